//! Per-connection prepared statement registry.
//!
//! Maps SQL text to the server-side statement handle. Releases are deferred:
//! the server cannot be told to close a statement while a result is pending,
//! so [`StatementRegistry::queue_for_release`] only marks the entry and the
//! connection drains the queue at its next purge.

use std::collections::HashMap;

use crate::protocol::column::FieldDescription;

/// Server-side prepared statement handle and its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatementInfo {
    pub statement_id: u32,
    pub param_count: u16,
    pub params: Vec<FieldDescription>,
    pub columns: Vec<FieldDescription>,
    pub queued_for_release: bool,
}

/// Statements prepared on one connection, keyed by SQL text.
#[derive(Debug, Default)]
pub struct StatementRegistry {
    entries: HashMap<String, PreparedStatementInfo>,
    /// SQL keys marked for release, in marking order.
    release_queue: Vec<String>,
}

impl StatementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached entry for `sql`, un-marking it if it was queued for release.
    pub fn lookup(&mut self, sql: &str) -> Option<&PreparedStatementInfo> {
        let info = self.entries.get_mut(sql)?;
        if info.queued_for_release {
            info.queued_for_release = false;
            self.release_queue.retain(|queued| queued != sql);
        }
        Some(info)
    }

    /// Returns the cached entry for `sql` without touching its release mark.
    pub fn get(&self, sql: &str) -> Option<&PreparedStatementInfo> {
        self.entries.get(sql)
    }

    pub fn insert(&mut self, sql: String, info: PreparedStatementInfo) {
        self.release_queue.retain(|queued| *queued != sql);
        self.entries.insert(sql, info);
    }

    /// Mark `sql` for release. Returns false if it is not registered.
    pub fn queue_for_release(&mut self, sql: &str) -> bool {
        match self.entries.get_mut(sql) {
            Some(info) => {
                if !info.queued_for_release {
                    info.queued_for_release = true;
                    self.release_queue.push(sql.to_string());
                }
                true
            }
            None => false,
        }
    }

    /// Mark every entry for release.
    pub fn queue_all_for_release(&mut self) {
        let mut keys: Vec<&String> = self
            .entries
            .iter()
            .filter(|(_, info)| !info.queued_for_release)
            .map(|(sql, _)| sql)
            .collect();
        keys.sort();
        let keys: Vec<String> = keys.into_iter().cloned().collect();
        for sql in keys {
            self.queue_for_release(&sql);
        }
    }

    pub fn has_queued(&self) -> bool {
        !self.release_queue.is_empty()
    }

    /// Remove every queued entry, returning `(sql, statement_id)` in queue order.
    pub fn take_queued(&mut self) -> Vec<(String, u32)> {
        let queue = std::mem::take(&mut self.release_queue);
        queue
            .into_iter()
            .filter_map(|sql| {
                let info = self.entries.remove(&sql)?;
                Some((sql, info.statement_id))
            })
            .collect()
    }

    /// Forget every statement. Used when the server session is gone.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.release_queue.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
