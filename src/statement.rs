//! Prepared statement value type and statement references for exec_* methods.

use crate::protocol::column::FieldDescription;
use crate::registry::PreparedStatementInfo;

/// A statement prepared through [`Conn::prepare`](crate::sync::Conn::prepare).
///
/// Carries the SQL text and the metadata reported by the server, but no
/// statement handle: handles belong to a connection and are looked up in its
/// registry by SQL text, so the value stays usable after a reconnect or on
/// another connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    sql: String,
    params: Vec<FieldDescription>,
    columns: Vec<FieldDescription>,
}

impl PreparedStatement {
    pub(crate) fn new(sql: &str, info: &PreparedStatementInfo) -> Self {
        Self {
            sql: sql.to_string(),
            params: info.params.clone(),
            columns: info.columns.clone(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Parameter descriptions reported at prepare time.
    pub fn params(&self) -> &[FieldDescription] {
        &self.params
    }

    /// Result column descriptions reported at prepare time.
    pub fn columns(&self) -> &[FieldDescription] {
        &self.columns
    }
}

/// Sealed trait for types that can be used as statement references in exec_* methods.
///
/// This trait is sealed and cannot be implemented outside this crate.
pub trait IntoStatement: private::Sealed {
    /// SQL text used as the registry key.
    fn as_sql(&self) -> &str;
}

mod private {
    use super::PreparedStatement;

    pub trait Sealed {}

    impl Sealed for &PreparedStatement {}
    impl Sealed for &str {}
    impl Sealed for &String {}
}

impl IntoStatement for &PreparedStatement {
    fn as_sql(&self) -> &str {
        &self.sql
    }
}

impl IntoStatement for &str {
    fn as_sql(&self) -> &str {
        self
    }
}

impl IntoStatement for &String {
    fn as_sql(&self) -> &str {
        self.as_str()
    }
}
