//! Lazily consumed result set.

use crate::error::{Error, Result};
use crate::protocol::column::FieldDescription;
use crate::row::Row;

use super::conn::Conn;

/// Rows of one result set, read from the connection on demand.
///
/// A stream does not borrow its connection; every call takes the connection
/// explicitly. The stream is valid only while the connection's command
/// counter still equals the value captured at creation: any later command,
/// a purge or a kill makes every operation return [`Error::StaleResult`].
///
/// Dropping a stream without reading it to the end is fine; the remaining
/// rows are discarded by the next command.
#[derive(Debug)]
pub struct ResultStream {
    conn_id: u64,
    counter: u64,
    columns: Vec<FieldDescription>,
    binary: bool,
    current: Option<Row>,
}

impl ResultStream {
    /// Read the result headers and the first row.
    pub(crate) fn open(conn: &mut Conn, column_count: u64, binary: bool) -> Result<Self> {
        let columns = conn.read_columns(column_count)?;
        let mut stream = Self {
            conn_id: conn.id(),
            counter: conn.command_counter(),
            columns,
            binary,
            current: None,
        };
        stream.current = conn.fetch_row(&stream.columns, binary)?;
        Ok(stream)
    }

    pub fn columns(&self) -> &[FieldDescription] {
        &self.columns
    }

    /// Returns true for rows of the binary (prepared statement) protocol.
    pub fn is_binary(&self) -> bool {
        self.binary
    }

    /// Returns true while no command has been issued on `conn` since this stream was created.
    pub fn is_valid(&self, conn: &Conn) -> bool {
        conn.id() == self.conn_id && conn.command_counter() == self.counter
    }

    fn check(&self, conn: &Conn) -> Result<()> {
        if self.is_valid(conn) {
            Ok(())
        } else {
            Err(Error::StaleResult)
        }
    }

    /// The row under the cursor, or `None` past the last row.
    pub fn current(&self, conn: &Conn) -> Result<Option<&Row>> {
        self.check(conn)?;
        Ok(self.current.as_ref())
    }

    pub fn is_end(&self, conn: &Conn) -> Result<bool> {
        self.check(conn)?;
        Ok(self.current.is_none())
    }

    /// Move the cursor to the next row.
    pub fn advance(&mut self, conn: &mut Conn) -> Result<()> {
        self.check(conn)?;
        if self.current.take().is_some() {
            self.current = conn.fetch_row(&self.columns, self.binary)?;
        }
        Ok(())
    }

    /// Take the row under the cursor and advance.
    pub fn next_row(&mut self, conn: &mut Conn) -> Result<Option<Row>> {
        self.check(conn)?;
        let Some(row) = self.current.take() else {
            return Ok(None);
        };
        self.current = conn.fetch_row(&self.columns, self.binary)?;
        Ok(Some(row))
    }

    /// Read and collect every remaining row.
    pub fn collect_rows(mut self, conn: &mut Conn) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row(conn)? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Discard the remaining rows now instead of at the next command.
    pub fn close(self, conn: &mut Conn) -> Result<()> {
        self.check(conn)?;
        conn.discard_result()
    }
}
