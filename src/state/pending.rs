//! Pending result data bookkeeping.

/// Which parts of the current result set have not been read yet.
///
/// No command may be sent while anything is pending: the connection purges
/// first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingData {
    headers: bool,
    rows: bool,
    binary: bool,
}

impl PendingData {
    /// A result set header arrived. `binary` is set for STMT_EXECUTE results.
    pub fn start_result_set(&mut self, binary: bool) {
        self.headers = true;
        self.rows = true;
        self.binary = binary;
    }

    /// The field descriptions and their terminating EOF have been read.
    pub fn headers_done(&mut self) {
        self.headers = false;
    }

    /// The row terminator (EOF or ERR) has been read.
    pub fn rows_done(&mut self) {
        self.rows = false;
        self.binary = false;
    }

    pub fn headers(&self) -> bool {
        self.headers
    }

    pub fn rows(&self) -> bool {
        self.rows
    }

    pub fn binary(&self) -> bool {
        self.binary
    }

    pub fn is_pending(&self) -> bool {
        self.headers || self.rows
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
