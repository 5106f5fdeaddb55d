//! A MySQL/MariaDB wire protocol client core.
//!
//! # Features
//!
//! - **Sans-I/O state machines**: Handshake and prepare logic is separated from I/O
//! - **Pluggable channels**: Connections talk to any [`Channel`] produced by a [`Connector`]
//! - **Prepared statements**: Per-connection statement registry with deferred release
//! - **Long data**: Parameters streamed to the server in fixed-size chunks
//! - **Self-healing**: Unread results are purged and closed channels reconnect transparently
//!
//! # Example
//!
//! ```no_run
//! use zero_mywire::sync::Conn;
//! use zero_mywire::{Opts, Param};
//!
//! fn main() -> zero_mywire::Result<()> {
//!     let opts = Opts {
//!         host: "localhost".into(),
//!         user: "root".into(),
//!         password: "secret".into(),
//!         database: "test".into(),
//!         ..Default::default()
//!     };
//!
//!     let mut conn = Conn::new(opts)?;
//!
//!     let rows = conn
//!         .exec("SELECT ? + 1", &mut [Param::new(41i32)])?
//!         .collect_rows(&mut conn)?;
//!     println!("Rows: {:?}", rows);
//!
//!     conn.close()?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod error;
pub mod opts;
pub mod protocol;
pub mod registry;
pub mod row;
pub mod state;
pub mod statement;
pub mod value;

#[cfg(feature = "sync")]
pub mod sync;

pub use channel::{Channel, Connector};
pub use error::{Error, Result, ServerError};
pub use opts::Opts;
pub use protocol::types::{CapabilityFlags, ColumnType, StatusFlags};
pub use protocol::{FieldDescription, OkPacket};
pub use registry::{PreparedStatementInfo, StatementRegistry};
pub use row::Row;
pub use statement::{IntoStatement, PreparedStatement};
pub use value::{
    ChunkSource, DEFAULT_MAX_LONG_DATA_LEN, DateTime, Param, ReaderSource, Time, Value,
};
