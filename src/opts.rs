//! Connection options.

use url::Url;

use crate::error::Error;
use crate::protocol::types::CapabilityFlags;

/// Default MySQL server port.
pub const DEFAULT_PORT: u16 = 3306;

/// Connection options for MySQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    /// Hostname or IP address.
    ///
    /// Default: `""`
    pub host: String,

    /// Port number for the MySQL server.
    ///
    /// Default: `3306`
    pub port: u16,

    /// Username for authentication.
    ///
    /// Default: `""`
    pub user: String,

    /// Password for authentication. Empty means no password.
    ///
    /// Default: `""`
    pub password: String,

    /// Default database sent in the auth packet.
    ///
    /// Default: `""`
    pub database: String,

    /// Character set sent in the auth packet.
    ///
    /// Default: `None` (use the charset from the server greeting)
    pub charset: Option<u8>,

    /// Client capability flags requested on connect.
    ///
    /// Default: `CapabilityFlags::default()`
    pub capabilities: CapabilityFlags,

    /// Disable Nagle's algorithm on TCP connections.
    ///
    /// Default: `true`
    pub tcp_nodelay: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            user: String::new(),
            password: String::new(),
            database: String::new(),
            charset: None,
            capabilities: CapabilityFlags::default(),
            tcp_nodelay: true,
        }
    }
}

impl Opts {
    /// Parse a semicolon-separated `key=value` connection string.
    ///
    /// Recognized keys: `host`, `port`, `user`, `pwd`, `db`. Empty segments
    /// are skipped; any other key is an error.
    pub fn from_connection_string(s: &str) -> Result<Self, Error> {
        let mut opts = Opts::default();
        for pair in s.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some((key, value)) = pair.split_once('=') else {
                return Err(Error::Config(format!("Expected key=value, got '{pair}'")));
            };
            let value = value.trim();
            match key.trim() {
                "host" => opts.host = value.to_string(),
                "port" => {
                    opts.port = value
                        .parse()
                        .map_err(|_| Error::Config(format!("Invalid port: {value}")))?;
                }
                "user" => opts.user = value.to_string(),
                "pwd" => opts.password = value.to_string(),
                "db" => opts.database = value.to_string(),
                other => {
                    return Err(Error::Config(format!("Unknown connection string key '{other}'")));
                }
            }
        }
        Ok(opts)
    }
}

impl TryFrom<&Url> for Opts {
    type Error = Error;

    /// Parse a MySQL connection URL.
    ///
    /// Format: `mysql://[user[:password]@]host[:port][/database]`
    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        if url.scheme() != "mysql" {
            return Err(Error::Config(format!(
                "Invalid scheme: expected 'mysql://', got '{}://'",
                url.scheme()
            )));
        }

        Ok(Opts {
            host: url.host_str().unwrap_or("localhost").to_string(),
            port: url.port().unwrap_or(DEFAULT_PORT),
            user: url.username().to_string(),
            password: url.password().unwrap_or_default().to_string(),
            database: url.path().trim_start_matches('/').to_string(),
            ..Opts::default()
        })
    }
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    /// Accepts either a `mysql://` URL or a `key=value;...` connection string.
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        if s.starts_with("mysql://") {
            let url = Url::parse(s).map_err(|e| Error::Config(format!("Invalid URL: {e}")))?;
            Self::try_from(&url)
        } else {
            Self::from_connection_string(s)
        }
    }
}
