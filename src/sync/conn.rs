//! Synchronous MySQL connection.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::channel::Connector;
use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::codec::PacketBuilder;
use crate::protocol::column::FieldDescription;
use crate::protocol::command::{
    write_command, write_execute, write_long_data, write_prepare, write_stmt_close,
};
use crate::protocol::response::{
    EofPacket, OkPacket, Response, is_eof, is_err, parse_err, parse_ok_or_err,
};
use crate::protocol::row::{decode_binary_row, decode_text_row};
use crate::protocol::types::{CapabilityFlags, CommandByte, StatusFlags};
use crate::registry::{PreparedStatementInfo, StatementRegistry};
use crate::row::Row;
use crate::state::{Action, HandshakeStateMachine, PendingData, PrepareStateMachine, ServerInfo};
use crate::statement::{IntoStatement, PreparedStatement};
use crate::value::Param;

use super::framer::Framer;
use super::result_stream::ResultStream;
use super::stream::TcpConnector;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Upper bound for preallocating column descriptions.
const MAX_PREALLOCATED_COLUMNS: u64 = 1024;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No channel.
    NotConnected,
    /// Greeting received, authentication in progress.
    Connected,
    /// Ready for commands.
    Authenticated,
}

fn not_connected() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::NotConnected,
        "connection is not open",
    ))
}

/// Synchronous MySQL connection.
///
/// Only one result can be outstanding at a time. Every command first purges
/// whatever is left of the previous result and then releases statements
/// queued for release. If the channel turns out to be closed, the command
/// reconnects transparently (except QUIT).
pub struct Conn {
    id: u64,
    opts: Opts,
    connector: Box<dyn Connector>,
    framer: Option<Framer>,
    state: ConnectionState,
    /// Client flags used for the last connect; reused on reconnect.
    requested: CapabilityFlags,
    capabilities: CapabilityFlags,
    server: Option<ServerInfo>,
    status: StatusFlags,
    affected_rows: u64,
    last_insert_id: u64,
    command_counter: u64,
    pending: PendingData,
    registry: StatementRegistry,
    purging: bool,
    read_buffer: Vec<u8>,
    write_buffer: Vec<u8>,
}

impl Conn {
    /// Connect to a MySQL server over TCP.
    ///
    /// Accepts [`Opts`], a `mysql://` URL or a `key=value;...` connection string.
    pub fn new<O: TryInto<Opts>>(opts: O) -> Result<Self>
    where
        Error: From<O::Error>,
    {
        let opts = opts.try_into()?;
        let connector = TcpConnector::new(&opts)?;
        Self::with_connector(opts, connector)
    }

    /// Connect using channels produced by `connector`.
    pub fn with_connector<K: Connector + 'static>(opts: Opts, connector: K) -> Result<Self> {
        let requested = opts.capabilities;
        let mut conn = Self {
            id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            opts,
            connector: Box::new(connector),
            framer: None,
            state: ConnectionState::NotConnected,
            requested,
            capabilities: CapabilityFlags::new(0),
            server: None,
            status: StatusFlags::default(),
            affected_rows: 0,
            last_insert_id: 0,
            command_counter: 0,
            pending: PendingData::default(),
            registry: StatementRegistry::new(),
            purging: false,
            read_buffer: Vec::with_capacity(8192),
            write_buffer: Vec::with_capacity(8192),
        };
        conn.connect(requested)?;
        Ok(conn)
    }

    /// Process-unique id of this connection object.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns true if a channel is attached and reports itself open.
    pub fn is_open(&self) -> bool {
        self.framer.as_ref().is_some_and(Framer::is_open)
    }

    /// Negotiated capability flags of the current session.
    pub fn capabilities(&self) -> CapabilityFlags {
        self.capabilities
    }

    /// Client capability flags requested on the last connect.
    pub fn requested_capabilities(&self) -> CapabilityFlags {
        self.requested
    }

    /// Server metadata from the last greeting.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server.as_ref()
    }

    /// Server status flags from the last OK or EOF packet.
    pub fn status(&self) -> StatusFlags {
        self.status
    }

    pub fn in_transaction(&self) -> bool {
        self.status.in_transaction()
    }

    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    /// Incremented by every command sent and every kill.
    pub fn command_counter(&self) -> u64 {
        self.command_counter
    }

    /// Returns true while result headers or rows are unread.
    pub fn has_pending_result(&self) -> bool {
        self.pending.is_pending()
    }

    pub fn statement_registry(&self) -> &StatementRegistry {
        &self.registry
    }

    // === Lifecycle ===

    fn connect(&mut self, requested: CapabilityFlags) -> Result<()> {
        let result = self.connect_inner(requested);
        if let Err(ref e) = result {
            debug!(conn_id = self.id, error = %e, "connect failed");
            self.kill();
        }
        result
    }

    fn connect_inner(&mut self, requested: CapabilityFlags) -> Result<()> {
        self.requested = requested;
        self.framer = Some(Framer::new(self.connector.connect()?));

        let opts = self.opts.clone();
        let mut handshake = HandshakeStateMachine::new(&opts, requested);
        let mut action = handshake.start()?;
        loop {
            match action {
                Action::ReadPacket => {}
                Action::WriteAndReadPacket => {
                    self.state = ConnectionState::Connected;
                    self.write_packet()?;
                }
                Action::Finished => break,
            }
            self.read_packet()?;
            action = handshake.step(&self.read_buffer, &mut self.write_buffer)?;
        }

        self.capabilities = handshake.negotiated();
        self.server = handshake.take_server_info();
        self.status = self.server.as_ref().map_or_else(StatusFlags::default, |s| s.status);
        self.pending.clear();
        self.state = ConnectionState::Authenticated;
        debug!(
            conn_id = self.id,
            thread_id = self.server.as_ref().map_or(0, |s| s.thread_id),
            "authenticated"
        );
        Ok(())
    }

    /// Reconnect with the capability flags of the last connect.
    pub fn reconnect(&mut self) -> Result<()> {
        self.reconnect_with(self.requested)
    }

    /// Reconnect requesting `capabilities`.
    ///
    /// A no-op if the connection is open and was made with the same flags.
    pub fn reconnect_with(&mut self, capabilities: CapabilityFlags) -> Result<()> {
        if self.is_open()
            && self.state == ConnectionState::Authenticated
            && capabilities == self.requested
        {
            return Ok(());
        }
        if let Err(e) = self.close() {
            debug!(conn_id = self.id, error = %e, "quit before reconnect failed");
        }
        self.connect(capabilities)
    }

    /// Send QUIT (if authenticated) and drop the channel.
    ///
    /// The connection object stays usable: the next command reconnects.
    pub fn close(&mut self) -> Result<()> {
        // A failed purge kills the connection, leaving nothing to quit.
        self.purge();
        let result = if self.state == ConnectionState::Authenticated && self.is_open() {
            self.send_command(CommandByte::Quit, |buf| {
                write_command(buf, CommandByte::Quit, &[]);
                Ok(())
            })
        } else {
            Ok(())
        };
        self.kill();
        result
    }

    /// Drop the channel without notifying the server.
    ///
    /// Forgets all prepared statements and invalidates every result stream.
    pub fn kill(&mut self) {
        if self.framer.take().is_some() {
            debug!(conn_id = self.id, "connection killed");
        }
        self.state = ConnectionState::NotConnected;
        self.pending.clear();
        self.registry.clear();
        self.command_counter += 1;
    }

    fn handle_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            if e.is_fatal() {
                warn!(conn_id = self.id, error = %e, "fatal error, killing connection");
                self.kill();
            }
        }
        result
    }

    // === Packet I/O ===

    fn read_packet(&mut self) -> Result<()> {
        let framer = self.framer.as_mut().ok_or_else(not_connected)?;
        framer.read_packet(&mut self.read_buffer)
    }

    fn write_packet(&mut self) -> Result<()> {
        let framer = self.framer.as_mut().ok_or_else(not_connected)?;
        framer.write_packet(&mut self.write_buffer)
    }

    /// Purge, then reconnect if the channel is gone and `command` is not QUIT.
    fn prepare_for_command(&mut self, command: CommandByte) -> Result<()> {
        self.purge();
        if command != CommandByte::Quit && !self.is_open() {
            if self.state != ConnectionState::NotConnected {
                warn!(conn_id = self.id, ?command, "channel closed, reconnecting");
            }
            self.kill();
            self.connect(self.requested)?;
        }
        Ok(())
    }

    /// Send one command packet built by `build`.
    fn send_command<F>(&mut self, command: CommandByte, build: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<u8>) -> Result<()>,
    {
        self.prepare_for_command(command)?;
        build(&mut self.write_buffer)?;

        let framer = self.framer.as_mut().ok_or_else(not_connected)?;
        framer.reset_sequence();
        framer.write_packet(&mut self.write_buffer)?;
        self.command_counter += 1;
        debug!(conn_id = self.id, ?command, "sent command");
        Ok(())
    }

    fn record_ok(&mut self, ok: &OkPacket) {
        self.affected_rows = ok.affected_rows;
        self.last_insert_id = ok.last_insert_id;
        self.status = ok.status;
    }

    /// Read the first response packet of a command that may return rows.
    fn read_response(&mut self, binary: bool) -> Result<Response> {
        self.read_packet()?;
        let response = Response::parse(&self.read_buffer)?;
        match &response {
            Response::Ok(ok) => self.record_ok(ok),
            Response::ResultSet { .. } => self.pending.start_result_set(binary),
        }
        Ok(response)
    }

    fn read_ok(&mut self) -> Result<OkPacket> {
        self.read_packet()?;
        let ok = parse_ok_or_err(&self.read_buffer)?;
        self.record_ok(&ok);
        Ok(ok)
    }

    /// Read the field descriptions of a result set and their EOF marker.
    pub(crate) fn read_columns(&mut self, column_count: u64) -> Result<Vec<FieldDescription>> {
        let mut columns =
            Vec::with_capacity(column_count.min(MAX_PREALLOCATED_COLUMNS) as usize);
        for _ in 0..column_count {
            self.read_packet()?;
            columns.push(FieldDescription::parse(&self.read_buffer)?);
        }
        self.read_packet()?;
        if !is_eof(&self.read_buffer) {
            return Err(Error::Protocol(
                "Expected EOF after column definitions".into(),
            ));
        }
        self.pending.headers_done();
        Ok(columns)
    }

    /// Read the next row, or `None` once the row terminator has been read.
    fn read_row(&mut self, columns: &[FieldDescription], binary: bool) -> Result<Option<Row>> {
        if !self.pending.rows() {
            return Ok(None);
        }
        self.read_packet()?;
        if is_eof(&self.read_buffer) {
            self.status = EofPacket::parse(&self.read_buffer)?.status;
            self.pending.rows_done();
            return Ok(None);
        }
        if is_err(&self.read_buffer) {
            self.pending.rows_done();
            return Err(Error::Server(parse_err(&self.read_buffer)?));
        }
        let values = if binary {
            decode_binary_row(&self.read_buffer, columns)?
        } else {
            decode_text_row(&self.read_buffer, columns)?
        };
        Ok(Some(Row::new(values)))
    }

    pub(crate) fn fetch_row(
        &mut self,
        columns: &[FieldDescription],
        binary: bool,
    ) -> Result<Option<Row>> {
        let result = self.read_row(columns, binary);
        self.handle_error(result)
    }

    // === Purge ===

    /// Discard unread result data, then release statements queued for release.
    ///
    /// Any [`ResultStream`] over the discarded result becomes invalid.
    /// Never fails: an error here means the connection is already broken, so
    /// it is killed and the next command reconnects.
    pub fn purge(&mut self) {
        if self.purging {
            return;
        }
        self.purging = true;
        let result = self
            .discard_pending()
            .and_then(|()| self.release_queued());
        self.purging = false;

        if let Err(e) = result {
            warn!(conn_id = self.id, error = %e, "purge failed, killing connection");
            self.kill();
        }
    }

    fn discard_pending(&mut self) -> Result<()> {
        if !self.pending.is_pending() {
            return Ok(());
        }
        let mut discarded = 0usize;
        if self.pending.headers() {
            loop {
                self.read_packet()?;
                if is_eof(&self.read_buffer) {
                    break;
                }
                discarded += 1;
            }
            self.pending.headers_done();
        }
        if self.pending.rows() {
            loop {
                self.read_packet()?;
                if is_eof(&self.read_buffer) {
                    self.status = EofPacket::parse(&self.read_buffer)?.status;
                    break;
                }
                if is_err(&self.read_buffer) {
                    break;
                }
                discarded += 1;
            }
            self.pending.rows_done();
        }
        // Streams over the discarded result are now stale.
        self.command_counter += 1;
        debug!(conn_id = self.id, packets = discarded, "discarded pending result");
        Ok(())
    }

    /// Explicit purge of the current result (closing a result stream early).
    pub(crate) fn discard_result(&mut self) -> Result<()> {
        let result = self.discard_pending();
        self.handle_error(result)
    }

    fn release_queued(&mut self) -> Result<()> {
        if !self.registry.has_queued() || !self.is_open() {
            return Ok(());
        }
        for (sql, statement_id) in self.registry.take_queued() {
            self.send_command(CommandByte::StmtClose, |buf| {
                write_stmt_close(buf, statement_id);
                Ok(())
            })?;
            debug!(conn_id = self.id, statement_id, %sql, "released statement");
        }
        Ok(())
    }

    // === Text protocol ===

    /// Run `sql` and stream its result set.
    ///
    /// Fails with `InvalidUsage` if the statement returns no result set.
    pub fn query(&mut self, sql: &str) -> Result<ResultStream> {
        let result = self.query_inner(sql);
        self.handle_error(result)
    }

    fn query_inner(&mut self, sql: &str) -> Result<ResultStream> {
        self.send_query(sql)?;
        match self.read_response(false)? {
            Response::ResultSet { column_count } => ResultStream::open(self, column_count, false),
            Response::Ok(_) => Err(Error::InvalidUsage(
                "query returned no result set, use execute".into(),
            )),
        }
    }

    /// Run a statement that returns no result set.
    ///
    /// Fails with `InvalidUsage` if a result set arrives; it is discarded by
    /// the next command.
    pub fn execute(&mut self, sql: &str) -> Result<OkPacket> {
        let result = self.execute_inner(sql);
        self.handle_error(result)
    }

    fn execute_inner(&mut self, sql: &str) -> Result<OkPacket> {
        self.send_query(sql)?;
        match self.read_response(false)? {
            Response::Ok(ok) => Ok(ok),
            Response::ResultSet { .. } => Err(Error::InvalidUsage(
                "statement returned a result set, use query".into(),
            )),
        }
    }

    /// Run `sql`, discarding any rows. Returns the affected row count.
    pub fn query_drop(&mut self, sql: &str) -> Result<u64> {
        let result = self.query_drop_inner(sql);
        self.handle_error(result)
    }

    fn query_drop_inner(&mut self, sql: &str) -> Result<u64> {
        self.send_query(sql)?;
        match self.read_response(false)? {
            Response::Ok(ok) => Ok(ok.affected_rows),
            Response::ResultSet { .. } => {
                self.discard_pending()?;
                Ok(0)
            }
        }
    }

    fn send_query(&mut self, sql: &str) -> Result<()> {
        self.send_command(CommandByte::Query, |buf| {
            write_command(buf, CommandByte::Query, sql.as_bytes());
            Ok(())
        })
    }

    // === Prepared statements ===

    /// Prepare `sql`, or return the statement already registered for it.
    pub fn prepare(&mut self, sql: &str) -> Result<PreparedStatement> {
        let result = self
            .register_if_needed(sql)
            .map(|info| PreparedStatement::new(sql, &info));
        self.handle_error(result)
    }

    /// Look up `sql` in the registry, preparing it on the server if absent.
    ///
    /// A cached entry queued for release is un-marked and reused.
    fn register_if_needed(&mut self, sql: &str) -> Result<PreparedStatementInfo> {
        if self.is_open() {
            if let Some(info) = self.registry.lookup(sql) {
                return Ok(info.clone());
            }
        }

        self.send_command(CommandByte::StmtPrepare, |buf| {
            write_prepare(buf, sql);
            Ok(())
        })?;

        let mut state_machine = PrepareStateMachine::new();
        loop {
            self.read_packet()?;
            if state_machine.step(&self.read_buffer)? == Action::Finished {
                break;
            }
        }
        let info = state_machine
            .take_statement()
            .ok_or_else(|| Error::Protocol("Incomplete STMT_PREPARE response".into()))?;
        debug!(
            conn_id = self.id,
            statement_id = info.statement_id,
            params = info.param_count,
            "prepared statement"
        );
        self.registry.insert(sql.to_string(), info.clone());
        Ok(info)
    }

    /// Queue the statement for `sql` for release at the next purge.
    ///
    /// Returns false if `sql` is not registered on this connection.
    pub fn release_statement(&mut self, sql: &str) -> bool {
        self.registry.queue_for_release(sql)
    }

    /// Queue every registered statement for release at the next purge.
    pub fn release_all_statements(&mut self) {
        self.registry.queue_all_for_release();
    }

    /// Execute a prepared statement and stream its result set.
    ///
    /// `statement` is a [`PreparedStatement`] or SQL text, prepared on
    /// demand. Long-data parameters are streamed before the execute packet.
    pub fn exec<S: IntoStatement>(
        &mut self,
        statement: S,
        params: &mut [Param],
    ) -> Result<ResultStream> {
        let result = self
            .exec_response(statement.as_sql(), params)
            .and_then(|response| match response {
                Response::ResultSet { column_count } => {
                    ResultStream::open(self, column_count, true)
                }
                Response::Ok(_) => Err(Error::InvalidUsage(
                    "statement returned no result set, use exec_ok".into(),
                )),
            });
        self.handle_error(result)
    }

    /// Execute a prepared statement that returns no result set.
    pub fn exec_ok<S: IntoStatement>(
        &mut self,
        statement: S,
        params: &mut [Param],
    ) -> Result<OkPacket> {
        let result = self
            .exec_response(statement.as_sql(), params)
            .and_then(|response| match response {
                Response::Ok(ok) => Ok(ok),
                Response::ResultSet { .. } => Err(Error::InvalidUsage(
                    "statement returned a result set, use exec".into(),
                )),
            });
        self.handle_error(result)
    }

    /// Execute a prepared statement, discarding any rows. Returns the affected row count.
    pub fn exec_drop<S: IntoStatement>(&mut self, statement: S, params: &mut [Param]) -> Result<u64> {
        let result = self
            .exec_response(statement.as_sql(), params)
            .and_then(|response| match response {
                Response::Ok(ok) => Ok(ok.affected_rows),
                Response::ResultSet { .. } => self.discard_pending().map(|()| 0),
            });
        self.handle_error(result)
    }

    fn exec_response(&mut self, sql: &str, params: &mut [Param]) -> Result<Response> {
        let mut info = self.register_if_needed(sql)?;
        self.prepare_for_command(CommandByte::StmtExecute)?;
        if self.registry.get(sql).is_none() {
            // The session was reset by the purge or a reconnect.
            info = self.register_if_needed(sql)?;
        }

        if params.len() != info.param_count as usize {
            return Err(Error::Binding(format!(
                "statement expects {} parameters, got {}",
                info.param_count,
                params.len()
            )));
        }
        if params
            .iter()
            .any(|p| p.long_data.as_ref().is_some_and(|l| l.chunk_size == 0))
        {
            return Err(Error::Binding("long data chunk size must be nonzero".into()));
        }

        let mut packet = Vec::new();
        write_execute(&mut packet, info.statement_id, params)?;

        self.send_long_data(info.statement_id, params)?;
        self.send_command(CommandByte::StmtExecute, |buf| {
            buf.clear();
            buf.extend_from_slice(&packet);
            Ok(())
        })?;
        self.read_response(true)
    }

    /// Stream every long-data parameter, in parameter order.
    ///
    /// A chunk shorter than the chunk size (possibly empty) ends a parameter.
    /// If streaming fails after a chunk went out, the statement is reset so the
    /// server drops the partial data.
    fn send_long_data(&mut self, statement_id: u32, params: &mut [Param]) -> Result<()> {
        let mut sent = false;
        let result = self.stream_long_data(statement_id, params, &mut sent);
        if let Err(e) = result {
            if sent && !e.is_fatal() {
                self.reset_statement(statement_id);
            }
            return Err(e);
        }
        Ok(())
    }

    fn stream_long_data(
        &mut self,
        statement_id: u32,
        params: &mut [Param],
        sent: &mut bool,
    ) -> Result<()> {
        for (idx, param) in params.iter_mut().enumerate() {
            let Some(long_data) = param.long_data.as_mut() else {
                continue;
            };
            let param_index = u16::try_from(idx)
                .map_err(|_| Error::Binding(format!("parameter index {idx} out of range")))?;

            let mut chunk = vec![0u8; long_data.chunk_size];
            let mut total = 0u64;
            loop {
                let len = long_data.source.fill_chunk(&mut chunk)?;
                if len > chunk.len() {
                    return Err(Error::Binding(format!(
                        "chunk source returned {len} bytes for a {}-byte chunk",
                        chunk.len()
                    )));
                }
                total += len as u64;
                if total > long_data.max_len {
                    return Err(Error::Binding(format!(
                        "long data for parameter {idx} exceeds {} bytes",
                        long_data.max_len
                    )));
                }
                self.send_command(CommandByte::StmtSendLongData, |buf| {
                    write_long_data(buf, statement_id, param_index, &chunk[..len]);
                    Ok(())
                })?;
                *sent = true;
                if len < chunk.len() {
                    break;
                }
            }
            debug!(conn_id = self.id, statement_id, param_index, bytes = total, "sent long data");
        }
        Ok(())
    }

    /// Discard long data buffered on the server for a statement.
    ///
    /// A failed reset kills the connection, which discards it as well.
    fn reset_statement(&mut self, statement_id: u32) {
        let result = self.simple_command(CommandByte::StmtReset, &statement_id.to_le_bytes());
        match result {
            Ok(_) => debug!(conn_id = self.id, statement_id, "statement reset"),
            Err(e) => {
                warn!(
                    conn_id = self.id,
                    statement_id,
                    error = %e,
                    "statement reset failed, killing connection"
                );
                self.kill();
            }
        }
    }

    // === Utility commands ===

    /// Check that the server is alive.
    pub fn ping(&mut self) -> Result<()> {
        let result = self.simple_command(CommandByte::Ping, &[]).map(drop);
        self.handle_error(result)
    }

    /// Change the default database.
    pub fn init_db(&mut self, database: &str) -> Result<()> {
        let result = self
            .simple_command(CommandByte::InitDb, database.as_bytes())
            .map(drop);
        self.handle_error(result)
    }

    /// Flush server caches (REFRESH with the given sub-command flags).
    pub fn refresh(&mut self, flags: u8) -> Result<()> {
        let result = self.simple_command(CommandByte::Refresh, &[flags]).map(drop);
        self.handle_error(result)
    }

    /// Human-readable server statistics.
    pub fn statistics(&mut self) -> Result<String> {
        let result = self.statistics_inner();
        self.handle_error(result)
    }

    fn statistics_inner(&mut self) -> Result<String> {
        self.send_command(CommandByte::Statistics, |buf| {
            write_command(buf, CommandByte::Statistics, &[]);
            Ok(())
        })?;
        self.read_packet()?;
        if is_err(&self.read_buffer) {
            return Err(Error::Server(parse_err(&self.read_buffer)?));
        }
        Ok(String::from_utf8_lossy(&self.read_buffer).into_owned())
    }

    /// Set a connection option (e.g. multi-statements on/off).
    pub fn set_option(&mut self, option: u16) -> Result<()> {
        let result = self.set_option_inner(option);
        self.handle_error(result)
    }

    fn set_option_inner(&mut self, option: u16) -> Result<()> {
        self.send_command(CommandByte::StmtOption, |buf| {
            let mut packet = PacketBuilder::command(buf, CommandByte::StmtOption);
            packet.write_u16(option);
            Ok(())
        })?;
        self.read_packet()?;
        if is_eof(&self.read_buffer) {
            self.status = EofPacket::parse(&self.read_buffer)?.status;
            return Ok(());
        }
        let ok = parse_ok_or_err(&self.read_buffer)?;
        self.record_ok(&ok);
        Ok(())
    }

    fn simple_command(&mut self, command: CommandByte, argument: &[u8]) -> Result<OkPacket> {
        self.send_command(command, |buf| {
            write_command(buf, command, argument);
            Ok(())
        })?;
        self.read_ok()
    }
}

impl Drop for Conn {
    fn drop(&mut self) {
        // Try to send QUIT, ignore errors
        if self.state != ConnectionState::Authenticated {
            return;
        }
        if let Some(framer) = self.framer.as_mut() {
            write_command(&mut self.write_buffer, CommandByte::Quit, &[]);
            framer.reset_sequence();
            let _ = framer.write_packet(&mut self.write_buffer);
        }
    }
}
