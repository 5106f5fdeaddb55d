//! In-process MySQL server speaking just enough of the protocol for tests.
//!
//! Every connect opens a new session. Client packets are answered
//! synchronously as they are written, and the responses are queued for
//! the next reads.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::rc::Rc;

use zero_mywire::protocol::handshake::scramble_password;
use zero_mywire::sync::Conn;
use zero_mywire::{CapabilityFlags, Channel, ColumnType, Opts};

pub const SCRAMBLE: [u8; 20] = *b"abcdefghijklmnopqrst";
pub const USER: &str = "app";
pub const PASSWORD: &str = "hunter2";

const CMD_QUIT: u8 = 0x01;
const CMD_INIT_DB: u8 = 0x02;
const CMD_QUERY: u8 = 0x03;
const CMD_REFRESH: u8 = 0x07;
const CMD_STATISTICS: u8 = 0x09;
const CMD_PING: u8 = 0x0e;
const CMD_STMT_PREPARE: u8 = 0x16;
const CMD_STMT_EXECUTE: u8 = 0x17;
const CMD_STMT_SEND_LONG_DATA: u8 = 0x18;
const CMD_STMT_CLOSE: u8 = 0x19;
const CMD_STMT_RESET: u8 = 0x1a;
const CMD_STMT_OPTION: u8 = 0x1b;

/// Observable server state, shared by every session.
#[derive(Debug, Default)]
pub struct ServerState {
    /// Number of sessions opened.
    pub connects: usize,
    /// Whether the current session's channel is open.
    pub open: bool,
    /// Client packets of the current session as `(sequence, payload)`.
    pub packets: Vec<(u8, Vec<u8>)>,
    /// Command bytes received after authentication, across sessions.
    pub commands: Vec<u8>,
    pub prepares: usize,
    pub closed_statements: Vec<u32>,
    /// Sizes of every long-data chunk received.
    pub long_data_chunks: Vec<usize>,
    /// Rows of table `t` (one nullable BIGINT column).
    pub table: Vec<Option<i64>>,
    /// Rows of table `blobs`.
    pub blobs: Vec<Vec<u8>>,
    /// Last client capability flags received.
    pub client_capabilities: u32,
    pub database: String,
    /// Capabilities advertised in the greeting.
    pub server_capabilities: u32,
    /// Statement ids reset with STMT_RESET.
    pub reset_statements: Vec<u32>,
    /// Make every read on the current session fail while the channel stays open.
    pub fail_reads: bool,
}

pub type Shared = Rc<RefCell<ServerState>>;

pub fn server() -> Shared {
    let caps = CapabilityFlags::default().0
        | CapabilityFlags::CLIENT_PLUGIN_AUTH
        | CapabilityFlags::CLIENT_MULTI_STATEMENTS;
    Rc::new(RefCell::new(ServerState {
        server_capabilities: caps,
        ..ServerState::default()
    }))
}

pub fn opts() -> Opts {
    Opts {
        host: "fake".into(),
        user: USER.into(),
        password: PASSWORD.into(),
        database: "test".into(),
        ..Opts::default()
    }
}

/// Connect a client to a fresh fake server.
pub fn connect() -> (Conn, Shared) {
    let state = server();
    let conn = connect_to(&state, opts()).expect("connect to fake server");
    (conn, state)
}

pub fn connect_to(state: &Shared, opts: Opts) -> zero_mywire::Result<Conn> {
    let shared = state.clone();
    Conn::with_connector(opts, move || Ok::<_, io::Error>(FakeChannel::open(shared.clone())))
}

struct Statement {
    sql: String,
    params: usize,
    long_data: HashMap<u16, Vec<u8>>,
}

/// One decoded execute parameter, kept in its wire encoding.
#[derive(Debug, Clone)]
enum Param {
    Null,
    Value { ty: u8, unsigned: bool, raw: Vec<u8> },
    LongData(Vec<u8>),
}

impl Param {
    fn as_int(&self) -> Option<i64> {
        let Param::Value { ty, unsigned, raw } = self else {
            return None;
        };
        let mut bytes = [0u8; 8];
        bytes[..raw.len()].copy_from_slice(raw);
        let value = i64::from_le_bytes(bytes);
        let bits = raw.len() * 8;
        match ty {
            0x01 | 0x02 | 0x03 | 0x08 | 0x09 | 0x0d if *unsigned || bits == 64 => Some(value),
            // sign-extend
            0x01 | 0x02 | 0x03 | 0x08 | 0x09 | 0x0d => Some((value << (64 - bits)) >> (64 - bits)),
            _ => None,
        }
    }

    fn as_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Param::LongData(bytes) => Some(bytes.clone()),
            Param::Value { raw, .. } => {
                let (len, rest) = read_lenenc(raw);
                Some(rest[..len].to_vec())
            }
            Param::Null => None,
        }
    }
}

pub struct FakeChannel {
    state: Shared,
    session: usize,
    authenticated: bool,
    statements: HashMap<u32, Statement>,
    next_statement_id: u32,
    input: Vec<u8>,
    output: VecDeque<u8>,
}

impl FakeChannel {
    fn open(state: Shared) -> Self {
        let session = {
            let mut s = state.borrow_mut();
            s.connects += 1;
            s.fail_reads = false;
            s.open = true;
            s.packets.clear();
            s.connects
        };
        let mut channel = Self {
            state,
            session,
            authenticated: false,
            statements: HashMap::new(),
            next_statement_id: 1,
            input: Vec::new(),
            output: VecDeque::new(),
        };
        let greeting = channel.greeting();
        channel.send(0, &greeting);
        channel
    }

    fn greeting(&self) -> Vec<u8> {
        let caps = self.state.borrow().server_capabilities;
        let mut p = vec![10];
        p.extend_from_slice(b"8.0.36-fake\0");
        p.extend_from_slice(&(self.session as u32).to_le_bytes());
        p.extend_from_slice(&SCRAMBLE[..8]);
        p.push(0);
        p.extend_from_slice(&(caps as u16).to_le_bytes());
        p.push(45);
        p.extend_from_slice(&2u16.to_le_bytes());
        p.extend_from_slice(&((caps >> 16) as u16).to_le_bytes());
        p.push(21);
        p.extend_from_slice(&[0; 10]);
        p.extend_from_slice(&SCRAMBLE[8..]);
        p.push(0);
        p.extend_from_slice(b"mysql_native_password\0");
        p
    }

    fn send(&mut self, seq: u8, payload: &[u8]) {
        let len = payload.len() as u32;
        self.output.extend(&len.to_le_bytes()[..3]);
        self.output.push_back(seq);
        self.output.extend(payload);
    }

    fn send_ok(&mut self, seq: u8, affected: u64, last_insert_id: u64) {
        let mut p = vec![0x00];
        lenenc(&mut p, affected);
        lenenc(&mut p, last_insert_id);
        p.extend_from_slice(&2u16.to_le_bytes());
        p.extend_from_slice(&0u16.to_le_bytes());
        self.send(seq, &p);
    }

    fn send_err(&mut self, seq: u8, code: u16, state: &str, message: &str) {
        let mut p = vec![0xFF];
        p.extend_from_slice(&code.to_le_bytes());
        p.push(b'#');
        p.extend_from_slice(state.as_bytes());
        p.extend_from_slice(message.as_bytes());
        self.send(seq, &p);
    }

    fn send_eof(&mut self, seq: u8) {
        self.send(seq, &[0xFE, 0, 0, 2, 0]);
    }

    fn handle(&mut self, seq: u8, payload: Vec<u8>) {
        self.state.borrow_mut().packets.push((seq, payload.clone()));
        if !self.authenticated {
            self.handle_auth(seq, &payload);
            return;
        }
        let Some((&command, body)) = payload.split_first() else {
            return;
        };
        self.state.borrow_mut().commands.push(command);
        assert_eq!(seq, 0, "command packet must start a new sequence");
        match command {
            CMD_QUIT => self.state.borrow_mut().open = false,
            CMD_PING | CMD_REFRESH => self.send_ok(1, 0, 0),
            CMD_INIT_DB => {
                let db = String::from_utf8_lossy(body).into_owned();
                if db == "missing" {
                    self.send_err(1, 1049, "42000", "Unknown database 'missing'");
                } else {
                    self.state.borrow_mut().database = db;
                    self.send_ok(1, 0, 0);
                }
            }
            CMD_STATISTICS => self.send(1, b"Uptime: 42  Threads: 1  Questions: 7"),
            CMD_STMT_OPTION => self.send_eof(1),
            CMD_QUERY => self.handle_query(&String::from_utf8_lossy(body)),
            CMD_STMT_PREPARE => self.handle_prepare(&String::from_utf8_lossy(body)),
            CMD_STMT_EXECUTE => self.handle_execute(body),
            CMD_STMT_SEND_LONG_DATA => {
                let id = u32::from_le_bytes(body[..4].try_into().unwrap());
                let idx = u16::from_le_bytes(body[4..6].try_into().unwrap());
                let chunk = &body[6..];
                self.state.borrow_mut().long_data_chunks.push(chunk.len());
                if let Some(stmt) = self.statements.get_mut(&id) {
                    stmt.long_data.entry(idx).or_default().extend_from_slice(chunk);
                }
            }
            CMD_STMT_RESET => {
                let id = u32::from_le_bytes(body[..4].try_into().unwrap());
                self.state.borrow_mut().reset_statements.push(id);
                match self.statements.get_mut(&id) {
                    Some(stmt) => {
                        stmt.long_data.clear();
                        self.send_ok(1, 0, 0);
                    }
                    None => self.send_err(1, 1243, "HY000", "Unknown prepared statement handler"),
                }
            }
            CMD_STMT_CLOSE => {
                let id = u32::from_le_bytes(body[..4].try_into().unwrap());
                self.statements.remove(&id);
                self.state.borrow_mut().closed_statements.push(id);
            }
            other => self.send_err(1, 1047, "08S01", &format!("Unknown command {other}")),
        }
    }

    fn handle_auth(&mut self, seq: u8, payload: &[u8]) {
        assert_eq!(seq, 1, "auth packet must follow the greeting");
        let caps = u32::from_le_bytes(payload[..4].try_into().unwrap());
        self.state.borrow_mut().client_capabilities = caps;
        let rest = &payload[32..];
        let nul = rest.iter().position(|&b| b == 0).unwrap();
        let user = std::str::from_utf8(&rest[..nul]).unwrap();
        let rest = &rest[nul + 1..];
        let token_len = rest[0] as usize;
        let token = &rest[1..1 + token_len];
        let rest = &rest[1 + token_len..];
        let db = std::str::from_utf8(&rest[..rest.len() - 1]).unwrap();

        let expected = scramble_password(PASSWORD.as_bytes(), &SCRAMBLE);
        if user == USER && token == expected.as_slice() {
            self.authenticated = true;
            self.state.borrow_mut().database = db.to_string();
            self.send_ok(2, 0, 0);
        } else {
            self.send_err(2, 1045, "28000", "Access denied for user");
        }
    }

    fn handle_query(&mut self, sql: &str) {
        if sql == "SELECT 1" {
            self.send(1, &[1]);
            self.send(2, &column("1", ColumnType::MYSQL_TYPE_LONGLONG, 0x21, 63));
            self.send_eof(3);
            self.send(4, &[1, b'1']);
            self.send_eof(5);
        } else if sql == "SELECT n FROM numbers" {
            self.send(1, &[1]);
            self.send(2, &column("n", ColumnType::MYSQL_TYPE_LONGLONG, 0, 63));
            self.send_eof(3);
            let mut seq = 4;
            for n in 1..=5u8 {
                self.send(seq, &[1, b'0' + n]);
                seq += 1;
            }
            self.send_eof(seq);
        } else if sql == "SELECT broken" {
            self.send(1, &[1]);
            self.send(2, &column("x", ColumnType::MYSQL_TYPE_LONGLONG, 0, 63));
            self.send_eof(3);
            self.send(4, &[1, b'1']);
            self.send_err(5, 1317, "70100", "Query execution was interrupted");
        } else if sql.starts_with("FAIL") {
            self.send_err(1, 1064, "42000", "You have an error in your SQL syntax");
        } else if sql.starts_with("INSERT") {
            self.send_ok(1, 1, 7);
        } else {
            self.send_ok(1, 0, 0);
        }
    }

    fn handle_prepare(&mut self, sql: &str) {
        if sql.contains("nope") {
            self.send_err(1, 1146, "42S02", "Table 'test.nope' doesn't exist");
            return;
        }
        let params = sql.matches('?').count();
        let columns: Vec<Vec<u8>> = if sql == "SELECT * FROM t" {
            vec![column("a", ColumnType::MYSQL_TYPE_LONGLONG, 0, 63)]
        } else if sql.starts_with("SELECT") {
            (0..params)
                .map(|_| column("?", ColumnType::MYSQL_TYPE_BLOB, 0, 63))
                .collect()
        } else {
            Vec::new()
        };

        let id = self.next_statement_id;
        self.next_statement_id += 1;
        self.statements.insert(
            id,
            Statement {
                sql: sql.to_string(),
                params,
                long_data: HashMap::new(),
            },
        );
        self.state.borrow_mut().prepares += 1;

        let mut ok = vec![0x00];
        ok.extend_from_slice(&id.to_le_bytes());
        ok.extend_from_slice(&(columns.len() as u16).to_le_bytes());
        ok.extend_from_slice(&(params as u16).to_le_bytes());
        ok.extend_from_slice(&[0, 0, 0]);
        self.send(1, &ok);

        let mut seq = 2;
        if params > 0 {
            for _ in 0..params {
                self.send(seq, &column("?", ColumnType::MYSQL_TYPE_VAR_STRING, 0, 63));
                seq += 1;
            }
            self.send_eof(seq);
            seq += 1;
        }
        if !columns.is_empty() {
            for col in &columns {
                self.send(seq, col);
                seq += 1;
            }
            self.send_eof(seq);
        }
    }

    fn handle_execute(&mut self, body: &[u8]) {
        let id = u32::from_le_bytes(body[..4].try_into().unwrap());
        let Some(stmt) = self.statements.get_mut(&id) else {
            self.send_err(1, 1243, "HY000", "Unknown prepared statement handler");
            return;
        };
        let params = decode_params(&body[9..], stmt.params, &mut stmt.long_data);
        let sql = stmt.sql.clone();

        if sql == "INSERT INTO t VALUES (?)" {
            let value = params[0].as_int();
            self.state.borrow_mut().table.push(value);
            self.send_ok(1, 1, 0);
        } else if sql == "INSERT INTO blobs VALUES (?)" {
            if let Some(bytes) = params[0].as_bytes() {
                self.state.borrow_mut().blobs.push(bytes);
            }
            self.send_ok(1, 1, 0);
        } else if sql == "SELECT * FROM t" {
            let table = self.state.borrow().table.clone();
            self.send(1, &[1]);
            self.send(2, &column("a", ColumnType::MYSQL_TYPE_LONGLONG, 0, 63));
            self.send_eof(3);
            let mut seq = 4;
            for value in table {
                // header, then a one-byte null bitmap (offset 2)
                let mut row = vec![0x00];
                match value {
                    Some(v) => {
                        row.push(0);
                        row.extend_from_slice(&v.to_le_bytes());
                    }
                    None => row.push(0x04),
                }
                self.send(seq, &row);
                seq += 1;
            }
            self.send_eof(seq);
        } else if sql.starts_with("SELECT") {
            // Echo every parameter back as one row.
            self.send(1, &[params.len() as u8]);
            let mut seq = 2;
            for param in &params {
                let col = match param {
                    Param::Value { ty, unsigned, .. } => {
                        let flags = if *unsigned { 0x20 } else { 0 };
                        let charset = if matches!(ty, 0x0f | 0xfd | 0xfe) { 33 } else { 63 };
                        column_raw("?", *ty, flags, charset)
                    }
                    _ => column("?", ColumnType::MYSQL_TYPE_BLOB, 0, 63),
                };
                self.send(seq, &col);
                seq += 1;
            }
            self.send_eof(seq);
            seq += 1;

            let mut row = vec![0x00];
            let mut bitmap = vec![0u8; (params.len() + 9) / 8];
            let mut values = Vec::new();
            for (i, param) in params.iter().enumerate() {
                match param {
                    Param::Null => bitmap[(i + 2) / 8] |= 1 << ((i + 2) % 8),
                    Param::Value { raw, .. } => values.extend_from_slice(raw),
                    Param::LongData(b) => {
                        lenenc(&mut values, b.len() as u64);
                        values.extend_from_slice(b);
                    }
                }
            }
            row.extend_from_slice(&bitmap);
            row.extend_from_slice(&values);
            self.send(seq, &row);
            self.send_eof(seq + 1);
        } else {
            self.send_ok(1, 0, 0);
        }
    }
}

fn decode_params(body: &[u8], count: usize, long_data: &mut HashMap<u16, Vec<u8>>) -> Vec<Param> {
    if count == 0 {
        return Vec::new();
    }
    let bitmap_len = count.div_ceil(8);
    let bitmap = &body[..bitmap_len];
    assert_eq!(body[bitmap_len], 1, "new_params_bound_flag");
    let types = &body[bitmap_len + 1..bitmap_len + 1 + count * 2];
    let mut data = &body[bitmap_len + 1 + count * 2..];

    let mut params = Vec::with_capacity(count);
    for i in 0..count {
        if let Some(bytes) = long_data.remove(&(i as u16)) {
            params.push(Param::LongData(bytes));
            continue;
        }
        if bitmap[i / 8] & (1 << (i % 8)) != 0 {
            params.push(Param::Null);
            continue;
        }
        let ty = types[i * 2];
        let unsigned = types[i * 2 + 1] & 0x80 != 0;
        let len = match ty {
            0x01 => 1,
            0x02 | 0x0d => 2,
            0x03 | 0x04 | 0x09 => 4,
            0x05 | 0x08 => 8,
            0x07 | 0x0a | 0x0b | 0x0c => 1 + data[0] as usize,
            _ => {
                let (len, rest) = read_lenenc(data);
                len + (data.len() - rest.len())
            }
        };
        params.push(Param::Value {
            ty,
            unsigned,
            raw: data[..len].to_vec(),
        });
        data = &data[len..];
    }
    params
}

impl Channel for FakeChannel {
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        if self.state.borrow().fail_reads {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"));
        }
        if self.output.len() < buf.len() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no more data"));
        }
        for b in buf.iter_mut() {
            *b = self.output.pop_front().unwrap();
        }
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if !self.is_open() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        }
        self.input.extend_from_slice(buf);
        while self.input.len() >= 4 {
            let len = u32::from_le_bytes([self.input[0], self.input[1], self.input[2], 0]) as usize;
            if self.input.len() < 4 + len {
                break;
            }
            let seq = self.input[3];
            let payload = self.input[4..4 + len].to_vec();
            self.input.drain(..4 + len);
            self.handle(seq, payload);
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn is_open(&self) -> bool {
        let state = self.state.borrow();
        state.open && state.connects == self.session
    }
}

/// Column definition packet.
pub fn column(name: &str, ty: ColumnType, flags: u16, charset: u16) -> Vec<u8> {
    column_raw(name, ty as u8, flags, charset)
}

fn column_raw(name: &str, ty: u8, flags: u16, charset: u16) -> Vec<u8> {
    let mut p = Vec::new();
    for part in ["def", "test", "t", "t", name, name] {
        lenenc(&mut p, part.len() as u64);
        p.extend_from_slice(part.as_bytes());
    }
    p.push(0x0C);
    p.extend_from_slice(&charset.to_le_bytes());
    p.extend_from_slice(&20u32.to_le_bytes());
    p.push(ty);
    p.extend_from_slice(&flags.to_le_bytes());
    p.push(0);
    p.extend_from_slice(&[0, 0]);
    p
}

fn lenenc(out: &mut Vec<u8>, v: u64) {
    match v {
        0..=250 => out.push(v as u8),
        251..=0xFFFF => {
            out.push(0xFC);
            out.extend_from_slice(&(v as u16).to_le_bytes());
        }
        0x1_0000..=0xFF_FFFF => {
            out.push(0xFD);
            out.extend_from_slice(&(v as u32).to_le_bytes()[..3]);
        }
        _ => {
            out.push(0xFE);
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
}

fn read_lenenc(data: &[u8]) -> (usize, &[u8]) {
    match data[0] {
        0xFC => (u16::from_le_bytes([data[1], data[2]]) as usize, &data[3..]),
        0xFD => (u32::from_le_bytes([data[1], data[2], data[3], 0]) as usize, &data[4..]),
        0xFE => (u64::from_le_bytes(data[1..9].try_into().unwrap()) as usize, &data[9..]),
        n => (n as usize, &data[1..]),
    }
}

/// Close the current session's channel, as if the server went away.
pub fn drop_connection(state: &Shared) {
    state.borrow_mut().open = false;
}
