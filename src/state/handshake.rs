//! Connection handshake and authentication state machine.

use tracing::debug;

use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::handshake::{
    Greeting, HandshakeResponse, scramble_password, write_handshake_response,
};
use crate::protocol::response::{EOF_HEADER, ERR_HEADER, OK_HEADER, OkPacket, parse_err};
use crate::protocol::types::{CapabilityFlags, StatusFlags};

use super::action::Action;

/// Handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Initial,
    WaitingGreeting,
    WaitingAuthResult,
    Authenticated,
    Failed,
}

/// Server metadata captured from the greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub version: String,
    pub thread_id: u32,
    pub charset: u8,
    pub status: StatusFlags,
    pub capabilities: CapabilityFlags,
}

/// Handshake state machine.
///
/// Consumes the greeting, answers with the auth packet and checks the
/// server's verdict.
pub struct HandshakeStateMachine<'a> {
    state: HandshakeState,
    opts: &'a Opts,
    requested: CapabilityFlags,
    negotiated: CapabilityFlags,
    server: Option<ServerInfo>,
}

impl<'a> HandshakeStateMachine<'a> {
    pub fn new(opts: &'a Opts, requested: CapabilityFlags) -> Self {
        Self {
            state: HandshakeState::Initial,
            opts,
            requested,
            negotiated: CapabilityFlags::new(0),
            server: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Capability flags in effect after the greeting.
    pub fn negotiated(&self) -> CapabilityFlags {
        self.negotiated
    }

    pub fn take_server_info(&mut self) -> Option<ServerInfo> {
        self.server.take()
    }

    /// Start the handshake. The server speaks first.
    ///
    /// Fails early if the requested flags lack protocol 4.1 or secure connection.
    pub fn start(&mut self) -> Result<Action> {
        if !self.requested.meets_baseline() {
            self.state = HandshakeState::Failed;
            return Err(Error::Unsupported(format!(
                "Client capabilities 0x{:08X} lack PROTOCOL_41 | SECURE_CONNECTION",
                self.requested.0
            )));
        }
        self.state = HandshakeState::WaitingGreeting;
        Ok(Action::ReadPacket)
    }

    /// Process a packet payload from the server.
    pub fn step(&mut self, payload: &[u8], write_buffer: &mut Vec<u8>) -> Result<Action> {
        let result = match self.state {
            HandshakeState::WaitingGreeting => self.handle_greeting(payload, write_buffer),
            HandshakeState::WaitingAuthResult => self.handle_auth_result(payload),
            state => Err(Error::Protocol(format!(
                "Unexpected packet in handshake state {state:?}"
            ))),
        };
        if result.is_err() {
            self.state = HandshakeState::Failed;
        }
        result
    }

    fn handle_greeting(&mut self, payload: &[u8], write_buffer: &mut Vec<u8>) -> Result<Action> {
        let greeting = Greeting::parse(payload)?;
        if !greeting.capabilities.meets_baseline() {
            return Err(Error::Unsupported(format!(
                "Server {} capabilities 0x{:08X} lack PROTOCOL_41 | SECURE_CONNECTION",
                greeting.server_version, greeting.capabilities.0
            )));
        }

        self.negotiated = CapabilityFlags::negotiate(greeting.capabilities, self.requested);
        let charset = self.opts.charset.unwrap_or(greeting.charset);
        let token = scramble_password(self.opts.password.as_bytes(), &greeting.scramble);

        write_handshake_response(
            write_buffer,
            &HandshakeResponse {
                capabilities: self.negotiated,
                charset,
                user: &self.opts.user,
                token: &token,
                database: &self.opts.database,
            },
        )?;

        debug!(
            server_version = %greeting.server_version,
            thread_id = greeting.thread_id,
            capabilities = self.negotiated.0,
            "received greeting"
        );

        self.server = Some(ServerInfo {
            version: greeting.server_version,
            thread_id: greeting.thread_id,
            charset,
            status: greeting.status,
            capabilities: greeting.capabilities,
        });
        self.state = HandshakeState::WaitingAuthResult;
        Ok(Action::WriteAndReadPacket)
    }

    fn handle_auth_result(&mut self, payload: &[u8]) -> Result<Action> {
        match payload.first() {
            Some(&OK_HEADER) => {
                let ok = OkPacket::parse(payload)?;
                if let Some(server) = self.server.as_mut() {
                    server.status = ok.status;
                }
                self.state = HandshakeState::Authenticated;
                Ok(Action::Finished)
            }
            Some(&ERR_HEADER) => {
                let err = parse_err(payload)?;
                Err(Error::Auth(err.to_string()))
            }
            Some(&EOF_HEADER) => Err(Error::Auth(
                "Server requested an authentication method switch".into(),
            )),
            Some(&other) => Err(Error::Protocol(format!(
                "Unexpected auth response header 0x{other:02X}"
            ))),
            None => Err(Error::Protocol("Empty auth response".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::handshake::tests::sample_greeting;

    fn opts() -> Opts {
        Opts {
            user: "root".into(),
            password: "pw".into(),
            database: "test".into(),
            ..Opts::default()
        }
    }

    #[test]
    fn test_successful_handshake() {
        let opts = opts();
        let mut hs = HandshakeStateMachine::new(&opts, CapabilityFlags::default());
        let mut buf = Vec::new();
        assert_eq!(hs.start().unwrap(), Action::ReadPacket);

        let scramble = [9u8; 20];
        let action = hs.step(&sample_greeting(&scramble), &mut buf).unwrap();
        assert_eq!(action, Action::WriteAndReadPacket);
        assert_eq!(hs.state(), HandshakeState::WaitingAuthResult);

        // capabilities, max packet, charset from the greeting
        let payload = &buf[4..];
        assert_eq!(&payload[..4], &hs.negotiated().0.to_le_bytes());
        assert_eq!(payload[8], 33);
        // token length follows "root\0" after the 23-byte filler
        assert_eq!(payload[37], 20);

        let action = hs.step(&[0x00, 0, 0, 2, 0, 0, 0], &mut buf).unwrap();
        assert_eq!(action, Action::Finished);
        let server = hs.take_server_info().unwrap();
        assert_eq!(server.version, "5.7.44-log");
        assert_eq!(server.thread_id, 42);
    }

    #[test]
    fn test_negotiation_forces_baseline() {
        let opts = opts();
        let mut hs = HandshakeStateMachine::new(&opts, CapabilityFlags::default());
        hs.start().unwrap();
        hs.step(&sample_greeting(&[1; 20]), &mut Vec::new()).unwrap();
        assert!(hs.negotiated().meets_baseline());
        assert!(!hs.negotiated().has(CapabilityFlags::CLIENT_PLUGIN_AUTH));
    }

    #[test]
    fn test_rejects_weak_client_flags() {
        let opts = opts();
        let mut hs = HandshakeStateMachine::new(
            &opts,
            CapabilityFlags::new(CapabilityFlags::CLIENT_PROTOCOL_41),
        );
        assert!(matches!(hs.start(), Err(Error::Unsupported(_))));
        assert_eq!(hs.state(), HandshakeState::Failed);
    }

    #[test]
    fn test_auth_error() {
        let opts = opts();
        let mut hs = HandshakeStateMachine::new(&opts, CapabilityFlags::default());
        hs.start().unwrap();
        let mut buf = Vec::new();
        hs.step(&sample_greeting(&[1; 20]), &mut buf).unwrap();

        let mut err = vec![0xFF, 0x15, 0x04, b'#'];
        err.extend_from_slice(b"28000Access denied");
        assert!(matches!(hs.step(&err, &mut buf), Err(Error::Auth(_))));
        assert_eq!(hs.state(), HandshakeState::Failed);
    }

    #[test]
    fn test_auth_switch_is_refused() {
        let opts = opts();
        let mut hs = HandshakeStateMachine::new(&opts, CapabilityFlags::default());
        hs.start().unwrap();
        let mut buf = Vec::new();
        hs.step(&sample_greeting(&[1; 20]), &mut buf).unwrap();
        assert!(matches!(hs.step(&[0xFE], &mut buf), Err(Error::Auth(_))));
    }
}
