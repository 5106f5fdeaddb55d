//! Sans-I/O state machines for the MySQL protocol.
//!
//! These state machines handle the protocol logic without performing any I/O.
//! They produce `Action` values that tell the caller what to do next.

pub mod action;
pub mod handshake;
pub mod pending;
pub mod prepare;

pub use action::Action;
pub use handshake::{HandshakeState, HandshakeStateMachine, ServerInfo};
pub use pending::PendingData;
pub use prepare::PrepareStateMachine;
