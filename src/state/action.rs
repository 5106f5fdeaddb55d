//! Action types for state machine I/O requests.

/// Action requested by a state machine.
///
/// The caller performs the requested I/O and then feeds the next packet
/// payload back into the state machine's `step()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Read the next packet from the server.
    ReadPacket,

    /// Write the packet in the write buffer, then read the next packet.
    WriteAndReadPacket,

    /// The state machine has finished successfully.
    Finished,
}
