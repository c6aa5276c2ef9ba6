//! Coherence messages exchanged over the interconnect.

/// The seven message kinds the protocol exchanges between nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Requester wants to read the line at `address`.
    ReadRequest,
    /// Requester wants exclusive write access to `address`.
    WriteRequest,
    /// Data has been made available; the receiver should mark its line SHARED.
    ReadAck,
    /// Write grant delivered; the receiver should mark its line MODIFIED.
    WriteAck,
    /// The receiver must invalidate its copy of `address`.
    Invalidate,
    /// Confirms an invalidation; the sending directory may clear presence.
    InvalidateAck,
    /// The receiver should transition its owning copy to SHARED; data is
    /// being transferred to the original requester.
    Fetch,
}

/// An immutable coherence message: kind, source node, destination node, and
/// the address it concerns. Messages carry no payload — only identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    /// What kind of coherence action this message carries.
    pub kind: MessageKind,
    /// The node that originated this message.
    pub src: usize,
    /// The node this message is addressed to.
    pub dst: usize,
    /// The memory address (block-granular) this message concerns.
    pub address: u64,
}

impl Message {
    /// Constructs a new message. Messages are plain value types; the queue
    /// that holds them owns their storage.
    #[must_use]
    pub fn new(kind: MessageKind, src: usize, dst: usize, address: u64) -> Self {
        Self {
            kind,
            src,
            dst,
            address,
        }
    }
}
