use crate::codec::WireError;

/// Sentinel preceding every record inside a resync chunk. Readers that find
/// anything else at a record boundary scan forward to the next occurrence
/// instead of abandoning the message.
pub const RECORD_MARKER: [u8; 4] = *b"TREC";

/// One-byte message tag, first payload byte of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    /// A placement event (content type + anchor).
    Place = 1,
    /// Ask the authority for a full state resync.
    SyncRequest = 2,
    /// One chunk of a full state resync.
    SyncChunk = 3,
    /// Authoritative entity kill (template + anchor).
    Kill = 4,
    /// Incremental single-entity state push.
    Delta = 5,
}

impl MessageKind {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(b: u8) -> Result<Self, WireError> {
        match b {
            1 => Ok(Self::Place),
            2 => Ok(Self::SyncRequest),
            3 => Ok(Self::SyncChunk),
            4 => Ok(Self::Kill),
            5 => Ok(Self::Delta),
            other => Err(WireError::BadTag(other)),
        }
    }
}
