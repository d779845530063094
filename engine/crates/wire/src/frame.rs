//! Versioned length framing above the external byte transport.
//!
//! Format (little-endian): u8 version, u32 payload length, payload bytes.
//! The transport collaborator delivers whole frames; this layer only guards
//! against version skew and absurd lengths.

use crate::codec::WireError;

pub const FRAME_VERSION: u8 = 1;

/// Upper bound on a single frame payload. Resync chunks are capped well
/// below this by the manager's own byte budget.
pub const MAX_FRAME_LEN: usize = 1_048_576;

/// Append one framed message to `out`.
pub fn write_frame(out: &mut Vec<u8>, payload: &[u8]) {
    out.push(FRAME_VERSION);
    let len = u32::try_from(payload.len()).unwrap_or(0);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
}

/// Read a single framed message, returning the payload slice.
pub fn read_frame(inp: &[u8]) -> Result<&[u8], WireError> {
    if inp.len() < 5 {
        return Err(WireError::ShortRead);
    }
    let ver = inp[0];
    if ver != FRAME_VERSION {
        return Err(WireError::BadVersion(ver));
    }
    let mut lenb = [0u8; 4];
    lenb.copy_from_slice(&inp[1..5]);
    let len = u32::from_le_bytes(lenb) as usize;
    if len > MAX_FRAME_LEN {
        return Err(WireError::Oversized {
            len,
            cap: MAX_FRAME_LEN,
        });
    }
    if inp.len() < 5 + len {
        return Err(WireError::ShortRead);
    }
    Ok(&inp[5..5 + len])
}
