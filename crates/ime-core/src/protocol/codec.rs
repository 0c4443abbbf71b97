//! Binary encoding of [`Command`] plus the length-prefixed frame used on
//! byte-stream connections.
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (u32, BE) │ Payload (bincode Command) │
//! └──────────────────┴──────────────────────────┘
//! ```

use std::io::{self, Read, Write};

use super::Command;

/// Upper bound for a single frame; larger length prefixes are rejected
/// before any allocation.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode command: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode command: {0}")]
    Decode(#[source] bincode::Error),
}

pub fn encode(command: &Command) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(command).map_err(CodecError::Encode)
}

pub fn decode(bytes: &[u8]) -> Result<Command, CodecError> {
    bincode::deserialize(bytes).map_err(CodecError::Decode)
}

/// Write one frame and flush.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let length = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_SIZE)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame too large: {} bytes", payload.len()),
            )
        })?;
    writer.write_all(&length.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Read one frame. A stream that ends before the full frame arrives yields
/// `ErrorKind::UnexpectedEof`.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let length = u32::from_be_bytes(len_bytes);
    if length > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {length} bytes"),
        ));
    }

    let mut payload = vec![0u8; length as usize];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}
