pub mod codec;
mod command;

pub use codec::{decode, encode, read_frame, write_frame, CodecError, MAX_FRAME_SIZE};
pub use command::*;
