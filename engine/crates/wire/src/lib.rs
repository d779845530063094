pub mod codec;
pub mod frame;
pub mod message;
pub mod transport;

pub use codec::{ByteReader, ByteWriter, WireError};
pub use frame::{read_frame, write_frame};
pub use message::{MessageKind, RECORD_MARKER};
pub use transport::{MemoryHub, MessageSink, PeerId, AUTHORITY};
