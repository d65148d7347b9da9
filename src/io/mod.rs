//! Stream & buffer layer: primitive little-endian reads/writes over page
//! bytes, and a scratch-buffer pool shared by the cstring/document codecs.

pub mod pool;
pub mod reader;
pub mod slice;
pub mod writer;

pub use pool::{BufferPool, PooledBuffer};
pub use reader::BufferReader;
pub use slice::{BufferSlice, BufferSliceMut};
pub use writer::BufferWriter;
