//! The streaming engine: chunked reader/writer, line splitter, and the
//! auto-buffering glue between them.

pub mod auto_buffer;
pub mod chunk_reader;
pub mod chunk_writer;
pub mod line_reader;

pub use auto_buffer::AutoBuffer;
pub use line_reader::LineStream;
