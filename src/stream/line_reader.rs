//! The line splitter: wraps a chunk sequence and re-cuts it on `\n`,
//! `\r\n` or bare `\r`, optionally trimming line endings and skipping
//! empty lines. Carries a partial line across chunk boundaries.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::error::FsError;
use crate::lazy_sequence::ChunkStream;
use crate::options::LineReadOptions;
use crate::stream::chunk_reader;
use crate::options::GeneratorReadOptions;

pub struct LineStream {
    chunks: ChunkStream,
    carry: BytesMut,
    pending_lines: std::collections::VecDeque<Bytes>,
    exhausted: bool,
    trim: bool,
    skip_empty: bool,
}

impl LineStream {
    pub(crate) fn new(chunks: ChunkStream, trim: bool, skip_empty: bool) -> Self {
        LineStream {
            chunks,
            carry: BytesMut::new(),
            pending_lines: std::collections::VecDeque::new(),
            exhausted: false,
            trim,
            skip_empty,
        }
    }

    /// Pulls the next line, or `None` once the underlying chunk sequence is
    /// exhausted and no partial line remains.
    pub async fn next_line(&mut self) -> Option<Result<Bytes, FsError>> {
        use futures::StreamExt;
        loop {
            if let Some(line) = self.pending_lines.pop_front() {
                if self.skip_empty && line.is_empty() {
                    continue;
                }
                return Some(Ok(line));
            }
            if self.exhausted {
                return None;
            }

            match self.chunks.next().await {
                Some(Ok(chunk)) => {
                    self.carry.extend_from_slice(&chunk);
                    self.split_carry(false);
                }
                Some(Err(e)) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
                None => {
                    self.exhausted = true;
                    self.split_carry(true);
                }
            }
        }
    }

    /// Splits `self.carry` on line boundaries, pushing complete lines into
    /// `pending_lines`. When `flush` is set (end of input), any remaining
    /// carry becomes a final line even without a trailing terminator.
    fn split_carry(&mut self, flush: bool) {
        let mut start = 0usize;
        let bytes = self.carry.clone().freeze();
        let len = bytes.len();
        let mut i = 0usize;
        while i < len {
            match bytes[i] {
                b'\n' => {
                    self.push_line(&bytes[start..i]);
                    start = i + 1;
                    i += 1;
                }
                b'\r' => {
                    let end = i;
                    if i + 1 < len && bytes[i + 1] == b'\n' {
                        self.push_line(&bytes[start..end]);
                        start = i + 2;
                        i += 2;
                    } else if i + 1 < len || flush {
                        self.push_line(&bytes[start..end]);
                        start = i + 1;
                        i += 1;
                    } else {
                        // `\r` is the last byte of a non-final chunk: it
                        // might be the start of a `\r\n` pair, keep it.
                        break;
                    }
                }
                _ => i += 1,
            }
        }

        if flush && start < len {
            self.push_line(&bytes[start..len]);
            start = len;
        }

        self.carry = BytesMut::from(&bytes[start..]);
    }

    fn push_line(&mut self, raw: &[u8]) {
        let line = if self.trim {
            trim_ascii(raw)
        } else {
            raw
        };
        self.pending_lines.push_back(Bytes::copy_from_slice(line));
    }
}

fn trim_ascii(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if first.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    while let [rest @ .., last] = bytes {
        if last.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    bytes
}

/// Builds the line sequence for `readLines`.
pub fn open(path: impl Into<std::path::PathBuf>, opts: LineReadOptions, cancelled: Arc<AtomicBool>) -> LineStream {
    let path: PathBuf = path.into();
    let chunk_opts = GeneratorReadOptions { chunk_size: opts.chunk_size, offset: 0, length: None };
    let chunks = chunk_reader::open(path, chunk_opts, cancelled);
    LineStream::new(chunks, opts.trim, opts.skip_empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;

    async fn write_file(path: &std::path::Path, content: &[u8]) {
        let mut f = tokio::fs::File::create(path).await.unwrap();
        f.write_all(content).await.unwrap();
        f.flush().await.unwrap();
    }

    async fn collect(stream: &mut LineStream) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(line) = stream.next_line().await {
            out.push(String::from_utf8(line.unwrap().to_vec()).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn splits_mixed_line_endings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mixed.txt");
        write_file(&path, b"one\ntwo\r\nthree\rfour").await;

        let mut stream = open(&path, LineReadOptions { chunk_size: 4, trim: false, skip_empty: false }, Arc::new(AtomicBool::new(false)));
        let lines = collect(&mut stream).await;
        assert_eq!(lines, vec!["one", "two", "three", "four"]);
    }

    #[tokio::test]
    async fn trims_and_skips_empty_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blank.txt");
        write_file(&path, b"  a  \n\n   \nb\n").await;

        let mut stream = open(&path, LineReadOptions { chunk_size: 8192, trim: true, skip_empty: true }, Arc::new(AtomicBool::new(false)));
        let lines = collect(&mut stream).await;
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn cr_immediately_before_chunk_boundary_is_not_split_early() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crlf_boundary.txt");
        write_file(&path, b"abc\r\ndef").await;

        // chunk_size of 4 puts the split right between \r and \n.
        let mut stream = open(&path, LineReadOptions { chunk_size: 4, trim: false, skip_empty: false }, Arc::new(AtomicBool::new(false)));
        let lines = collect(&mut stream).await;
        assert_eq!(lines, vec!["abc", "def"]);
    }
}
