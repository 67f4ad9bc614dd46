//! Option structs accepted by each filesystem operation. Each carries its
//! own sensible defaults; none of them read environment variables or a
//! config file — there is no persisted state.

/// Options shared by `read` / `readStream`.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub offset: u64,
    pub length: Option<u64>,
}

/// Options for `readFromGenerator`.
#[derive(Debug, Clone)]
pub struct GeneratorReadOptions {
    pub chunk_size: usize,
    pub offset: u64,
    pub length: Option<u64>,
}

impl Default for GeneratorReadOptions {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            offset: 0,
            length: None,
        }
    }
}

/// Options for `readLines`.
#[derive(Debug, Clone)]
pub struct LineReadOptions {
    pub chunk_size: usize,
    pub trim: bool,
    pub skip_empty: bool,
}

impl Default for LineReadOptions {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            trim: false,
            skip_empty: false,
        }
    }
}

/// Options for `write` / `writeStream`.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub create_directories: bool,
    pub append: bool,
}

/// Options for `writeFromGenerator`.
#[derive(Debug, Clone, Default)]
pub struct GeneratorWriteOptions {
    pub buffer_size: usize,
    pub create_directories: bool,
}

/// Options for `createDirectory`.
#[derive(Debug, Clone, Copy)]
pub struct MkdirOptions {
    pub mode: u32,
    pub recursive: bool,
}

impl Default for MkdirOptions {
    fn default() -> Self {
        Self {
            mode: 0o755,
            recursive: false,
        }
    }
}

/// Options for `watch`.
#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    pub polling_interval: std::time::Duration,
    pub watch_size: bool,
    pub watch_content: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            polling_interval: std::time::Duration::from_millis(100),
            watch_size: true,
            watch_content: false,
        }
    }
}
