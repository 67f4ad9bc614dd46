//! Watching a file for modifications: writes to it a few times on a
//! delay and prints each change the poller detects.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use portal_fs::facade;
use portal_fs::options::{WatchOptions, WriteOptions};
use portal_fs::watcher::WatchEvent;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::temp_dir().join("portal_fs_debounce_demo.txt");
    facade::write(&path, Bytes::from_static(b"v0"), WriteOptions::default()).await?;

    let watched: PathBuf = path.clone();
    let opts = WatchOptions { polling_interval: Duration::from_millis(50), ..WatchOptions::default() };
    let callback = Arc::new(move |event: WatchEvent| {
        println!("{:?}: {:?}", watched, event.kind);
    });

    let id = facade::watch(&path, callback, opts);

    for i in 1..=5 {
        tokio::time::sleep(Duration::from_millis(120)).await;
        facade::write(&path, Bytes::from(format!("v{i}")), WriteOptions::default()).await?;
    }

    tokio::time::sleep(Duration::from_millis(120)).await;
    facade::unwatch(id);

    Ok(())
}
