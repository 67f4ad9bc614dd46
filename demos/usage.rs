//! Cancelling a streaming write partway through: the generator never
//! finishes on its own, so without cancellation this would write forever.
//! Cancelling deletes the partial file it had written so far.

use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use portal_fs::facade;
use portal_fs::options::GeneratorWriteOptions;
use portal_fs::FsError;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::temp_dir().join("portal_fs_usage_demo.txt");

    let producer = futures::stream::repeat(Bytes::from_static(b"chunk\n")).map(Ok::<_, FsError>);

    let write = facade::write_from_generator(&path, Box::pin(producer), GeneratorWriteOptions::default());

    let canceller = write.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result = write.await;
    println!("write was cancelled: {}", result.is_cancelled());
    println!("partial output left on disk: {}", path.exists());

    Ok(())
}
