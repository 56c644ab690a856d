use async_trait::async_trait;
use log::debug;
use tokio::io::AsyncWriteExt;

use crate::{
    error::Result, AccessMode, CopyStrategy, MoveStrategy, StorageFile, StorageFolder,
};

/// Copies the content of `from` into `to`, returning the number of bytes.
pub async fn copy_file_contents(from: &dyn StorageFile, to: &dyn StorageFile) -> Result<u64> {
    let mut reader = from.open_stream(AccessMode::READ).await?;
    let mut writer = to.open_stream(AccessMode::WRITE).await?;

    let copied = tokio::io::copy(&mut reader, &mut writer).await?;
    // Remote writers only commit on shutdown
    writer.shutdown().await?;

    Ok(copied)
}

/// Moves and copies by routing the bytes through this process.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamTransfer;

#[async_trait]
impl CopyStrategy for StreamTransfer {
    async fn create_copy_of(
        &self,
        target: &dyn StorageFolder,
        file: &dyn StorageFile,
        overwrite: bool,
    ) -> Result<Box<dyn StorageFile>> {
        let copy = target.create_file(file.name(), overwrite).await?;
        let copied = copy_file_contents(file, copy.as_ref()).await?;
        debug!("Copied {copied} bytes from \"{}\" to \"{}\"", file.id(), copy.id());

        Ok(copy)
    }
}

#[async_trait]
impl MoveStrategy for StreamTransfer {
    async fn move_from(
        &self,
        target: &dyn StorageFolder,
        file: &dyn StorageFile,
        source: &dyn StorageFolder,
        overwrite: bool,
    ) -> Result<Box<dyn StorageFile>> {
        let moved = self.create_copy_of(target, file, overwrite).await?;
        source.delete_item(file).await?;

        Ok(moved)
    }
}
