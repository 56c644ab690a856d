//! The FTP client operations the storage layer consumes.
//!
//! Everything protocol-related (control and data channels, listing formats,
//! TLS) lives behind [`FtpClient`].

mod memory;
mod suppa;

use async_trait::async_trait;
use tokio::io::AsyncRead;

pub use memory::{MemoryClient, MemoryServer};
pub use suppa::SuppaClient;

use crate::data::{FileType, RemoteEntry};
use crate::error::Result;
use crate::stream::{ReadHalf, WriteHalf};

/// What to do when the destination of a transfer already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteExists {
    Overwrite,
    Skip,
}

impl RemoteExists {
    pub fn from_overwrite(overwrite: bool) -> Self {
        if overwrite {
            Self::Overwrite
        } else {
            Self::Skip
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Success,
    /// The destination existed and [`RemoteExists::Skip`] was requested.
    Skipped,
    Failed,
}

#[async_trait]
pub trait FtpClient: Send + Sync + 'static {
    async fn is_connected(&self) -> bool;

    async fn connect(&self) -> Result<()>;

    /// Metadata of the object at `path`, `None` when nothing is there.
    async fn object_info(&self, path: &str) -> Result<Option<RemoteEntry>>;

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>>;

    async fn open_read(&self, path: &str) -> Result<ReadHalf>;

    /// Opens a writer on `path`. Content is committed when the writer is shut down.
    async fn open_write(&self, path: &str) -> Result<WriteHalf>;

    async fn upload(
        &self,
        path: &str,
        data: &mut (dyn AsyncRead + Send + Unpin),
        exists: RemoteExists,
    ) -> Result<TransferStatus>;

    async fn create_dir(&self, path: &str) -> Result<bool>;

    async fn delete_dir(&self, path: &str) -> Result<()>;

    async fn delete_file(&self, path: &str) -> Result<()>;

    /// Renames `from` to `to` on the server. Returns `false` when nothing was moved.
    async fn move_file(&self, from: &str, to: &str, exists: RemoteExists) -> Result<bool>;

    /// Server-to-server (FXP) transfer from this session to `target`.
    ///
    /// Reports [`TransferStatus::Failed`] when either side cannot take part.
    async fn transfer_file(
        &self,
        from: &str,
        target: &Self,
        to: &str,
        exists: RemoteExists,
    ) -> Result<TransferStatus>;

    async fn directory_exists(&self, path: &str) -> Result<bool> {
        Ok(self
            .object_info(path)
            .await?
            .is_some_and(|entry| entry.metadata.r#type == FileType::Dir))
    }

    async fn file_exists(&self, path: &str) -> Result<bool> {
        Ok(self
            .object_info(path)
            .await?
            .is_some_and(|entry| entry.metadata.r#type.is_file_like()))
    }
}
