//! Storage abstraction over FTP servers.
//!
//! Remote files and folders are exposed through the same small set of
//! capability traits as any other backend ([`StorageFile`], [`StorageFolder`]).
//! The wire protocol is left to an [`client::FtpClient`] implementation; this
//! crate only maps storage operations onto client calls and wraps the results
//! back into [`backends::ftp::FtpFile`] and [`backends::ftp::FtpFolder`].

pub mod backends;
pub mod client;
pub mod config;
pub mod data;
pub mod error;
pub mod ops;
pub mod stream;
pub mod util;

use std::any::Any;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

pub use data::{AccessMode, Capabilities, ItemKind, StorableType};
pub use stream::FileStream;

use crate::error::{Error, Result};

#[async_trait]
pub trait StorageItem: Any + Send + Sync {
    /// Unique identifier of the item within its backend.
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn kind(&self) -> ItemKind;
    fn capabilities(&self) -> Capabilities;
    fn as_any(&self) -> &dyn Any;

    /// Short name of the backend, used in error messages.
    fn backend(&self) -> &'static str;

    async fn parent(&self) -> Result<Option<Box<dyn StorageFolder>>> {
        Err(self.unsupported("parent"))
    }

    fn unsupported(&self, operation: &str) -> Error {
        Error::Unsupported(operation.into(), self.backend().into())
    }
}

#[async_trait]
pub trait StorageFile: StorageItem {
    async fn open_stream(&self, mode: AccessMode) -> Result<FileStream>;
}

pub enum StorageChild {
    File(Box<dyn StorageFile>),
    Folder(Box<dyn StorageFolder>),
}

impl StorageChild {
    pub fn id(&self) -> &str {
        match self {
            Self::File(file) => file.id(),
            Self::Folder(folder) => folder.id(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::File(file) => file.name(),
            Self::Folder(folder) => folder.name(),
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::File(_) => ItemKind::File,
            Self::Folder(_) => ItemKind::Folder,
        }
    }

    pub fn as_item(&self) -> &dyn StorageItem {
        match self {
            Self::File(file) => file.as_ref(),
            Self::Folder(folder) => folder.as_ref(),
        }
    }

    pub fn into_file(self) -> Option<Box<dyn StorageFile>> {
        match self {
            Self::File(file) => Some(file),
            Self::Folder(_) => None,
        }
    }

    pub fn into_folder(self) -> Option<Box<dyn StorageFolder>> {
        match self {
            Self::Folder(folder) => Some(folder),
            Self::File(_) => None,
        }
    }
}

impl std::fmt::Debug for StorageChild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageChild")
            .field("kind", &self.kind())
            .field("id", &self.id())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderChange {
    Added(String),
    Removed(String),
}

#[async_trait]
pub trait FolderWatcher: Send {
    async fn next_change(&mut self) -> Option<FolderChange>;
}

/// Generic copy used when a backend has no faster way of its own.
#[async_trait]
pub trait CopyStrategy: Send + Sync {
    async fn create_copy_of(
        &self,
        target: &dyn StorageFolder,
        file: &dyn StorageFile,
        overwrite: bool,
    ) -> Result<Box<dyn StorageFile>>;
}

/// Generic move used when a backend has no faster way of its own.
#[async_trait]
pub trait MoveStrategy: Send + Sync {
    async fn move_from(
        &self,
        target: &dyn StorageFolder,
        file: &dyn StorageFile,
        source: &dyn StorageFolder,
        overwrite: bool,
    ) -> Result<Box<dyn StorageFile>>;
}

#[async_trait]
pub trait StorageFolder: StorageItem {
    /// Lists the folder's children.
    ///
    /// The returned stream is lazy and one-shot: nothing is fetched until it is
    /// first polled, and listing again issues a fresh request.
    fn items(&self, filter: StorableType) -> Result<BoxStream<'static, Result<StorageChild>>>;

    async fn get_item(&self, _id: &str) -> Result<StorageChild> {
        Err(self.unsupported("get_item"))
    }

    async fn get_item_recursive(&self, id: &str) -> Result<StorageChild> {
        self.get_item(id).await
    }

    async fn get_first_by_name(&self, _name: &str) -> Result<StorageChild> {
        Err(self.unsupported("get_first_by_name"))
    }

    async fn create_file(&self, _name: &str, _overwrite: bool) -> Result<Box<dyn StorageFile>> {
        Err(self.unsupported("create_file"))
    }

    async fn create_folder(
        &self,
        _name: &str,
        _overwrite: bool,
    ) -> Result<Box<dyn StorageFolder>> {
        Err(self.unsupported("create_folder"))
    }

    async fn delete_item(&self, _item: &dyn StorageItem) -> Result<()> {
        Err(self.unsupported("delete_item"))
    }

    async fn move_from(
        &self,
        file: &dyn StorageFile,
        source: &dyn StorageFolder,
        overwrite: bool,
        fallback: &dyn MoveStrategy,
    ) -> Result<Box<dyn StorageFile>>;

    async fn create_copy_of(
        &self,
        file: &dyn StorageFile,
        overwrite: bool,
        fallback: &dyn CopyStrategy,
    ) -> Result<Box<dyn StorageFile>>;

    async fn watcher(&self) -> Result<Box<dyn FolderWatcher>> {
        Err(self.unsupported("watcher"))
    }
}
