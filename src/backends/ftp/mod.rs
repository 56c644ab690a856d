//! Files and folders on an FTP server.
//!
//! Entities hold a [`Connection`], a shared handle onto one client session.
//! They never close it: quitting the session is the caller's job, and entities
//! should not be used after that.

mod file;
mod folder;
mod interop;

use std::sync::Arc;

use log::debug;
use tokio_util::sync::CancellationToken;

pub use file::FtpFile;
pub use folder::FtpFolder;
pub use interop::{choose_route, TransferRoute};

use crate::client::FtpClient;
use crate::config::Settings;
use crate::data::{FileType, RemoteEntry};
use crate::error::{Error, Result};
use crate::util::{normalize_path, parent_path, validate_path, ROOT};
use crate::StorageChild;

pub const BACKEND: &str = "FTP";

pub struct Connection<C> {
    client: Arc<C>,
    settings: Settings,
    cancel: Option<CancellationToken>,
}

impl<C> Clone for Connection<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            settings: self.settings,
            cancel: self.cancel.clone(),
        }
    }
}

impl<C: FtpClient> Connection<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            settings: Settings::default(),
            cancel: None,
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Operations check `token` before each request they send.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Whether both handles drive the very same client session.
    pub fn same_session(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.client, &other.client)
    }

    pub(crate) fn checkpoint(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    pub(crate) fn validate(&self, path: &str) -> Result<()> {
        validate_path(path, self.cancel.as_ref())
    }

    pub async fn ensure_connected(&self) -> Result<()> {
        self.checkpoint()?;
        if !self.client.is_connected().await {
            debug!("FTP session is not connected, connecting");
            self.client.connect().await?;
        }
        Ok(())
    }

    pub(crate) async fn lookup(&self, path: &str) -> Result<Option<FtpItem<C>>> {
        self.ensure_connected().await?;

        if normalize_path(path) == ROOT {
            return Ok(Some(FtpItem::Folder(FtpFolder::new(
                self.clone(),
                RemoteEntry::root(),
            ))));
        }

        self.checkpoint()?;
        let Some(entry) = self.client.object_info(path).await? else {
            return Ok(None);
        };

        match entry.metadata.r#type {
            FileType::Dir => Ok(Some(FtpItem::Folder(FtpFolder::new(self.clone(), entry)))),
            FileType::File | FileType::Symlink => {
                Ok(Some(FtpItem::File(FtpFile::new(self.clone(), entry))))
            }
            other => Err(Error::Unsupported(
                format!("items of type {other:?}"),
                BACKEND.into(),
            )),
        }
    }

    pub(crate) async fn lookup_file(&self, path: &str) -> Result<FtpFile<C>> {
        match self.lookup(path).await? {
            Some(FtpItem::File(file)) => Ok(file),
            _ => Err(Error::UnexpectedItem {
                path: path.to_string(),
                expected: "file",
            }),
        }
    }

    pub(crate) async fn lookup_folder(&self, path: &str) -> Result<FtpFolder<C>> {
        match self.lookup(path).await? {
            Some(FtpItem::Folder(folder)) => Ok(folder),
            _ => Err(Error::UnexpectedItem {
                path: path.to_string(),
                expected: "folder",
            }),
        }
    }

    pub(crate) async fn parent_folder(&self, path: &str) -> Result<Option<FtpFolder<C>>> {
        self.ensure_connected().await?;

        match parent_path(path) {
            Some(parent) => self.lookup_folder(&parent).await.map(Some),
            None => Ok(None),
        }
    }
}

/// A file or folder found on the server.
pub enum FtpItem<C> {
    File(FtpFile<C>),
    Folder(FtpFolder<C>),
}

impl<C: FtpClient> FtpItem<C> {
    pub fn id(&self) -> &str {
        match self {
            Self::File(file) => file.path(),
            Self::Folder(folder) => folder.path(),
        }
    }

    pub fn entry(&self) -> &RemoteEntry {
        match self {
            Self::File(file) => file.entry(),
            Self::Folder(folder) => folder.entry(),
        }
    }

    pub fn into_file(self) -> Option<FtpFile<C>> {
        match self {
            Self::File(file) => Some(file),
            Self::Folder(_) => None,
        }
    }

    pub fn into_folder(self) -> Option<FtpFolder<C>> {
        match self {
            Self::Folder(folder) => Some(folder),
            Self::File(_) => None,
        }
    }
}

impl<C: FtpClient> From<FtpItem<C>> for StorageChild {
    fn from(item: FtpItem<C>) -> Self {
        match item {
            FtpItem::File(file) => StorageChild::File(Box::new(file)),
            FtpItem::Folder(folder) => StorageChild::Folder(Box::new(folder)),
        }
    }
}

/// Resolves `path` to the file or folder there.
pub async fn get_from_path<C: FtpClient>(
    connection: &Connection<C>,
    path: &str,
) -> Result<FtpItem<C>> {
    let item = try_get_from_path(connection, path).await?;
    connection.checkpoint()?;
    item.ok_or_else(|| Error::NotFound(path.to_string()))
}

/// Like [`get_from_path`], but absence is `Ok(None)`.
pub async fn try_get_from_path<C: FtpClient>(
    connection: &Connection<C>,
    path: &str,
) -> Result<Option<FtpItem<C>>> {
    connection.checkpoint()?;
    connection.validate(path)?;
    connection.lookup(path).await
}
