use std::any::Any;

use async_trait::async_trait;

use super::{try_get_from_path, Connection, FtpItem, BACKEND};
use crate::client::FtpClient;
use crate::data::RemoteEntry;
use crate::error::{Error, Result};
use crate::{AccessMode, Capabilities, FileStream, ItemKind, StorageFile, StorageFolder, StorageItem};

pub struct FtpFile<C> {
    connection: Connection<C>,
    entry: RemoteEntry,
}

impl<C: FtpClient> FtpFile<C> {
    pub(crate) fn new(connection: Connection<C>, entry: RemoteEntry) -> Self {
        Self { connection, entry }
    }

    pub async fn from_path(connection: &Connection<C>, path: &str) -> Result<Self> {
        Self::try_from_path(connection, path)
            .await?
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    pub async fn try_from_path(connection: &Connection<C>, path: &str) -> Result<Option<Self>> {
        match try_get_from_path(connection, path).await? {
            Some(FtpItem::File(file)) => Ok(Some(file)),
            Some(FtpItem::Folder(_)) => Err(Error::UnexpectedItem {
                path: path.to_string(),
                expected: "file",
            }),
            None => Ok(None),
        }
    }

    pub fn path(&self) -> &str {
        &self.entry.path
    }

    pub fn entry(&self) -> &RemoteEntry {
        &self.entry
    }

    pub fn connection(&self) -> &Connection<C> {
        &self.connection
    }

    /// [`AccessMode::READ_WRITE`] splices a download and an upload. Written
    /// content lands on the server once the stream is shut down.
    pub async fn open_stream(&self, mode: AccessMode) -> Result<FileStream> {
        if mode.is_empty() || !AccessMode::all().contains(mode) {
            return Err(Error::InvalidArgument(format!(
                "Unrecognized access mode {:#04b}",
                mode.bits()
            )));
        }

        self.connection.ensure_connected().await?;
        let client = self.connection.client();

        if mode == AccessMode::READ {
            Ok(FileStream::Read(client.open_read(self.path()).await?))
        } else if mode == AccessMode::WRITE {
            Ok(FileStream::Write(client.open_write(self.path()).await?))
        } else {
            let reader = client.open_read(self.path()).await?;
            self.connection.checkpoint()?;
            let writer = client.open_write(self.path()).await?;
            Ok(FileStream::splice(reader, writer))
        }
    }

    pub async fn parent(&self) -> Result<Option<super::FtpFolder<C>>> {
        self.connection.parent_folder(self.path()).await
    }
}

#[async_trait]
impl<C: FtpClient> StorageItem for FtpFile<C> {
    fn id(&self) -> &str {
        &self.entry.path
    }

    fn name(&self) -> &str {
        &self.entry.name
    }

    fn kind(&self) -> ItemKind {
        ItemKind::File
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::READ_STREAM | Capabilities::WRITE_STREAM | Capabilities::PARENT
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn parent(&self) -> Result<Option<Box<dyn StorageFolder>>> {
        Ok(FtpFile::parent(self)
            .await?
            .map(|folder| Box::new(folder) as Box<dyn StorageFolder>))
    }
}

#[async_trait]
impl<C: FtpClient> StorageFile for FtpFile<C> {
    async fn open_stream(&self, mode: AccessMode) -> Result<FileStream> {
        FtpFile::open_stream(self, mode).await
    }
}
