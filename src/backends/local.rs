//! Files and folders on the local disk.
//!
//! Local folders have no fast path into or out of other backends, so moves
//! and copies always go through the strategy they are handed.

use std::any::Any;
use std::fs::Metadata as StdMetadata;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use log::debug;
use tokio::fs;

use crate::data::FileType;
use crate::error::{Error, Result};
use crate::{
    AccessMode, Capabilities, CopyStrategy, FileStream, ItemKind, MoveStrategy, StorableType,
    StorageChild, StorageFile, StorageFolder, StorageItem,
};

pub const BACKEND: &str = "local";

fn path_to_string(path: &Path) -> Result<String> {
    Ok(path.to_str().ok_or(Error::NotUtf8)?.to_string())
}

fn file_name(path: &Path) -> Result<String> {
    Ok(path
        .file_name()
        .ok_or(Error::NoFileName)?
        .to_str()
        .ok_or(Error::NotUtf8)?
        .to_string())
}

fn file_type_from_std_metadata(std_metadata: &StdMetadata) -> FileType {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;

        let file_type = std_metadata.file_type();
        if file_type.is_socket() {
            return FileType::Socket;
        } else if file_type.is_fifo() {
            return FileType::Fifo;
        } else if file_type.is_char_device() {
            return FileType::CharDevice;
        } else if file_type.is_block_device() {
            return FileType::BlockDevice;
        }
    }

    FileType::from_bools(
        std_metadata.is_file(),
        std_metadata.is_dir(),
        std_metadata.is_symlink(),
    )
}

async fn child_at(path: PathBuf) -> Result<Option<StorageChild>> {
    let metadata = fs::metadata(&path).await?;

    match file_type_from_std_metadata(&metadata) {
        FileType::Dir => Ok(Some(StorageChild::Folder(Box::new(LocalFolder::new(path)?)))),
        FileType::File | FileType::Symlink => {
            Ok(Some(StorageChild::File(Box::new(LocalFile::new(path)?))))
        }
        other => {
            debug!("Skipping {path:?} of unsupported type {other:?}");
            Ok(None)
        }
    }
}

pub struct LocalFile {
    path: PathBuf,
    id: String,
    name: String,
}

impl LocalFile {
    fn new(path: PathBuf) -> Result<Self> {
        Ok(Self {
            id: path_to_string(&path)?,
            name: file_name(&path)?,
            path,
        })
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !fs::metadata(path).await?.is_file() {
            return Err(Error::UnexpectedItem {
                path: path_to_string(path)?,
                expected: "file",
            });
        }
        Self::new(path.to_path_buf())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StorageItem for LocalFile {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
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
        match self.path.parent() {
            Some(parent) => Ok(Some(Box::new(LocalFolder::new(parent.to_path_buf())?))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl StorageFile for LocalFile {
    async fn open_stream(&self, mode: AccessMode) -> Result<FileStream> {
        if mode == AccessMode::READ {
            Ok(FileStream::Read(Box::new(fs::File::open(&self.path).await?)))
        } else if mode == AccessMode::WRITE {
            Ok(FileStream::Write(Box::new(fs::File::create(&self.path).await?)))
        } else if mode == AccessMode::READ_WRITE {
            let file = fs::OpenOptions::new()
                .read(true)
                .write(true)
                .open(&self.path)
                .await?;
            let (reader, writer) = tokio::io::split(file);
            Ok(FileStream::splice(Box::new(reader), Box::new(writer)))
        } else {
            Err(Error::InvalidArgument(format!(
                "Unrecognized access mode {:#04b}",
                mode.bits()
            )))
        }
    }
}

pub struct LocalFolder {
    path: PathBuf,
    id: String,
    name: String,
}

impl LocalFolder {
    fn new(path: PathBuf) -> Result<Self> {
        Ok(Self {
            id: path_to_string(&path)?,
            // The filesystem root has no name
            name: match path.file_name() {
                Some(name) => name.to_str().ok_or(Error::NotUtf8)?.to_string(),
                None => String::new(),
            },
            path,
        })
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !fs::metadata(path).await?.is_dir() {
            return Err(Error::UnexpectedItem {
                path: path_to_string(path)?,
                expected: "folder",
            });
        }
        Self::new(path.to_path_buf())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StorageItem for LocalFolder {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ItemKind {
        ItemKind::Folder
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PARENT
            | Capabilities::ENUMERATE
            | Capabilities::MODIFY
            | Capabilities::GET_ITEM
            | Capabilities::GET_ITEM_BY_NAME
            | Capabilities::MOVE_FROM
            | Capabilities::CREATE_COPY_OF
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn parent(&self) -> Result<Option<Box<dyn StorageFolder>>> {
        match self.path.parent() {
            Some(parent) => Ok(Some(Box::new(LocalFolder::new(parent.to_path_buf())?))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl StorageFolder for LocalFolder {
    fn items(&self, filter: StorableType) -> Result<BoxStream<'static, Result<StorageChild>>> {
        if filter == StorableType::None {
            return Err(Error::InvalidArgument(
                "Cannot list items of no type".into(),
            ));
        }

        let path = self.path.clone();
        let listing = async move {
            let mut children = vec![];
            let mut entries = fs::read_dir(&path).await?;

            while let Some(entry) = entries.next_entry().await? {
                if let Some(child) = child_at(entry.path()).await? {
                    if filter.admits(child.kind()) {
                        children.push(Ok(child));
                    }
                }
            }

            Ok::<_, Error>(children)
        };

        Ok(stream::once(listing)
            .map_ok(stream::iter)
            .try_flatten()
            .boxed())
    }

    async fn get_item(&self, id: &str) -> Result<StorageChild> {
        child_at(PathBuf::from(id)).await?.ok_or_else(|| {
            Error::Unsupported(format!("items of the type at \"{id}\""), BACKEND.into())
        })
    }

    async fn get_first_by_name(&self, name: &str) -> Result<StorageChild> {
        self.get_item(&path_to_string(&self.path.join(name))?).await
    }

    async fn create_file(&self, name: &str, overwrite: bool) -> Result<Box<dyn StorageFile>> {
        let path = self.path.join(name);
        if overwrite {
            fs::File::create(&path).await?;
        } else {
            fs::File::create_new(&path).await?;
        }
        Ok(Box::new(LocalFile::new(path)?))
    }

    async fn create_folder(&self, name: &str, overwrite: bool) -> Result<Box<dyn StorageFolder>> {
        let path = self.path.join(name);
        if fs::metadata(&path).await.is_ok_and(|metadata| metadata.is_dir()) {
            if !overwrite {
                return Ok(Box::new(LocalFolder::new(path)?));
            }
            fs::remove_dir_all(&path).await?;
        }
        fs::create_dir(&path).await?;
        Ok(Box::new(LocalFolder::new(path)?))
    }

    async fn delete_item(&self, item: &dyn StorageItem) -> Result<()> {
        if item.backend() != BACKEND {
            return Err(Error::InvalidArgument(format!(
                "Cannot delete {} item \"{}\" through a local folder",
                item.backend(),
                item.id()
            )));
        }

        match item.kind() {
            ItemKind::Folder => fs::remove_dir_all(item.id()).await?,
            ItemKind::File => fs::remove_file(item.id()).await?,
        }
        Ok(())
    }

    async fn move_from(
        &self,
        file: &dyn StorageFile,
        source: &dyn StorageFolder,
        overwrite: bool,
        fallback: &dyn MoveStrategy,
    ) -> Result<Box<dyn StorageFile>> {
        fallback.move_from(self, file, source, overwrite).await
    }

    async fn create_copy_of(
        &self,
        file: &dyn StorageFile,
        overwrite: bool,
        fallback: &dyn CopyStrategy,
    ) -> Result<Box<dyn StorageFile>> {
        fallback.create_copy_of(self, file, overwrite).await
    }
}
