use std::any::Any;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use log::debug;

use super::interop::{self, resolve_collision};
use super::{
    choose_route, get_from_path, try_get_from_path, Connection, FtpFile, FtpItem,
    TransferRoute, BACKEND,
};
use crate::client::{FtpClient, RemoteExists, TransferStatus};
use crate::data::{FileType, RemoteEntry};
use crate::error::{Error, Result};
use crate::util::{join_path, normalize_path};
use crate::{
    Capabilities, CopyStrategy, FolderWatcher, ItemKind, MoveStrategy, StorableType,
    StorageChild, StorageFile, StorageFolder, StorageItem,
};

pub struct FtpFolder<C> {
    connection: Connection<C>,
    entry: RemoteEntry,
}

impl<C: FtpClient> FtpFolder<C> {
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
            Some(FtpItem::Folder(folder)) => Ok(Some(folder)),
            Some(FtpItem::File(_)) => Err(Error::UnexpectedItem {
                path: path.to_string(),
                expected: "folder",
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

    pub async fn get_item(&self, id: &str) -> Result<FtpItem<C>> {
        let item = get_from_path(&self.connection, id).await?;
        if !item.id().contains(normalize_path(id)) {
            return Err(Error::UnexpectedItem {
                path: id.to_string(),
                expected: "matching item",
            });
        }
        Ok(item)
    }

    pub async fn get_first_by_name(&self, name: &str) -> Result<FtpItem<C>> {
        self.get_item(&join_path(self.path(), name)).await
    }

    pub async fn create_file(&self, name: &str, overwrite: bool) -> Result<FtpFile<C>> {
        let path = join_path(self.path(), name);
        self.connection.validate(&path)?;
        self.connection.ensure_connected().await?;

        let status = self
            .connection
            .client()
            .upload(
                &path,
                &mut tokio::io::empty(),
                RemoteExists::from_overwrite(overwrite),
            )
            .await?;

        match status {
            TransferStatus::Success => self.connection.lookup_file(&path).await,
            TransferStatus::Skipped => Err(Error::AlreadyExists(path)),
            TransferStatus::Failed => Err(Error::TransferFailed(format!(
                "Could not upload \"{path}\""
            ))),
        }
    }

    /// Unlike [`FtpFolder::create_file`], an existing folder is returned as is
    /// when `overwrite` is false.
    pub async fn create_folder(&self, name: &str, overwrite: bool) -> Result<FtpFolder<C>> {
        let path = join_path(self.path(), name);
        self.connection.validate(&path)?;
        self.connection.ensure_connected().await?;
        let client = self.connection.client();

        if client.directory_exists(&path).await? {
            if !overwrite {
                return self.connection.lookup_folder(&path).await;
            }
            debug!("Replacing existing folder \"{path}\"");
            self.connection.checkpoint()?;
            client.delete_dir(&path).await?;
        }

        self.connection.checkpoint()?;
        if !client.create_dir(&path).await? {
            return Err(Error::TransferFailed(format!(
                "Could not create folder \"{path}\""
            )));
        }
        self.connection.lookup_folder(&path).await
    }

    /// Deletes `item` from the server. Folders go with everything in them.
    pub async fn delete_item(&self, item: &dyn StorageItem) -> Result<()> {
        let any = item.as_any();
        let owner = match (any.downcast_ref::<FtpFile<C>>(), any.downcast_ref::<FtpFolder<C>>()) {
            (Some(file), _) => Some(file.connection()),
            (_, Some(folder)) => Some(folder.connection()),
            _ => None,
        };

        // Paths only mean something on the session they came from
        if !owner.is_some_and(|owner| self.connection.same_session(owner)) {
            return Err(Error::InvalidArgument(format!(
                "Cannot delete {} item \"{}\" through this FTP folder",
                item.backend(),
                item.id()
            )));
        }

        self.connection.ensure_connected().await?;
        match item.kind() {
            ItemKind::Folder => self.connection.client().delete_dir(item.id()).await,
            ItemKind::File => self.connection.client().delete_file(item.id()).await,
        }
    }

    pub async fn parent(&self) -> Result<Option<FtpFolder<C>>> {
        self.connection.parent_folder(self.path()).await
    }

    async fn move_within(&self, file: &FtpFile<C>, overwrite: bool) -> Result<FtpFile<C>> {
        let destination = join_path(self.path(), &file.entry().name);
        self.connection.ensure_connected().await?;
        let client = self.connection.client();

        if normalize_path(&destination) == normalize_path(file.path()) {
            debug!("\"{destination}\" is already in place");
            return self.connection.lookup_file(&destination).await;
        }

        // A refused rename does not say why
        if !overwrite && client.file_exists(&destination).await? {
            return resolve_collision(&self.connection, &destination).await;
        }

        self.connection.checkpoint()?;
        let moved = client
            .move_file(
                file.path(),
                &destination,
                RemoteExists::from_overwrite(overwrite),
            )
            .await?;
        if !moved {
            return Err(Error::TransferFailed(format!(
                "Could not move \"{}\" to \"{destination}\"",
                file.path()
            )));
        }
        self.connection.lookup_file(&destination).await
    }

    /// FTP has no copy command, so the bytes come down and go back up.
    async fn copy_within(&self, file: &FtpFile<C>, overwrite: bool) -> Result<FtpFile<C>> {
        let destination = join_path(self.path(), &file.entry().name);
        self.connection.ensure_connected().await?;
        let client = self.connection.client();

        if !overwrite && client.file_exists(&destination).await? {
            return resolve_collision(&self.connection, &destination).await;
        }

        let mut reader = client.open_read(file.path()).await?;
        self.connection.checkpoint()?;
        let status = client
            .upload(
                &destination,
                reader.as_mut(),
                RemoteExists::from_overwrite(overwrite),
            )
            .await?;

        match status {
            TransferStatus::Success => self.connection.lookup_file(&destination).await,
            TransferStatus::Skipped => resolve_collision(&self.connection, &destination).await,
            TransferStatus::Failed => Err(Error::TransferFailed(format!(
                "Could not copy \"{}\" to \"{destination}\"",
                file.path()
            ))),
        }
    }

    fn route(&self, file: Option<&FtpFile<C>>) -> TransferRoute {
        match file {
            Some(file) => choose_route(true, self.connection.same_session(file.connection())),
            None => choose_route(false, false),
        }
    }
}

fn into_child<C: FtpClient>(
    connection: &Connection<C>,
    entry: RemoteEntry,
    filter: StorableType,
) -> Option<StorageChild> {
    let item = match entry.metadata.r#type {
        FileType::Dir => FtpItem::Folder(FtpFolder::new(connection.clone(), entry)),
        FileType::File | FileType::Symlink => FtpItem::File(FtpFile::new(connection.clone(), entry)),
        other => {
            debug!("Skipping \"{}\" of unsupported type {other:?}", entry.path);
            return None;
        }
    };

    let kind = match item {
        FtpItem::File(_) => ItemKind::File,
        FtpItem::Folder(_) => ItemKind::Folder,
    };
    filter.admits(kind).then(|| item.into())
}

#[async_trait]
impl<C: FtpClient> StorageItem for FtpFolder<C> {
    fn id(&self) -> &str {
        &self.entry.path
    }

    fn name(&self) -> &str {
        &self.entry.name
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
            | Capabilities::GET_ITEM_RECURSIVE
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
        Ok(FtpFolder::parent(self)
            .await?
            .map(|folder| Box::new(folder) as Box<dyn StorageFolder>))
    }
}

#[async_trait]
impl<C: FtpClient> StorageFolder for FtpFolder<C> {
    fn items(&self, filter: StorableType) -> Result<BoxStream<'static, Result<StorageChild>>> {
        if filter == StorableType::None {
            return Err(Error::InvalidArgument(
                "Cannot list items of no type".into(),
            ));
        }

        let connection = self.connection.clone();
        let path = self.path().to_string();
        let listing = async move {
            connection.ensure_connected().await?;
            let entries = connection.client().list(&path).await?;
            Ok::<_, Error>(
                entries
                    .into_iter()
                    .filter_map(|entry| into_child(&connection, entry, filter))
                    .map(Ok)
                    .collect::<Vec<_>>(),
            )
        };

        Ok(stream::once(listing)
            .map_ok(stream::iter)
            .try_flatten()
            .boxed())
    }

    async fn get_item(&self, id: &str) -> Result<StorageChild> {
        FtpFolder::get_item(self, id).await.map(Into::into)
    }

    async fn get_first_by_name(&self, name: &str) -> Result<StorageChild> {
        FtpFolder::get_first_by_name(self, name).await.map(Into::into)
    }

    async fn create_file(&self, name: &str, overwrite: bool) -> Result<Box<dyn StorageFile>> {
        Ok(Box::new(FtpFolder::create_file(self, name, overwrite).await?))
    }

    async fn create_folder(&self, name: &str, overwrite: bool) -> Result<Box<dyn StorageFolder>> {
        Ok(Box::new(FtpFolder::create_folder(self, name, overwrite).await?))
    }

    async fn delete_item(&self, item: &dyn StorageItem) -> Result<()> {
        FtpFolder::delete_item(self, item).await
    }

    async fn move_from(
        &self,
        file: &dyn StorageFile,
        source: &dyn StorageFolder,
        overwrite: bool,
        fallback: &dyn MoveStrategy,
    ) -> Result<Box<dyn StorageFile>> {
        let ftp_file = file.as_any().downcast_ref::<FtpFile<C>>();
        let ftp_source = source.as_any().downcast_ref::<FtpFolder<C>>();

        match (self.route(ftp_file), ftp_file, ftp_source) {
            (TransferRoute::SameConnection, Some(file), Some(_)) => {
                Ok(Box::new(self.move_within(file, overwrite).await?))
            }
            (TransferRoute::Interoperable, Some(file), Some(source)) => {
                interop::move_between(file, source, self, overwrite, fallback).await
            }
            _ => {
                debug!("Moving \"{}\" from {} through the fallback", file.id(), source.backend());
                fallback.move_from(self, file, source, overwrite).await
            }
        }
    }

    async fn create_copy_of(
        &self,
        file: &dyn StorageFile,
        overwrite: bool,
        fallback: &dyn CopyStrategy,
    ) -> Result<Box<dyn StorageFile>> {
        let ftp_file = file.as_any().downcast_ref::<FtpFile<C>>();

        match (self.route(ftp_file), ftp_file) {
            (TransferRoute::SameConnection, Some(file)) => {
                Ok(Box::new(self.copy_within(file, overwrite).await?))
            }
            (TransferRoute::Interoperable, Some(file)) => {
                interop::copy_between(file, self, overwrite, fallback).await
            }
            _ => {
                debug!("Copying \"{}\" from {} through the fallback", file.id(), file.backend());
                fallback.create_copy_of(self, file, overwrite).await
            }
        }
    }

    async fn watcher(&self) -> Result<Box<dyn FolderWatcher>> {
        Err(Error::Unsupported("folder watching".into(), BACKEND.into()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::client::{MemoryClient, MemoryServer};
    use crate::config::{MoveCollision, Settings};
    use crate::ops::StreamTransfer;
    use crate::AccessMode;

    fn connection(server: &MemoryServer) -> Connection<MemoryClient> {
        Connection::new(Arc::new(server.client()))
    }

    async fn read(file: &dyn StorageFile) -> String {
        let mut content = String::new();
        file.open_stream(AccessMode::READ)
            .await
            .unwrap()
            .read_to_string(&mut content)
            .await
            .unwrap();
        content
    }

    async fn names(folder: &FtpFolder<MemoryClient>, filter: StorableType) -> Vec<String> {
        folder
            .items(filter)
            .unwrap()
            .map_ok(|child| child.name().to_string())
            .try_collect()
            .await
            .unwrap()
    }

    /// Counts how often the fast paths gave up.
    #[derive(Default)]
    struct Recording {
        calls: AtomicUsize,
    }

    impl Recording {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CopyStrategy for Recording {
        async fn create_copy_of(
            &self,
            target: &dyn StorageFolder,
            file: &dyn StorageFile,
            overwrite: bool,
        ) -> Result<Box<dyn StorageFile>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            StreamTransfer.create_copy_of(target, file, overwrite).await
        }
    }

    #[async_trait]
    impl MoveStrategy for Recording {
        async fn move_from(
            &self,
            target: &dyn StorageFolder,
            file: &dyn StorageFile,
            source: &dyn StorageFolder,
            overwrite: bool,
        ) -> Result<Box<dyn StorageFile>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            StreamTransfer.move_from(target, file, source, overwrite).await
        }
    }

    #[tokio::test]
    async fn lists_lazily_and_filters() {
        let server = MemoryServer::new();
        server.insert_file("/pub/a.txt", "a");
        server.insert_dir("/pub/sub");
        server.insert_special("/pub/link", FileType::Symlink);
        server.insert_special("/pub/socket", FileType::Socket);
        let connection = connection(&server);
        let folder = FtpFolder::from_path(&connection, "/pub").await.unwrap();

        let before = connection.client().requests();
        let items = folder.items(StorableType::All).unwrap();
        assert_eq!(connection.client().requests(), before);
        let all: Vec<_> = items.try_collect().await.unwrap();
        assert_eq!(connection.client().requests(), before + 1);
        assert_eq!(all.len(), 3);

        assert_eq!(names(&folder, StorableType::File).await, ["a.txt", "link"]);
        assert_eq!(names(&folder, StorableType::Folder).await, ["sub"]);

        let err = folder.items(StorableType::None).err().unwrap();
        assert!(err.is_invalid_argument_error());
    }

    #[tokio::test]
    async fn created_file_is_listed_once() {
        let server = MemoryServer::new();
        server.insert_dir("/inbox");
        let connection = connection(&server);
        let folder = FtpFolder::from_path(&connection, "/inbox").await.unwrap();

        let file = folder.create_file("new.txt", false).await.unwrap();
        assert_eq!(file.path(), "/inbox/new.txt");
        assert_eq!(server.read_file("/inbox/new.txt").unwrap(), b"");

        let children: Vec<_> = folder
            .items(StorableType::All)
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let matching: Vec<_> = children
            .iter()
            .filter(|child| child.name() == "new.txt")
            .collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].id(), "/inbox/new.txt");
        assert_eq!(matching[0].kind(), ItemKind::File);
    }

    #[tokio::test]
    async fn create_file_and_create_folder_treat_existing_targets_differently() {
        let server = MemoryServer::new();
        server.insert_file("/root/existing.txt", "keep me");
        server.insert_file("/root/dir/inner.txt", "inner");
        let connection = connection(&server);
        let folder = FtpFolder::from_path(&connection, "/root").await.unwrap();

        let err = folder.create_file("existing.txt", false).await.err().unwrap();
        assert!(err.is_already_exists_error());
        assert_eq!(server.read_file("/root/existing.txt").unwrap(), b"keep me");

        let same = folder.create_folder("dir", false).await.unwrap();
        assert_eq!(same.path(), "/root/dir");
        assert!(server.contains("/root/dir/inner.txt"));

        folder.create_file("existing.txt", true).await.unwrap();
        assert_eq!(server.read_file("/root/existing.txt").unwrap(), b"");

        let fresh = folder.create_folder("dir", true).await.unwrap();
        assert_eq!(fresh.path(), "/root/dir");
        assert!(!server.contains("/root/dir/inner.txt"));
    }

    #[tokio::test]
    async fn create_folder_fails_when_a_file_is_in_the_way() {
        let server = MemoryServer::new();
        server.insert_file("/taken", "file");
        let connection = connection(&server);
        let root = FtpFolder::from_path(&connection, "/").await.unwrap();

        let err = root.create_folder("taken", false).await.err().unwrap();
        assert!(matches!(err, Error::TransferFailed(_)));
    }

    #[tokio::test]
    async fn deleting_a_folder_removes_descendants() {
        let server = MemoryServer::new();
        server.insert_file("/tree/a/b/deep.txt", "deep");
        server.insert_file("/tree/top.txt", "top");
        let connection = connection(&server);
        let root = FtpFolder::from_path(&connection, "/").await.unwrap();
        let tree = FtpFolder::from_path(&connection, "/tree").await.unwrap();

        root.delete_item(&tree).await.unwrap();
        for path in ["/tree", "/tree/a/b/deep.txt", "/tree/top.txt"] {
            let err = get_from_path(&connection, path).await.err().unwrap();
            assert!(err.is_not_found_error(), "{path} still resolves");
        }
    }

    #[tokio::test]
    async fn lookups() {
        let server = MemoryServer::new();
        server.insert_file("/pub/a/b.txt", "b");
        let connection = connection(&server);
        let folder = FtpFolder::from_path(&connection, "/pub").await.unwrap();

        let by_name = folder.get_first_by_name("a").await.unwrap();
        assert_eq!(by_name.id(), "/pub/a");
        assert!(by_name.into_folder().is_some());

        let by_id = folder.get_item("/pub/a/b.txt/").await.unwrap();
        assert_eq!(by_id.id(), "/pub/a/b.txt");

        let nested = StorageFolder::get_item_recursive(&folder, "/pub/a/b.txt")
            .await
            .unwrap();
        assert_eq!(nested.kind(), ItemKind::File);

        let err = folder.get_first_by_name("missing").await.err().unwrap();
        assert!(err.is_not_found_error());
    }

    #[tokio::test]
    async fn move_on_one_connection_keeps_content() {
        let server = MemoryServer::new();
        server.insert_file("/src/data.bin", "payload");
        server.insert_dir("/dst");
        let connection = connection(&server);
        let source = FtpFolder::from_path(&connection, "/src").await.unwrap();
        let target = FtpFolder::from_path(&connection, "/dst").await.unwrap();
        let file = FtpFile::from_path(&connection, "/src/data.bin").await.unwrap();
        let fallback = Recording::default();

        let moved = target
            .move_from(&file, &source, false, &fallback)
            .await
            .unwrap();
        assert_eq!(moved.id(), "/dst/data.bin");
        assert_eq!(read(moved.as_ref()).await, "payload");
        assert!(!server.contains("/src/data.bin"));
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn move_collisions_follow_settings() {
        let server = MemoryServer::new();
        server.insert_file("/src/f.txt", "new");
        server.insert_file("/dst/f.txt", "old");

        let failing = connection(&server);
        let source = FtpFolder::from_path(&failing, "/src").await.unwrap();
        let target = FtpFolder::from_path(&failing, "/dst").await.unwrap();
        let file = FtpFile::from_path(&failing, "/src/f.txt").await.unwrap();
        let err = target
            .move_from(&file, &source, false, &StreamTransfer)
            .await
            .err()
            .unwrap();
        assert!(err.is_already_exists_error());

        let skipping = connection(&server).with_settings(Settings {
            move_collision: MoveCollision::Skip,
        });
        let source = FtpFolder::from_path(&skipping, "/src").await.unwrap();
        let target = FtpFolder::from_path(&skipping, "/dst").await.unwrap();
        let file = FtpFile::from_path(&skipping, "/src/f.txt").await.unwrap();
        let kept = target
            .move_from(&file, &source, false, &StreamTransfer)
            .await
            .unwrap();
        assert_eq!(read(kept.as_ref()).await, "old");
        assert_eq!(server.read_file("/src/f.txt").unwrap(), b"new");

        target
            .move_from(&file, &source, true, &StreamTransfer)
            .await
            .unwrap();
        assert_eq!(server.read_file("/dst/f.txt").unwrap(), b"new");
        assert!(!server.contains("/src/f.txt"));
    }

    #[tokio::test]
    async fn copy_on_one_connection_streams_through() {
        let server = MemoryServer::new();
        server.insert_file("/src/data.bin", "payload");
        server.insert_dir("/dst");
        let connection = connection(&server);
        let target = FtpFolder::from_path(&connection, "/dst").await.unwrap();
        let file = FtpFile::from_path(&connection, "/src/data.bin").await.unwrap();
        let fallback = Recording::default();

        let copy = target.create_copy_of(&file, false, &fallback).await.unwrap();
        assert_eq!(read(copy.as_ref()).await, "payload");
        assert!(server.contains("/src/data.bin"));
        assert_eq!(fallback.calls(), 0);

        let err = target
            .create_copy_of(&file, false, &fallback)
            .await
            .err()
            .unwrap();
        assert!(err.is_already_exists_error());
    }

    #[tokio::test]
    async fn cross_connection_without_fxp_uses_the_fallback() {
        let server = MemoryServer::new();
        server.insert_file("/src/data.bin", "payload");
        server.insert_file("/src/copy.bin", "copied");
        server.insert_dir("/dst");
        let reading = connection(&server);
        let writing = connection(&server);
        let source = FtpFolder::from_path(&reading, "/src").await.unwrap();
        let target = FtpFolder::from_path(&writing, "/dst").await.unwrap();
        let fallback = Recording::default();

        let file = FtpFile::from_path(&reading, "/src/data.bin").await.unwrap();
        let moved = target
            .move_from(&file, &source, false, &fallback)
            .await
            .unwrap();
        assert_eq!(moved.id(), "/dst/data.bin");
        assert_eq!(read(moved.as_ref()).await, "payload");
        assert!(!server.contains("/src/data.bin"));

        let file = FtpFile::from_path(&reading, "/src/copy.bin").await.unwrap();
        let copy = target.create_copy_of(&file, false, &fallback).await.unwrap();
        assert_eq!(read(copy.as_ref()).await, "copied");
        assert!(server.contains("/src/copy.bin"));

        assert_eq!(fallback.calls(), 2);
    }

    #[tokio::test]
    async fn cross_server_fxp_skips_the_fallback() {
        let origin = MemoryServer::with_fxp();
        let mirror = MemoryServer::with_fxp();
        origin.insert_file("/out/data.bin", "payload");
        mirror.insert_dir("/in");
        let from = connection(&origin);
        let to = connection(&mirror);
        let source = FtpFolder::from_path(&from, "/out").await.unwrap();
        let target = FtpFolder::from_path(&to, "/in").await.unwrap();
        let file = FtpFile::from_path(&from, "/out/data.bin").await.unwrap();
        let fallback = Recording::default();

        let copy = target.create_copy_of(&file, false, &fallback).await.unwrap();
        assert_eq!(copy.id(), "/in/data.bin");
        assert!(origin.contains("/out/data.bin"));

        let moved = target
            .move_from(&file, &source, true, &fallback)
            .await
            .unwrap();
        assert_eq!(read(moved.as_ref()).await, "payload");
        assert!(!origin.contains("/out/data.bin"));
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn fxp_reconnects_dropped_sessions() {
        let origin = MemoryServer::with_fxp();
        let mirror = MemoryServer::with_fxp();
        origin.insert_file("/data.bin", "payload");
        let from = connection(&origin);
        let to = connection(&mirror);
        let file = FtpFile::from_path(&from, "/data.bin").await.unwrap();
        let target = FtpFolder::from_path(&to, "/").await.unwrap();

        from.client().disconnect();
        to.client().disconnect();
        target
            .create_copy_of(&file, false, &StreamTransfer)
            .await
            .unwrap();
        assert_eq!(mirror.read_file("/data.bin").unwrap(), b"payload");
    }

    #[tokio::test]
    async fn move_into_own_folder_keeps_the_file() {
        let server = MemoryServer::new();
        server.insert_file("/docs/report.txt", "draft");
        let connection = connection(&server);
        let folder = FtpFolder::from_path(&connection, "/docs").await.unwrap();
        let file = FtpFile::from_path(&connection, "/docs/report.txt").await.unwrap();

        let before = connection.client().requests();
        let moved = folder
            .move_from(&file, &folder, true, &StreamTransfer)
            .await
            .unwrap();
        // Only the lookup of the result, no rename or delete
        assert_eq!(connection.client().requests(), before + 1);
        assert_eq!(moved.id(), "/docs/report.txt");
        assert_eq!(server.read_file("/docs/report.txt").unwrap(), b"draft");
    }

    #[tokio::test]
    async fn items_of_other_sessions_are_not_deleted() {
        let first = MemoryServer::new();
        let second = MemoryServer::new();
        first.insert_file("/shared.txt", "first");
        second.insert_file("/shared.txt", "second");
        let on_first = connection(&first);
        let on_second = connection(&second);
        let file = FtpFile::from_path(&on_first, "/shared.txt").await.unwrap();
        let root = FtpFolder::from_path(&on_second, "/").await.unwrap();

        let err = root.delete_item(&file).await.err().unwrap();
        assert!(err.is_invalid_argument_error());
        assert!(first.contains("/shared.txt"));
        assert!(second.contains("/shared.txt"));

        // Another handle on the same session is fine
        let root = FtpFolder::from_path(&on_first.clone(), "/").await.unwrap();
        root.delete_item(&file).await.unwrap();
        assert!(!first.contains("/shared.txt"));
    }

    #[tokio::test]
    async fn lookups_cannot_leave_the_folder() {
        let server = MemoryServer::new();
        server.insert_file("/private/secret.txt", "secret");
        server.insert_dir("/pub");
        let connection = connection(&server);
        let folder = FtpFolder::from_path(&connection, "/pub").await.unwrap();

        let err = folder
            .get_first_by_name("../private/secret.txt")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnexpectedItem { .. }));
    }

    #[tokio::test]
    async fn copy_collisions_are_found_before_downloading() {
        let server = MemoryServer::new();
        server.insert_file("/src/data.bin", "new");
        server.insert_file("/dst/data.bin", "old");
        let connection = connection(&server);
        let target = FtpFolder::from_path(&connection, "/dst").await.unwrap();
        let file = FtpFile::from_path(&connection, "/src/data.bin").await.unwrap();

        let before = connection.client().requests();
        let err = target
            .create_copy_of(&file, false, &StreamTransfer)
            .await
            .err()
            .unwrap();
        assert!(err.is_already_exists_error());
        assert_eq!(connection.client().requests(), before + 1);
        assert_eq!(server.read_file("/dst/data.bin").unwrap(), b"old");
    }

    #[tokio::test]
    async fn skipped_collisions_agree_across_routes() {
        let skip = Settings {
            move_collision: MoveCollision::Skip,
        };
        let server = MemoryServer::new();
        server.insert_file("/src/f.txt", "new");
        server.insert_file("/dst/f.txt", "old");
        let shared = connection(&server).with_settings(skip);
        let other = connection(&server).with_settings(skip);
        let target = FtpFolder::from_path(&shared, "/dst").await.unwrap();

        let mut kept = vec![];
        for connection in [&shared, &other] {
            let source = FtpFolder::from_path(connection, "/src").await.unwrap();
            let file = FtpFile::from_path(connection, "/src/f.txt").await.unwrap();
            let fallback = Recording::default();

            let moved = target
                .move_from(&file, &source, false, &fallback)
                .await
                .unwrap();
            let copied = target.create_copy_of(&file, false, &fallback).await.unwrap();
            assert_eq!(fallback.calls(), 0);
            kept.push((moved.id().to_string(), read(copied.as_ref()).await));
        }

        assert_eq!(kept[0], kept[1]);
        assert_eq!(kept[0], ("/dst/f.txt".to_string(), "old".to_string()));
        assert_eq!(server.read_file("/src/f.txt").unwrap(), b"new");
        assert_eq!(server.read_file("/dst/f.txt").unwrap(), b"old");
    }

    #[tokio::test]
    async fn watching_is_unsupported() {
        let server = MemoryServer::new();
        let connection = connection(&server);
        let root = FtpFolder::from_path(&connection, "/").await.unwrap();

        assert!(!root.capabilities().contains(Capabilities::WATCH));
        assert!(root.capabilities().contains(Capabilities::MOVE_FROM));
        let err = root.watcher().await.err().unwrap();
        assert!(matches!(err, Error::Unsupported(..)));
        assert!(root.parent().await.unwrap().is_none());
    }
}
