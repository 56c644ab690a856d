use std::collections::BTreeMap;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use async_trait::async_trait;
use log::warn;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use super::{FtpClient, RemoteExists, TransferStatus};
use crate::data::{FileType, RemoteEntry};
use crate::error::{Error, Result};
use crate::stream::{ReadHalf, WriteHalf};
use crate::util::{normalize_path, parent_path, resolve_dots, ROOT};

#[derive(Debug, Clone)]
struct Node {
    r#type: FileType,
    data: Vec<u8>,
}

impl Node {
    fn dir() -> Self {
        Self {
            r#type: FileType::Dir,
            data: vec![],
        }
    }

    fn file(data: Vec<u8>) -> Self {
        Self {
            r#type: FileType::File,
            data,
        }
    }

    fn is_dir(&self) -> bool {
        self.r#type == FileType::Dir
    }
}

#[derive(Debug, Default)]
struct Namespace {
    nodes: BTreeMap<String, Node>,
}

impl Namespace {
    fn get(&self, path: &str) -> Option<Node> {
        let path = resolve_dots(path);
        if path == ROOT {
            return Some(Node::dir());
        }
        self.nodes.get(&path).cloned()
    }

    fn is_dir(&self, path: &str) -> bool {
        self.get(path).is_some_and(|node| node.is_dir())
    }

    fn parent_is_dir(&self, path: &str) -> bool {
        parent_path(path).is_some_and(|parent| self.is_dir(&parent))
    }

    /// Creates `path` and any missing ancestors. Fails if a file is in the way.
    fn create_dirs(&mut self, path: &str) -> bool {
        let path = normalize_path(path);
        if path == ROOT {
            return true;
        }
        if let Some(parent) = parent_path(path) {
            if !self.create_dirs(&parent) {
                return false;
            }
        }

        match self.nodes.get(path) {
            Some(node) => node.is_dir(),
            None => {
                self.nodes.insert(path.to_string(), Node::dir());
                true
            }
        }
    }

    fn insert(&mut self, path: &str, node: Node) {
        self.nodes.insert(normalize_path(path).to_string(), node);
    }

    fn remove_tree(&mut self, path: &str) {
        let path = normalize_path(path);
        let prefix = if path == ROOT {
            ROOT.to_string()
        } else {
            format!("{path}/")
        };
        self.nodes
            .retain(|key, _| key != path && !key.starts_with(&prefix));
    }

    fn children(&self, dir: &str) -> Vec<RemoteEntry> {
        let dir = normalize_path(dir);
        self.nodes
            .iter()
            .filter(|(key, _)| parent_path(key).as_deref() == Some(dir))
            .map(|(key, node)| entry_for(key, node))
            .collect()
    }
}

fn entry_for(path: &str, node: &Node) -> RemoteEntry {
    let entry = RemoteEntry::new(path, node.r#type);
    if node.is_dir() {
        entry
    } else {
        entry.with_size(node.data.len() as u64)
    }
}

/// An FTP namespace held in process memory. Clients obtained from one server
/// share its files but not their connection state.
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    namespace: Arc<Mutex<Namespace>>,
    fxp: bool,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fxp() -> Self {
        Self {
            fxp: true,
            ..Default::default()
        }
    }

    pub fn supports_fxp(&self) -> bool {
        self.fxp
    }

    /// A new, not yet connected, session on this server.
    pub fn client(&self) -> MemoryClient {
        MemoryClient {
            server: self.clone(),
            connected: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn insert_dir(&self, path: &str) {
        self.namespace().create_dirs(path);
    }

    pub fn insert_file(&self, path: &str, data: impl Into<Vec<u8>>) {
        self.insert_node(path, Node::file(data.into()));
    }

    /// Inserts an object of any kind, e.g. a link or a fifo.
    pub fn insert_special(&self, path: &str, r#type: FileType) {
        self.insert_node(
            path,
            Node {
                r#type,
                data: vec![],
            },
        );
    }

    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        self.namespace()
            .get(path)
            .filter(|node| !node.is_dir())
            .map(|node| node.data)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.namespace().get(path).is_some()
    }

    fn insert_node(&self, path: &str, node: Node) {
        let mut namespace = self.namespace();
        if let Some(parent) = parent_path(path) {
            namespace.create_dirs(&parent);
        }
        namespace.insert(path, node);
    }

    fn namespace(&self) -> MutexGuard<'_, Namespace> {
        self.namespace.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One session against a [`MemoryServer`].
#[derive(Debug)]
pub struct MemoryClient {
    server: MemoryServer,
    connected: AtomicBool,
    requests: AtomicUsize,
}

impl MemoryClient {
    pub fn server(&self) -> &MemoryServer {
        &self.server
    }

    /// Number of requests this session has sent, `connect` included.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn request(&self) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl FtpClient for MemoryClient {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn object_info(&self, path: &str) -> Result<Option<RemoteEntry>> {
        self.request()?;
        // Entries carry the path the server resolved, not the one asked for
        let path = resolve_dots(path);
        Ok(self
            .server
            .namespace()
            .get(&path)
            .map(|node| entry_for(&path, &node)))
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        self.request()?;
        let namespace = self.server.namespace();
        if !namespace.is_dir(path) {
            return Err(Error::NotFound(path.to_string()));
        }
        Ok(namespace.children(path))
    }

    async fn open_read(&self, path: &str) -> Result<ReadHalf> {
        self.request()?;
        match self.server.namespace().get(path) {
            Some(node) if node.r#type.is_file_like() => Ok(Box::new(Cursor::new(node.data))),
            _ => Err(Error::NotFound(path.to_string())),
        }
    }

    async fn open_write(&self, path: &str) -> Result<WriteHalf> {
        self.request()?;
        {
            let namespace = self.server.namespace();
            if !namespace.parent_is_dir(path) {
                return Err(Error::NotFound(path.to_string()));
            }
            if namespace.is_dir(path) {
                return Err(Error::TransferFailed(format!(
                    "Cannot write to directory \"{path}\""
                )));
            }
        }

        Ok(Box::new(MemoryWriter {
            server: self.server.clone(),
            path: path.to_string(),
            buffer: vec![],
            committed: false,
        }))
    }

    async fn upload(
        &self,
        path: &str,
        data: &mut (dyn AsyncRead + Send + Unpin),
        exists: RemoteExists,
    ) -> Result<TransferStatus> {
        self.request()?;
        {
            let namespace = self.server.namespace();
            if !namespace.parent_is_dir(path) || namespace.is_dir(path) {
                return Ok(TransferStatus::Failed);
            }
            if exists == RemoteExists::Skip && namespace.get(path).is_some() {
                return Ok(TransferStatus::Skipped);
            }
        }

        let mut buffer = vec![];
        data.read_to_end(&mut buffer).await?;
        self.server.namespace().insert(path, Node::file(buffer));
        Ok(TransferStatus::Success)
    }

    async fn create_dir(&self, path: &str) -> Result<bool> {
        self.request()?;
        let mut namespace = self.server.namespace();
        if namespace.get(path).is_some() {
            return Ok(false);
        }
        Ok(namespace.create_dirs(path))
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        self.request()?;
        let mut namespace = self.server.namespace();
        if !namespace.is_dir(path) {
            return Err(Error::NotFound(path.to_string()));
        }
        namespace.remove_tree(path);
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        self.request()?;
        let mut namespace = self.server.namespace();
        match namespace.get(path) {
            Some(node) if !node.is_dir() => {
                namespace.remove_tree(path);
                Ok(())
            }
            _ => Err(Error::NotFound(path.to_string())),
        }
    }

    async fn move_file(&self, from: &str, to: &str, exists: RemoteExists) -> Result<bool> {
        self.request()?;
        let mut namespace = self.server.namespace();
        let Some(node) = namespace.get(from).filter(|node| !node.is_dir()) else {
            return Ok(false);
        };
        if !namespace.parent_is_dir(to) {
            return Ok(false);
        }
        match namespace.get(to) {
            Some(existing) if existing.is_dir() => return Ok(false),
            Some(_) if exists == RemoteExists::Skip => return Ok(false),
            _ => (),
        }

        namespace.remove_tree(from);
        namespace.insert(to, node);
        Ok(true)
    }

    async fn transfer_file(
        &self,
        from: &str,
        target: &Self,
        to: &str,
        exists: RemoteExists,
    ) -> Result<TransferStatus> {
        self.request()?;
        target.request()?;
        if !self.server.fxp || !target.server.fxp {
            return Ok(TransferStatus::Failed);
        }

        let data = self
            .server
            .read_file(from)
            .ok_or_else(|| Error::NotFound(from.to_string()))?;

        let mut namespace = target.server.namespace();
        if !namespace.parent_is_dir(to) || namespace.is_dir(to) {
            return Ok(TransferStatus::Failed);
        }
        if exists == RemoteExists::Skip && namespace.get(to).is_some() {
            return Ok(TransferStatus::Skipped);
        }
        namespace.insert(to, Node::file(data));
        Ok(TransferStatus::Success)
    }
}

struct MemoryWriter {
    server: MemoryServer,
    path: String,
    buffer: Vec<u8>,
    committed: bool,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.committed {
            let data = std::mem::take(&mut this.buffer);
            this.server.namespace().insert(&this.path, Node::file(data));
            this.committed = true;
        }
        Poll::Ready(Ok(()))
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        if !self.committed {
            warn!(
                "Writer for \"{}\" dropped without shutdown, {} bytes discarded",
                self.path,
                self.buffer.len()
            );
        }
    }
}
