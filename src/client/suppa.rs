use std::future::Future;
use std::io;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use async_trait::async_trait;
use log::{debug, warn};
use suppaftp::list::File as ListFile;
use suppaftp::tokio::{AsyncNativeTlsConnector, AsyncNativeTlsFtpStream};
use suppaftp::types::FileType as TransferType;
use suppaftp::{FtpError, Mode, Status};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use super::{FtpClient, RemoteExists, TransferStatus};
use crate::config::FtpConfig;
use crate::data::{FileType, RemoteEntry};
use crate::error::{Error, Result};
use crate::stream::{ReadHalf, WriteHalf};
use crate::util::{extract_lowest_path_item, join_path, normalize_path, parent_path, ROOT};

type SharedStream = Arc<Mutex<Option<AsyncNativeTlsFtpStream>>>;

/// [`FtpClient`] backed by a `suppaftp` control connection.
///
/// The session is opened lazily by [`FtpClient::connect`]. Closing it with
/// [`SuppaClient::quit`] is up to whoever owns the client; storage entities
/// never do it.
pub struct SuppaClient {
    config: FtpConfig,
    stream: SharedStream,
}

impl SuppaClient {
    pub fn new(config: FtpConfig) -> Self {
        Self {
            config,
            stream: Arc::new(Mutex::new(None)),
        }
    }

    /// Wraps a session that is already logged in.
    pub fn from_stream(config: FtpConfig, stream: AsyncNativeTlsFtpStream) -> Self {
        Self {
            config,
            stream: Arc::new(Mutex::new(Some(stream))),
        }
    }

    pub fn config(&self) -> &FtpConfig {
        &self.config
    }

    pub async fn quit(&self) -> Result<()> {
        if let Some(mut stream) = self.stream.lock().await.take() {
            stream.quit().await?;
        }
        Ok(())
    }

    async fn session(&self) -> Result<MappedMutexGuard<'_, AsyncNativeTlsFtpStream>> {
        MutexGuard::try_map(self.stream.lock().await, Option::as_mut)
            .map_err(|_| Error::NotConnected)
    }
}

async fn open_session(config: &FtpConfig) -> Result<AsyncNativeTlsFtpStream> {
    let address = config.address();
    let mut stream = AsyncNativeTlsFtpStream::connect(address.as_str()).await?;

    if config.secure {
        let connector =
            AsyncNativeTlsConnector::from(suppaftp::async_native_tls::TlsConnector::new());
        stream = stream.into_secure(connector, &config.host).await?;
    }

    stream.login(&config.username, &config.password).await?;
    stream.transfer_type(TransferType::Binary).await?;
    if !config.passive {
        stream.set_mode(Mode::Active);
    }

    Ok(stream)
}

fn is_unavailable(err: &FtpError) -> bool {
    matches!(err, FtpError::UnexpectedResponse(response) if response.status == Status::FileUnavailable)
}

fn entry_from_listing(path: &str, file: &ListFile) -> RemoteEntry {
    RemoteEntry::new(
        path,
        FileType::from_bools(file.is_file(), file.is_directory(), file.is_symlink()),
    )
    .with_size(file.size() as u64)
    .with_modified(file.modified())
}

fn parse_listing(lines: &[String]) -> impl Iterator<Item = ListFile> + '_ {
    lines
        .iter()
        .filter_map(|line| ListFile::from_str(line).ok())
        .filter(|file| file.name() != "." && file.name() != "..")
}

#[async_trait]
impl FtpClient for SuppaClient {
    async fn is_connected(&self) -> bool {
        self.stream.lock().await.is_some()
    }

    async fn connect(&self) -> Result<()> {
        let mut stream = self.stream.lock().await;
        if stream.is_none() {
            debug!("Connecting to FTP server {}", self.config.address());
            *stream = Some(open_session(&self.config).await?);
        }
        Ok(())
    }

    async fn object_info(&self, path: &str) -> Result<Option<RemoteEntry>> {
        let path = normalize_path(path);
        if path == ROOT {
            return Ok(Some(RemoteEntry::root()));
        }

        let mut stream = self.session().await?;
        match stream.mlst(Some(path)).await {
            Ok(line) => match ListFile::from_mlsx_line(line.trim()) {
                Ok(file) => {
                    // MLST answers with the pathname as the server resolved it
                    let reported = match file.name() {
                        name if name.starts_with('/') => normalize_path(name),
                        _ => path,
                    };
                    return Ok(Some(entry_from_listing(reported, &file)));
                }
                Err(err) => debug!("Unparseable MLST reply for \"{path}\" ({err:?}), using LIST"),
            },
            Err(err) if is_unavailable(&err) => return Ok(None),
            Err(err) => debug!("MLST \"{path}\" failed ({err}), using LIST"),
        }

        let Some(parent) = parent_path(path) else {
            return Ok(None);
        };
        let name = extract_lowest_path_item(path);
        let lines = match stream.list(Some(&parent)).await {
            Ok(lines) => lines,
            Err(err) if is_unavailable(&err) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let entry = parse_listing(&lines)
            .find(|file| file.name() == name)
            .map(|file| entry_from_listing(path, &file));
        Ok(entry)
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let lines = match self.session().await?.list(Some(path)).await {
            Ok(lines) => lines,
            Err(err) if is_unavailable(&err) => return Err(Error::NotFound(path.to_string())),
            Err(err) => return Err(err.into()),
        };

        let entries = parse_listing(&lines)
            .map(|file| entry_from_listing(&join_path(path, file.name()), &file))
            .collect();
        Ok(entries)
    }

    /// Streams the file over a session of its own, so lookups and uploads on
    /// this client can go ahead while the reader is open.
    async fn open_read(&self, path: &str) -> Result<ReadHalf> {
        if !self.is_connected().await {
            return Err(Error::NotConnected);
        }

        let mut session = open_session(&self.config).await?;
        let data = match session.retr_as_stream(path).await {
            Ok(data) => data,
            Err(err) if is_unavailable(&err) => return Err(Error::NotFound(path.to_string())),
            Err(err) => return Err(err.into()),
        };

        Ok(Box::new(DownloadReader {
            path: path.to_string(),
            state: DownloadState::Streaming {
                session,
                data: Box::new(data),
            },
        }))
    }

    async fn open_write(&self, path: &str) -> Result<WriteHalf> {
        if !self.is_connected().await {
            return Err(Error::NotConnected);
        }

        Ok(Box::new(UploadWriter {
            session: self.stream.clone(),
            path: path.to_string(),
            buffer: vec![],
            upload: None,
            committed: false,
        }))
    }

    async fn upload(
        &self,
        path: &str,
        data: &mut (dyn AsyncRead + Send + Unpin),
        exists: RemoteExists,
    ) -> Result<TransferStatus> {
        if exists == RemoteExists::Skip && self.object_info(path).await?.is_some() {
            return Ok(TransferStatus::Skipped);
        }

        let mut reader = data;
        match self.session().await?.put_file(path, &mut reader).await {
            Ok(_) => Ok(TransferStatus::Success),
            Err(FtpError::ConnectionError(err)) => Err(err.into()),
            Err(err) => {
                warn!("Upload to \"{path}\" failed: {err}");
                Ok(TransferStatus::Failed)
            }
        }
    }

    async fn create_dir(&self, path: &str) -> Result<bool> {
        match self.session().await?.mkdir(path).await {
            Ok(()) => Ok(true),
            Err(err @ FtpError::UnexpectedResponse(_)) => {
                debug!("MKD \"{path}\" refused: {err}");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        let mut dirs_to_remove = vec![];
        let mut dirs_to_process = vec![path.to_string()];

        while !dirs_to_process.is_empty() {
            let mut new_dirs_to_process = vec![];

            for dir in dirs_to_process {
                for entry in self.list(&dir).await? {
                    if entry.metadata.r#type == FileType::Dir {
                        new_dirs_to_process.push(entry.path);
                    } else {
                        self.delete_file(&entry.path).await?;
                    }
                }

                dirs_to_remove.push(dir);
            }

            dirs_to_process = new_dirs_to_process;
        }

        // Deepest directories were queued last
        while let Some(dir) = dirs_to_remove.pop() {
            self.session().await?.rmdir(&dir).await?;
        }

        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        match self.session().await?.rm(path).await {
            Ok(()) => Ok(()),
            Err(err) if is_unavailable(&err) => Err(Error::NotFound(path.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    async fn move_file(&self, from: &str, to: &str, exists: RemoteExists) -> Result<bool> {
        if normalize_path(from) == normalize_path(to) {
            return self.file_exists(from).await;
        }

        if self.file_exists(to).await? {
            match exists {
                RemoteExists::Skip => return Ok(false),
                // Plenty of servers refuse RNTO onto an existing file
                RemoteExists::Overwrite => self.delete_file(to).await?,
            }
        }

        match self.session().await?.rename(from, to).await {
            Ok(()) => Ok(true),
            Err(err @ FtpError::UnexpectedResponse(_)) => {
                debug!("Rename of \"{from}\" to \"{to}\" refused: {err}");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn transfer_file(
        &self,
        from: &str,
        target: &Self,
        to: &str,
        _exists: RemoteExists,
    ) -> Result<TransferStatus> {
        debug!(
            "FXP of \"{from}\" to \"{to}\" on {} is not available through suppaftp",
            target.config.address()
        );
        Ok(TransferStatus::Failed)
    }
}

type SessionFuture = Pin<Box<dyn Future<Output = io::Result<()>> + Send>>;

fn io_error(err: FtpError) -> io::Error {
    Error::from(err).into()
}

async fn close_download(mut session: AsyncNativeTlsFtpStream, data: ReadHalf) -> io::Result<()> {
    session.finalize_retr_stream(data).await.map_err(io_error)?;
    session.quit().await.map_err(io_error)
}

enum DownloadState {
    Streaming {
        session: AsyncNativeTlsFtpStream,
        data: ReadHalf,
    },
    Closing(SessionFuture),
    Closed,
}

/// Reads a `RETR` data stream, then collects the transfer reply and logs the
/// download session out once the data runs dry.
struct DownloadReader {
    path: String,
    state: DownloadState,
}

impl AsyncRead for DownloadReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        loop {
            match &mut this.state {
                DownloadState::Streaming { data, .. } => {
                    let filled = buf.filled().len();
                    if let Err(err) = ready!(Pin::new(data).poll_read(cx, buf)) {
                        this.state = DownloadState::Closed;
                        return Poll::Ready(Err(err));
                    }
                    if buf.filled().len() > filled || buf.remaining() == 0 {
                        return Poll::Ready(Ok(()));
                    }

                    if let DownloadState::Streaming { session, data } =
                        std::mem::replace(&mut this.state, DownloadState::Closed)
                    {
                        this.state = DownloadState::Closing(Box::pin(close_download(session, data)));
                    }
                }
                DownloadState::Closing(close) => {
                    let result = ready!(close.as_mut().poll(cx));
                    this.state = DownloadState::Closed;
                    return Poll::Ready(result);
                }
                DownloadState::Closed => return Poll::Ready(Ok(())),
            }
        }
    }
}

impl Drop for DownloadReader {
    fn drop(&mut self) {
        let DownloadState::Streaming { session, data } =
            std::mem::replace(&mut self.state, DownloadState::Closed)
        else {
            return;
        };

        debug!("Reader for \"{}\" dropped before the end of the data", self.path);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let path = self.path.clone();
            runtime.spawn(async move {
                if let Err(err) = close_download(session, data).await {
                    debug!("Closing the download of \"{path}\" failed: {err}");
                }
            });
        }
    }
}

/// Collects written bytes and stores them with `STOR` on shutdown.
struct UploadWriter {
    session: SharedStream,
    path: String,
    buffer: Vec<u8>,
    upload: Option<SessionFuture>,
    committed: bool,
}

impl AsyncWrite for UploadWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.upload.is_some() || this.committed {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "upload already started",
            )));
        }
        this.buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.committed {
            return Poll::Ready(Ok(()));
        }

        let upload = this.upload.get_or_insert_with(|| {
            let session = this.session.clone();
            let path = this.path.clone();
            let data = std::mem::take(&mut this.buffer);

            Box::pin(async move {
                let mut guard = session.lock().await;
                let stream = guard.as_mut().ok_or_else(|| io::Error::from(Error::NotConnected))?;
                stream
                    .put_file(&path, &mut data.as_slice())
                    .await
                    .map_err(io_error)?;
                Ok(())
            })
        });

        match upload.as_mut().poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                this.upload = None;
                this.committed = true;
                Poll::Ready(result)
            }
        }
    }
}

impl Drop for UploadWriter {
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
