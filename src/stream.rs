use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::data::AccessMode;

pub type ReadHalf = Box<dyn AsyncRead + Send + Unpin>;
pub type WriteHalf = Box<dyn AsyncWrite + Send + Unpin>;

/// A stream opened on a storage file.
///
/// `ReadWrite` splices two independent streams together: reads come from the
/// first, writes go to the second. Using a direction the stream was not opened
/// for fails with [`io::ErrorKind::Unsupported`].
pub enum FileStream {
    Read(ReadHalf),
    Write(WriteHalf),
    ReadWrite(ReadHalf, WriteHalf),
}

impl FileStream {
    pub fn splice(reader: ReadHalf, writer: WriteHalf) -> Self {
        Self::ReadWrite(reader, writer)
    }

    pub fn mode(&self) -> AccessMode {
        match self {
            Self::Read(_) => AccessMode::READ,
            Self::Write(_) => AccessMode::WRITE,
            Self::ReadWrite(..) => AccessMode::READ_WRITE,
        }
    }
}

fn wrong_direction(direction: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("stream was not opened for {direction}"),
    )
}

impl AsyncRead for FileStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Read(reader) | Self::ReadWrite(reader, _) => Pin::new(reader).poll_read(cx, buf),
            Self::Write(_) => Poll::Ready(Err(wrong_direction("reading"))),
        }
    }
}

impl AsyncWrite for FileStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Write(writer) | Self::ReadWrite(_, writer) => Pin::new(writer).poll_write(cx, buf),
            Self::Read(_) => Poll::Ready(Err(wrong_direction("writing"))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Write(writer) | Self::ReadWrite(_, writer) => Pin::new(writer).poll_flush(cx),
            Self::Read(_) => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Write(writer) | Self::ReadWrite(_, writer) => Pin::new(writer).poll_shutdown(cx),
            Self::Read(_) => Poll::Ready(Ok(())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn spliced_stream_reads_and_writes_independently() {
        let reader: ReadHalf = Box::new(Cursor::new(b"hello".to_vec()));
        let writer: WriteHalf = Box::new(Cursor::new(Vec::new()));
        let mut stream = FileStream::splice(reader, writer);
        assert_eq!(stream.mode(), AccessMode::READ_WRITE);

        stream.write_all(b"ignored by reader").await.unwrap();

        let mut read = String::new();
        stream.read_to_string(&mut read).await.unwrap();
        assert_eq!(read, "hello");
    }

    #[tokio::test]
    async fn read_only_stream_refuses_writes() {
        let mut stream = FileStream::Read(Box::new(Cursor::new(Vec::new())));
        let err = stream.write_all(b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn write_only_stream_refuses_reads() {
        let mut stream = FileStream::Write(Box::new(Cursor::new(Vec::new())));
        let mut buf = [0u8; 4];
        let err = stream.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
