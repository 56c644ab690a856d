use log::{debug, info};

use super::{Connection, FtpFile, FtpFolder};
use crate::client::{FtpClient, RemoteExists, TransferStatus};
use crate::config::MoveCollision;
use crate::error::{Error, Result};
use crate::util::join_path;
use crate::{CopyStrategy, MoveStrategy, StorageFile};

/// How a file gets into an FTP folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferRoute {
    /// The source lives on another kind of backend.
    Fallback,
    /// Both sides are FTP, on independent sessions.
    Interoperable,
    /// Both sides share one session; the server moves the file itself.
    SameConnection,
}

pub fn choose_route(same_backend: bool, same_session: bool) -> TransferRoute {
    match (same_backend, same_session) {
        (false, _) => TransferRoute::Fallback,
        (true, false) => TransferRoute::Interoperable,
        (true, true) => TransferRoute::SameConnection,
    }
}

/// The destination exists and overwriting was not requested.
pub(super) async fn resolve_collision<C: FtpClient>(
    connection: &Connection<C>,
    destination: &str,
) -> Result<FtpFile<C>> {
    match connection.settings().move_collision {
        MoveCollision::Fail => Err(Error::AlreadyExists(destination.to_string())),
        MoveCollision::Skip => {
            debug!("\"{destination}\" already exists, keeping it");
            connection.lookup_file(destination).await
        }
    }
}

/// Settles a collision before the fallback runs, so the outcome matches the
/// one a same-connection transfer would give.
async fn collision_before_fallback<C: FtpClient>(
    target: &FtpFolder<C>,
    destination: &str,
    overwrite: bool,
) -> Result<Option<FtpFile<C>>> {
    let connection = target.connection();
    if overwrite || !connection.client().file_exists(destination).await? {
        return Ok(None);
    }
    resolve_collision(connection, destination).await.map(Some)
}

async fn transfer<C: FtpClient>(
    file: &FtpFile<C>,
    target: &FtpFolder<C>,
    destination: &str,
    overwrite: bool,
) -> Result<TransferStatus> {
    let source = file.connection();
    let target = target.connection();
    tokio::try_join!(source.ensure_connected(), target.ensure_connected())?;

    source.checkpoint()?;
    source
        .client()
        .transfer_file(
            file.path(),
            target.client().as_ref(),
            destination,
            RemoteExists::from_overwrite(overwrite),
        )
        .await
}

pub(super) async fn copy_between<C: FtpClient>(
    file: &FtpFile<C>,
    target: &FtpFolder<C>,
    overwrite: bool,
    fallback: &dyn CopyStrategy,
) -> Result<Box<dyn StorageFile>> {
    let destination = join_path(target.path(), &file.entry().name);

    match transfer(file, target, &destination, overwrite).await? {
        TransferStatus::Success => Ok(Box::new(
            target.connection().lookup_file(&destination).await?,
        )),
        TransferStatus::Skipped => Ok(Box::new(
            resolve_collision(target.connection(), &destination).await?,
        )),
        TransferStatus::Failed => {
            if let Some(existing) = collision_before_fallback(target, &destination, overwrite).await? {
                return Ok(Box::new(existing));
            }
            info!(
                "Server-to-server copy of \"{}\" failed, copying through this host",
                file.path()
            );
            fallback.create_copy_of(target, file, overwrite).await
        }
    }
}

pub(super) async fn move_between<C: FtpClient>(
    file: &FtpFile<C>,
    source: &FtpFolder<C>,
    target: &FtpFolder<C>,
    overwrite: bool,
    fallback: &dyn MoveStrategy,
) -> Result<Box<dyn StorageFile>> {
    let destination = join_path(target.path(), &file.entry().name);

    match transfer(file, target, &destination, overwrite).await? {
        TransferStatus::Success => {
            // FXP only copies
            file.connection().checkpoint()?;
            file.connection().client().delete_file(file.path()).await?;
            Ok(Box::new(
                target.connection().lookup_file(&destination).await?,
            ))
        }
        TransferStatus::Skipped => Ok(Box::new(
            resolve_collision(target.connection(), &destination).await?,
        )),
        TransferStatus::Failed => {
            if let Some(existing) = collision_before_fallback(target, &destination, overwrite).await? {
                return Ok(Box::new(existing));
            }
            info!(
                "Server-to-server move of \"{}\" failed, moving through this host",
                file.path()
            );
            fallback.move_from(target, file, source, overwrite).await
        }
    }
}
