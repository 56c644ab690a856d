#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 21;
pub const ANONYMOUS_USER: &str = "anonymous";

/// Where and how to reach an FTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Upgrade the control connection with AUTH TLS before logging in.
    pub secure: bool,
    pub passive: bool,
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            username: ANONYMOUS_USER.to_string(),
            password: String::new(),
            secure: false,
            passive: true,
        }
    }
}

impl FtpConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_passive(mut self, passive: bool) -> Self {
        self.passive = passive;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parses `ftp[s]://[user[:password]@]host[:port]`.
    ///
    /// Any path component is ignored; paths are given per lookup.
    pub fn from_url(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|err| Error::InvalidArgument(err.to_string()))?;

        let secure = match url.scheme() {
            "ftp" => false,
            "ftps" => true,
            scheme => {
                return Err(Error::InvalidArgument(format!(
                    "Expected 'ftp' or 'ftps' URL scheme, got '{scheme}'"
                )))
            }
        };

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| Error::InvalidArgument("FTP URL must include a host".into()))?;

        let mut config = Self::new(host)
            .with_port(url.port().unwrap_or(DEFAULT_PORT))
            .with_secure(secure);
        if !url.username().is_empty() {
            config.username = url.username().to_string();
        }
        if let Some(password) = url.password() {
            config.password = password.to_string();
        }

        Ok(config)
    }
}

/// What a move or copy does when the destination exists and overwriting was
/// not requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MoveCollision {
    /// Fail with [`Error::AlreadyExists`].
    #[default]
    Fail,
    /// Leave both files alone and return the existing destination.
    Skip,
}

/// Behaviour knobs shared by every entity obtained through one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct Settings {
    pub move_collision: MoveCollision,
}
