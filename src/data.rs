use std::time::SystemTime;

use bitflags::bitflags;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::util::{extract_lowest_path_item, ROOT};

/// One object on a remote server, as reported by a lookup or listing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct RemoteEntry {
    pub path: String,
    pub name: String,
    pub metadata: Metadata,
}

impl RemoteEntry {
    pub fn new(path: impl Into<String>, r#type: FileType) -> Self {
        let path = path.into();
        Self {
            name: extract_lowest_path_item(&path),
            path,
            metadata: Metadata {
                r#type,
                ..Default::default()
            },
        }
    }

    /// The root directory. Some listings never report it, so it is built locally.
    pub fn root() -> Self {
        Self::new(ROOT, FileType::Dir)
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.metadata.size = Some(size);
        self
    }

    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.metadata.modified = Some(modified);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Metadata {
    pub r#type: FileType,
    pub modified: Option<SystemTime>,
    pub size: Option<u64>,
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FileType {
    File,
    Dir,
    Symlink,
    Socket,
    Fifo,
    CharDevice,
    BlockDevice,
    #[default]
    Unknown,
}

impl FileType {
    pub fn from_bools(is_file: bool, is_dir: bool, is_symlink: bool) -> Self {
        match (is_file, is_dir, is_symlink) {
            (true, false, false) => Self::File,
            (false, true, false) => Self::Dir,
            (false, false, true) => Self::Symlink,
            _ => Self::Unknown,
        }
    }

    /// Links are exposed as files.
    pub fn is_file_like(&self) -> bool {
        matches!(self, Self::File | Self::Symlink)
    }
}

/// Whether a storage item is a file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ItemKind {
    File,
    Folder,
}

/// Filter for folder enumeration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StorableType {
    None,
    File,
    Folder,
    #[default]
    All,
}

impl StorableType {
    pub fn admits(&self, kind: ItemKind) -> bool {
        match self {
            Self::None => false,
            Self::File => kind == ItemKind::File,
            Self::Folder => kind == ItemKind::Folder,
            Self::All => true,
        }
    }
}

bitflags! {
    /// Operations a storage item declares support for when it is constructed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct Capabilities: u32 {
        const READ_STREAM = 1 << 0;
        const WRITE_STREAM = 1 << 1;
        const PARENT = 1 << 2;
        const ENUMERATE = 1 << 3;
        const MODIFY = 1 << 4;
        const GET_ITEM = 1 << 5;
        const GET_ITEM_BY_NAME = 1 << 6;
        const GET_ITEM_RECURSIVE = 1 << 7;
        const MOVE_FROM = 1 << 8;
        const CREATE_COPY_OF = 1 << 9;
        const WATCH = 1 << 10;
    }
}

bitflags! {
    /// Requested access when opening a file stream.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct AccessMode: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_entry() {
        let root = RemoteEntry::root();
        assert_eq!(root.path, "/");
        assert_eq!(root.name, "");
        assert_eq!(root.metadata.r#type, FileType::Dir);
    }

    #[test]
    fn entry_name_from_path() {
        let entry = RemoteEntry::new("/pub/docs/readme.txt", FileType::File).with_size(12);
        assert_eq!(entry.name, "readme.txt");
        assert_eq!(entry.metadata.size, Some(12));
    }

    #[test]
    fn links_are_file_like() {
        assert!(FileType::Symlink.is_file_like());
        assert!(FileType::File.is_file_like());
        assert!(!FileType::Dir.is_file_like());
        assert!(!FileType::Fifo.is_file_like());
    }

    #[test]
    fn storable_type_filter() {
        assert!(StorableType::All.admits(ItemKind::File));
        assert!(StorableType::Folder.admits(ItemKind::Folder));
        assert!(!StorableType::Folder.admits(ItemKind::File));
        assert!(!StorableType::None.admits(ItemKind::File));
    }
}
