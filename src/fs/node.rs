use stratus_lib::ids;
use chrono::{DateTime, Utc};

/// content of the current version of a file
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub storage_ref: ids::StorageRef,
    pub mime: mime::Mime,
    pub size: u64,
    pub checksum: String,
    pub version: u32,
}

/// what a new node will be. directories never carry content
#[derive(Debug, Clone)]
pub enum Kind {
    Directory,
    File(Content),
}

/// a file or directory in an owner's namespace.
///
/// the path of a node is not stored here. `parent_id` is the only authority
/// for where a node lives and the path is derived from the ancestor chain
/// whenever it is needed.
#[derive(Debug, Clone, PartialEq)]
pub struct FileNode {
    pub id: ids::NodeId,
    pub owner_id: ids::OwnerId,
    pub parent_id: Option<ids::NodeId>,
    pub name: String,
    pub content: Option<Content>,
    pub trashed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileNode {
    pub fn new(
        owner_id: ids::OwnerId,
        parent_id: Option<ids::NodeId>,
        name: String,
        kind: Kind
    ) -> Self {
        let now = Utc::now();

        FileNode {
            id: ids::create_uid(),
            owner_id,
            parent_id,
            name,
            content: match kind {
                Kind::Directory => None,
                Kind::File(content) => Some(content),
            },
            trashed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.content.is_none()
    }

    pub fn is_trashed(&self) -> bool {
        self.trashed_at.is_some()
    }

    /// byte size counted against the owner's quota. zero for directories
    pub fn size(&self) -> u64 {
        self.content.as_ref()
            .map(|c| c.size)
            .unwrap_or(0)
    }

    pub fn checksum(&self) -> Option<&str> {
        self.content.as_ref().map(|c| c.checksum.as_str())
    }

    pub fn etag(&self) -> Option<String> {
        self.checksum().map(|sum| format!("\"{sum}\""))
    }

    pub fn into_schema(self, path: String) -> stratus_api::fs::Item {
        let is_directory = self.is_directory();
        let is_trashed = self.is_trashed();
        let (mime_type, size, checksum, version) = match self.content {
            Some(content) => (
                content.mime.to_string(),
                content.size,
                content.checksum,
                content.version
            ),
            None => (String::new(), 0, String::new(), 1),
        };

        stratus_api::fs::Item {
            id: self.id,
            name: self.name,
            path,
            mime_type,
            size,
            is_directory,
            parent_id: self.parent_id,
            owner_id: self.owner_id,
            checksum,
            version,
            is_trashed,
            trashed_at: self.trashed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// immutable snapshot of a file's content before it was overwritten
#[derive(Debug, Clone, PartialEq)]
pub struct FileVersion {
    pub file_id: ids::NodeId,
    pub version: u32,
    pub storage_ref: ids::StorageRef,
    pub size: u64,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

impl FileVersion {
    pub fn snapshot(file_id: &ids::NodeId, content: &Content) -> Self {
        FileVersion {
            file_id: file_id.clone(),
            version: content.version,
            storage_ref: content.storage_ref.clone(),
            size: content.size,
            checksum: content.checksum.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn into_schema(self) -> stratus_api::fs::Version {
        stratus_api::fs::Version {
            file_id: self.file_id,
            version: self.version,
            size: self.size,
            checksum: self.checksum,
            created_at: self.created_at,
        }
    }
}

/// the storage account of a principal. owned by the authentication side,
/// only `used_space` is ever written here
#[derive(Debug, Clone, PartialEq)]
pub struct Owner {
    pub id: ids::OwnerId,
    pub quota: u64,
    pub used_space: u64,
    pub is_active: bool,
}

impl Owner {
    pub fn has_space_for(&self, additional: u64) -> bool {
        self.used_space
            .checked_add(additional)
            .map(|total| total <= self.quota)
            .unwrap_or(false)
    }
}
