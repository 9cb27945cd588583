use crate::fs::node::{FileNode, FileVersion, Owner};

#[cfg(test)]
pub mod memory;
pub mod pg;

#[cfg(test)]
pub use memory::MemoryStore;
pub use pg::PgStore;

type BoxDynError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// a non-trashed sibling already holds the name
    #[error("name is already taken by a sibling")]
    Conflict,

    #[error("used space would exceed the owner quota")]
    QuotaExceeded,

    /// the record was changed by someone else since it was read
    #[error("record changed since it was read")]
    Stale,

    #[error("owner not found")]
    OwnerNotFound,

    #[error(transparent)]
    Backend(BoxDynError),
}

impl Error {
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<BoxDynError>
    {
        Error::Backend(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub files: u64,
    pub folders: u64,
}

/// persistence of owners, nodes and file versions.
///
/// every method is atomic on its own. methods that touch more than one record
/// (`replace_content`, `delete_node`) commit all of their writes or none.
#[async_trait::async_trait]
pub trait MetaStore: Send + Sync {
    async fn owner(&self, id: &str) -> Result<Option<Owner>>;

    /// adds `delta` to the used space of an owner. with `enforce` set the
    /// update only lands if the new total stays within quota, otherwise
    /// [`Error::QuotaExceeded`] is returned and nothing changes. the total
    /// never drops below zero.
    async fn adjust_used_space(&self, id: &str, delta: i64, enforce: bool) -> Result<Owner>;

    async fn node(&self, id: &str) -> Result<Option<FileNode>>;

    /// the non-trashed child of `parent` with exactly `name`
    async fn child(
        &self,
        owner: &str,
        parent: Option<&str>,
        name: &str
    ) -> Result<Option<FileNode>>;

    /// non-trashed children ordered directories first then by name
    async fn children(&self, owner: &str, parent: Option<&str>) -> Result<Vec<FileNode>>;

    /// every child of a directory including trashed ones
    async fn all_children(&self, parent: &str) -> Result<Vec<FileNode>>;

    async fn insert_node(&self, node: &FileNode) -> Result<()>;

    /// writes name, parent, trash state and timestamps. content is only
    /// changed through [`MetaStore::replace_content`]
    async fn update_node(&self, node: &FileNode) -> Result<()>;

    /// records `previous` as a version and stores the content of `node`,
    /// provided the stored version still equals `previous.version`
    async fn replace_content(&self, node: &FileNode, previous: &FileVersion) -> Result<()>;

    /// versions of a file newest first
    async fn versions(&self, file_id: &str) -> Result<Vec<FileVersion>>;

    /// removes a node with its versions and hands back the removed versions
    async fn delete_node(&self, id: &str) -> Result<Vec<FileVersion>>;

    /// trashed nodes of an owner most recently trashed first
    async fn trashed(&self, owner: &str) -> Result<Vec<FileNode>>;

    /// non-trashed nodes whose name contains `needle` ignoring case
    async fn search(&self, owner: &str, needle: &str) -> Result<Vec<FileNode>>;

    /// non-trashed file and directory counts
    async fn counts(&self, owner: &str) -> Result<Counts>;
}

impl std::fmt::Debug for dyn MetaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MetaStore")
    }
}

pub(crate) fn sort_listing(nodes: &mut [FileNode]) {
    nodes.sort_by(|a, b| {
        b.is_directory()
            .cmp(&a.is_directory())
            .then_with(|| a.name.cmp(&b.name))
    });
}
