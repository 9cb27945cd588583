use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use stratus_lib::{fs as lib_fs, ids};

use crate::blob::{self, BlobStore, Saved};
use crate::quota::Quota;
use crate::store::{Counts, MetaStore};

pub mod node;
pub mod error;
pub mod trash;

pub use error::{Error, Result};
pub use node::{Content, FileNode, FileVersion, Kind, Owner};

type BoxDynError = Box<dyn std::error::Error + Send + Sync>;

/// what a path resolves to
#[derive(Debug, Clone)]
pub enum Entry {
    /// the implicit top level of an owner, nodes here have no parent
    Root,
    Node(FileNode),
}

impl Entry {
    pub fn id(&self) -> Option<&ids::NodeId> {
        match self {
            Entry::Root => None,
            Entry::Node(node) => Some(&node.id),
        }
    }

    pub fn is_directory(&self) -> bool {
        match self {
            Entry::Root => true,
            Entry::Node(node) => node.is_directory(),
        }
    }

    pub fn into_node(self) -> Option<FileNode> {
        match self {
            Entry::Root => None,
            Entry::Node(node) => Some(node),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Written {
    Created,
    Overwritten,
}

/// the hierarchical namespace of every owner.
///
/// names are unique among the non-trashed children of a directory and are
/// compared case-sensitively. directories may only be moved to places that
/// are not inside themselves.
#[derive(Clone)]
pub struct Namespace {
    store: Arc<dyn MetaStore>,
    blobs: BlobStore,
    quota: Quota,
}

impl Namespace {
    pub fn new(store: Arc<dyn MetaStore>, blobs: BlobStore, quota: Quota) -> Self {
        Namespace {
            store,
            blobs,
            quota,
        }
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// a node of the owner by id, trashed or not
    pub async fn get(&self, owner: &str, id: &str) -> Result<FileNode> {
        if !ids::uid_valid(id) {
            return Err(Error::InvalidReference);
        }

        match self.store.node(id).await? {
            Some(node) if node.owner_id == owner => Ok(node),
            _ => Err(Error::NotFound),
        }
    }

    /// a non-trashed node of the owner by id
    pub async fn get_active(&self, owner: &str, id: &str) -> Result<FileNode> {
        let node = self.get(owner, id).await?;

        if node.is_trashed() {
            Err(Error::NotFound)
        } else {
            Ok(node)
        }
    }

    /// looks up a directory that something will be placed into. `None` is
    /// the top level of the owner
    async fn directory(&self, owner: &str, id: Option<&str>) -> Result<Option<FileNode>> {
        let Some(id) = id else {
            return Ok(None);
        };

        let node = self.get_active(owner, id).await?;

        if !node.is_directory() {
            return Err(Error::NotDirectory);
        }

        Ok(Some(node))
    }

    /// walks `path` one segment at a time from the top level of the owner,
    /// only ever following non-trashed nodes
    pub async fn resolve(&self, owner: &str, path: &str) -> Result<Entry> {
        let mut current: Option<FileNode> = None;

        for seg in lib_fs::segments(path) {
            if !lib_fs::name_valid(seg) {
                return Err(Error::NotFound);
            }

            if let Some(node) = &current {
                if !node.is_directory() {
                    return Err(Error::NotFound);
                }
            }

            let parent = current.as_ref().map(|node| node.id.as_str());

            current = Some(
                self.store.child(owner, parent, seg)
                    .await?
                    .ok_or(Error::NotFound)?
            );
        }

        Ok(match current {
            Some(node) => Entry::Node(node),
            None => Entry::Root,
        })
    }

    /// resolves the directory that holds `path` along with the leaf name.
    /// the root itself has no parent and is rejected as an invalid name
    pub async fn resolve_parent(&self, owner: &str, path: &str) -> Result<(Option<FileNode>, String)> {
        let (parent_path, name) = lib_fs::split_path(path)
            .ok_or(Error::InvalidName)?;

        if !lib_fs::name_valid(&name) {
            return Err(Error::InvalidName);
        }

        match self.resolve(owner, &parent_path).await? {
            Entry::Root => Ok((None, name)),
            Entry::Node(node) => if node.is_directory() {
                Ok((Some(node), name))
            } else {
                Err(Error::NotDirectory)
            }
        }
    }

    /// path of the directory holding the node, "/" for the top level
    pub async fn parent_path(&self, node: &FileNode) -> Result<String> {
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        let mut next = node.parent_id.clone();

        while let Some(id) = next {
            if !seen.insert(id.clone()) {
                return Err(Error::Cycle);
            }

            let parent = self.store.node(&id)
                .await?
                .ok_or(Error::NotFound)?;

            next = parent.parent_id;
            names.push(parent.name);
        }

        if names.is_empty() {
            return Ok(lib_fs::ROOT_PATH.to_owned());
        }

        let mut rtn = String::new();

        for name in names.iter().rev() {
            rtn.push('/');
            rtn.push_str(name);
        }

        Ok(rtn)
    }

    pub async fn path_of(&self, node: &FileNode) -> Result<String> {
        let parent = self.parent_path(node).await?;

        Ok(lib_fs::join_path(&parent, &node.name))
    }

    /// parent paths for a batch of nodes, walking each distinct parent once
    pub async fn parent_paths(&self, nodes: &[FileNode]) -> Result<Vec<String>> {
        let mut cache: HashMap<Option<ids::NodeId>, String> = HashMap::new();
        let mut rtn = Vec::with_capacity(nodes.len());

        for node in nodes {
            if let Some(found) = cache.get(&node.parent_id) {
                rtn.push(found.clone());
                continue;
            }

            let path = self.parent_path(node).await?;

            cache.insert(node.parent_id.clone(), path.clone());
            rtn.push(path);
        }

        Ok(rtn)
    }

    /// non-trashed children of a directory, directories first then by name
    pub async fn list(&self, owner: &str, parent: Option<&str>) -> Result<Vec<FileNode>> {
        let parent = self.directory(owner, parent).await?;

        Ok(self.store.children(owner, parent.as_ref().map(|p| p.id.as_str())).await?)
    }

    pub async fn create(
        &self,
        owner: &str,
        parent: Option<&str>,
        name: &str,
        kind: Kind
    ) -> Result<FileNode> {
        if !lib_fs::name_valid(name) {
            return Err(Error::InvalidName);
        }

        let parent = self.directory(owner, parent).await?;

        self.insert_new(owner, parent.map(|p| p.id), name, kind).await
    }

    async fn insert_new(
        &self,
        owner: &str,
        parent_id: Option<ids::NodeId>,
        name: &str,
        kind: Kind
    ) -> Result<FileNode> {
        self.check_available(owner, parent_id.as_deref(), name, None).await?;

        let node = FileNode::new(owner.to_owned(), parent_id, name.to_owned(), kind);

        // the store enforces the same rule for writers racing past the check
        self.store.insert_node(&node).await?;

        Ok(node)
    }

    async fn check_available(
        &self,
        owner: &str,
        parent: Option<&str>,
        name: &str,
        except: Option<&str>,
    ) -> Result<()> {
        match self.store.child(owner, parent, name).await? {
            Some(found) if Some(found.id.as_str()) != except => Err(Error::Conflict),
            _ => Ok(()),
        }
    }

    pub async fn rename(&self, mut node: FileNode, name: &str) -> Result<FileNode> {
        if !lib_fs::name_valid(name) {
            return Err(Error::InvalidName);
        }

        if node.is_trashed() {
            return Err(Error::NotFound);
        }

        if node.name == name {
            return Ok(node);
        }

        self.check_available(
            &node.owner_id,
            node.parent_id.as_deref(),
            name,
            Some(&node.id)
        ).await?;

        node.name = name.to_owned();
        node.updated_at = Utc::now();

        self.store.update_node(&node).await?;

        Ok(node)
    }

    /// fails with [`Error::Cycle`] if `dest` is `moving` or lies beneath it
    async fn check_cycle(&self, moving: &str, dest: &FileNode) -> Result<()> {
        if dest.id == moving {
            return Err(Error::Cycle);
        }

        let mut seen = HashSet::new();
        let mut next = dest.parent_id.clone();

        while let Some(id) = next {
            if id == moving || !seen.insert(id.clone()) {
                return Err(Error::Cycle);
            }

            next = match self.store.node(&id).await? {
                Some(ancestor) => ancestor.parent_id,
                None => None,
            };
        }

        Ok(())
    }

    /// places the node under `dest` keeping its name. `None` moves it to the
    /// top level
    pub async fn move_to(&self, node: FileNode, dest: Option<&str>) -> Result<FileNode> {
        let name = node.name.clone();

        self.relocate(node, dest, &name).await
    }

    /// moves and renames in a single metadata write
    pub async fn relocate(&self, mut node: FileNode, dest: Option<&str>, name: &str) -> Result<FileNode> {
        if !lib_fs::name_valid(name) {
            return Err(Error::InvalidName);
        }

        if node.is_trashed() {
            return Err(Error::NotFound);
        }

        let dest = self.directory(&node.owner_id, dest).await?;

        if node.is_directory() {
            if let Some(dest) = &dest {
                self.check_cycle(&node.id, dest).await?;
            }
        }

        let dest_id = dest.map(|d| d.id);

        if dest_id == node.parent_id && node.name == name {
            return Ok(node);
        }

        self.check_available(
            &node.owner_id,
            dest_id.as_deref(),
            name,
            Some(&node.id)
        ).await?;

        node.parent_id = dest_id;
        node.name = name.to_owned();
        node.updated_at = Utc::now();

        self.store.update_node(&node).await?;

        Ok(node)
    }

    /// duplicates a file into `dest` with its own blob. the copy starts a
    /// fresh version history
    pub async fn copy(
        &self,
        node: &FileNode,
        dest: Option<&str>,
        new_name: Option<&str>
    ) -> Result<FileNode> {
        if node.is_trashed() {
            return Err(Error::NotFound);
        }

        let content = node.content.as_ref().ok_or(Error::NotFile)?;
        let owner = node.owner_id.as_str();
        let name = new_name.unwrap_or(&node.name);

        if !lib_fs::name_valid(name) {
            return Err(Error::InvalidName);
        }

        let dest_id = self.directory(owner, dest).await?.map(|d| d.id);

        self.check_available(owner, dest_id.as_deref(), name, None).await?;
        self.quota.authorize(owner, content.size).await?;

        let storage_ref = self.blobs.copy(&content.storage_ref).await?;

        if let Err(err) = self.quota.reserve(owner, content.size).await {
            self.discard_blob(&storage_ref).await;

            return Err(err);
        }

        let kind = Kind::File(Content {
            storage_ref: storage_ref.clone(),
            mime: content.mime.clone(),
            size: content.size,
            checksum: content.checksum.clone(),
            version: 1,
        });

        match self.insert_new(owner, dest_id, name, kind).await {
            Ok(copied) => Ok(copied),
            Err(err) => {
                self.quota.undo(owner, content.size).await;
                self.discard_blob(&storage_ref).await;

                Err(err)
            }
        }
    }

    /// stores the stream as `name` under `parent`. an existing file of the
    /// same name is overwritten and its previous content kept as a version.
    ///
    /// the quota is checked before anything is streamed and the stream stops
    /// once it outgrows the space left. the blob is written first, then the
    /// size change is reserved, then the metadata is committed. a failing
    /// step undoes the ones before it.
    pub async fn write_file<S, E>(
        &self,
        owner: &str,
        parent: Option<&str>,
        name: &str,
        size_hint: Option<u64>,
        stream: S,
    ) -> Result<(FileNode, Written)>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: Into<BoxDynError>,
    {
        if !lib_fs::name_valid(name) {
            return Err(Error::InvalidName);
        }

        let parent_id = self.directory(owner, parent).await?.map(|p| p.id);
        let existing = self.store.child(owner, parent_id.as_deref(), name).await?;

        if let Some(found) = &existing {
            if found.is_directory() {
                return Err(Error::Conflict);
            }
        }

        let existing_size = existing.as_ref().map(|n| n.size()).unwrap_or(0);

        let hint = size_hint.unwrap_or(0);
        let record = self.quota.authorize(owner, hint.saturating_sub(existing_size)).await?;

        // bytes the stream may take before it can no longer fit
        let room = record.quota
            .saturating_sub(record.used_space)
            .saturating_add(existing_size);

        let saved = self.blobs.save(owner, stream, Some(room)).await?;
        let growth = saved.size.saturating_sub(existing_size);

        if let Err(err) = self.quota.reserve(owner, growth).await {
            self.discard_blob(&saved.storage_ref).await;

            return Err(err);
        }

        let result = match existing {
            Some(found) => self.overwrite(found, &saved)
                .await
                .map(|node| (node, Written::Overwritten)),
            None => {
                let kind = Kind::File(Content {
                    storage_ref: saved.storage_ref.clone(),
                    mime: blob::mime_type(name),
                    size: saved.size,
                    checksum: saved.checksum.clone(),
                    version: 1,
                });

                self.insert_new(owner, parent_id, name, kind)
                    .await
                    .map(|node| (node, Written::Created))
            }
        };

        match result {
            Ok(rtn) => {
                let shrink = existing_size.saturating_sub(saved.size);

                if shrink > 0 {
                    self.quota.undo(owner, shrink).await;
                }

                Ok(rtn)
            }
            Err(err) => {
                if growth > 0 {
                    self.quota.undo(owner, growth).await;
                }

                self.discard_blob(&saved.storage_ref).await;

                Err(err)
            }
        }
    }

    async fn overwrite(&self, mut node: FileNode, saved: &Saved) -> Result<FileNode> {
        let current = node.content.take().ok_or(Error::NotFile)?;
        let previous = FileVersion::snapshot(&node.id, &current);

        node.content = Some(Content {
            storage_ref: saved.storage_ref.clone(),
            mime: blob::mime_type(&node.name),
            size: saved.size,
            checksum: saved.checksum.clone(),
            version: current.version + 1,
        });
        node.updated_at = Utc::now();

        self.store.replace_content(&node, &previous).await?;

        Ok(node)
    }

    /// removes a blob that no metadata points to. failures leak the blob so
    /// they are only logged
    async fn discard_blob(&self, storage_ref: &str) {
        if let Err(err) = self.blobs.delete(storage_ref).await {
            tracing::error!(storage_ref, "failed to remove orphaned blob: {err}");
        }
    }

    pub async fn open(&self, node: &FileNode) -> Result<tokio::fs::File> {
        let content = node.content.as_ref().ok_or(Error::NotFile)?;

        self.blobs.open(&content.storage_ref).await
    }

    pub async fn versions(&self, node: &FileNode) -> Result<Vec<FileVersion>> {
        if node.is_directory() {
            return Err(Error::NotFile);
        }

        Ok(self.store.versions(&node.id).await?)
    }

    /// non-trashed nodes whose name contains `query` ignoring case
    pub async fn search(&self, owner: &str, query: &str) -> Result<Vec<FileNode>> {
        let query = query.trim();

        if query.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self.store.search(owner, query).await?)
    }

    pub async fn usage(&self, owner: &str) -> Result<(Owner, Counts)> {
        let (owner, counts) = tokio::try_join!(
            self.quota.owner(owner),
            async { self.store.counts(owner).await.map_err(Error::from) },
        )?;

        Ok((owner, counts))
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("blobs", &self.blobs)
            .finish()
    }
}
