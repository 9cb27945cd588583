use std::sync::Arc;

use chrono::Utc;

use crate::blob::BlobStore;
use crate::quota::Quota;
use crate::store::{self, MetaStore};

use super::error::{Error, Result};
use super::node::FileNode;

/// totals of a purge
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Purged {
    /// nodes removed including descendants
    pub nodes: u64,
    /// blob bytes reclaimed, current content and versions
    pub freed: u64,
}

impl std::ops::AddAssign for Purged {
    fn add_assign(&mut self, rhs: Purged) {
        self.nodes += rhs.nodes;
        self.freed += rhs.freed;
    }
}

/// soft delete, restore and permanent removal of nodes.
///
/// trashing only marks the node itself. descendants of a trashed directory
/// keep their state and are swept up when the directory is purged. trashed
/// files do not count against the quota of their owner.
#[derive(Clone)]
pub struct Trash {
    store: Arc<dyn MetaStore>,
    blobs: BlobStore,
    quota: Quota,
}

impl Trash {
    pub fn new(store: Arc<dyn MetaStore>, blobs: BlobStore, quota: Quota) -> Self {
        Trash {
            store,
            blobs,
            quota,
        }
    }

    pub async fn list(&self, owner: &str) -> Result<Vec<FileNode>> {
        Ok(self.store.trashed(owner).await?)
    }

    pub async fn trash(&self, mut node: FileNode) -> Result<FileNode> {
        if node.is_trashed() {
            return Ok(node);
        }

        let now = Utc::now();

        node.trashed_at = Some(now);
        node.updated_at = now;

        self.store.update_node(&node).await?;

        let size = node.size();

        if size > 0 {
            self.quota.release(&node.owner_id, size).await?;
        }

        Ok(node)
    }

    /// fails with [`Error::Conflict`] when a live sibling took the name in
    /// the meantime and with [`Error::QuotaExceeded`] when the file no longer
    /// fits
    pub async fn restore(&self, mut node: FileNode) -> Result<FileNode> {
        if !node.is_trashed() {
            return Ok(node);
        }

        if self.store.child(&node.owner_id, node.parent_id.as_deref(), &node.name).await?.is_some() {
            return Err(Error::Conflict);
        }

        let size = node.size();

        self.quota.reserve(&node.owner_id, size).await?;

        node.trashed_at = None;
        node.updated_at = Utc::now();

        if let Err(err) = self.store.update_node(&node).await {
            if size > 0 {
                self.quota.undo(&node.owner_id, size).await;
            }

            return Err(err.into());
        }

        Ok(node)
    }

    /// permanently removes a node. directories take their whole subtree with
    /// them, trashed or not. metadata goes first so that a failing blob
    /// removal can only leak storage, never leave a node without content.
    pub async fn purge(&self, node: FileNode) -> Result<Purged> {
        let mut order = vec![node];
        let mut index = 0;

        while index < order.len() {
            if order[index].is_directory() {
                let children = self.store.all_children(&order[index].id).await?;

                order.extend(children);
            }

            index += 1;
        }

        let mut purged = Purged::default();

        // children come after their parents, removing in reverse keeps every
        // parent reference valid until the parent itself goes
        for node in order.into_iter().rev() {
            purged += self.purge_single(node).await?;
        }

        Ok(purged)
    }

    async fn purge_single(&self, node: FileNode) -> Result<Purged> {
        let versions = match self.store.delete_node(&node.id).await {
            Ok(versions) => versions,
            // already removed by someone else
            Err(store::Error::Stale) => return Ok(Purged::default()),
            Err(err) => return Err(err.into()),
        };

        let mut purged = Purged {
            nodes: 1,
            freed: 0,
        };

        if let Some(content) = &node.content {
            if !node.is_trashed() {
                self.quota.release(&node.owner_id, content.size).await?;
            }

            purged.freed += content.size;

            self.remove_blob(&content.storage_ref).await;
        }

        for version in versions {
            purged.freed += version.size;

            self.remove_blob(&version.storage_ref).await;
        }

        tracing::debug!(id = %node.id, "purged node");

        Ok(purged)
    }

    async fn remove_blob(&self, storage_ref: &str) {
        if let Err(err) = self.blobs.delete(storage_ref).await {
            tracing::error!(storage_ref, "failed to remove blob of purged node: {err}");
        }
    }

    /// purges every trashed node of the owner
    pub async fn empty(&self, owner: &str) -> Result<Purged> {
        let mut purged = Purged::default();

        for trashed in self.store.trashed(owner).await? {
            // an earlier purge may have taken it as a descendant
            let Some(current) = self.store.node(&trashed.id).await? else {
                continue;
            };

            purged += self.purge(current).await?;
        }

        Ok(purged)
    }
}

impl std::fmt::Debug for Trash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trash").finish()
    }
}

#[cfg(test)]
mod test {
    use crate::fs::test::{Harness, OWNER};
    use crate::fs::{Entry, Error};

    #[tokio::test]
    async fn trash_then_restore_round_trip() {
        let h = Harness::new(1024);
        let docs = h.dir(None, "docs").await;
        let (file, _) = h.write(Some(&docs.id), "a.txt", b"12345").await.unwrap();

        let trashed = h.trash.trash(file.clone()).await.unwrap();

        assert!(trashed.is_trashed());
        assert_eq!(h.used().await, 0);
        assert!(h.namespace.list(OWNER, Some(&docs.id)).await.unwrap().is_empty());
        assert!(matches!(h.namespace.resolve(OWNER, "/docs/a.txt").await, Err(Error::NotFound)));

        let listed = h.trash.list(OWNER).await.unwrap();
        assert_eq!(listed.len(), 1);

        let restored = h.trash.restore(trashed).await.unwrap();

        assert!(!restored.is_trashed());
        assert_eq!(restored.parent_id, file.parent_id);
        assert_eq!(restored.name, file.name);
        assert_eq!(restored.content, file.content);
        assert_eq!(h.used().await, 5);
        assert!(matches!(h.namespace.resolve(OWNER, "/docs/a.txt").await, Ok(Entry::Node(_))));
    }

    #[tokio::test]
    async fn trashed_name_can_be_reused_but_blocks_restore() {
        let h = Harness::new(1024);
        let (first, _) = h.write(None, "a.txt", b"one").await.unwrap();

        let trashed = h.trash.trash(first).await.unwrap();

        let (second, written) = h.write(None, "a.txt", b"two").await.unwrap();
        assert_eq!(written, crate::fs::Written::Created);
        assert_ne!(second.id, trashed.id);

        let result = h.trash.restore(trashed.clone()).await;
        assert!(matches!(result, Err(Error::Conflict)));

        // still in the trash with quota untouched by the failed restore
        assert!(h.namespace.get(OWNER, &trashed.id).await.unwrap().is_trashed());
        assert_eq!(h.used().await, 3);
    }

    #[tokio::test]
    async fn restore_fails_when_quota_is_gone() {
        let h = Harness::new(6);
        let (first, _) = h.write(None, "a.txt", b"1234").await.unwrap();

        let trashed = h.trash.trash(first).await.unwrap();
        h.write(None, "b.txt", b"1234").await.unwrap();

        let result = h.trash.restore(trashed).await;

        assert!(matches!(result, Err(Error::QuotaExceeded)));
        assert_eq!(h.used().await, 4);
    }

    #[tokio::test]
    async fn purge_removes_blobs_and_versions() {
        let h = Harness::new(1024);
        h.write(None, "a.txt", b"1").await.unwrap();
        let (file, _) = h.write(None, "a.txt", b"22").await.unwrap();

        let versions = h.namespace.versions(&file).await.unwrap();
        let current_ref = file.content.as_ref().unwrap().storage_ref.clone();

        let purged = h.trash.purge(file.clone()).await.unwrap();

        assert_eq!(purged.nodes, 1);
        assert_eq!(purged.freed, 3);
        assert_eq!(h.used().await, 0);
        assert!(matches!(h.namespace.get(OWNER, &file.id).await, Err(Error::NotFound)));
        assert!(!h.namespace.blobs().exists(&current_ref).await.unwrap());
        assert!(!h.namespace.blobs().exists(&versions[0].storage_ref).await.unwrap());
    }

    #[tokio::test]
    async fn purging_a_directory_takes_descendants() {
        let h = Harness::new(1024);
        let docs = h.dir(None, "docs").await;
        let inner = h.dir(Some(&docs.id), "inner").await;
        let (a, _) = h.write(Some(&docs.id), "a.txt", b"aaa").await.unwrap();
        let (b, _) = h.write(Some(&inner.id), "b.txt", b"bb").await.unwrap();

        // a trashed descendant no longer counts, the live one does
        h.trash.trash(a.clone()).await.unwrap();
        assert_eq!(h.used().await, 2);

        let trashed_docs = h.trash.trash(docs.clone()).await.unwrap();
        let purged = h.trash.empty(OWNER).await.unwrap();

        assert_eq!(purged.nodes, 4);
        assert_eq!(purged.freed, 5);
        assert_eq!(h.used().await, 0);

        for id in [&trashed_docs.id, &inner.id, &a.id, &b.id] {
            assert!(matches!(h.namespace.get(OWNER, id).await, Err(Error::NotFound)));
        }

        assert!(h.trash.list(OWNER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn trash_is_not_cascading() {
        let h = Harness::new(1024);
        let docs = h.dir(None, "docs").await;
        let (file, _) = h.write(Some(&docs.id), "a.txt", b"abc").await.unwrap();

        h.trash.trash(docs).await.unwrap();

        let child = h.namespace.get(OWNER, &file.id).await.unwrap();

        assert!(!child.is_trashed());
        assert_eq!(h.used().await, 3);
        assert!(matches!(h.namespace.resolve(OWNER, "/docs/a.txt").await, Err(Error::NotFound)));
    }
}
