use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::fs::node::{FileNode, FileVersion, Owner};

use super::{Counts, Error, MetaStore, Result, sort_listing};

#[derive(Debug, Default)]
struct Tables {
    owners: HashMap<String, Owner>,
    nodes: HashMap<String, FileNode>,
    versions: HashMap<String, Vec<FileVersion>>,
}

impl Tables {
    /// mirrors the partial unique index on (owner, parent, name) for
    /// non-trashed nodes
    fn name_taken(&self, node: &FileNode) -> bool {
        if node.is_trashed() {
            return false;
        }

        self.nodes.values().any(|other| {
            other.id != node.id &&
                !other.is_trashed() &&
                other.owner_id == node.owner_id &&
                other.parent_id == node.parent_id &&
                other.name == node.name
        })
    }
}

/// in process store backing the tests, enforces the same guards as postgres
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables.lock()
            .map_err(|_| Error::backend("memory store mutex poisoned"))
    }

    pub fn insert_owner(&self, owner: Owner) -> Result<()> {
        let mut tables = self.lock()?;

        if tables.owners.contains_key(&owner.id) {
            return Err(Error::Conflict);
        }

        tables.owners.insert(owner.id.clone(), owner);

        Ok(())
    }
}

#[async_trait::async_trait]
impl MetaStore for MemoryStore {
    async fn owner(&self, id: &str) -> Result<Option<Owner>> {
        Ok(self.lock()?.owners.get(id).cloned())
    }

    async fn adjust_used_space(&self, id: &str, delta: i64, enforce: bool) -> Result<Owner> {
        let mut tables = self.lock()?;
        let owner = tables.owners.get_mut(id)
            .ok_or(Error::OwnerNotFound)?;

        let next = if delta >= 0 {
            owner.used_space.saturating_add(delta.unsigned_abs())
        } else {
            owner.used_space.saturating_sub(delta.unsigned_abs())
        };

        if enforce && delta > 0 && next > owner.quota {
            return Err(Error::QuotaExceeded);
        }

        owner.used_space = next;

        Ok(owner.clone())
    }

    async fn node(&self, id: &str) -> Result<Option<FileNode>> {
        Ok(self.lock()?.nodes.get(id).cloned())
    }

    async fn child(
        &self,
        owner: &str,
        parent: Option<&str>,
        name: &str
    ) -> Result<Option<FileNode>> {
        let tables = self.lock()?;

        Ok(tables.nodes.values()
            .find(|node| {
                !node.is_trashed() &&
                    node.owner_id == owner &&
                    node.parent_id.as_deref() == parent &&
                    node.name == name
            })
            .cloned())
    }

    async fn children(&self, owner: &str, parent: Option<&str>) -> Result<Vec<FileNode>> {
        let tables = self.lock()?;
        let mut rtn: Vec<FileNode> = tables.nodes.values()
            .filter(|node| {
                !node.is_trashed() &&
                    node.owner_id == owner &&
                    node.parent_id.as_deref() == parent
            })
            .cloned()
            .collect();

        sort_listing(&mut rtn);

        Ok(rtn)
    }

    async fn all_children(&self, parent: &str) -> Result<Vec<FileNode>> {
        let tables = self.lock()?;

        Ok(tables.nodes.values()
            .filter(|node| node.parent_id.as_deref() == Some(parent))
            .cloned()
            .collect())
    }

    async fn insert_node(&self, node: &FileNode) -> Result<()> {
        let mut tables = self.lock()?;

        if tables.nodes.contains_key(&node.id) || tables.name_taken(node) {
            return Err(Error::Conflict);
        }

        tables.nodes.insert(node.id.clone(), node.clone());

        Ok(())
    }

    async fn update_node(&self, node: &FileNode) -> Result<()> {
        let mut tables = self.lock()?;

        if tables.name_taken(node) {
            return Err(Error::Conflict);
        }

        let Some(found) = tables.nodes.get_mut(&node.id) else {
            return Err(Error::Stale);
        };

        found.name = node.name.clone();
        found.parent_id = node.parent_id.clone();
        found.trashed_at = node.trashed_at;
        found.updated_at = node.updated_at;

        Ok(())
    }

    async fn replace_content(&self, node: &FileNode, previous: &FileVersion) -> Result<()> {
        let mut tables = self.lock()?;

        let Some(found) = tables.nodes.get_mut(&node.id) else {
            return Err(Error::Stale);
        };

        let current = found.content.as_ref().map(|c| c.version);

        if current != Some(previous.version) {
            return Err(Error::Stale);
        }

        found.content = node.content.clone();
        found.updated_at = node.updated_at;

        tables.versions.entry(node.id.clone())
            .or_default()
            .push(previous.clone());

        Ok(())
    }

    async fn versions(&self, file_id: &str) -> Result<Vec<FileVersion>> {
        let tables = self.lock()?;
        let mut rtn = tables.versions.get(file_id)
            .cloned()
            .unwrap_or_default();

        rtn.sort_by(|a, b| b.version.cmp(&a.version));

        Ok(rtn)
    }

    async fn delete_node(&self, id: &str) -> Result<Vec<FileVersion>> {
        let mut tables = self.lock()?;

        if tables.nodes.remove(id).is_none() {
            return Err(Error::Stale);
        }

        Ok(tables.versions.remove(id).unwrap_or_default())
    }

    async fn trashed(&self, owner: &str) -> Result<Vec<FileNode>> {
        let tables = self.lock()?;
        let mut rtn: Vec<FileNode> = tables.nodes.values()
            .filter(|node| node.is_trashed() && node.owner_id == owner)
            .cloned()
            .collect();

        rtn.sort_by(|a, b| b.trashed_at.cmp(&a.trashed_at));

        Ok(rtn)
    }

    async fn search(&self, owner: &str, needle: &str) -> Result<Vec<FileNode>> {
        let tables = self.lock()?;
        let needle = needle.to_lowercase();
        let mut rtn: Vec<FileNode> = tables.nodes.values()
            .filter(|node| {
                !node.is_trashed() &&
                    node.owner_id == owner &&
                    node.name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();

        sort_listing(&mut rtn);

        Ok(rtn)
    }

    async fn counts(&self, owner: &str) -> Result<Counts> {
        let tables = self.lock()?;
        let mut rtn = Counts::default();

        for node in tables.nodes.values() {
            if node.is_trashed() || node.owner_id != owner {
                continue;
            }

            if node.is_directory() {
                rtn.folders += 1;
            } else {
                rtn.files += 1;
            }
        }

        Ok(rtn)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fs::node::Kind;

    fn owner(quota: u64) -> Owner {
        Owner {
            id: "owner".into(),
            quota,
            used_space: 0,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn sibling_names_are_unique() {
        let store = MemoryStore::new();
        let first = FileNode::new("owner".into(), None, "docs".into(), Kind::Directory);
        let second = FileNode::new("owner".into(), None, "docs".into(), Kind::Directory);

        store.insert_node(&first).await.unwrap();

        assert!(matches!(store.insert_node(&second).await, Err(Error::Conflict)));

        // a trashed holder frees the name
        let mut trashed = first.clone();
        trashed.trashed_at = Some(chrono::Utc::now());

        store.update_node(&trashed).await.unwrap();
        store.insert_node(&second).await.unwrap();

        // and restoring it would collide again
        let mut restored = trashed.clone();
        restored.trashed_at = None;

        assert!(matches!(store.update_node(&restored).await, Err(Error::Conflict)));
    }

    #[tokio::test]
    async fn enforced_adjustment_respects_quota() {
        let store = MemoryStore::new();
        store.insert_owner(owner(100)).unwrap();

        let updated = store.adjust_used_space("owner", 60, true).await.unwrap();
        assert_eq!(updated.used_space, 60);

        assert!(matches!(
            store.adjust_used_space("owner", 41, true).await,
            Err(Error::QuotaExceeded)
        ));

        let updated = store.adjust_used_space("owner", -100, false).await.unwrap();
        assert_eq!(updated.used_space, 0);
    }

    #[tokio::test]
    async fn listing_order() {
        let store = MemoryStore::new();
        let content = crate::fs::node::Content {
            storage_ref: "ref".into(),
            mime: mime::TEXT_PLAIN,
            size: 1,
            checksum: "sum".into(),
            version: 1,
        };

        for (name, kind) in [
            ("b.txt", Kind::File(content.clone())),
            ("zeta", Kind::Directory),
            ("a.txt", Kind::File(content.clone())),
            ("alpha", Kind::Directory),
        ] {
            let node = FileNode::new("owner".into(), None, name.into(), kind);
            store.insert_node(&node).await.unwrap();
        }

        let names: Vec<String> = store.children("owner", None).await.unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();

        assert_eq!(names, vec!["alpha", "zeta", "a.txt", "b.txt"]);
    }
}
