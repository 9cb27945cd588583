use std::sync::Arc;

use axum::http::HeaderName;

use crate::activity::{self, Activity};
use crate::blob::BlobStore;
use crate::config;
use crate::error;
use crate::fs::Namespace;
use crate::fs::trash::Trash;
use crate::quota::Quota;
use crate::store::{MetaStore, PgStore};

#[derive(Debug)]
pub struct Shared {
    store: Arc<dyn MetaStore>,
    namespace: Namespace,
    trash: Trash,
    quota: Quota,
    activity: Activity,
    webdav_prefix: String,
    auth_header: HeaderName,
}

pub type ArcShared = Arc<Shared>;

impl Shared {
    pub fn from_config(config: &config::Config) -> error::Result<Shared> {
        tracing::debug!("creating Shared state");

        let pg = PgStore::from_config(&config.settings.db)?;

        let recorder: Arc<dyn activity::Recorder> = match config.settings.activity {
            config::ActivitySink::Database => Arc::new(activity::PgRecorder::new(pg.pool().clone())),
            config::ActivitySink::Log => Arc::new(activity::LogRecorder),
        };

        let blobs = BlobStore::new(&config.settings.data, config.settings.upload.max_size);

        Ok(Shared::new(
            Arc::new(pg),
            blobs,
            Activity::new(recorder),
            config.settings.webdav.prefix.clone(),
            config.settings.auth.header.clone(),
        ))
    }

    pub fn new(
        store: Arc<dyn MetaStore>,
        blobs: BlobStore,
        activity: Activity,
        webdav_prefix: String,
        auth_header: HeaderName,
    ) -> Shared {
        let quota = Quota::new(store.clone());

        Shared {
            namespace: Namespace::new(store.clone(), blobs.clone(), quota.clone()),
            trash: Trash::new(store.clone(), blobs, quota.clone()),
            store,
            quota,
            activity,
            webdav_prefix,
            auth_header,
        }
    }

    pub fn store(&self) -> &dyn MetaStore {
        self.store.as_ref()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn trash(&self) -> &Trash {
        &self.trash
    }

    pub fn quota(&self) -> &Quota {
        &self.quota
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn webdav_prefix(&self) -> &str {
        &self.webdav_prefix
    }

    pub fn auth_header(&self) -> &HeaderName {
        &self.auth_header
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    use crate::fs::Owner;
    use crate::store::MemoryStore;

    pub(crate) const OWNER: &str = "owner";

    /// state over an in-memory store with a single active owner
    pub(crate) fn shared(dir: &tempfile::TempDir, quota: u64, max_size: Option<u64>) -> ArcShared {
        let store = MemoryStore::new();

        store.insert_owner(Owner {
            id: OWNER.into(),
            quota,
            used_space: 0,
            is_active: true,
        }).unwrap();

        store.insert_owner(Owner {
            id: "inactive".into(),
            quota,
            used_space: 0,
            is_active: false,
        }).unwrap();

        Arc::new(Shared::new(
            Arc::new(store),
            BlobStore::new(dir.path(), max_size),
            Activity::new(Arc::new(activity::LogRecorder)),
            config::DEFAULT_WEBDAV_PREFIX.into(),
            HeaderName::from_static(config::DEFAULT_AUTH_HEADER),
        ))
    }
}
