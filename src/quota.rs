use std::sync::Arc;

use crate::fs::error::{Error, Result};
use crate::fs::node::Owner;
use crate::store::MetaStore;

/// keeps `used_space` of an owner equal to the bytes of their non-trashed
/// files.
///
/// [`Quota::authorize`] is only an early answer for the client. the binding
/// check is [`Quota::reserve`] which guards and writes in one atomic step.
#[derive(Clone)]
pub struct Quota {
    store: Arc<dyn MetaStore>,
}

impl Quota {
    pub fn new(store: Arc<dyn MetaStore>) -> Self {
        Quota { store }
    }

    pub async fn owner(&self, owner_id: &str) -> Result<Owner> {
        self.store.owner(owner_id)
            .await?
            .ok_or(Error::NotFound)
    }

    /// fails with [`Error::QuotaExceeded`] if `additional` bytes would not
    /// fit. nothing is recorded
    pub async fn authorize(&self, owner_id: &str, additional: u64) -> Result<Owner> {
        let owner = self.owner(owner_id).await?;

        if owner.has_space_for(additional) {
            Ok(owner)
        } else {
            Err(Error::QuotaExceeded)
        }
    }

    /// atomically adds `bytes` to the used space if it stays within quota
    pub async fn reserve(&self, owner_id: &str, bytes: u64) -> Result<Owner> {
        if bytes == 0 {
            return self.owner(owner_id).await;
        }

        let delta = i64::try_from(bytes)
            .map_err(|_| Error::QuotaExceeded)?;

        Ok(self.store.adjust_used_space(owner_id, delta, true).await?)
    }

    /// applies a signed change without the quota guard. used once an
    /// operation has completed, e.g. releasing the bytes of a purged file
    pub async fn commit(&self, owner_id: &str, delta: i64) -> Result<Owner> {
        if delta == 0 {
            return self.owner(owner_id).await;
        }

        Ok(self.store.adjust_used_space(owner_id, delta, false).await?)
    }

    pub async fn release(&self, owner_id: &str, bytes: u64) -> Result<Owner> {
        let delta = i64::try_from(bytes).unwrap_or(i64::MAX);

        self.commit(owner_id, -delta).await
    }

    /// gives back a reservation after a later step failed. failures are
    /// logged since the caller is already returning another error
    pub async fn undo(&self, owner_id: &str, bytes: u64) {
        if let Err(err) = self.release(owner_id, bytes).await {
            tracing::error!(
                owner = owner_id,
                bytes,
                "failed to release quota reservation: {err}"
            );
        }
    }
}

impl std::fmt::Debug for Quota {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Quota").finish()
    }
}
