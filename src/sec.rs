use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::fs::Owner;
use crate::net::error::{self, AuthKind};
use crate::state::ArcShared;

/// the verified principal of a request.
///
/// authentication happens upstream. the proxy in front of this service
/// places the owner id in the configured header and everything past this
/// point trusts it.
#[derive(Debug, Clone)]
pub struct Initiator {
    pub owner: Owner,
}

impl Initiator {
    pub fn owner_id(&self) -> &str {
        &self.owner.id
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("no principal was provided")]
    Missing,

    #[error("principal header is not valid utf8")]
    InvalidHeader(#[from] axum::http::header::ToStrError),

    #[error("owner is not known")]
    UnknownOwner,

    #[error("owner is inactive")]
    Inactive,

    #[error(transparent)]
    Store(#[from] crate::store::Error),
}

impl From<LookupError> for error::Error {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::Missing |
            LookupError::UnknownOwner => error::Error::api(AuthKind::Unauthenticated),
            LookupError::InvalidHeader(err) => error::Error::api(AuthKind::Unauthenticated)
                .source(err),
            LookupError::Inactive => error::Error::api(AuthKind::Inactive),
            LookupError::Store(err) => error::Error::new()
                .context("failed to look up owner")
                .source(err),
        }
    }
}

pub async fn lookup(parts: &Parts, state: &ArcShared) -> Result<Initiator, LookupError> {
    let value = parts.headers.get(state.auth_header())
        .ok_or(LookupError::Missing)?;
    let owner_id = value.to_str()?.trim();

    if owner_id.is_empty() {
        return Err(LookupError::Missing);
    }

    let owner = state.store()
        .owner(owner_id)
        .await?
        .ok_or(LookupError::UnknownOwner)?;

    if !owner.is_active {
        return Err(LookupError::Inactive);
    }

    Ok(Initiator { owner })
}

#[axum::async_trait]
impl FromRequestParts<ArcShared> for Initiator {
    type Rejection = error::Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ArcShared
    ) -> Result<Self, Self::Rejection> {
        Ok(lookup(parts, state).await?)
    }
}
