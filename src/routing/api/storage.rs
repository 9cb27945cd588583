use axum::extract::State;

use crate::net::error;
use crate::sec::Initiator;
use crate::state::ArcShared;

pub async fn stats(
    State(state): State<ArcShared>,
    initiator: Initiator,
) -> error::Result<stratus_api::Payload<stratus_api::fs::Usage>> {
    let (owner, counts) = state.namespace().usage(initiator.owner_id()).await?;

    Ok(stratus_api::Payload::new(stratus_api::fs::Usage {
        used_space: owner.used_space,
        quota: owner.quota,
        file_count: counts.files,
        folder_count: counts.folders,
        percentage: stratus_api::fs::Usage::percentage_of(owner.used_space, owner.quota),
    }))
}
