use axum::extract::{Path, State};
use serde::Deserialize;
use stratus_lib::ids;

use crate::activity::{ActivityType, Event};
use crate::fs::trash::Purged;
use crate::net::error;
use crate::sec::Initiator;
use crate::state::ArcShared;

use super::fs::{to_item, to_items};

#[derive(Deserialize)]
pub struct PathParams {
    id: ids::NodeId,
}

fn purged_schema(purged: Purged) -> stratus_api::fs::Purged {
    stratus_api::fs::Purged {
        purged: purged.nodes,
        freed: purged.freed,
    }
}

pub async fn list(
    State(state): State<ArcShared>,
    initiator: Initiator,
) -> error::Result<stratus_api::Payload<stratus_api::fs::Contents>> {
    let trashed = state.trash().list(initiator.owner_id()).await?;

    Ok(stratus_api::Payload::new(stratus_api::fs::Contents {
        files: to_items(&state, trashed).await?
    }))
}

pub async fn trash(
    State(state): State<ArcShared>,
    initiator: Initiator,
    Path(PathParams { id }): Path<PathParams>,
) -> error::Result<stratus_api::Payload<stratus_api::fs::Item>> {
    let node = state.namespace().get_active(initiator.owner_id(), &id).await?;
    let node = state.trash().trash(node).await?;

    state.activity().record(
        Event::on(ActivityType::FileDeleted, &node)
            .with_details("moved to trash")
    );

    Ok(stratus_api::Payload::new(to_item(&state, node).await?))
}

pub async fn restore(
    State(state): State<ArcShared>,
    initiator: Initiator,
    Path(PathParams { id }): Path<PathParams>,
) -> error::Result<stratus_api::Payload<stratus_api::fs::Item>> {
    let node = state.namespace().get(initiator.owner_id(), &id).await?;
    let node = state.trash().restore(node).await?;

    Ok(stratus_api::Payload::new(to_item(&state, node).await?))
}

pub async fn purge(
    State(state): State<ArcShared>,
    initiator: Initiator,
    Path(PathParams { id }): Path<PathParams>,
) -> error::Result<stratus_api::Payload<stratus_api::fs::Purged>> {
    let node = state.namespace().get(initiator.owner_id(), &id).await?;
    let event = Event::on(ActivityType::FileDeleted, &node)
        .with_details("permanently deleted");

    let purged = state.trash().purge(node).await?;

    state.activity().record(event);

    Ok(stratus_api::Payload::new(purged_schema(purged)))
}

pub async fn empty(
    State(state): State<ArcShared>,
    initiator: Initiator,
) -> error::Result<stratus_api::Payload<stratus_api::fs::Purged>> {
    let purged = state.trash().empty(initiator.owner_id()).await?;

    state.activity().record(
        Event::new(ActivityType::FileDeleted, initiator.owner_id())
            .with_details(format!("emptied trash, {} nodes", purged.nodes))
    );

    Ok(stratus_api::Payload::new(purged_schema(purged)))
}

#[cfg(test)]
mod test {
    use axum::body::Body;
    use axum::http::StatusCode;
    use stratus_api::fs::{Contents, Item, Purged, Usage};

    use crate::routing::api::test::{payload, request, send};
    use crate::state;

    async fn upload(state: &state::ArcShared, name: &str, data: &'static str) -> Item {
        let res = send(state, request("POST", &format!("/api/files/upload?name={name}"), Body::from(data))).await;

        payload(res).await
    }

    async fn usage(state: &state::ArcShared) -> Usage {
        payload(send(state, request("GET", "/api/storage/stats", Body::empty())).await).await
    }

    #[tokio::test]
    async fn trash_restore_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = state::test::shared(&dir, 1024, None);
        let file = upload(&state, "a.txt", "12345").await;

        let res = send(&state, request("DELETE", &format!("/api/files/{}/trash", file.id), Body::empty())).await;
        let trashed: Item = payload(res).await;

        assert!(trashed.is_trashed);
        assert!(trashed.trashed_at.is_some());
        assert_eq!(usage(&state).await.used_space, 0);

        let res = send(&state, request("GET", "/api/trash", Body::empty())).await;
        let listed: Contents = payload(res).await;
        assert_eq!(listed.files.len(), 1);

        let res = send(&state, request("POST", &format!("/api/files/{}/restore", file.id), Body::empty())).await;
        let restored: Item = payload(res).await;

        assert!(!restored.is_trashed);
        assert_eq!(restored.path, "/");
        assert_eq!(usage(&state).await.used_space, 5);

        send(&state, request("DELETE", &format!("/api/files/{}/trash", file.id), Body::empty())).await;

        let res = send(&state, request("DELETE", "/api/trash", Body::empty())).await;
        let purged: Purged = payload(res).await;

        assert_eq!(purged.purged, 1);
        assert_eq!(purged.freed, 5);

        let res = send(&state, request("GET", &format!("/api/files/{}", file.id), Body::empty())).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn permanent_delete_releases_quota() {
        let dir = tempfile::tempdir().unwrap();
        let state = state::test::shared(&dir, 1024, None);
        let file = upload(&state, "a.txt", "123").await;

        assert_eq!(usage(&state).await.used_space, 3);

        let res = send(&state, request("DELETE", &format!("/api/files/{}", file.id), Body::empty())).await;
        let purged: Purged = payload(res).await;

        assert_eq!(purged.purged, 1);

        let stats = usage(&state).await;

        assert_eq!(stats.used_space, 0);
        assert_eq!(stats.file_count, 0);
    }
}
