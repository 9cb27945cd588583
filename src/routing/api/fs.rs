use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use axum::Json;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use stratus_lib::ids;
use tokio_util::io::ReaderStream;

use crate::activity::{ActivityType, Event};
use crate::fs::{Entry, FileNode, Kind, Written};
use crate::net::error::{self, Detail, FsKind, GeneralKind};
use crate::sec::Initiator;
use crate::state::ArcShared;

#[derive(Deserialize)]
pub struct PathParams {
    id: ids::NodeId,
}

pub async fn to_item(state: &ArcShared, node: FileNode) -> error::Result<stratus_api::fs::Item> {
    let path = state.namespace().parent_path(&node).await?;

    Ok(node.into_schema(path))
}

pub async fn to_items(state: &ArcShared, nodes: Vec<FileNode>) -> error::Result<Vec<stratus_api::fs::Item>> {
    let paths = state.namespace().parent_paths(&nodes).await?;

    Ok(nodes.into_iter()
        .zip(paths)
        .map(|(node, path)| node.into_schema(path))
        .collect())
}

#[derive(Deserialize)]
pub struct ListQuery {
    path: Option<String>,
}

pub async fn list(
    State(state): State<ArcShared>,
    initiator: Initiator,
    Query(ListQuery { path }): Query<ListQuery>,
) -> error::Result<stratus_api::Payload<stratus_api::fs::Listing>> {
    let ns = state.namespace();
    let path = path.unwrap_or_else(|| stratus_lib::fs::ROOT_PATH.to_owned());

    let (path, parent) = match ns.resolve(initiator.owner_id(), &path).await? {
        Entry::Root => (stratus_lib::fs::ROOT_PATH.to_owned(), None),
        Entry::Node(node) => {
            if !node.is_directory() {
                return Err(error::Error::api(FsKind::NotDirectory));
            }

            (ns.path_of(&node).await?, Some(node.id))
        }
    };

    let children = ns.list(initiator.owner_id(), parent.as_deref()).await?;
    let files = to_items(&state, children).await?;

    Ok(stratus_api::Payload::new(stratus_api::fs::Listing {
        total_count: files.len() as u64,
        files,
        path,
        current_parent_id: parent,
    }))
}

pub async fn get(
    State(state): State<ArcShared>,
    initiator: Initiator,
    Path(PathParams { id }): Path<PathParams>,
) -> error::Result<stratus_api::Payload<stratus_api::fs::Item>> {
    let node = state.namespace().get(initiator.owner_id(), &id).await?;

    Ok(stratus_api::Payload::new(to_item(&state, node).await?))
}

pub async fn contents(
    State(state): State<ArcShared>,
    initiator: Initiator,
    Path(PathParams { id }): Path<PathParams>,
) -> error::Result<stratus_api::Payload<stratus_api::fs::Contents>> {
    let children = state.namespace().list(initiator.owner_id(), Some(&id)).await?;

    Ok(stratus_api::Payload::new(stratus_api::fs::Contents {
        files: to_items(&state, children).await?
    }))
}

pub async fn versions(
    State(state): State<ArcShared>,
    initiator: Initiator,
    Path(PathParams { id }): Path<PathParams>,
) -> error::Result<stratus_api::Payload<Vec<stratus_api::fs::Version>>> {
    let ns = state.namespace();
    let node = ns.get(initiator.owner_id(), &id).await?;
    let versions = ns.versions(&node).await?;

    Ok(stratus_api::Payload::new(
        versions.into_iter()
            .map(|v| v.into_schema())
            .collect()
    ))
}

pub async fn download(
    State(state): State<ArcShared>,
    initiator: Initiator,
    Path(PathParams { id }): Path<PathParams>,
) -> error::Result<Response<Body>> {
    let ns = state.namespace();
    let node = ns.get_active(initiator.owner_id(), &id).await?;
    let file = ns.open(&node).await?;

    let Some(content) = &node.content else {
        return Err(error::Error::api(FsKind::NotFile));
    };

    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        utf8_percent_encode(&node.name, NON_ALPHANUMERIC)
    );

    let res = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content.mime.to_string())
        .header(header::CONTENT_LENGTH, content.size)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(ReaderStream::new(file)))?;

    state.activity().record(Event::on(ActivityType::FileDownloaded, &node));

    Ok(res)
}

#[derive(Deserialize)]
pub struct UploadQuery {
    parent_id: Option<ids::NodeId>,
    name: Option<String>,
}

pub async fn upload(
    State(state): State<ArcShared>,
    initiator: Initiator,
    headers: HeaderMap,
    Query(UploadQuery { parent_id, name }): Query<UploadQuery>,
    body: Body,
) -> error::Result<(StatusCode, stratus_api::Payload<stratus_api::fs::Item>)> {
    let Some(name) = name else {
        return Err(error::Error::api((
            GeneralKind::MissingData,
            Detail::with_key("name")
        )));
    };

    let size_hint = content_length(&headers)?;

    let (node, written) = state.namespace().write_file(
        initiator.owner_id(),
        parent_id.as_deref(),
        &name,
        size_hint,
        body.into_data_stream(),
    ).await?;

    let (status, kind) = match written {
        Written::Created => (StatusCode::CREATED, ActivityType::FileCreated),
        Written::Overwritten => (StatusCode::OK, ActivityType::FileUpdated),
    };

    state.activity().record(Event::on(kind, &node));

    Ok((status, stratus_api::Payload::new(to_item(&state, node).await?)))
}

pub fn content_length(headers: &HeaderMap) -> error::Result<Option<u64>> {
    let Some(value) = headers.get(header::CONTENT_LENGTH) else {
        return Ok(None);
    };

    let parsed = value.to_str()?
        .parse::<u64>()
        .map_err(|err| error::Error::api(GeneralKind::InvalidHeaderValue).source(err))?;

    Ok(Some(parsed))
}

pub async fn create_folder(
    State(state): State<ArcShared>,
    initiator: Initiator,
    Json(json): Json<stratus_api::fs::CreateFolder>,
) -> error::Result<(StatusCode, stratus_api::Payload<stratus_api::fs::Item>)> {
    let node = state.namespace().create(
        initiator.owner_id(),
        json.parent_id.as_deref(),
        &json.name,
        Kind::Directory
    ).await?;

    state.activity().record(Event::on(ActivityType::FolderCreated, &node));

    Ok((StatusCode::CREATED, stratus_api::Payload::new(to_item(&state, node).await?)))
}

pub async fn rename(
    State(state): State<ArcShared>,
    initiator: Initiator,
    Path(PathParams { id }): Path<PathParams>,
    Json(json): Json<stratus_api::fs::Rename>,
) -> error::Result<stratus_api::Payload<stratus_api::fs::Item>> {
    let ns = state.namespace();
    let node = ns.get(initiator.owner_id(), &id).await?;
    let previous = node.name.clone();
    let node = ns.rename(node, &json.name).await?;

    state.activity().record(
        Event::on(ActivityType::FileMoved, &node)
            .with_details(format!("renamed from {previous}"))
    );

    Ok(stratus_api::Payload::new(to_item(&state, node).await?))
}

pub async fn move_to(
    State(state): State<ArcShared>,
    initiator: Initiator,
    Path(PathParams { id }): Path<PathParams>,
    Json(json): Json<stratus_api::fs::Move>,
) -> error::Result<stratus_api::Payload<stratus_api::fs::Item>> {
    let ns = state.namespace();
    let node = ns.get(initiator.owner_id(), &id).await?;
    let from = ns.path_of(&node).await?;
    let node = ns.move_to(node, json.destination_id.as_deref()).await?;
    let item = to_item(&state, node.clone()).await?;

    state.activity().record(
        Event::on(ActivityType::FileMoved, &node)
            .with_details(format!("{from} -> {}", stratus_lib::fs::join_path(&item.path, &item.name)))
    );

    Ok(stratus_api::Payload::new(item))
}

pub async fn copy(
    State(state): State<ArcShared>,
    initiator: Initiator,
    Path(PathParams { id }): Path<PathParams>,
    Json(json): Json<stratus_api::fs::Copy>,
) -> error::Result<(StatusCode, stratus_api::Payload<stratus_api::fs::Item>)> {
    let ns = state.namespace();
    let node = ns.get(initiator.owner_id(), &id).await?;
    let copied = ns.copy(
        &node,
        json.destination_id.as_deref(),
        json.new_name.as_deref()
    ).await?;

    state.activity().record(
        Event::on(ActivityType::FileCreated, &copied)
            .with_details(format!("copied from {}", node.id))
    );

    Ok((StatusCode::CREATED, stratus_api::Payload::new(to_item(&state, copied).await?)))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
}

pub async fn search(
    State(state): State<ArcShared>,
    initiator: Initiator,
    Query(SearchQuery { q }): Query<SearchQuery>,
) -> error::Result<stratus_api::Payload<stratus_api::fs::Contents>> {
    let query = q.unwrap_or_default();

    if query.trim().is_empty() {
        return Err(error::Error::api((
            GeneralKind::ValidationFailed,
            Detail::with_key("q")
        )));
    }

    let found = state.namespace().search(initiator.owner_id(), &query).await?;

    Ok(stratus_api::Payload::new(stratus_api::fs::Contents {
        files: to_items(&state, found).await?
    }))
}
