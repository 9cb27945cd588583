use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, StreamExt};
use stratus_lib::fs as lib_fs;

use crate::activity::{ActivityType, Event};
use crate::fs::{self, Kind, Written};

use super::{href, Dav, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Move,
    Copy,
}

/// a missing or non-collection parent is a conflict for every verb that
/// creates something
fn parent_conflict(err: fs::Error) -> fs::Error {
    match err {
        fs::Error::NotFound |
        fs::Error::NotDirectory => fs::Error::Conflict,
        err => err,
    }
}

fn content_length(dav: &Dav<'_>) -> Option<u64> {
    dav.header(header::CONTENT_LENGTH.as_str())
        .and_then(|value| value.parse().ok())
}

/// clients test the mount with an empty body. it never changes anything
pub async fn put(dav: &Dav<'_>, body: Body) -> Result<Response> {
    let ns = dav.state.namespace();
    let (parent, name) = ns.resolve_parent(dav.owner, dav.path)
        .await
        .map_err(parent_conflict)?;
    let mut body = body.into_data_stream();

    let first = loop {
        match body.next().await {
            Some(Ok(chunk)) if chunk.is_empty() => continue,
            Some(Ok(chunk)) => break Some(chunk),
            Some(Err(err)) => return Err(fs::Error::stream(err).into()),
            None => break None,
        }
    };

    let Some(first) = first else {
        let status = match ns.resolve(dav.owner, dav.path).await {
            Ok(_) => StatusCode::NO_CONTENT,
            Err(fs::Error::NotFound) => StatusCode::CREATED,
            Err(err) => return Err(err.into()),
        };

        return Ok(status.into_response());
    };

    let stream = stream::once(futures::future::ready(Ok(first))).chain(body);
    let parent_id = parent.map(|p| p.id);

    let (node, written) = ns.write_file(
        dav.owner,
        parent_id.as_deref(),
        &name,
        content_length(dav),
        stream
    ).await?;

    let (kind, status) = match written {
        Written::Created => (ActivityType::FileCreated, StatusCode::CREATED),
        Written::Overwritten => (ActivityType::FileUpdated, StatusCode::NO_CONTENT),
    };

    dav.state.activity().record(Event::on(kind, &node));

    let mut res = status.into_response();

    if let Some(etag) = node.etag() {
        if let Ok(value) = etag.parse() {
            res.headers_mut().insert(header::ETAG, value);
        }
    }

    Ok(res)
}

pub async fn mkcol(dav: &Dav<'_>) -> Result<Response> {
    let ns = dav.state.namespace();
    let (parent, name) = ns.resolve_parent(dav.owner, dav.path)
        .await
        .map_err(parent_conflict)?;
    let parent_id = parent.map(|p| p.id);

    let created = ns.create(dav.owner, parent_id.as_deref(), &name, Kind::Directory).await?;

    dav.state.activity().record(Event::on(ActivityType::FolderCreated, &created));

    Ok(StatusCode::CREATED.into_response())
}

/// permanent removal, there is no trash stage through WebDAV
pub async fn delete(dav: &Dav<'_>) -> Result<Response> {
    let node = dav.state.namespace()
        .resolve(dav.owner, dav.path)
        .await?
        .into_node()
        .ok_or(Error::Status(StatusCode::FORBIDDEN))?;

    let event = Event::on(ActivityType::FileDeleted, &node);
    let purged = dav.state.trash().purge(node).await?;

    tracing::debug!(nodes = purged.nodes, freed = purged.freed, "webdav delete");

    dav.state.activity().record(event);

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// MOVE and COPY. an existing destination is set aside in trash unless the
/// client sent `Overwrite: F`, then purged once the transfer succeeds or
/// restored when it fails
pub async fn transfer(dav: &Dav<'_>, transfer: Transfer) -> Result<Response> {
    let ns = dav.state.namespace();
    let dest_path = href::destination(dav.headers, dav.prefix())?;
    let overwrite = dav.header("overwrite")
        .map(|value| !value.eq_ignore_ascii_case("f"))
        .unwrap_or(true);

    let source = ns.resolve(dav.owner, dav.path)
        .await?
        .into_node()
        .ok_or(Error::Status(StatusCode::FORBIDDEN))?;

    if transfer == Transfer::Copy && source.is_directory() {
        return Err(fs::Error::NotFile.into());
    }

    let source_path = ns.path_of(&source).await?;
    let dest_path = match lib_fs::split_path(&dest_path) {
        Some((parent, name)) => lib_fs::join_path(&parent, &name),
        None => return Err(Error::Status(StatusCode::FORBIDDEN)),
    };

    if dest_path == source_path {
        return Err(Error::Status(StatusCode::FORBIDDEN));
    }

    if dest_path.starts_with(&format!("{source_path}/")) {
        return Err(fs::Error::Cycle.into());
    }

    let (dest_parent, dest_name) = ns.resolve_parent(dav.owner, &dest_path)
        .await
        .map_err(parent_conflict)?;
    let dest_parent = dest_parent.map(|p| p.id);

    let existing = match ns.resolve(dav.owner, &dest_path).await {
        Ok(entry) => entry.into_node(),
        Err(fs::Error::NotFound) => None,
        Err(err) => return Err(err.into()),
    };

    let replaced = match existing {
        Some(existing) => {
            if !overwrite {
                return Err(Error::Status(StatusCode::PRECONDITION_FAILED));
            }

            // the source lives below what is being replaced
            if source_path.starts_with(&format!("{dest_path}/")) {
                return Err(Error::Status(StatusCode::FORBIDDEN));
            }

            // set aside to free the name. it is only purged once the transfer
            // landed and comes back otherwise
            Some(dav.state.trash().trash(existing).await?)
        }
        None => None,
    };

    let result = match transfer {
        Transfer::Move => ns.relocate(source, dest_parent.as_deref(), &dest_name)
            .await
            .map(|moved| Event::on(ActivityType::FileMoved, &moved)
                .with_details(format!("{source_path} -> {dest_path}"))),
        Transfer::Copy => ns.copy(&source, dest_parent.as_deref(), Some(&dest_name))
            .await
            .map(|copied| Event::on(ActivityType::FileCreated, &copied)),
    };

    let event = match result {
        Ok(event) => event,
        Err(err) => {
            if let Some(replaced) = replaced {
                if let Err(restore_err) = dav.state.trash().restore(replaced).await {
                    tracing::error!(
                        destination = %dest_path,
                        "failed to restore replaced destination, it remains in trash: {restore_err}"
                    );
                }
            }

            return Err(err.into());
        }
    };

    dav.state.activity().record(event);

    let Some(replaced) = replaced else {
        return Ok(StatusCode::CREATED.into_response());
    };

    let replaced_id = replaced.id.clone();

    if let Err(err) = dav.state.trash().purge(replaced).await {
        tracing::error!(
            node = %replaced_id,
            "failed to purge replaced destination, it remains in trash: {err}"
        );
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}
