use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use stratus_lib::ids;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::fs::error::{Error, Result};
use crate::path;

type BoxDynError = Box<dyn std::error::Error + Send + Sync>;

/// length of the hex prefix used for per owner directories
const OWNER_DIR_LEN: usize = 16;

const TMP_EXT: &str = "tmp";

/// result of persisting a content stream
#[derive(Debug, Clone, PartialEq)]
pub struct Saved {
    pub storage_ref: ids::StorageRef,
    pub size: u64,
    pub checksum: String,
}

/// opaque content storage on the local filesystem.
///
/// blobs are never modified after they are written. a storage reference has
/// the form `{owner_dir}/{uid}` where `owner_dir` is derived from the owner
/// id so that arbitrary owner ids never reach the filesystem.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    max_size: Option<u64>,
}

impl BlobStore {
    pub fn new<P>(root: P, max_size: Option<u64>) -> Self
    where
        P: Into<PathBuf>
    {
        BlobStore {
            root: root.into(),
            max_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn owner_dir(owner: &str) -> String {
        let hash = blake3::hash(owner.as_bytes());

        hash.to_hex()[..OWNER_DIR_LEN].to_owned()
    }

    fn parse_ref(storage_ref: &str) -> Result<(&str, &str)> {
        let (dir, uid) = storage_ref.split_once('/')
            .ok_or(Error::InvalidReference)?;

        let dir_valid = dir.len() == OWNER_DIR_LEN &&
            dir.chars().all(|ch| ch.is_ascii_hexdigit());

        if !dir_valid || !ids::uid_valid(uid) {
            return Err(Error::InvalidReference);
        }

        Ok((dir, uid))
    }

    fn blob_path(&self, storage_ref: &str) -> Result<PathBuf> {
        let (dir, uid) = Self::parse_ref(storage_ref)?;

        Ok(self.root.join(dir).join(uid))
    }

    /// creates a fresh reference and the directory it will live in
    async fn allocate(&self, dir: &str) -> Result<(ids::StorageRef, PathBuf, PathBuf)> {
        let dir_path = self.root.join(dir);

        tokio::fs::create_dir_all(&dir_path).await?;

        let uid = ids::create_uid();
        let full = dir_path.join(&uid);
        let tmp = full.with_extension(TMP_EXT);

        Ok((format!("{dir}/{uid}"), full, tmp))
    }

    /// writes the stream to a new blob computing size and checksum in the
    /// same pass. the blob only becomes visible under its reference once the
    /// whole stream was written.
    ///
    /// with `room` the stream stops with [`Error::QuotaExceeded`] once it
    /// goes past that many bytes
    pub async fn save<S, E>(&self, owner: &str, stream: S, room: Option<u64>) -> Result<Saved>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: Into<BoxDynError>,
    {
        let (storage_ref, full, tmp) = self.allocate(&Self::owner_dir(owner)).await?;

        tracing::debug!("tmp blob path: \"{}\"", tmp.display());

        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .await?;

        let (size, hash) = match self.write_stream(BufWriter::new(file), stream, room).await {
            Ok(result) => result,
            Err(err) => {
                if let Err(rm_err) = tokio::fs::remove_file(&tmp).await {
                    tracing::warn!("failed removing tmp blob \"{}\": {rm_err}", tmp.display());
                }

                return Err(err);
            }
        };

        if let Err(err) = tokio::fs::rename(&tmp, &full).await {
            if let Err(rm_err) = tokio::fs::remove_file(&tmp).await {
                tracing::warn!("failed removing tmp blob \"{}\": {rm_err}", tmp.display());
            }

            return Err(err.into());
        }

        Ok(Saved {
            storage_ref,
            size,
            checksum: hash.to_hex().to_string(),
        })
    }

    async fn write_stream<W, S, E>(
        &self,
        mut writer: W,
        mut stream: S,
        room: Option<u64>,
    ) -> Result<(u64, blake3::Hash)>
    where
        W: tokio::io::AsyncWrite + Unpin,
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: Into<BoxDynError>,
    {
        let mut written: u64 = 0;
        let mut hasher = blake3::Hasher::new();

        while let Some(result) = stream.next().await {
            let bytes = result.map_err(Error::stream)?;
            let slice = bytes.as_ref();

            written = written.checked_add(slice.len() as u64)
                .ok_or(Error::TooLarge)?;

            if let Some(max) = self.max_size {
                if written > max {
                    return Err(Error::TooLarge);
                }
            }

            if let Some(room) = room {
                if written > room {
                    return Err(Error::QuotaExceeded);
                }
            }

            hasher.update(slice);
            writer.write_all(slice).await?;
        }

        writer.flush().await?;

        Ok((written, hasher.finalize()))
    }

    pub async fn open(&self, storage_ref: &str) -> Result<tokio::fs::File> {
        let full = self.blob_path(storage_ref)?;

        match tokio::fs::File::open(&full).await {
            Ok(file) => Ok(file),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    /// removes a blob. removing a blob that does not exist is not an error
    pub async fn delete(&self, storage_ref: &str) -> Result<()> {
        let full = self.blob_path(storage_ref)?;

        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// duplicates a blob under a new reference in the same owner directory
    pub async fn copy(&self, storage_ref: &str) -> Result<ids::StorageRef> {
        let (dir, _) = Self::parse_ref(storage_ref)?;
        let src = self.blob_path(storage_ref)?;

        if path::metadata(&src)?.is_none() {
            return Err(Error::NotFound);
        }

        let (new_ref, full, tmp) = self.allocate(dir).await?;

        if let Err(err) = tokio::fs::copy(&src, &tmp).await {
            if let Err(rm_err) = tokio::fs::remove_file(&tmp).await {
                tracing::warn!("failed removing tmp blob \"{}\": {rm_err}", tmp.display());
            }

            return Err(err.into());
        }

        tokio::fs::rename(&tmp, &full).await?;

        Ok(new_ref)
    }
}

#[cfg(test)]
impl BlobStore {
    pub async fn save_bytes(&self, owner: &str, bytes: Bytes) -> Result<Saved> {
        let stream = futures::stream::iter([Ok::<_, std::io::Error>(bytes)]);

        self.save(owner, stream, None).await
    }

    pub async fn exists(&self, storage_ref: &str) -> Result<bool> {
        let full = self.blob_path(storage_ref)?;

        Ok(path::metadata(full)?.is_some())
    }
}

/// guesses the mime type from the extension of a file name
pub fn mime_type(name: &str) -> mime::Mime {
    mime_guess::from_path(name).first_or_octet_stream()
}
