use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// metadata of `path`, `None` when nothing exists there
pub fn metadata(path: impl AsRef<Path>) -> std::io::Result<Option<Metadata>> {
    path.as_ref()
        .metadata()
        .map(Some)
        .or_else(|err| if err.kind() == ErrorKind::NotFound {
            Ok(None)
        } else {
            Err(err)
        })
}

/// resolves `.` and `..` lexically. symlinks are not followed
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref()
        .components()
        .fold(PathBuf::new(), |mut rtn, comp| {
            match comp {
                Component::CurDir => {}
                Component::ParentDir => {
                    rtn.pop();
                }
                other => rtn.push(other.as_os_str()),
            }

            rtn
        })
}
