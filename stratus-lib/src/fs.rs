pub const MAX_NAME_CHARS: usize = 255;
pub const MIN_NAME_CHARS: usize = 1;

pub const ROOT_PATH: &str = "/";

pub const INVALID_NAME_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

fn valid_name_char(ch: &char) -> bool {
    !INVALID_NAME_CHARS.contains(ch) && !ch.is_control()
}

/// checks a single name component of a file or directory.
///
/// names are compared case-sensitively everywhere else so nothing here
/// normalizes case or whitespace.
pub fn name_valid(given: &str) -> bool {
    if given == "." || given == ".." {
        return false;
    }

    let mut count = 0;

    for ch in given.chars() {
        if !valid_name_char(&ch) {
            return false;
        }

        count += 1;

        if count > MAX_NAME_CHARS {
            return false;
        }
    }

    count >= MIN_NAME_CHARS
}

/// the non-empty components of a slash-delimited path
pub fn segments(path: &str) -> impl DoubleEndedIterator<Item = &str> {
    path.split('/').filter(|seg| !seg.is_empty())
}

pub fn is_root(path: &str) -> bool {
    segments(path).next().is_none()
}

/// splits a path into the path of its parent directory and the leaf name.
///
/// returns `None` for the root path. the parent path is always absolute and
/// never carries a trailing slash unless it is the root itself.
pub fn split_path(path: &str) -> Option<(String, String)> {
    let mut iter = segments(path);
    let name = iter.next_back()?;
    let mut parent = String::new();

    for seg in iter {
        parent.push('/');
        parent.push_str(seg);
    }

    if parent.is_empty() {
        parent.push_str(ROOT_PATH);
    }

    Some((parent, name.to_owned()))
}

/// joins a parent directory path and a name into the full path of the child
pub fn join_path(parent: &str, name: &str) -> String {
    if is_root(parent) {
        format!("/{name}")
    } else {
        format!("{}/{name}", parent.trim_end_matches('/'))
    }
}
