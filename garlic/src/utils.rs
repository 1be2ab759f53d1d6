use std::borrow::Cow;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;

/// Paths only ever show up in messages, so a lossy conversion is fine
pub fn path_lossy(path: &Path) -> Cow<'_, str> {
    path.to_string_lossy()
}

fn not_found_or(path: &Path, e: io::Error) -> crate::Error {
    match e.kind() {
        ErrorKind::NotFound => crate::Error::MissingFile(path_lossy(path).into_owned()),
        _ => e.into(),
    }
}

pub fn read_file(path: &Path) -> crate::Result<String> {
    fs::read_to_string(path).map_err(|e| not_found_or(path, e))
}

pub fn read_file_bytes(path: &Path) -> crate::Result<Vec<u8>> {
    fs::read(path).map_err(|e| not_found_or(path, e))
}

/// Resolve `child` against the directory containing `file` unless it is
/// already absolute
pub fn relative_to_file(file: &Path, child: &str) -> std::path::PathBuf {
    let child = Path::new(child);
    if child.is_absolute() {
        return child.to_path_buf();
    }
    match file.parent() {
        Some(parent) => parent.join(child),
        None => child.to_path_buf(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_relative_to_file() {
        let base = PathBuf::from("/tmp/project/device.toml");
        assert_eq!(
            relative_to_file(&base, "certs/a.der"),
            PathBuf::from("/tmp/project/certs/a.der")
        );
        assert_eq!(
            relative_to_file(&base, "/etc/a.der"),
            PathBuf::from("/etc/a.der")
        );
    }

    #[test]
    fn test_read_missing_file() {
        let path = PathBuf::from("/definitely/not/a/real/garlic/file");
        match read_file(&path) {
            Err(crate::Error::MissingFile(p)) => assert!(p.contains("garlic")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
