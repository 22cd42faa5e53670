//! Storage disk backed by a local directory

use crate::storage::{ByteStream, StorageBackend};
use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};

/// A named disk whose files live under a local root directory
///
/// Images on a local disk are never copied into the cache; callers get
/// the direct path instead.
#[derive(Debug, Clone)]
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    /// Create a disk rooted at `root`
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Root directory of the disk
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join a disk-relative path onto the root, dropping `..` and root
    /// components so the result stays below the root
    fn resolve(&self, path: &str) -> PathBuf {
        let mut resolved = self.root.clone();
        for component in Path::new(path).components() {
            if let Component::Normal(part) = component {
                resolved.push(part);
            }
        }
        resolved
    }
}

impl StorageBackend for LocalDisk {
    fn open(&self, path: &str) -> io::Result<ByteStream> {
        Ok(Box::new(File::open(self.resolve(path))?))
    }

    fn direct_path(&self, path: &str) -> Option<PathBuf> {
        Some(self.resolve(path))
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn direct_path_stays_below_root() {
        let disk = LocalDisk::new(PathBuf::from("/data/images"));
        assert_eq!(
            disk.direct_path("dive/1.jpg").unwrap(),
            PathBuf::from("/data/images/dive/1.jpg")
        );
        assert_eq!(
            disk.direct_path("../../etc/passwd").unwrap(),
            PathBuf::from("/data/images/etc/passwd")
        );
        assert_eq!(
            disk.direct_path("/abs/a.png").unwrap(),
            PathBuf::from("/data/images/abs/a.png")
        );
    }

    #[test]
    fn open_reads_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.jpg"), b"jpeg").unwrap();
        let disk = LocalDisk::new(temp.path().to_path_buf());

        let mut content = Vec::new();
        disk.open("a.jpg").unwrap().read_to_end(&mut content).unwrap();
        assert_eq!(content, b"jpeg");
    }

    #[test]
    fn open_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp.path().to_path_buf());
        let err = disk.open("missing.jpg").err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
