//! Deterministic content hashing of modules.
//!
//! A module is either a single file or a directory tree. Files are streamed through
//! SHA-256 in fixed-size blocks. Directories are hashed by feeding the digest of each
//! child, sorted by name, into one outer SHA-256 accumulator, so a directory digest
//! depends on the full recursive content and layout but not on creation order.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest as _, Sha256};

use modguard_core_types::Digest;

mod scan;

pub use scan::{discover, scan};

/// Size of the blocks read from each file.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Directory trees deeper than this are rejected, which also stops symlink cycles.
pub const MAX_DEPTH: usize = 64;

/// Failure to hash a module.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to list directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("directory tree under {} is deeper than {MAX_DEPTH} levels", path.display())]
    TooDeep { path: PathBuf },

    #[error("{} is neither a regular file nor a directory", path.display())]
    Unsupported { path: PathBuf },
}

/// Computes content digests of module files and directory trees.
#[derive(Copy, Clone, Debug)]
pub struct ContentHasher {
    block_size: usize,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different read block size. The digest does not depend on it.
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
        }
    }

    /// Hash the file or directory tree at `path`.
    pub fn digest(&self, path: impl AsRef<Path>) -> Result<Digest, HashError> {
        self.digest_at_depth(path.as_ref(), 0)
    }

    fn digest_at_depth(&self, path: &Path, depth: usize) -> Result<Digest, HashError> {
        let metadata = fs::metadata(path).map_err(|source| HashError::Io {
            path: path.to_owned(),
            source,
        })?;

        // Pipes, sockets and devices can block a read forever
        if metadata.is_dir() {
            self.digest_dir(path, depth)
        } else if metadata.is_file() {
            self.digest_file(path)
        } else {
            Err(HashError::Unsupported {
                path: path.to_owned(),
            })
        }
    }

    fn digest_file(&self, path: &Path) -> Result<Digest, HashError> {
        let io_err = |source| HashError::Io {
            path: path.to_owned(),
            source,
        };

        let mut file = File::open(path).map_err(io_err)?;
        let mut hasher = Sha256::new();
        let mut block = vec![0u8; self.block_size];

        loop {
            let read = match file.read(&mut block) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(io_err(e)),
            };

            hasher.update(&block[..read]);
        }

        Ok(Digest::from_bytes(hasher.finalize().into()))
    }

    fn digest_dir(&self, path: &Path, depth: usize) -> Result<Digest, HashError> {
        if depth >= MAX_DEPTH {
            return Err(HashError::TooDeep {
                path: path.to_owned(),
            });
        }

        let read_dir_err = |source| HashError::ReadDir {
            path: path.to_owned(),
            source,
        };

        let mut children = fs::read_dir(path)
            .map_err(read_dir_err)?
            .map(|entry| entry.map(|e| (e.file_name(), e.path())))
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_dir_err)?;

        children.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut hasher = Sha256::new();
        for (_, child) in children {
            let digest = self.digest_at_depth(&child, depth + 1)?;
            hasher.update(digest.as_bytes());
        }

        Ok(Digest::from_bytes(hasher.finalize().into()))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn sha256(data: &[u8]) -> Digest {
        Digest::from_bytes(Sha256::digest(data).into())
    }

    #[test]
    fn file_digest_is_plain_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("mod.jar");
        fs::write(&file, b"hello world").unwrap();

        let digest = ContentHasher::new().digest(&file).unwrap();
        assert_eq!(digest, sha256(b"hello world"));
        assert_eq!(
            digest.to_hex(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn block_size_does_not_change_digest() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.bin");
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&file, &data).unwrap();

        let a = ContentHasher::with_block_size(7).digest(&file).unwrap();
        let b = ContentHasher::new().digest(&file).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, sha256(&data));
    }

    #[test]
    fn directory_digest_chains_child_digests_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), b"bee").unwrap();
        fs::write(dir.path().join("a.txt"), b"ay").unwrap();

        let mut outer = Sha256::new();
        outer.update(sha256(b"ay").as_bytes());
        outer.update(sha256(b"bee").as_bytes());
        let expected = Digest::from_bytes(outer.finalize().into());

        assert_eq!(ContentHasher::new().digest(dir.path()).unwrap(), expected);
    }

    #[test]
    fn empty_directory_hashes_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            ContentHasher::new().digest(dir.path()).unwrap(),
            sha256(b"")
        );
    }

    #[test]
    fn missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContentHasher::new()
            .digest(dir.path().join("nope"))
            .unwrap_err();

        assert!(matches!(err, HashError::Io { .. }));
    }
}
