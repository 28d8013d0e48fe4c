//! Recursive enumeration of regular files under a directory

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{ErrorCategory, ErrorKind, Result, SealtreeError};

/// Lazy iterator over the regular files in a directory subtree
///
/// Yields files in unspecified order, in a single pass over the tree as it
/// exists at call time; entries created or removed while the walk is in
/// progress may or may not be observed. Symlinks and other non-regular
/// entries are skipped and never followed. A subdirectory that fails to
/// enumerate is reported as one error item and the walk continues with the
/// rest of the tree.
#[derive(Debug)]
pub struct FileWalk {
    stack: Vec<fs::ReadDir>,
}

impl FileWalk {
    /// Start a walk rooted at `root`, which must be a readable directory.
    pub fn new(root: &Path) -> Result<Self> {
        let read_dir = fs::read_dir(root).map_err(|e| read_dir_error(root, e))?;
        Ok(Self {
            stack: vec![read_dir],
        })
    }
}

impl Iterator for FileWalk {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            let entry = match top.next() {
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    return Some(Err(SealtreeError::with_kind_and_source(
                        ErrorCategory::Internal,
                        ErrorKind::Io,
                        format!("failed to read directory entry: {}", e),
                        e,
                    )));
                }
                None => {
                    self.stack.pop();
                    continue;
                }
            };

            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    return Some(Err(SealtreeError::with_kind_and_source(
                        ErrorCategory::Internal,
                        ErrorKind::Io,
                        format!("failed to stat {}", path.display()),
                        e,
                    )));
                }
            };

            if file_type.is_dir() {
                match fs::read_dir(&path) {
                    Ok(read_dir) => self.stack.push(read_dir),
                    Err(e) => return Some(Err(read_dir_error(&path, e))),
                }
            } else if file_type.is_file() {
                return Some(Ok(path));
            }
            // Symlinks and special files are not regular files; skip.
        }
    }
}

fn read_dir_error(path: &Path, err: io::Error) -> SealtreeError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    SealtreeError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read directory {}", path.display()),
        err,
    )
}
