//! Whole-tree encryption/decryption
//!
//! Applies the per-file operations to every candidate under a root and
//! aggregates the outcomes. Each file is its own atomic unit (seal then
//! delete original, or open then delete artifact). There is no tree-wide
//! rollback: a failure on one file leaves every previously processed file
//! in its new state.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ErrorCategory, ErrorKind, Result, SealtreeError};
use crate::file_ops;
use crate::tree::FileWalk;

/// Snapshot of the files a tree operation would touch
///
/// Taken before any mutation, so artifacts written during a pass are never
/// re-visited by the same pass.
pub struct Plan {
    /// Files the operation would process, in walk order.
    pub files: Vec<PathBuf>,
    /// Enumeration failures encountered while listing, keyed by the walk
    /// root. These do not prevent processing the files that were listed.
    pub errors: Vec<(PathBuf, SealtreeError)>,
}

/// Aggregate outcome of a whole-tree operation
#[derive(Default)]
pub struct TreeReport {
    /// Input paths processed successfully.
    pub succeeded: Vec<PathBuf>,
    /// Paths that failed, with the per-file error.
    pub failed: Vec<(PathBuf, SealtreeError)>,
}

impl TreeReport {
    /// True only when every candidate file was processed successfully.
    pub fn all_ok(&self) -> bool {
        self.failed.is_empty()
    }

    /// True when the operation failed and every failure is an
    /// authentication failure, meaning a retry with a different passphrase
    /// could succeed.
    pub fn only_auth_failures(&self) -> bool {
        !self.failed.is_empty()
            && self
                .failed
                .iter()
                .all(|(_, e)| e.is_authentication_failure())
    }
}

/// Files an encrypt pass over `root` would seal
///
/// Every regular file is a candidate regardless of name; a sealed artifact
/// encountered here (e.g. left by an interrupted earlier run) gets sealed
/// again and unwraps over two decrypt passes.
pub fn encrypt_plan(root: &Path) -> Result<Plan> {
    plan_with(root, |_| true)
}

/// Sealed artifacts a decrypt pass over `root` would open
///
/// Only files carrying the sealed extension are candidates; everything
/// else is ignored, which makes re-running after a partial pass process
/// exactly the files that are still sealed.
pub fn decrypt_plan(root: &Path) -> Result<Plan> {
    plan_with(root, file_ops::is_sealed)
}

fn plan_with(root: &Path, keep: impl Fn(&Path) -> bool) -> Result<Plan> {
    let mut files = Vec::new();
    let mut errors = Vec::new();
    for item in FileWalk::new(root)? {
        match item {
            Ok(path) => {
                if keep(&path) {
                    files.push(path);
                }
            }
            Err(e) => errors.push((root.to_path_buf(), e)),
        }
    }
    Ok(Plan { files, errors })
}

/// Seal every regular file under `root` with the passphrase
///
/// Each original is deleted only after its own seal succeeded; a failure
/// on a later file never rolls back earlier ones. The final tree state is
/// independent of traversal order.
pub fn encrypt_tree(root: &Path, passphrase: &[u8]) -> Result<TreeReport> {
    let plan = encrypt_plan(root)?;
    let mut report = TreeReport {
        failed: plan.errors,
        ..Default::default()
    };

    for path in plan.files {
        match file_ops::encrypt_file(&path, passphrase) {
            Ok(_) => remove_processed(&path, "original", &mut report),
            Err(e) => report.failed.push((path, e)),
        }
    }

    Ok(report)
}

/// Open every sealed artifact under `root` with the passphrase
///
/// Each artifact is deleted only after its own open succeeded; artifacts
/// that fail (wrong passphrase, corruption, I/O) are left untouched and
/// recorded. `all_ok()` on the returned report is true only if every
/// sealed file in the tree was recovered.
pub fn decrypt_tree(root: &Path, passphrase: &[u8]) -> Result<TreeReport> {
    let plan = decrypt_plan(root)?;
    let mut report = TreeReport {
        failed: plan.errors,
        ..Default::default()
    };

    for path in plan.files {
        match file_ops::decrypt_file(&path, passphrase) {
            Ok(_) => remove_processed(&path, "artifact", &mut report),
            Err(e) => report.failed.push((path, e)),
        }
    }

    Ok(report)
}

/// Delete a successfully processed input and record the outcome
///
/// The output already exists at this point, so a failed delete leaves both
/// forms on disk; that is reported as a failure rather than silently
/// keeping the duplicate.
fn remove_processed(path: &Path, role: &str, report: &mut TreeReport) {
    match fs::remove_file(path) {
        Ok(()) => report.succeeded.push(path.to_path_buf()),
        Err(e) => {
            let err = SealtreeError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("processed, but failed to remove {} {}", role, path.display()),
                e,
            );
            report.failed.push((path.to_path_buf(), err));
        }
    }
}
