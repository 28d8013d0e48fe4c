//! Single-file encryption/decryption operations
//!
//! This module provides the on-disk naming convention for sealed artifacts
//! and the per-file seal/open operations built on top of `sealcrypt`.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{ErrorCategory, ErrorKind, Result, SealtreeError};
use crate::sealcrypt;

/// Extension carried by sealed artifacts (without the leading dot)
pub const SEALED_EXTENSION: &str = "sealed";

/// Returns the sealed artifact path for a plaintext path
///
/// The artifact sits next to the original: `path` plus a `.sealed` suffix.
pub fn sealed_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(SEALED_EXTENSION);
    PathBuf::from(name)
}

/// True when the path carries the sealed-artifact extension
pub fn is_sealed(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SEALED_EXTENSION)
}

/// Returns the plaintext path for a sealed artifact, stripping exactly the
/// sealed extension
///
/// Returns None when the path does not carry the extension.
pub fn unsealed_path(path: &Path) -> Option<PathBuf> {
    if is_sealed(path) {
        Some(path.with_extension(""))
    } else {
        None
    }
}

/// Seal a file's contents under a passphrase
///
/// Reads the whole file, seals it, and writes the artifact to
/// `path` + ".sealed", returning the artifact path. The original file is
/// left untouched; removing it after a successful seal is the caller's
/// decision.
pub fn encrypt_file(path: &Path, passphrase: &[u8]) -> Result<PathBuf> {
    let plaintext = fs::read(path).map_err(|e| read_error(path, e))?;
    let sealed = sealcrypt::encrypt(passphrase, &plaintext)
        .map_err(|e| e.with_context(format!("failed to seal {}", path.display())))?;
    let out_path = sealed_path(path);
    write_file_atomic(&out_path, &sealed)
        .map_err(|e| e.with_context(format!("failed to write to {}", out_path.display())))?;
    Ok(out_path)
}

/// Open a sealed artifact under a passphrase
///
/// Writes the plaintext to the suffix-stripped path and returns it. On any
/// failure, authentication failure included, no output file is created and
/// the artifact is left untouched.
pub fn decrypt_file(path: &Path, passphrase: &[u8]) -> Result<PathBuf> {
    let out_path = unsealed_path(path).ok_or_else(|| {
        SealtreeError::with_kind(
            ErrorCategory::User,
            ErrorKind::NotSealed,
            format!(
                "{} does not carry the .{} extension",
                path.display(),
                SEALED_EXTENSION
            ),
        )
    })?;
    let sealed = fs::read(path).map_err(|e| read_error(path, e))?;
    let plaintext = sealcrypt::decrypt(passphrase, &sealed)
        .map_err(|e| e.with_context(format!("failed to open {}", path.display())))?;
    write_file_atomic(&out_path, &plaintext)
        .map_err(|e| e.with_context(format!("failed to write to {}", out_path.display())))?;
    Ok(out_path)
}

/// Write file contents atomically with secure permissions (0o600 on Unix)
///
/// The contents land in a tempfile in the target directory which is flushed,
/// fsynced, and renamed over the destination, so a crash mid-write never
/// leaves a partial file at `path`.
fn write_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        SealtreeError::with_kind(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("{} has no parent directory", path.display()),
        )
    })?;
    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        SealtreeError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to create tempfile",
            e,
        )
    })?;

    temp_file.write_all(contents).map_err(|e| {
        SealtreeError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        SealtreeError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        SealtreeError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = temp_file
            .as_file()
            .metadata()
            .map_err(|e| {
                SealtreeError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to get tempfile metadata",
                    e,
                )
            })?
            .permissions();
        perms.set_mode(0o600);
        temp_file.as_file().set_permissions(perms).map_err(|e| {
            SealtreeError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to set tempfile permissions",
                e,
            )
        })?;
    }

    temp_file.persist(path).map_err(|e| {
        SealtreeError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

fn read_error(path: &Path, err: io::Error) -> SealtreeError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    SealtreeError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}
