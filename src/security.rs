//! Input validation and file permission helpers
//!
//! Every store enforces the same policy before touching its backend:
//! identifiers that end up inside a query (table, schema, key prefix) must
//! match a strict allow-list, and keys, scopes and values are size-bounded.

use crate::entry::ConfigEntry;
use crate::error::{Error, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Maximum key length, in characters
pub const MAX_KEY_LEN: usize = 256;

/// Maximum scope length, in characters
pub const MAX_SCOPE_LEN: usize = 128;

/// Maximum serialized value size, in bytes (100 MiB)
pub const MAX_VALUE_BYTES: usize = 100 * 1024 * 1024;

/// Maximum length of a backend identifier (Postgres' `NAMEDATALEN - 1`)
pub const MAX_IDENTIFIER_LEN: usize = 63;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is a valid regex")
});

// =============================================================================
// Identifier Validation
// =============================================================================

/// Check a backend identifier (table, schema, key prefix) against the allow-list
///
/// `kind` names the identifier in the error message.
///
/// # Errors
///
/// Returns `Error::InvalidIdentifier` if the name is empty, too long, or
/// contains anything other than ASCII letters, digits and underscores (or
/// starts with a digit).
pub fn validate_identifier(kind: &'static str, name: &str) -> Result<()> {
    let invalid = |reason: String| Error::InvalidIdentifier {
        kind,
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("must not be empty".into()));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid(format!(
            "must be at most {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    if !IDENTIFIER.is_match(name) {
        return Err(invalid(
            "only ASCII letters, digits and underscores are allowed, and it must not start with a digit"
                .into(),
        ));
    }
    Ok(())
}

// =============================================================================
// Entry Validation
// =============================================================================

/// Reject blank or over-long keys
///
/// # Errors
///
/// Returns `Error::InvalidArgument` for a blank key and
/// `Error::LimitExceeded` for one longer than [`MAX_KEY_LEN`].
pub fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::InvalidArgument("key must not be empty".into()));
    }
    check_len("key", key, key.chars().count(), MAX_KEY_LEN)
}

/// Reject over-long scopes (`None` is always valid)
///
/// # Errors
///
/// Returns `Error::LimitExceeded` if the scope is longer than [`MAX_SCOPE_LEN`].
pub fn validate_scope(scope: Option<&str>) -> Result<()> {
    match scope {
        Some(scope) => check_len("scope", scope, scope.chars().count(), MAX_SCOPE_LEN),
        None => Ok(()),
    }
}

/// Validate one entry about to be written under `scope`
///
/// # Errors
///
/// Returns the first violated limit.
pub fn validate_entry(entry: &ConfigEntry, scope: Option<&str>) -> Result<()> {
    validate_key(entry.key())?;
    validate_scope(scope)?;
    check_len(
        "value",
        entry.key(),
        entry.value().len(),
        MAX_VALUE_BYTES,
    )
}

fn check_len(what: &'static str, subject: &str, len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(Error::LimitExceeded {
            what,
            subject: truncate_for_message(subject),
            len,
            max,
        });
    }
    Ok(())
}

fn truncate_for_message(subject: &str) -> String {
    const SHOWN: usize = 32;
    if subject.chars().count() <= SHOWN {
        subject.to_string()
    } else {
        let head: String = subject.chars().take(SHOWN).collect();
        format!("{head}...")
    }
}

// =============================================================================
// File Permissions
// =============================================================================

/// Set restrictive permissions on a file (Unix: 0o600 - owner read/write only)
///
/// On Windows, this is a no-op as Windows uses ACLs differently.
///
/// # Errors
///
/// * `Error::FileRead` / `Error::FileWrite` - If the permissions cannot be read or changed
#[cfg(unix)]
pub fn set_secure_file_permissions(path: &Path) -> Result<()> {
    set_mode(path, 0o600)
}

/// Set restrictive permissions on a directory (Unix: 0o700 - owner rwx only)
///
/// # Errors
///
/// * `Error::FileRead` / `Error::FileWrite` - If the permissions cannot be read or changed
#[cfg(unix)]
pub fn set_secure_dir_permissions(path: &Path) -> Result<()> {
    set_mode(path, 0o700)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut perms = metadata.permissions();
    perms.set_mode(mode);

    fs::set_permissions(path, perms).map_err(|e| Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// No-op on Windows (permissions managed via ACLs)
#[cfg(not(unix))]
pub fn set_secure_file_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// No-op on Windows (permissions managed via ACLs)
#[cfg(not(unix))]
pub fn set_secure_dir_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Ensure a directory exists with secure permissions (Unix: 0o700)
///
/// Only directories created here are restricted; an existing directory keeps
/// its permissions.
///
/// # Errors
///
/// * `Error::DirectoryCreate` - If directory creation fails
pub fn ensure_secure_dir(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    std::fs::create_dir_all(path).map_err(|e| Error::DirectoryCreate {
        path: path.to_path_buf(),
        source: e,
    })?;

    set_secure_dir_permissions(path)
}
