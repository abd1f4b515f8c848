//! SSH private key loading

use std::path::Path;
use std::sync::Arc;

use russh::keys::decode_secret_key;
use russh::keys::ssh_key::PrivateKey;
use tracing::{debug, warn};

use crate::error::ExecError;

/// Read and parse an unencrypted private key from `path`
///
/// Both failure modes are permanent, so callers must not retry them.
///
/// # Errors
/// Returns `ExecError::Credential` if the file cannot be read or does not
/// contain a supported private key
pub fn load_credential(path: &Path) -> Result<Arc<PrivateKey>, ExecError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ExecError::Credential {
        path: path.to_path_buf(),
        reason: format!("failed to read key file: {e}"),
    })?;

    let key = decode_secret_key(&contents, None).map_err(|e| ExecError::Credential {
        path: path.to_path_buf(),
        reason: format!("failed to parse private key: {e}"),
    })?;

    check_permissions(path);
    debug!(path = %path.display(), algorithm = %key.algorithm(), "loaded SSH key");

    Ok(Arc::new(key))
}

#[cfg(unix)]
fn check_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let Ok(metadata) = std::fs::metadata(path) else {
        return;
    };

    // group/other bits set
    if metadata.permissions().mode() & 0o77 != 0 {
        warn!(path = %path.display(), "SSH key permissions too open (should be 600)");
    }
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path) {}
