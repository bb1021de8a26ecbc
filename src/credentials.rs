//! Scoped bearer-token store.
//!
//! The token lives in a plain file under the app directory. Absence is not
//! an error; the client simply sends unauthenticated requests.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;

const TOKEN_FILE: &str = "credentials";

pub fn token_path() -> Result<PathBuf> {
    Ok(Config::get_app_dir()?.join(TOKEN_FILE))
}

/// Read the stored bearer token, if any. Unreadable or empty files count as
/// "no token".
pub fn load_token() -> Option<String> {
    let path = token_path().ok()?;
    load_token_from(&path)
}

pub fn load_token_from(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    let token = contents.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

pub fn store_token(token: &str) -> Result<()> {
    store_token_at(&token_path()?, token)
}

pub fn store_token_at(path: &Path, token: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, token.trim())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_means_no_token() {
        let dir = tempdir().unwrap();
        assert!(load_token_from(&dir.path().join("credentials")).is_none());
    }

    #[test]
    fn blank_file_means_no_token() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials");
        fs::write(&path, "   \n").unwrap();
        assert!(load_token_from(&path).is_none());
    }

    #[test]
    fn stored_token_is_trimmed_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deep").join("credentials");
        store_token_at(&path, "  secret-token\n").unwrap();
        assert_eq!(load_token_from(&path).as_deref(), Some("secret-token"));
    }
}
