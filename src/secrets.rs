// File-backed credential store. Read-only at runtime aside from `reload`,
// which re-scans the directory (the SIGHUP-equivalent the spec calls for).
//
// Permission policy: a credential file readable by group or other is a
// warning in dev/test, fatal in prod (`Environment::Prod`).

use crate::error::ForgeError;
use crate::github::types::Environment;
use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential(***)")
    }
}

#[derive(Debug)]
pub struct SecretStore {
    dir: PathBuf,
    environment: Environment,
    credentials: HashMap<String, Credential>,
}

impl SecretStore {
    pub fn load(dir: impl Into<PathBuf>, environment: Environment) -> Result<Self, ForgeError> {
        let dir = dir.into();
        let mut store = Self {
            dir,
            environment,
            credentials: HashMap::new(),
        };
        store.reload()?;
        Ok(store)
    }

    /// Re-scans the secrets directory, replacing the in-memory table.
    pub fn reload(&mut self) -> Result<(), ForgeError> {
        let mut credentials = HashMap::new();
        if !self.dir.exists() {
            return Err(ForgeError::Fatal(format!(
                "secrets directory {:?} does not exist",
                self.dir
            )));
        }
        for entry in fs::read_dir(&self.dir)
            .map_err(|e| ForgeError::Fatal(format!("reading secrets dir: {e}")))?
        {
            let entry = entry.map_err(|e| ForgeError::Fatal(format!("reading secrets dir: {e}")))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let credential_ref = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            self.check_permissions(&path)?;
            let contents = fs::read_to_string(&path)
                .map_err(|e| ForgeError::Fatal(format!("reading {path:?}: {e}")))?;
            credentials.insert(credential_ref, Credential(contents.trim().to_string()));
        }
        self.credentials = credentials;
        Ok(())
    }

    fn check_permissions(&self, path: &Path) -> Result<(), ForgeError> {
        let mode = fs::metadata(path)
            .map_err(|e| ForgeError::Fatal(format!("stat {path:?}: {e}")))?
            .permissions()
            .mode();
        if mode & 0o077 != 0 {
            let msg = format!(
                "credential file {path:?} is group/world readable (mode {mode:o})"
            );
            if self.environment == Environment::Prod {
                return Err(ForgeError::Fatal(msg));
            }
            warn!("{msg}");
        }
        Ok(())
    }

    pub fn get(&self, credential_ref: &str) -> Result<&Credential, ForgeError> {
        self.credentials
            .get(credential_ref)
            .ok_or_else(|| ForgeError::NotFound(format!("credential {credential_ref}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_world_readable_in_prod_and_warns_in_dev() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("tok");
        fs::write(&file, "secret-value").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();

        let dev = SecretStore::load(dir.path(), Environment::Dev).unwrap();
        assert_eq!(dev.get("tok").unwrap().expose(), "secret-value");

        let prod = SecretStore::load(dir.path(), Environment::Prod);
        assert!(prod.is_err());
    }

    #[test]
    fn missing_credential_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SecretStore::load(dir.path(), Environment::Dev).unwrap();
        assert!(matches!(store.get("nope"), Err(ForgeError::NotFound(_))));
    }
}
