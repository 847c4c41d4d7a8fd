//! Content hash of a playbook and the roles it uses.
//!
//! The hash changes whenever the playbook file or any file under a role it
//! references changes, which lets a caller decide whether a non-replayable
//! run has to be repeated. Roles are looked up as `roles/<name>` next to the
//! playbook. Each role directory is hashed once, in the order roles first
//! appear, with files visited in lexical path order. The playbook file itself
//! is hashed last.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct PlayRoles {
    #[serde(default)]
    roles: Vec<RoleRef>,
}

/// A role listed either by name or as a mapping with a `role`/`name` key.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RoleRef {
    Name(String),
    Mapping {
        #[serde(alias = "name")]
        role: String,
    },
}

impl RoleRef {
    fn into_name(self) -> String {
        match self {
            RoleRef::Name(name) | RoleRef::Mapping { role: name } => name,
        }
    }
}

/// Roles referenced by the plays of a playbook, deduplicated in first-seen order.
pub fn playbook_roles(playbook: impl AsRef<Path>) -> Result<Vec<String>> {
    let playbook = playbook.as_ref();
    let content = fs::read_to_string(playbook)
        .map_err(|e| Error::hash(playbook, format!("couldn't read playbook: {e}")))?;
    let plays: Vec<PlayRoles> = serde_yaml::from_str(&content)
        .map_err(|e| Error::hash(playbook, format!("couldn't parse playbook roles: {e}")))?;

    let mut roles: Vec<String> = Vec::new();
    for role in plays.into_iter().flat_map(|play| play.roles) {
        let name = role.into_name();
        if !roles.contains(&name) {
            roles.push(name);
        }
    }
    Ok(roles)
}

/// Lowercase hex SHA-256 over the playbook's roles and the playbook itself.
pub fn playbook_hash(playbook: impl AsRef<Path>) -> Result<String> {
    let playbook = playbook.as_ref();
    let roles = playbook_roles(playbook)?;
    let roles_dir = playbook
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
        .join("roles");

    let mut hasher = Sha256::new();
    for role in &roles {
        hash_directory(&mut hasher, &roles_dir.join(role))?;
    }
    hash_file(&mut hasher, playbook)?;

    let digest = hex(&hasher.finalize());
    debug!(playbook = %playbook.display(), roles = ?roles, hash = %digest, "Computed playbook hash");
    Ok(digest)
}

fn hash_directory(hasher: &mut Sha256, dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(Error::hash(dir, "role directory does not exist"));
    }
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
            Error::hash(path, e.to_string())
        })?;
        if entry.file_type().is_file() {
            hash_file(hasher, entry.path())?;
        }
    }
    Ok(())
}

fn hash_file(hasher: &mut Sha256, path: &Path) -> Result<()> {
    let content = fs::read(path).map_err(|e| Error::hash(PathBuf::from(path), e.to_string()))?;
    hasher.update(&content);
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
