//! Admin console and support staff credentials loaded from a TOML file.
//!
//! ## Credentials file format
//!
//! ```toml
//! [[admins]]
//! username = "owner"
//! password = "secret"
//!
//! [[support]]
//! username = "suporte"
//! password = "pw"
//! name = "Equipe Suporte"
//! email = "suporte@example.com"
//! ```
//!
//! Duplicate usernames are deduplicated (last wins). Empty usernames or passwords are skipped.
//! Without a file the admin console login is disabled and no support staff are provisioned.
//!
//! **Security:** Use `chmod 600` on the credentials file. The server warns if it is
//! world-readable (Unix).

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    admins: BTreeMap<String, String>,
    support: BTreeMap<String, SupportAccount>,
}

/// A support staff account as written in the credentials file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SupportAccount {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdminAccount {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(admins: Vec<AdminAccount>, support: Vec<SupportAccount>) -> Self {
        let mut admin_map = BTreeMap::new();
        for account in admins {
            let username = account.username.trim().to_string();
            let password = account.password.trim().to_string();
            if username.is_empty() || password.is_empty() {
                continue;
            }
            admin_map.insert(username, password);
        }

        let mut support_map = BTreeMap::new();
        for account in support {
            let username = account.username.trim().to_string();
            let password = account.password.trim().to_string();
            if username.is_empty() || password.is_empty() {
                continue;
            }
            let name = match account.name.trim() {
                "" => username.clone(),
                name => name.to_string(),
            };
            support_map.insert(
                username.clone(),
                SupportAccount {
                    username,
                    password,
                    name,
                    email: account.email.trim().to_string(),
                },
            );
        }

        Self {
            admins: admin_map,
            support: support_map,
        }
    }

    pub fn admin_login_enabled(&self) -> bool {
        !self.admins.is_empty()
    }

    pub fn admin_count(&self) -> usize {
        self.admins.len()
    }

    pub fn support_accounts(&self) -> impl Iterator<Item = &SupportAccount> {
        self.support.values()
    }

    pub fn is_admin_authorized(&self, username: &str, password: &str) -> bool {
        self.admins.get(username).is_some_and(|known_password| {
            let a = password.as_bytes();
            let b = known_password.as_bytes();
            a.ct_eq(b).into()
        })
    }
}

/// `salt$digest`, where `digest` is the hex SHA-256 of the salt followed by
/// the password. Stored in `support_staff.password_hash`.
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let digest = salted_digest(&salt, password);
    format!("{salt}${digest}")
}

fn salted_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();

    let mut encoded = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(encoded, "{byte:02x}");
    }
    encoded
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Some((salt, digest)) = stored_hash.split_once('$') else {
        return false;
    };
    let candidate = salted_digest(salt, password);
    candidate.as_bytes().ct_eq(digest.as_bytes()).into()
}

#[derive(Debug, Error)]
pub enum AuthFileError {
    #[error("failed to read credentials file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid credentials file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("credentials file {path} does not define any valid account")]
    EmptyCredentials { path: String },
}

#[derive(Debug, Default, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    admins: Vec<AdminAccount>,
    #[serde(default)]
    support: Vec<SupportAccount>,
}

/// Loads credentials from `path`, or empty credentials when there is none.
/// A file that defines no usable account is an error.
pub fn load_credentials(path: Option<&Path>) -> Result<Credentials, AuthFileError> {
    let Some(path) = path else {
        return Ok(Credentials::default());
    };
    check_credentials_file_permissions(path);

    let raw = std::fs::read_to_string(path).map_err(|source| AuthFileError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let parsed: CredentialsFile = toml::from_str(&raw).map_err(|source| AuthFileError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    let credentials = Credentials::new(parsed.admins, parsed.support);
    if credentials.admins.is_empty() && credentials.support.is_empty() {
        return Err(AuthFileError::EmptyCredentials {
            path: path.display().to_string(),
        });
    }
    Ok(credentials)
}

/// Warn if the credentials file is world-readable. No-op on non-Unix.
#[cfg(unix)]
fn check_credentials_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = std::fs::metadata(path) {
        let mode = meta.permissions().mode();
        if mode & 0o004 != 0 {
            warn!(
                path = %path.display(),
                "credentials file is world-readable; consider chmod 600"
            );
        }
    }
}

#[cfg(not(unix))]
fn check_credentials_file_permissions(_path: &Path) {}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use super::{hash_password, load_credentials, verify_password, AdminAccount, Credentials};

    fn admin(username: &str, password: &str) -> AdminAccount {
        AdminAccount {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn duplicate_admins_keep_last_password() {
        let credentials = Credentials::new(
            vec![admin("owner", "pw1"), admin("owner", "pw2"), admin("  ", "x")],
            Vec::new(),
        );

        assert_eq!(credentials.admin_count(), 1);
        assert!(credentials.is_admin_authorized("owner", "pw2"));
        assert!(!credentials.is_admin_authorized("owner", "pw1"));
        assert!(!credentials.is_admin_authorized("other", "pw2"));
    }

    #[test]
    fn file_parses_admins_and_support() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("credentials.toml");
        std::fs::write(
            &path,
            "[[admins]]\nusername = \"owner\"\npassword = \"pw\"\n\
             [[support]]\nusername = \"suporte\"\npassword = \"s3\"\nemail = \"s@example.com\"\n",
        )?;

        let credentials = load_credentials(Some(&path))?;
        assert!(credentials.admin_login_enabled());
        let support: Vec<_> = credentials.support_accounts().collect();
        assert_eq!(support.len(), 1);
        assert_eq!(support[0].name, "suporte");
        assert_eq!(support[0].email, "s@example.com");
        Ok(())
    }

    #[test]
    fn file_without_accounts_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        std::fs::write(&path, "[[admins]]\nusername = \"\"\npassword = \"\"\n").unwrap();

        assert!(load_credentials(Some(&path)).is_err());
    }

    #[test]
    fn missing_path_disables_console_login() {
        let credentials = load_credentials(None).unwrap();
        assert!(!credentials.admin_login_enabled());
        assert!(!credentials.is_admin_authorized("", ""));
    }

    #[test]
    fn password_hash_round_trips() {
        let hash = hash_password("segredo");
        assert!(verify_password("segredo", &hash));
        assert!(!verify_password("Segredo", &hash));
        assert!(!verify_password("segredo", "not-a-salted-hash"));
    }

    #[test]
    fn same_password_gets_a_fresh_salt_per_account() {
        let first = hash_password("segredo");
        let second = hash_password("segredo");
        assert_ne!(first, second);
        assert_ne!(first.split_once('$').unwrap().0, second.split_once('$').unwrap().0);
        assert!(verify_password("segredo", &second));
    }
}
