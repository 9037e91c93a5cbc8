//! User registry loading.
//!
//! Users come from exactly one of three places, in order of preference:
//! inline `USERS_JSON`, a `USERS_FILE` document, or the single-admin
//! `ADMIN_PASSWORD` fallback. Every declared root is created if missing,
//! canonicalized, and proven to sit inside `FILE_ROOT` before the user is
//! accepted; a registry with a bad root never loads at all.

use crate::Settings;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::Deserialize;
use stash_auth::{Role, Secret, User};
use std::fs;
use std::path::Path;

/// One user as declared in the users document.
#[derive(Debug, Deserialize)]
struct RawUser {
    username: String,
    password: String,
    #[serde(default = "default_role")]
    role: Role,
    /// Virtual root, POSIX form; defaults to the whole file root.
    #[serde(default = "default_root")]
    root: String,
}

fn default_role() -> Role {
    Role::ReadWrite
}

fn default_root() -> String {
    "/".to_string()
}

/// Load and vet the user registry.
pub fn load_users(settings: &Settings) -> Result<Vec<User>> {
    let raw = raw_users(settings)?;
    if raw.is_empty() {
        exn::bail!(ErrorKind::NoUsers);
    }
    let file_root = fs::canonicalize(&settings.file_root)
        .or_raise(|| ErrorKind::Root("FILE_ROOT".to_string()))?;
    let mut users = Vec::with_capacity(raw.len());
    for user in raw {
        users.push(vet(user, &file_root)?);
    }
    tracing::info!(count = users.len(), "loaded user registry");
    Ok(users)
}

fn raw_users(settings: &Settings) -> Result<Vec<RawUser>> {
    if let Some(json) = &settings.users_json {
        return serde_json::from_str(json).or_raise(|| ErrorKind::Users("USERS_JSON".to_string()));
    }
    if let Some(path) = &settings.users_file {
        let contents =
            fs::read_to_string(path).or_raise(|| ErrorKind::Users(path.display().to_string()))?;
        return serde_json::from_str(&contents)
            .or_raise(|| ErrorKind::Users(path.display().to_string()));
    }
    if let Some(password) = &settings.admin_password {
        return Ok(vec![RawUser {
            username: "admin".to_string(),
            password: password.clone(),
            role: Role::Admin,
            root: "/".to_string(),
        }]);
    }
    exn::bail!(ErrorKind::NoUsers);
}

fn vet(raw: RawUser, file_root: &Path) -> Result<User> {
    if !raw.root.starts_with('/') {
        exn::bail!(ErrorKind::Root(raw.username));
    }
    // Refuse dot-dot segments outright rather than creating a directory
    // somewhere surprising and rejecting it afterwards.
    if raw.root.split('/').any(|segment| segment == "..") {
        exn::bail!(ErrorKind::Root(raw.username));
    }
    let declared = file_root.join(raw.root.trim_start_matches('/'));
    fs::create_dir_all(&declared).or_raise(|| ErrorKind::Root(raw.username.clone()))?;
    let root_real =
        fs::canonicalize(&declared).or_raise(|| ErrorKind::Root(raw.username.clone()))?;
    if root_real != file_root && !root_real.starts_with(file_root) {
        exn::bail!(ErrorKind::Root(raw.username));
    }
    let secret = Secret::parse(&raw.password, &raw.username)
        .or_raise(|| ErrorKind::Users(raw.username.clone()))?;
    Ok(User {
        username: raw.username,
        role: raw.role,
        root_path: raw.root,
        root_real,
        secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn settings(file_root: &Path) -> Settings {
        Settings {
            file_root: file_root.to_path_buf(),
            session_secret: "s".to_string(),
            admin_password: None,
            users_file: None,
            users_json: None,
            archive_large_mb: 100,
            search_max_bytes: 200 * 1024,
            audit_log_path: PathBuf::from("audit.log"),
            max_s3_connections: 5,
            settings_path: PathBuf::from("data/settings.json"),
        }
    }

    #[test]
    fn inline_users_json_loads_and_creates_roots() {
        let tmp = tempfile::tempdir().unwrap();
        let mut settings = settings(tmp.path());
        settings.users_json = Some(
            r#"[
                {"username": "alice", "password": "pw", "role": "admin", "root": "/alice"},
                {"username": "bob", "password": "pw", "role": "read-only"}
            ]"#
            .to_string(),
        );
        let users = load_users(&settings).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].username, "alice");
        assert!(users[0].role.is_admin());
        assert!(users[0].root_real.ends_with("alice"));
        assert!(users[0].root_real.is_dir());
        assert_eq!(users[1].root_path, "/");
        assert!(!users[1].role.can_write());
    }

    #[test]
    fn users_file_is_read_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let users_path = tmp.path().join("users.json");
        std::fs::write(
            &users_path,
            r#"[{"username": "carol", "password": "pw"}]"#,
        )
        .unwrap();
        let mut settings = settings(tmp.path());
        settings.users_file = Some(users_path);
        let users = load_users(&settings).unwrap();
        assert_eq!(users[0].username, "carol");
        assert!(users[0].role.can_write());
    }

    #[test]
    fn admin_password_fallback_creates_a_single_admin() {
        let tmp = tempfile::tempdir().unwrap();
        let mut settings = settings(tmp.path());
        settings.admin_password = Some("top-secret".to_string());
        let users = load_users(&settings).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "admin");
        assert!(users[0].role.is_admin());
        assert!(users[0].secret.verify("top-secret"));
    }

    #[test]
    fn roots_outside_file_root_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut settings = settings(tmp.path());
        settings.users_json = Some(
            r#"[{"username": "evil", "password": "pw", "root": "/../../outside"}]"#.to_string(),
        );
        let err = load_users(&settings).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Root(_)));
    }

    #[test]
    fn relative_roots_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut settings = settings(tmp.path());
        settings.users_json =
            Some(r#"[{"username": "evil", "password": "pw", "root": "plain"}]"#.to_string());
        assert!(load_users(&settings).is_err());
    }

    #[test]
    fn no_user_source_at_all_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_users(&settings(tmp.path())).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NoUsers));
    }
}
