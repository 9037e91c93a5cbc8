//! Per-session S3 connection registry.
//!
//! Process-wide map from `(session, configuration)` to a live adapter.
//! Sessions themselves are stateless tokens, so this registry is the only
//! server-side session state there is, and it is not replicated: each
//! node maintains its own.
//!
//! The cap is on *distinct configurations* live across the whole process,
//! not on bindings: any number of sessions may share an already-live
//! configuration. Cap check and insertion happen under one critical
//! section so two racing attaches cannot both squeeze past the limit.

use crate::error::{ErrorKind, Result};
use crate::profiles::S3ConfigProfile;
use stash_storage::BackendHandle;
use stash_storage::backend::S3Adapter;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub struct S3ConnectionRegistry {
    max_connections: usize,
    bindings: Mutex<HashMap<(String, Uuid), BackendHandle>>,
}

impl S3ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            max_connections,
            bindings: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Bind a session to a profile, constructing the adapter if needed.
    ///
    /// Reattaching an existing binding hands back the same adapter.
    /// Attaching a configuration that is not yet live anywhere fails with
    /// `AtLimit` once the distinct-configuration cap is reached.
    pub fn attach(&self, session_id: &str, profile: &S3ConfigProfile) -> Result<BackendHandle> {
        // unwrap is safe: no panics while the lock is held
        let mut bindings = self.bindings.lock().unwrap();
        let key = (session_id.to_string(), profile.id);
        if let Some(existing) = bindings.get(&key) {
            return Ok(existing.clone());
        }
        let config_is_live = bindings.keys().any(|(_, id)| *id == profile.id);
        if !config_is_live {
            let distinct = {
                let mut ids: Vec<Uuid> = bindings.keys().map(|(_, id)| *id).collect();
                ids.sort_unstable();
                ids.dedup();
                ids.len()
            };
            if distinct >= self.max_connections {
                exn::bail!(ErrorKind::AtLimit(self.max_connections));
            }
        }
        let adapter: BackendHandle = Arc::new(adapter_for(profile));
        bindings.insert(key, adapter.clone());
        tracing::debug!(session = session_id, config = %profile.id, "attached S3 connection");
        Ok(adapter)
    }

    /// The adapter bound for this session and configuration.
    pub fn resolve(&self, session_id: &str, config_id: Uuid) -> Result<BackendHandle> {
        let bindings = self.bindings.lock().unwrap();
        bindings
            .get(&(session_id.to_string(), config_id))
            .cloned()
            .ok_or_else(|| ErrorKind::NotConnected.into())
    }

    /// Drop one binding, or every binding of the session when no
    /// configuration is named.
    pub fn detach(&self, session_id: &str, config_id: Option<Uuid>) {
        let mut bindings = self.bindings.lock().unwrap();
        match config_id {
            Some(config_id) => {
                bindings.remove(&(session_id.to_string(), config_id));
            }
            None => bindings.retain(|(session, _), _| session != session_id),
        }
    }

    /// Profile deletion invalidates every session bound to it.
    pub fn on_profile_deleted(&self, config_id: Uuid) {
        let mut bindings = self.bindings.lock().unwrap();
        let before = bindings.len();
        bindings.retain(|(_, id), _| *id != config_id);
        let dropped = before - bindings.len();
        if dropped > 0 {
            tracing::info!(config = %config_id, dropped, "dropped bindings for deleted profile");
        }
    }

    /// Configuration ids this session currently holds, for the
    /// connections overview surface.
    pub fn connected_ids(&self, session_id: &str) -> Vec<Uuid> {
        let bindings = self.bindings.lock().unwrap();
        let mut ids: Vec<Uuid> = bindings
            .keys()
            .filter(|(session, _)| session == session_id)
            .map(|(_, id)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

fn adapter_for(profile: &S3ConfigProfile) -> S3Adapter {
    S3Adapter::new(
        profile.bucket.clone(),
        profile.prefix.clone(),
        profile.region.clone(),
        profile.endpoint.clone(),
        profile.access_key_id.clone(),
        profile.secret_access_key.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> S3ConfigProfile {
        S3ConfigProfile {
            id: Uuid::new_v4(),
            name: name.to_string(),
            region: "us-east-1".to_string(),
            endpoint: Some("http://localhost:9000".to_string()),
            access_key_id: "AKIA".to_string(),
            secret_access_key: "shh".to_string(),
            bucket: "bucket".to_string(),
            prefix: None,
            is_default: None,
            active: None,
        }
    }

    #[test]
    fn the_cap_counts_distinct_configurations_not_bindings() {
        let registry = S3ConnectionRegistry::new(2);
        let a = profile("a");
        let b = profile("b");
        let c = profile("c");

        registry.attach("session-1", &a).unwrap();
        registry.attach("session-2", &b).unwrap();
        // A third distinct configuration is over the cap...
        let err = registry.attach("session-3", &c).err().expect("cap must apply");
        assert!(matches!(&*err, ErrorKind::AtLimit(2)));
        // ...but an already-live one attaches freely.
        registry.attach("session-3", &a).unwrap();
        assert_eq!(registry.connected_ids("session-3"), vec![a.id]);
    }

    #[test]
    fn reattach_returns_the_same_adapter() {
        let registry = S3ConnectionRegistry::new(1);
        let a = profile("a");
        let first = registry.attach("session-1", &a).unwrap();
        let second = registry.attach("session-1", &a).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn resolve_requires_an_attached_binding() {
        let registry = S3ConnectionRegistry::new(1);
        let a = profile("a");
        let err = registry.resolve("session-1", a.id).err().expect("nothing attached yet");
        assert!(matches!(&*err, ErrorKind::NotConnected));
        registry.attach("session-1", &a).unwrap();
        assert!(registry.resolve("session-1", a.id).is_ok());
        // Another session doesn't inherit the binding.
        assert!(registry.resolve("session-2", a.id).is_err());
    }

    #[test]
    fn detach_scopes_to_the_named_configuration_or_the_whole_session() {
        let registry = S3ConnectionRegistry::new(2);
        let a = profile("a");
        let b = profile("b");
        registry.attach("session-1", &a).unwrap();
        registry.attach("session-1", &b).unwrap();

        registry.detach("session-1", Some(a.id));
        assert_eq!(registry.connected_ids("session-1"), vec![b.id]);

        registry.detach("session-1", None);
        assert!(registry.connected_ids("session-1").is_empty());
        // Detaching freed the cap.
        registry.attach("session-2", &a).unwrap();
        registry.attach("session-2", &b).unwrap();
    }

    #[test]
    fn profile_deletion_drops_every_binding() {
        let registry = S3ConnectionRegistry::new(2);
        let a = profile("a");
        registry.attach("session-1", &a).unwrap();
        registry.attach("session-2", &a).unwrap();
        registry.on_profile_deleted(a.id);
        assert!(registry.resolve("session-1", a.id).is_err());
        assert!(registry.resolve("session-2", a.id).is_err());
    }
}
