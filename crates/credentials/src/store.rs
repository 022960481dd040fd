//! Multi-user credential store backed by a single JSON file, with
//! optional at-rest encryption when a process-wide secret is present.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use booking_domain::{Error, Result};

use crate::encryption;

const DEFAULT_TTL_HOURS: i64 = 4;
const DEFAULT_KEY: &str = "__default__";

/// On-disk record for a single user (version-2 shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    cookie: String,
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    nickname: Option<String>,
}

/// The version-2 on-disk file shape.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct FileShape {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    cookies: HashMap<String, StoredRecord>,
    #[serde(default)]
    active_user: Option<String>,
    /// Legacy single-cookie fields, read once then migrated away.
    #[serde(default)]
    cookie: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

/// A resolved, in-memory credential record (no longer tied to the
/// on-disk optional fields).
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub cookie: String,
    pub expires_at: DateTime<Utc>,
    pub username: Option<String>,
    pub nickname: Option<String>,
}

impl CredentialRecord {
    /// §4.1: equality key is `username` when known, else `nickname`,
    /// else the `"__default__"` sentinel.
    pub fn key(&self) -> &str {
        self.username
            .as_deref()
            .or(self.nickname.as_deref())
            .unwrap_or(DEFAULT_KEY)
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub struct CredentialStore {
    path: PathBuf,
    secret: Option<String>,
    records: RwLock<HashMap<String, CredentialRecord>>,
    active_user: RwLock<Option<String>>,
}

impl CredentialStore {
    /// Loads the store from `path`, migrating a legacy single-cookie
    /// file and evicting expired entries in the same pass.
    pub fn new(path: impl Into<PathBuf>, secret: Option<String>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }

        let store = Self {
            path,
            secret,
            records: RwLock::new(HashMap::new()),
            active_user: RwLock::new(None),
        };
        store.load()?;
        Ok(store)
    }

    fn read_file(&self) -> Result<Option<FileShape>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read(&self.path).map_err(Error::Io)?;
        let json_bytes = match &self.secret {
            Some(secret) => {
                let text = String::from_utf8(raw)
                    .map_err(|e| Error::Other(format!("credentials file is not UTF-8: {e}")))?;
                encryption::decrypt(secret, text.trim())?
            }
            None => raw,
        };
        let shape: FileShape = match serde_json::from_slice(&json_bytes) {
            Ok(s) => s,
            Err(_) => return Ok(Some(FileShape::default())),
        };
        Ok(Some(shape))
    }

    fn write_file(&self, shape: &FileShape) -> Result<()> {
        let json = serde_json::to_vec(shape)?;
        let bytes = match &self.secret {
            Some(secret) => encryption::encrypt(secret, &json)?.into_bytes(),
            None => json,
        };
        std::fs::write(&self.path, bytes).map_err(Error::Io)?;
        Ok(())
    }

    /// Loads from disk, migrating the legacy shape and evicting expired
    /// entries, rewriting the file if anything changed.
    fn load(&self) -> Result<()> {
        let mut shape = match self.read_file()? {
            Some(s) => s,
            None => return Ok(()),
        };

        let mut changed = false;

        if shape.cookies.is_empty() {
            if let Some(cookie) = shape.cookie.take() {
                shape.cookies.insert(
                    DEFAULT_KEY.to_string(),
                    StoredRecord {
                        cookie,
                        expires_at: shape.expires_at.take(),
                        updated_at: None,
                        username: None,
                        nickname: None,
                    },
                );
                shape.active_user = Some(DEFAULT_KEY.to_string());
                changed = true;
            }
        }
        if shape.version != 2 {
            shape.version = 2;
            changed = true;
        }

        let now = Utc::now();
        let mut resolved = HashMap::new();
        let mut stale = Vec::new();

        for (key, entry) in shape.cookies.iter() {
            let expires_at = entry
                .expires_at
                .unwrap_or_else(|| now + Duration::hours(DEFAULT_TTL_HOURS));
            if expires_at < now {
                stale.push(key.clone());
                continue;
            }
            let username = entry
                .username
                .clone()
                .or_else(|| (key != DEFAULT_KEY).then(|| key.clone()));
            resolved.insert(
                key.clone(),
                CredentialRecord {
                    cookie: entry.cookie.clone(),
                    expires_at,
                    username,
                    nickname: entry.nickname.clone(),
                },
            );
        }

        if !stale.is_empty() {
            for key in &stale {
                shape.cookies.remove(key);
            }
            changed = true;
        }

        *self.records.write() = resolved;
        *self.active_user.write() = shape.active_user.clone();

        if changed {
            self.write_file(&shape)?;
        }

        Ok(())
    }

    fn to_file_shape(&self) -> FileShape {
        let records = self.records.read();
        let cookies = records
            .iter()
            .map(|(key, record)| {
                (
                    key.clone(),
                    StoredRecord {
                        cookie: record.cookie.clone(),
                        expires_at: Some(record.expires_at),
                        updated_at: Some(Utc::now()),
                        username: record.username.clone(),
                        nickname: record.nickname.clone(),
                    },
                )
            })
            .collect();
        FileShape {
            version: 2,
            cookies,
            active_user: self.active_user.read().clone(),
            cookie: None,
            expires_at: None,
        }
    }

    fn persist(&self) -> Result<()> {
        let shape = self.to_file_shape();
        self.write_file(&shape)
    }

    /// `LoadAll() → (map[userkey]Record, activeKey?)`.
    pub fn load_all(&self) -> (HashMap<String, CredentialRecord>, Option<String>) {
        (self.records.read().clone(), self.active_user.read().clone())
    }

    /// `Load(user?) → (cookie, expires_at)?`. Falls back to the active
    /// user, then to an arbitrary entry, when `user` is absent.
    pub fn load(&self, user: Option<&str>) -> Option<(String, DateTime<Utc>)> {
        let records = self.records.read();
        let active = self.active_user.read();

        let key = user
            .filter(|u| records.contains_key(*u))
            .or_else(|| active.as_deref().filter(|a| records.contains_key(*a)))
            .or_else(|| records.keys().next().map(String::as_str))?;

        let record = records.get(key)?;
        Some((record.cookie.clone(), record.expires_at))
    }

    /// `Save(cookie, expires_at, username?, nickname?)`.
    pub fn save(
        &self,
        cookie: String,
        expires_at: Option<DateTime<Utc>>,
        username: Option<String>,
        nickname: Option<String>,
    ) -> Result<()> {
        let expires_at = expires_at.unwrap_or_else(|| Utc::now() + Duration::hours(DEFAULT_TTL_HOURS));

        let record = CredentialRecord {
            cookie,
            expires_at,
            username,
            nickname,
        };
        let key = record.key().to_string();

        {
            let mut records = self.records.write();
            records.insert(key.clone(), record);
        }
        *self.active_user.write() = Some(key);

        self.persist()
    }

    /// `SetActive(userkey?) → bool`. Passing `None` clears the active
    /// user; passing `Some` requires the key to already exist.
    pub fn set_active(&self, userkey: Option<&str>) -> Result<bool> {
        match userkey {
            None => {
                *self.active_user.write() = None;
                self.persist()?;
                Ok(true)
            }
            Some(key) => {
                if !self.records.read().contains_key(key) {
                    return Ok(false);
                }
                *self.active_user.write() = Some(key.to_string());
                self.persist()?;
                Ok(true)
            }
        }
    }

    /// `Delete(userkey) → bool`.
    pub fn delete(&self, userkey: &str) -> Result<bool> {
        let removed = self.records.write().remove(userkey).is_some();
        if removed {
            let mut active = self.active_user.write();
            if active.as_deref() == Some(userkey) {
                *active = None;
            }
            drop(active);
            self.persist()?;
        }
        Ok(removed)
    }

    /// `Clear()`.
    pub fn clear(&self) -> Result<()> {
        self.records.write().clear();
        *self.active_user.write() = None;
        self.persist()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("booking-credentials-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("credentials.json")
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = CredentialStore::new(temp_path(), None).unwrap();
        store
            .save("cookie-value".into(), None, Some("alice".into()), None)
            .unwrap();
        let (cookie, _expires) = store.load(Some("alice")).unwrap();
        assert_eq!(cookie, "cookie-value");
    }

    #[test]
    fn load_falls_back_to_active_user() {
        let store = CredentialStore::new(temp_path(), None).unwrap();
        store
            .save("a-cookie".into(), None, Some("alice".into()), None)
            .unwrap();
        let (cookie, _) = store.load(None).unwrap();
        assert_eq!(cookie, "a-cookie");
    }

    #[test]
    fn migrates_legacy_single_cookie_file() {
        let path = temp_path();
        std::fs::write(
            &path,
            r#"{"cookie":"legacy-cookie","expires_at":"2099-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        let store = CredentialStore::new(&path, None).unwrap();
        let (cookies, active) = store.load_all();
        assert!(cookies.contains_key("__default__"));
        assert_eq!(active.as_deref(), Some("__default__"));
    }

    #[test]
    fn expired_entries_are_evicted_on_load() {
        let path = temp_path();
        std::fs::write(
            &path,
            r#"{"version":2,"cookies":{"alice":{"cookie":"stale","expires_at":"2000-01-01T00:00:00Z"}}}"#,
        )
        .unwrap();
        let store = CredentialStore::new(&path, None).unwrap();
        assert!(store.load(Some("alice")).is_none());
    }

    #[test]
    fn delete_clears_active_user_when_it_matches() {
        let store = CredentialStore::new(temp_path(), None).unwrap();
        store
            .save("c".into(), None, Some("alice".into()), None)
            .unwrap();
        store.delete("alice").unwrap();
        let (_, active) = store.load_all();
        assert!(active.is_none());
    }

    #[test]
    fn encrypted_round_trip_through_a_fresh_store_instance() {
        let path = temp_path();
        {
            let store = CredentialStore::new(&path, Some("process-secret".into())).unwrap();
            store
                .save("secret-cookie".into(), None, Some("bob".into()), None)
                .unwrap();
        }
        let reopened = CredentialStore::new(&path, Some("process-secret".into())).unwrap();
        let (cookie, _) = reopened.load(Some("bob")).unwrap();
        assert_eq!(cookie, "secret-cookie");
    }

    #[test]
    fn default_key_used_when_username_absent() {
        let store = CredentialStore::new(temp_path(), None).unwrap();
        store.save("anon-cookie".into(), None, None, None).unwrap();
        let (cookies, _) = store.load_all();
        assert!(cookies.contains_key("__default__"));
    }

    #[test]
    fn nickname_used_as_key_when_username_absent() {
        let store = CredentialStore::new(temp_path(), None).unwrap();
        store
            .save("alice-cookie".into(), None, None, Some("Alice".into()))
            .unwrap();
        let (cookies, active) = store.load_all();
        assert!(cookies.contains_key("Alice"));
        assert!(!cookies.contains_key(DEFAULT_KEY));
        assert_eq!(active.as_deref(), Some("Alice"));
    }

    #[test]
    fn nickname_only_save_does_not_overwrite_unrelated_default_record() {
        let store = CredentialStore::new(temp_path(), None).unwrap();
        store.save("anon-cookie".into(), None, None, None).unwrap();
        store
            .save("alice-cookie".into(), None, None, Some("Alice".into()))
            .unwrap();
        let (cookies, _) = store.load_all();
        assert_eq!(cookies.get(DEFAULT_KEY).unwrap().cookie, "anon-cookie");
        assert_eq!(cookies.get("Alice").unwrap().cookie, "alice-cookie");
    }
}
