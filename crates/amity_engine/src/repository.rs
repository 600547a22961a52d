//! User record repository.

use crate::config::EngineConfig;
use crate::error::{EngineResult, StoreResult};
use crate::store::{StoreClient, Subscription};
use amity_model::{
    AuthIdentity, Email, FriendEntry, Mapping, RequestEntry, StorePath, UserKey, UserRecord,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A stored record that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableRecord {
    /// Raw key of the record.
    pub key: String,
    /// The record's `email` field, if it is a string.
    pub email: Option<String>,
    /// Why decoding failed.
    pub error: String,
}

/// Result of reading the whole users collection.
#[derive(Debug, Clone, Default)]
pub struct UserScan {
    /// Records that decoded, by key.
    pub records: BTreeMap<UserKey, UserRecord>,
    /// Records that did not.
    pub unreadable: Vec<UnreadableRecord>,
}

impl UserScan {
    /// Returns true if the record stored under `key` failed to decode.
    pub fn is_unreadable(&self, key: &UserKey) -> bool {
        self.unreadable.iter().any(|r| r.key == key.as_str())
    }
}

/// Reads and patches user records through a store client.
///
/// Every write is scoped to a single mapping entry or a single field, so
/// concurrent writers touching different entries never clobber each other.
pub struct Repository<S: StoreClient> {
    store: S,
    users: StorePath,
    email_index: StorePath,
    use_email_index: bool,
}

impl<S: StoreClient> Repository<S> {
    /// Creates a repository for the collections named in `config`.
    pub fn new(config: &EngineConfig, store: S) -> EngineResult<Self> {
        Ok(Self {
            store,
            users: config.users_path()?,
            email_index: config.email_index_path()?,
            use_email_index: config.use_email_index,
        })
    }

    /// Returns the underlying store client.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the users collection path.
    pub fn users_path(&self) -> &StorePath {
        &self.users
    }

    /// Returns the path of a user record.
    pub fn record_path(&self, key: &UserKey) -> StorePath {
        self.users.key(key)
    }

    /// Returns the path of one mapping of a user record.
    pub fn mapping_path(&self, owner: &UserKey, mapping: Mapping) -> StorePath {
        self.users.key(owner).mapping(mapping)
    }

    fn index_path(&self, email: &Email) -> EngineResult<StorePath> {
        Ok(self.email_index.child(&email.index_segment())?)
    }

    /// Subscribes to change events on the users collection.
    pub async fn subscribe_users(&self) -> StoreResult<Subscription> {
        self.store.subscribe(&self.users).await
    }

    /// Creates a new user record and its email index entry.
    ///
    /// The record is written first. If the index write fails the record is
    /// still usable: lookups fall back to a scan and repair the index.
    pub async fn create_user(
        &self,
        identity: &AuthIdentity,
        avatar_url: &str,
    ) -> EngineResult<UserKey> {
        let mut record = UserRecord::new(identity.email.clone(), avatar_url);
        record.uid = identity.uid.clone();

        let key = self.store.push(&self.users, record.to_value()?).await?;
        let key = UserKey::new(key)?;
        debug!(key = %key, email = %identity.email, "created user record");

        if self.use_email_index {
            let path = self.index_path(&identity.email)?;
            if let Err(e) = self
                .store
                .write(&path, Value::String(key.as_str().to_string()))
                .await
            {
                warn!(key = %key, error = %e, "email index write failed, lookups will scan");
            }
        }
        Ok(key)
    }

    /// Reads a user record.
    pub async fn read_user(&self, key: &UserKey) -> EngineResult<Option<UserRecord>> {
        match self.store.read(&self.record_path(key)).await? {
            Some(value) => Ok(Some(UserRecord::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Reads every user record. Records that fail to decode are skipped.
    pub async fn list_users(&self) -> EngineResult<BTreeMap<UserKey, UserRecord>> {
        Ok(self.scan_users().await?.records)
    }

    /// Reads every user record, reporting the ones that fail to decode.
    pub async fn scan_users(&self) -> EngineResult<UserScan> {
        let Some(Value::Object(children)) = self.store.read(&self.users).await? else {
            return Ok(UserScan::default());
        };

        let mut scan = UserScan::default();
        for (key, value) in children {
            let email = value.get("email").and_then(Value::as_str).map(String::from);
            let decoded = UserKey::new(key.clone())
                .and_then(|k| UserRecord::from_value(value).map(|record| (k, record)));
            match decoded {
                Ok((key, record)) => {
                    scan.records.insert(key, record);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping undecodable user record");
                    scan.unreadable.push(UnreadableRecord {
                        key,
                        email,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(scan)
    }

    /// Finds the record key for an email.
    ///
    /// Consults the email index first. A missing or stale index entry falls
    /// back to a linear scan, and a scan hit rewrites the index entry. A
    /// record carrying the email that fails to decode is reported as the
    /// decode error rather than as absent.
    pub async fn find_key_by_email(&self, email: &Email) -> EngineResult<Option<UserKey>> {
        if self.use_email_index {
            let path = self.index_path(email)?;
            if let Some(Value::String(key)) = self.store.read(&path).await? {
                let key = UserKey::new(key)?;
                match self.read_user(&key).await? {
                    Some(record) if &record.email == email => return Ok(Some(key)),
                    _ => debug!(key = %key, email = %email, "stale email index entry"),
                }
            }
        }

        let scan = self.scan_users().await?;
        let mut found = scan
            .records
            .into_iter()
            .find(|(_, record)| &record.email == email)
            .map(|(key, _)| key);

        if found.is_none() {
            let unreadable = scan
                .unreadable
                .iter()
                .find(|r| r.email.as_deref() == Some(email.as_str()));
            if let Some(unreadable) = unreadable {
                let key = UserKey::new(unreadable.key.clone())?;
                // Re-reading yields the decode error, or the record if it was fixed meanwhile
                found = self.read_user(&key).await?.map(|_| key);
            }
        }

        if let (true, Some(key)) = (self.use_email_index, &found) {
            let path = self.index_path(email)?;
            if let Err(e) = self
                .store
                .write(&path, Value::String(key.as_str().to_string()))
                .await
            {
                warn!(key = %key, error = %e, "email index repair failed");
            } else {
                debug!(key = %key, email = %email, "repaired email index entry");
            }
        }
        Ok(found)
    }

    /// Reads a single entry of `owner`'s `requestsReceived` mapping.
    pub async fn read_request_received(
        &self,
        owner: &UserKey,
        peer: &UserKey,
    ) -> EngineResult<Option<RequestEntry>> {
        let path = self.mapping_path(owner, Mapping::RequestsReceived).key(peer);
        self.read_entry::<RequestEntry>(&path).await
    }

    /// Reads a single entry of `owner`'s `friends` mapping.
    pub async fn read_friend(
        &self,
        owner: &UserKey,
        peer: &UserKey,
    ) -> EngineResult<Option<FriendEntry>> {
        let path = self.mapping_path(owner, Mapping::Friends).key(peer);
        self.read_entry::<FriendEntry>(&path).await
    }

    async fn read_entry<T: serde::de::DeserializeOwned>(
        &self,
        path: &StorePath,
    ) -> EngineResult<Option<T>> {
        let Some(value) = self.store.read(path).await? else {
            return Ok(None);
        };
        let entry: T = serde_json::from_value(value).map_err(amity_model::ModelError::from)?;
        Ok(Some(entry))
    }

    /// Sets or deletes one entry of a mapping. `None` deletes.
    pub async fn patch_entry(
        &self,
        owner: &UserKey,
        mapping: Mapping,
        peer: &UserKey,
        value: Option<Value>,
    ) -> StoreResult<()> {
        let path = self.mapping_path(owner, mapping);
        let mut entries = Map::new();
        entries.insert(peer.as_str().to_string(), value.unwrap_or(Value::Null));
        debug!(path = %path, peer = %peer, "patch entry");
        self.store.patch(&path, entries).await
    }

    /// Updates the avatar of a user record.
    ///
    /// Also drops the legacy `avatar` field so no reader sees the old URL.
    pub async fn set_avatar(&self, key: &UserKey, avatar_url: &str) -> StoreResult<()> {
        let mut entries = Map::new();
        entries.insert("avatarUrl".into(), Value::String(avatar_url.to_string()));
        entries.insert("avatar".into(), Value::Null);
        self.store.patch(&self.record_path(key), entries).await
    }
}
