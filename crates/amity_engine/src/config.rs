//! Configuration for the relationship engine.

use amity_model::{ModelResult, StorePath, DEFAULT_AVATAR_URL};

/// Configuration for the relationship engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Collection holding user records.
    pub users_collection: String,
    /// Collection holding the email → user key index.
    pub email_index_collection: String,
    /// Avatar assigned to newly registered users.
    pub default_avatar_url: String,
    /// Whether correlation consults the email index before scanning.
    pub use_email_index: bool,
    /// Whether transitions update the projection before the store confirms.
    pub optimistic_updates: bool,
}

impl EngineConfig {
    /// Creates a configuration with the default collection names.
    pub fn new() -> Self {
        Self {
            users_collection: "users".into(),
            email_index_collection: "emailIndex".into(),
            default_avatar_url: DEFAULT_AVATAR_URL.into(),
            use_email_index: true,
            optimistic_updates: true,
        }
    }

    /// Sets the users collection.
    pub fn with_users_collection(mut self, collection: impl Into<String>) -> Self {
        self.users_collection = collection.into();
        self
    }

    /// Sets the email index collection.
    pub fn with_email_index_collection(mut self, collection: impl Into<String>) -> Self {
        self.email_index_collection = collection.into();
        self
    }

    /// Sets the default avatar URL.
    pub fn with_default_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.default_avatar_url = url.into();
        self
    }

    /// Enables or disables the email index.
    pub fn with_email_index(mut self, enabled: bool) -> Self {
        self.use_email_index = enabled;
        self
    }

    /// Enables or disables optimistic projection updates.
    pub fn with_optimistic_updates(mut self, enabled: bool) -> Self {
        self.optimistic_updates = enabled;
        self
    }

    /// Parses the users collection path.
    pub fn users_path(&self) -> ModelResult<StorePath> {
        StorePath::parse(&self.users_collection)
    }

    /// Parses the email index collection path.
    pub fn email_index_path(&self) -> ModelResult<StorePath> {
        StorePath::parse(&self.email_index_collection)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.users_path().unwrap().to_string(), "users");
        assert_eq!(config.email_index_path().unwrap().to_string(), "emailIndex");
        assert_eq!(config.default_avatar_url, DEFAULT_AVATAR_URL);
        assert!(config.use_email_index);
        assert!(config.optimistic_updates);
    }

    #[test]
    fn config_builder() {
        let config = EngineConfig::new()
            .with_users_collection("app/users")
            .with_email_index_collection("app/index")
            .with_default_avatar_url("https://img/default.png")
            .with_email_index(false)
            .with_optimistic_updates(false);

        assert_eq!(config.users_path().unwrap().len(), 2);
        assert_eq!(config.email_index_path().unwrap().to_string(), "app/index");
        assert_eq!(config.default_avatar_url, "https://img/default.png");
        assert!(!config.use_email_index);
        assert!(!config.optimistic_updates);
    }

    #[test]
    fn invalid_collection_is_reported() {
        let config = EngineConfig::new().with_users_collection("users.v2");
        assert!(config.users_path().is_err());
    }
}
