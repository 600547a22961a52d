//! Signup command implementation.

use amity_model::{AuthIdentity, Email};
use std::path::Path;
use tracing::info;

use super::{engine, store_file};

/// Runs the signup command.
pub async fn run(
    path: &Path,
    email: &str,
    uid: Option<String>,
    avatar: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = store_file::load(path)?;
    let engine = engine(&store)?;

    let mut identity = AuthIdentity::new(Email::parse(email)?);
    if let Some(uid) = uid {
        identity = identity.with_uid(uid);
    }

    info!("Registering {}", identity.email);
    let key = engine.register(&identity).await?;
    if let Some(avatar) = avatar {
        engine.repository().set_avatar(&key, &avatar).await?;
    }
    store_file::save(path, &store)?;

    println!("✓ Registered {} as {}", identity.email, key);
    Ok(())
}
