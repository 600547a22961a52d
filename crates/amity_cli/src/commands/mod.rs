//! CLI command implementations.

pub mod init;
pub mod inspect;
pub mod relationship;
pub mod signup;
pub mod store_file;
pub mod users;
pub mod verify;

use amity_engine::{EngineConfig, MemoryStore, RelationshipEngine, Session};
use amity_model::{AuthIdentity, Email, UserKey};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// Engine over the snapshot-backed store.
pub type Engine = RelationshipEngine<Arc<MemoryStore>>;

/// Creates an engine over a loaded store.
pub fn engine(store: &Arc<MemoryStore>) -> Result<Engine, Box<dyn std::error::Error>> {
    Ok(RelationshipEngine::new(
        EngineConfig::default(),
        Arc::clone(store),
    )?)
}

/// Opens a session for an email and folds in every existing record.
pub async fn open_session(
    engine: &Engine,
    email: &str,
) -> Result<Arc<Session>, Box<dyn std::error::Error>> {
    let identity = AuthIdentity::new(Email::parse(email)?);
    let session = engine.correlate(identity).await?;
    let mut listener = engine.listen(&session).await?;
    listener.drain();
    Ok(session)
}

/// Resolves a peer email to its record key.
pub async fn resolve_peer(
    engine: &Engine,
    email: &str,
) -> Result<(UserKey, Email), Box<dyn std::error::Error>> {
    let email = Email::parse(email)?;
    let key = engine
        .repository()
        .find_key_by_email(&email)
        .await?
        .ok_or_else(|| format!("No user registered for {}", email))?;
    Ok((key, email))
}

/// Asks the user a yes/no question on the terminal.
pub fn confirm(prompt: &str) -> Result<bool, Box<dyn std::error::Error>> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
