//! Inspect command implementation.

use amity_engine::ProjectionSnapshot;
use serde::Serialize;
use std::path::Path;

use super::{engine, open_session, store_file};

/// Relationship state of one user.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Record key.
    pub key: String,
    /// Email of the user.
    pub email: String,
    /// Emails of users whose requests are pending, by key.
    pub requests_received: Vec<(String, String)>,
    /// Emails of users this user asked, by key.
    pub requests_sent: Vec<(String, String)>,
    /// Emails of friends, by key.
    pub friends: Vec<(String, String)>,
}

impl InspectResult {
    fn new(key: String, email: String, snapshot: &ProjectionSnapshot) -> Self {
        Self {
            key,
            email,
            requests_received: snapshot
                .requests_received
                .iter()
                .map(|(k, e)| (k.to_string(), e.email.to_string()))
                .collect(),
            requests_sent: snapshot
                .requests_sent
                .iter()
                .map(|(k, e)| (k.to_string(), e.email.to_string()))
                .collect(),
            friends: snapshot
                .friends
                .iter()
                .map(|(k, e)| (k.to_string(), e.email.to_string()))
                .collect(),
        }
    }
}

/// Runs the inspect command.
pub async fn run(path: &Path, email: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = store_file::load(path)?;
    let engine = engine(&store)?;
    let session = open_session(&engine, email).await?;
    store_file::save(path, &store)?;

    let result = InspectResult::new(
        session.user_key().to_string(),
        session.email().to_string(),
        &session.snapshot(),
    );

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("User: {} ({})", result.email, result.key);
    print_section("Requests received", &result.requests_received);
    print_section("Requests sent", &result.requests_sent);
    print_section("Friends", &result.friends);
    Ok(())
}

fn print_section(title: &str, entries: &[(String, String)]) {
    println!();
    println!("{} ({}):", title, entries.len());
    for (key, email) in entries {
        println!("  {:<34} {}", key, email);
    }
}
