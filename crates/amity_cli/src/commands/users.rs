//! Users command implementation.

use amity_engine::DiscoveredUser;
use serde::Serialize;
use std::path::Path;

use super::{engine, open_session, store_file};

/// One listed user.
#[derive(Debug, Serialize)]
pub struct UserRow {
    /// Record key.
    pub key: String,
    /// Email of the user.
    pub email: String,
    /// Avatar image URL.
    pub avatar_url: String,
    /// Relationship status as seen by the viewer, if one was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl From<DiscoveredUser> for UserRow {
    fn from(user: DiscoveredUser) -> Self {
        Self {
            key: user.key.to_string(),
            email: user.email.to_string(),
            avatar_url: user.avatar_url,
            status: Some(user.status.to_string()),
        }
    }
}

/// Runs the users command.
pub async fn run(
    path: &Path,
    viewer: Option<&str>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = store_file::load(path)?;
    let engine = engine(&store)?;

    let rows: Vec<UserRow> = match viewer {
        Some(email) => {
            let session = open_session(&engine, email).await?;
            session.discover().into_iter().map(UserRow::from).collect()
        }
        None => engine
            .repository()
            .list_users()
            .await?
            .into_iter()
            .map(|(key, record)| UserRow {
                key: key.to_string(),
                email: record.email.to_string(),
                avatar_url: record.avatar_url,
                status: None,
            })
            .collect(),
    };
    // Lookups may have repaired the email index
    store_file::save(path, &store)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No users");
        return Ok(());
    }
    for row in &rows {
        match &row.status {
            Some(status) => println!("{:<34} {:<24} {}", row.key, row.email, status),
            None => println!("{:<34} {}", row.key, row.email),
        }
    }
    Ok(())
}
