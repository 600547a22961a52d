//! Relationship transition commands.

use amity_engine::{Confirmed, REJECT_PROMPT, UNFRIEND_PROMPT};
use std::path::Path;
use tracing::info;

use super::{confirm, engine, open_session, resolve_peer, store_file};

/// Sends a friend request from `actor` to `peer`.
pub async fn send(path: &Path, actor: &str, peer: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = store_file::load(path)?;
    let engine = engine(&store)?;
    let session = open_session(&engine, actor).await?;
    let (peer_key, peer_email) = resolve_peer(&engine, peer).await?;

    info!("Sending request from {} to {}", actor, peer_email);
    let result = engine.send_request(&session, &peer_key, &peer_email).await;
    store_file::save(path, &store)?;
    result?;

    println!("✓ Friend request sent to {}", peer_email);
    Ok(())
}

/// Accepts the request `actor` received from `peer`.
pub async fn accept(path: &Path, actor: &str, peer: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = store_file::load(path)?;
    let engine = engine(&store)?;
    let session = open_session(&engine, actor).await?;
    let (peer_key, peer_email) = resolve_peer(&engine, peer).await?;

    info!("Accepting request from {} as {}", peer_email, actor);
    let result = engine.accept(&session, &peer_key).await;
    store_file::save(path, &store)?;
    result?;

    println!("✓ You and {} are now friends", peer_email);
    Ok(())
}

/// Rejects the request `actor` received from `peer`.
pub async fn reject(
    path: &Path,
    actor: &str,
    peer: &str,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = store_file::load(path)?;
    let engine = engine(&store)?;
    let session = open_session(&engine, actor).await?;
    let (peer_key, peer_email) = resolve_peer(&engine, peer).await?;

    if !yes && !confirm(REJECT_PROMPT)? {
        println!("Cancelled");
        return Ok(());
    }

    info!("Rejecting request from {} as {}", peer_email, actor);
    let result = engine
        .reject(&session, &peer_key, Confirmed::by_user())
        .await;
    store_file::save(path, &store)?;
    result?;

    println!("✓ Rejected request from {}", peer_email);
    Ok(())
}

/// Removes the friendship between `actor` and `peer`.
pub async fn unfriend(
    path: &Path,
    actor: &str,
    peer: &str,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = store_file::load(path)?;
    let engine = engine(&store)?;
    let session = open_session(&engine, actor).await?;
    let (peer_key, peer_email) = resolve_peer(&engine, peer).await?;

    if !yes && !confirm(UNFRIEND_PROMPT)? {
        println!("Cancelled");
        return Ok(());
    }

    info!("Unfriending {} as {}", peer_email, actor);
    let result = engine
        .unfriend(&session, &peer_key, Confirmed::by_user())
        .await;
    store_file::save(path, &store)?;
    result?;

    println!("✓ Unfriended {}", peer_email);
    Ok(())
}
