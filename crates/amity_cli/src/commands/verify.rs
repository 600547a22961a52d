//! Verify command implementation.

use std::path::Path;

use super::{engine, store_file};

/// Runs the verify command.
pub async fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying relationships in {:?}", path);
    println!();

    let store = store_file::load(path)?;
    let engine = engine(&store)?;
    let report = engine.audit().await?;

    println!("Records checked: {}", report.records);
    for record in &report.unreadable {
        println!("  unreadable record {}: {}", record.key, record.error);
    }
    for finding in &report.asymmetries {
        println!("  {}", finding);
    }

    println!();
    if report.is_clean() {
        println!("✓ Relationship verification passed");
        Ok(())
    } else {
        println!(
            "✗ Relationship verification failed ({} asymmetric pairs, {} unreadable records)",
            report.asymmetries.len(),
            report.unreadable.len()
        );
        Err("Verification failed".into())
    }
}
