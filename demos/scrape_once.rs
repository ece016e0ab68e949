//! One-shot scrape example.
//!
//! Runs a single authenticate, fetch and compute cycle against a real tenant
//! and prints the resulting metric set, without starting the HTTP server.
//! Credentials are read from AZURE_TENANT_ID, AZURE_CLIENT_ID and
//! AZURE_CLIENT_SECRET.
//!
//! Run with: cargo run --example scrape_once

use std::env;

use aad_app_exporter::metrics::DAYS_REMAINING_METRIC;
use aad_app_exporter::{Exporter, Settings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Azure AD Credential Scrape ===\n");

    let tenant = env::var("AZURE_TENANT_ID")?;
    let client = env::var("AZURE_CLIENT_ID")?;
    let secret = env::var("AZURE_CLIENT_SECRET")?;

    let mut settings = Settings::new(&tenant, &client, &secret);
    settings.follow_next_link = env::var_os("FOLLOW_NEXT_LINK").is_some();

    let exporter = Exporter::new(settings)?;
    let text = exporter.scrape().await?;

    for line in text.lines().filter(|line| line.starts_with(DAYS_REMAINING_METRIC)) {
        println!("{}", line);
    }

    Ok(())
}
