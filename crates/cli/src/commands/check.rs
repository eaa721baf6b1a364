//! Credential check against the minimal-permission shop endpoint.

use shopsync_engine::config::SyncConfig;
use shopsync_engine::shopify::RestClient;

use super::CliError;

/// Call `shop.json` and report what the credentials can see.
#[allow(clippy::print_stdout)]
pub async fn run() -> Result<(), CliError> {
    let config = SyncConfig::from_env()?;
    let client = RestClient::new(&config)?;

    let shop = client.test_connection().await?;
    println!("Connection OK");
    println!("  Shop:   {}", shop.name);
    if let Some(domain) = &shop.myshopify_domain {
        println!("  Domain: {domain}");
    }
    if let Some(email) = &shop.email {
        println!("  Email:  {email}");
    }
    Ok(())
}
