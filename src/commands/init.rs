use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its subdirectories and:
/// - Creates an initial `config.json` file with default settings
/// - Writes the built-in classification rules to `rules.csv`
/// - Moves `api_key_file` into its default location in the data dir.
///
/// # Arguments
/// - `home` - The directory that will be the root of data directory, e.g. `$HOME/vouchers`
/// - `api_key_file` - A file containing the sevDesk API token.
///
/// # Errors
/// - Returns an error if any file operations fail.
pub async fn init(home: &Path, api_key_file: &Path) -> Result<Out<()>> {
    let config = Config::create(home, api_key_file)
        .await
        .context("Unable to create the data directory and configs")
        .pub_result(ErrorType::Config)?;
    Ok(format!(
        "Successfully created the vouchers directory and config at {}",
        config.root().display()
    )
    .into())
}
