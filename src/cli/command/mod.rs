pub mod collections;
pub mod download;
pub mod granules;
pub mod login;
pub mod peek;
pub mod s3;

use std::path::PathBuf;

use anyhow::Result;
use chrono::{Datelike, Local};
use reqwest::Client;

pub use collections::collections;
pub use download::download;
pub use granules::granules;
pub use login::login;
pub use peek::peek;
pub use s3::s3_credentials;

use crate::{
    auth::{self, Credentials, Session, Strategy},
    cli::create_spinner,
    config::Config,
};

pub fn make_parquet_file_name(kind: &str) -> PathBuf {
    let today = Local::now();
    let file_name = format!(
        "emit-{}-{}-{:02}-{:02}.parquet",
        kind,
        today.year(),
        today.month(),
        today.day()
    );

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(file_name)
}

/// Client for public endpoints such as CMR search.
pub fn http_client(config: &Config) -> Result<Client> {
    let client = Client::builder().user_agent(&config.user_agent).build()?;
    Ok(client)
}

/// Logs in and returns a session that sends the token to trusted hosts only.
pub async fn authorized_session(config: &Config) -> Result<(Session, Credentials)> {
    let bar = create_spinner("Logging in to Earthdata Login...".to_string());
    let client = http_client(config)?;
    let credentials = auth::login(&client, config, Strategy::All).await?;
    bar.finish_and_clear();

    if credentials.is_expired(Local::now().date_naive()) {
        tracing::warn!("Earthdata token has expired, requests will probably be rejected");
    }

    let session = Session::new(client, credentials.clone(), config.trusted_domains.clone());
    Ok((session, credentials))
}
