//! Print temporary S3 credentials as shell exports.

use anyhow::Result;

use crate::{
    auth::{self, S3Credentials},
    config::Config,
};

use super::authorized_session;

pub async fn s3_credentials(config: &Config) -> Result<String> {
    let (session, credentials) = authorized_session(config).await?;
    let s3 = auth::s3_credentials(session.client(), &config.s3_credentials_url, &credentials).await?;

    println!("{}", exports(&s3));

    Ok(format!("Credentials expire at {}", s3.expiration))
}

fn exports(s3: &S3Credentials) -> String {
    format!(
        "export AWS_ACCESS_KEY_ID={}\nexport AWS_SECRET_ACCESS_KEY={}\nexport AWS_SESSION_TOKEN={}",
        s3.access_key_id, s3.secret_access_key, s3.session_token
    )
}

// -- Tests -------------------------------------------------------------------
