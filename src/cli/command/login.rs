//! Log in to Earthdata Login and optionally remember the credentials.

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate};

use crate::{
    auth::{self, Credentials, Source, Strategy},
    cli::create_spinner,
    config::Config,
};

use super::http_client;

pub async fn login(config: &Config, strategy: Strategy, persist: bool) -> Result<String> {
    let client = http_client(config)?;
    let source = auth::resolve(strategy, config.urs_host())?;

    let bar = create_spinner("Logging in to Earthdata Login...".to_string());
    let credentials = auth::authenticate(&client, &config.urs_url, source.clone()).await?;
    bar.finish_with_message("Logged in");

    if persist {
        match &source {
            Source::Password { username, password } => {
                let path = auth::netrc_path().ok_or_else(|| anyhow!("No home directory for the netrc file"))?;
                auth::persist_netrc(&path, config.urs_host(), username, password)?;
                println!("Credentials saved to `{}`", path.display());
            }
            Source::Token(_) => {
                tracing::warn!("logged in with a token, there is no password to persist");
            }
        }
    }

    Ok(describe(&credentials, Local::now().date_naive()))
}

fn describe(credentials: &Credentials, today: NaiveDate) -> String {
    let user = credentials.username.as_deref().unwrap_or("token from environment");
    let expiry = match credentials.token.expiration_date {
        Some(date) if credentials.is_expired(today) => format!("expired on {}", date),
        Some(date) => format!("expires on {}", date),
        None => "expiry unknown".to_string(),
    };

    format!("Logged in as {} ({} token, {})", user, credentials.token.token_type, expiry)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::auth::Token;

    fn credentials(username: Option<&str>, expires: Option<NaiveDate>) -> Credentials {
        Credentials {
            username: username.map(str::to_string),
            token: Token {
                access_token: "t".to_string(),
                token_type: "Bearer".to_string(),
                expiration_date: expires,
            },
        }
    }

    #[test]
    fn should_describe_login() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();

        let c = credentials(Some("alice"), NaiveDate::from_ymd_opt(2026, 12, 13));
        assert_eq!(
            describe(&c, today),
            "Logged in as alice (Bearer token, expires on 2026-12-13)"
        );

        let c = credentials(None, None);
        assert_eq!(
            describe(&c, today),
            "Logged in as token from environment (Bearer token, expiry unknown)"
        );

        let c = credentials(Some("bob"), NaiveDate::from_ymd_opt(2026, 1, 1));
        assert!(describe(&c, today).contains("expired on 2026-01-01"));
    }
}
