//! Earthdata Login: credential discovery, token exchange and S3 credentials.
//!
//! Credentials are looked up in the environment or a netrc file and a
//! username/password pair is exchanged for a bearer token with the URS
//! `find_or_create_token` endpoint. The same token authorizes HTTPS downloads
//! and the DAAC `/s3credentials` endpoint.

use std::{
    env, fmt,
    fs::{self, OpenOptions},
    io::Write,
    ops::Range,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use clap::ValueEnum;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("IO error {0}")]
    IOError(#[from] std::io::Error),

    #[error("http error {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("no Earthdata Login credentials found using the `{0}` strategy")]
    NoCredentials(Strategy),

    #[error("Earthdata Login request failed with {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("invalid token expiration date `{0}`")]
    ExpirationParseError(String),
}

/// Where to look for credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// EARTHDATA_TOKEN, or EARTHDATA_USERNAME and EARTHDATA_PASSWORD
    #[value(name = "env")]
    Environment,
    /// ~/.netrc, or the file named by NETRC
    Netrc,
    /// environment first, then netrc
    All,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Environment => "env",
            Strategy::Netrc => "netrc",
            Strategy::All => "all",
        };
        f.write_str(name)
    }
}

/// Raw credentials found by a strategy, before talking to URS.
#[derive(Clone, PartialEq)]
pub enum Source {
    Token(String),
    Password { username: String, password: String },
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Token(_) => f.debug_tuple("Token").field(&"[REDACTED]").finish(),
            Source::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

#[derive(Clone)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    /// Unknown for tokens supplied directly through the environment.
    pub expiration_date: Option<NaiveDate>,
}

// Custom Debug implementation to keep the token out of logs
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expiration_date", &self.expiration_date)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: Option<String>,
    pub token: Token,
}

impl Credentials {
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.token
            .expiration_date
            .map(|expires| expires < today)
            .unwrap_or(false)
    }
}

/// An HTTP client that attaches the Earthdata token only to requests for
/// hosts under one of the trusted domains.
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    credentials: Option<Credentials>,
    trusted_domains: Vec<String>,
}

impl Session {
    pub fn new(client: Client, credentials: Credentials, trusted_domains: Vec<String>) -> Self {
        Session {
            client,
            credentials: Some(credentials),
            trusted_domains,
        }
    }

    /// A session that never sends a token.
    pub fn anonymous(client: Client) -> Self {
        Session {
            client,
            credentials: None,
            trusted_domains: Vec::new(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn is_trusted(&self, url: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };

        self.trusted_domains.iter().any(|domain| {
            let domain = domain.trim_start_matches('.');
            host == domain
                || host
                    .strip_suffix(domain)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.authorize(self.client.get(url), url)
    }

    pub fn head(&self, url: &str) -> RequestBuilder {
        self.authorize(self.client.head(url), url)
    }

    fn authorize(&self, request: RequestBuilder, url: &str) -> RequestBuilder {
        match &self.credentials {
            Some(credentials) if self.is_trusted(url) => {
                request.bearer_auth(&credentials.token.access_token)
            }
            Some(_) => {
                tracing::debug!(%url, "host is not trusted, sending request without token");
                request
            }
            None => request,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expiration_date: String,
}

impl TokenResponse {
    fn into_token(self) -> Result<Token> {
        let expiration_date = parse_expiration(&self.expiration_date)?;
        Ok(Token {
            access_token: self.access_token,
            token_type: self.token_type,
            expiration_date: Some(expiration_date),
        })
    }
}

fn parse_expiration(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%m/%d/%Y")
        .map_err(|_| AuthError::ExpirationParseError(date.to_string()))
}

/// Temporary AWS credentials for direct in-region S3 access.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: String,
}

impl fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Finds credentials and exchanges them for a token if needed.
pub async fn login(client: &Client, config: &Config, strategy: Strategy) -> Result<Credentials> {
    let source = resolve(strategy, config.urs_host())?;
    authenticate(client, &config.urs_url, source).await
}

/// Looks up credentials with the given strategy without any network access.
pub fn resolve(strategy: Strategy, host: &str) -> Result<Source> {
    let netrc = netrc_path();
    resolve_with(strategy, host, |key| env::var(key).ok(), netrc.as_deref())
}

fn resolve_with<F>(strategy: Strategy, host: &str, get_env: F, netrc: Option<&Path>) -> Result<Source>
where
    F: Fn(&str) -> Option<String>,
{
    let from_netrc = || -> Result<Option<Source>> {
        let Some(path) = netrc.filter(|p| p.exists()) else {
            return Ok(None);
        };
        let text = fs::read_to_string(path)?;
        Ok(parse_netrc(&text, host)
            .map(|(username, password)| Source::Password { username, password }))
    };

    let found = match strategy {
        Strategy::Environment => source_from_env(&get_env),
        Strategy::Netrc => from_netrc()?,
        Strategy::All => match source_from_env(&get_env) {
            Some(source) => Some(source),
            None => from_netrc()?,
        },
    };

    found.ok_or(AuthError::NoCredentials(strategy))
}

fn source_from_env<F>(get_env: &F) -> Option<Source>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| get_env(key).filter(|v| !v.trim().is_empty());

    if let Some(token) = non_empty("EARTHDATA_TOKEN") {
        return Some(Source::Token(token));
    }

    match (non_empty("EARTHDATA_USERNAME"), non_empty("EARTHDATA_PASSWORD")) {
        (Some(username), Some(password)) => Some(Source::Password { username, password }),
        _ => None,
    }
}

/// Turns a credential source into usable credentials.
pub async fn authenticate(client: &Client, urs_url: &str, source: Source) -> Result<Credentials> {
    match source {
        Source::Token(access_token) => {
            tracing::info!("using Earthdata token from the environment");
            Ok(Credentials {
                username: None,
                token: Token {
                    access_token,
                    token_type: "Bearer".to_string(),
                    expiration_date: None,
                },
            })
        }
        Source::Password { username, password } => {
            let token = request_token(client, urs_url, &username, &password).await?;
            tracing::info!(user = %username, "logged in to Earthdata Login");
            Ok(Credentials {
                username: Some(username),
                token,
            })
        }
    }
}

async fn request_token(client: &Client, urs_url: &str, username: &str, password: &str) -> Result<Token> {
    let url = format!("{}/api/users/find_or_create_token", urs_url.trim_end_matches('/'));
    tracing::debug!(%url, "requesting token");

    let response = client
        .post(&url)
        .basic_auth(username, Some(password))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Rejected { status, body });
    }

    response.json::<TokenResponse>().await?.into_token()
}

/// Fetches temporary S3 credentials from a DAAC `/s3credentials` endpoint.
pub async fn s3_credentials(client: &Client, url: &str, credentials: &Credentials) -> Result<S3Credentials> {
    let response = client
        .get(url)
        .bearer_auth(&credentials.token.access_token)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Rejected { status, body });
    }

    Ok(response.json().await?)
}

// -- netrc -------------------------------------------------------------------

pub fn netrc_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os("NETRC") {
        return Some(PathBuf::from(path));
    }

    let name = if cfg!(windows) { "_netrc" } else { ".netrc" };
    dirs::home_dir().map(|home| home.join(name))
}

#[derive(Debug, Default, Clone, PartialEq)]
struct NetrcEntry {
    /// `None` for the `default` entry
    machine: Option<String>,
    login: Option<String>,
    password: Option<String>,
    account: Option<String>,
    /// Byte range from the `machine`/`default` keyword to the end of the entry's last value.
    span: Range<usize>,
}

#[derive(Debug, Default)]
struct Netrc {
    entries: Vec<NetrcEntry>,
    /// The file ends inside a `macdef` body, so appended text would become part of the macro.
    open_macro: bool,
}

struct Lexeme {
    value: String,
    start: usize,
    end: usize,
}

/// Splits netrc text into tokens, skipping `#` comments and `macdef` bodies.
struct Lexer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Lexer { text, pos: 0 }
    }

    fn next_token(&mut self) -> Option<Lexeme> {
        let text = self.text;
        let bytes = text.as_bytes();
        loop {
            while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos < bytes.len() && bytes[self.pos] == b'#' {
                self.skip_line();
            } else {
                break;
            }
        }
        if self.pos >= bytes.len() {
            return None;
        }

        let start = self.pos;
        let mut value = String::new();

        if bytes[start] == b'"' {
            self.pos = self.text.len();
            let mut chars = self.text[start + 1..].char_indices();
            while let Some((i, c)) = chars.next() {
                match c {
                    '"' => {
                        self.pos = start + 1 + i + 1;
                        break;
                    }
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    c => value.push(c),
                }
            }
        } else {
            let end = self.text[start..]
                .find(|c: char| c.is_ascii_whitespace())
                .map_or(self.text.len(), |i| start + i);
            value.push_str(&self.text[start..end]);
            self.pos = end;
        }

        Some(Lexeme {
            value,
            start,
            end: self.pos,
        })
    }

    fn skip_line(&mut self) {
        self.pos = self.text[self.pos..]
            .find('\n')
            .map_or(self.text.len(), |i| self.pos + i + 1);
    }

    /// Skips the rest of the `macdef` line and the body up to the first empty
    /// line. Returns false if the text ends before that line.
    fn skip_macro_body(&mut self) -> bool {
        self.skip_line();
        while self.pos < self.text.len() {
            let line_start = self.pos;
            self.skip_line();
            if self.text[line_start..self.pos].trim().is_empty() {
                return true;
            }
        }
        false
    }
}

fn parse_entries(text: &str) -> Netrc {
    let mut lexer = Lexer::new(text);
    let mut netrc = Netrc::default();
    let mut current: Option<NetrcEntry> = None;

    while let Some(token) = lexer.next_token() {
        match token.value.as_str() {
            "machine" | "default" => {
                netrc.entries.extend(current.take());
                let mut entry = NetrcEntry {
                    span: token.start..token.end,
                    ..NetrcEntry::default()
                };
                if token.value == "machine" {
                    if let Some(name) = lexer.next_token() {
                        entry.span.end = name.end;
                        entry.machine = Some(name.value);
                    }
                }
                current = Some(entry);
            }
            "login" | "password" | "account" => {
                let value = lexer.next_token();
                if let (Some(entry), Some(value)) = (current.as_mut(), value) {
                    entry.span.end = value.end;
                    match token.value.as_str() {
                        "login" => entry.login = Some(value.value),
                        "password" => entry.password = Some(value.value),
                        _ => entry.account = Some(value.value),
                    }
                }
            }
            "macdef" => {
                lexer.next_token();
                netrc.open_macro = !lexer.skip_macro_body();
            }
            _ => {}
        }
    }

    netrc.entries.extend(current);
    netrc
}

/// Returns the login and password for `machine`, falling back to the `default` entry.
pub fn parse_netrc(text: &str, machine: &str) -> Option<(String, String)> {
    let entries = parse_entries(text).entries;

    let complete = |entry: &NetrcEntry| match (&entry.login, &entry.password) {
        (Some(login), Some(password)) => Some((login.clone(), password.clone())),
        _ => None,
    };

    entries
        .iter()
        .filter(|e| e.machine.as_deref() == Some(machine))
        .find_map(complete)
        .or_else(|| entries.iter().filter(|e| e.machine.is_none()).find_map(complete))
}

/// Writes or replaces the entry for `machine`.
///
/// Only the tokens of that entry are rewritten. Other entries, comments and
/// macro definitions are kept byte for byte.
pub fn persist_netrc(path: &Path, machine: &str, username: &str, password: &str) -> Result<()> {
    let existing = if path.exists() {
        fs::read_to_string(path)?
    } else {
        String::new()
    };

    let netrc = parse_entries(&existing);
    let ours = format!(
        "machine {} login {} password {}",
        quote(machine),
        quote(username),
        quote(password)
    );

    let replaced = netrc
        .entries
        .iter()
        .find(|e| e.machine.as_deref() == Some(machine));
    // default must stay last
    let default = netrc.entries.iter().find(|e| e.machine.is_none());

    let updated = match (replaced, default) {
        (Some(entry), _) => format!(
            "{}{}{}",
            &existing[..entry.span.start],
            ours,
            &existing[entry.span.end..]
        ),
        (None, Some(default)) => format!(
            "{}{}\n{}",
            &existing[..default.span.start],
            ours,
            &existing[default.span.start..]
        ),
        (None, None) => {
            let mut text = existing;
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            if netrc.open_macro {
                text.push('\n');
            }
            text.push_str(&ours);
            text.push('\n');
            text
        }
    };

    write_private(path, &updated)
}

/// Quotes a netrc value when it would otherwise not read back as one token.
fn quote(value: &str) -> String {
    let plain = !value.is_empty()
        && !value.starts_with('#')
        && !value.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\');
    if plain {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Writes `contents` to a file only the owner can read.
fn write_private(path: &Path, contents: &str) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // mode only applies on creation, an existing file keeps its permissions
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents.as_bytes())?;
    file.flush()?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;
    use mockito::{Matcher, Server};
    use tempfile::TempDir;

    const URS: &str = "urs.earthdata.nasa.gov";

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn should_parse_one_line_netrc() {
        let text = "machine urs.earthdata.nasa.gov login alice password s3cret\n";
        assert_eq!(
            parse_netrc(text, URS),
            Some(("alice".to_string(), "s3cret".to_string()))
        );
    }

    #[test]
    fn should_parse_multi_line_netrc() {
        let text = "machine example.com\n  login bob\n  password x\n\nmachine urs.earthdata.nasa.gov\n  login carol\n  password y\n";
        assert_eq!(
            parse_netrc(text, URS),
            Some(("carol".to_string(), "y".to_string()))
        );
    }

    #[test]
    fn should_fall_back_to_default_entry() {
        let text = "machine example.com login bob password x\ndefault login anon password guest\n";
        assert_eq!(
            parse_netrc(text, URS),
            Some(("anon".to_string(), "guest".to_string()))
        );
        assert_eq!(parse_netrc("machine example.com login bob password x", URS), None);
    }

    #[test]
    fn should_prefer_env_token() {
        let env = env_of(&[
            ("EARTHDATA_TOKEN", "abc"),
            ("EARTHDATA_USERNAME", "alice"),
            ("EARTHDATA_PASSWORD", "pw"),
        ]);
        let source = resolve_with(Strategy::Environment, URS, env, None).unwrap();
        assert_eq!(source, Source::Token("abc".to_string()));
    }

    #[test]
    fn should_need_both_username_and_password() {
        let env = env_of(&[("EARTHDATA_USERNAME", "alice")]);
        let err = resolve_with(Strategy::Environment, URS, env, None).unwrap_err();
        assert!(matches!(err, AuthError::NoCredentials(Strategy::Environment)));
    }

    #[test]
    fn should_try_netrc_after_env() {
        let dir = TempDir::new().unwrap();
        let netrc = dir.path().join(".netrc");
        fs::write(&netrc, "machine urs.earthdata.nasa.gov login dave password pw\n").unwrap();

        let source = resolve_with(Strategy::All, URS, env_of(&[]), Some(&netrc)).unwrap();
        assert_eq!(
            source,
            Source::Password {
                username: "dave".to_string(),
                password: "pw".to_string()
            }
        );

        let err = resolve_with(Strategy::Environment, URS, env_of(&[]), Some(&netrc)).unwrap_err();
        assert!(matches!(err, AuthError::NoCredentials(_)));
    }

    #[test]
    fn should_replace_existing_netrc_entry() {
        let dir = TempDir::new().unwrap();
        let netrc = dir.path().join(".netrc");
        fs::write(
            &netrc,
            "machine urs.earthdata.nasa.gov login old password old\nmachine example.com login bob password x\ndefault login anon password guest\n",
        )
        .unwrap();

        persist_netrc(&netrc, URS, "new", "pw").unwrap();
        let text = fs::read_to_string(&netrc).unwrap();

        assert_eq!(parse_netrc(&text, URS), Some(("new".to_string(), "pw".to_string())));
        assert_eq!(
            parse_netrc(&text, "example.com"),
            Some(("bob".to_string(), "x".to_string()))
        );
        assert!(text.trim_end().ends_with("default login anon password guest"));
        assert_eq!(text.matches("urs.earthdata.nasa.gov").count(), 1);
    }

    #[test]
    fn should_parse_urs_token_response() {
        let json = r#"{"access_token":"eyJ0","token_type":"Bearer","expiration_date":"3/7/2027"}"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        let token = response.into_token().unwrap();

        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expiration_date, NaiveDate::from_ymd_opt(2027, 3, 7));
    }

    #[test]
    fn should_report_expiry() {
        let credentials = Credentials {
            username: None,
            token: Token {
                access_token: "t".to_string(),
                token_type: "Bearer".to_string(),
                expiration_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            },
        };

        assert!(credentials.is_expired(NaiveDate::from_ymd_opt(2026, 1, 2).unwrap()));
        assert!(!credentials.is_expired(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()));
    }

    #[test]
    fn should_redact_token_in_debug_output() {
        let token = Token {
            access_token: "very-secret".to_string(),
            token_type: "Bearer".to_string(),
            expiration_date: None,
        };

        assert!(!format!("{:?}", token).contains("very-secret"));
    }

    #[test]
    fn should_parse_s3_credentials() {
        let json = r#"{"accessKeyId":"AKIA","secretAccessKey":"s","sessionToken":"t","expiration":"2026-10-14 12:00:00+00:00"}"#;
        let creds: S3Credentials = serde_json::from_str(json).unwrap();
        assert_eq!(creds.access_key_id, "AKIA");
        assert_eq!(creds.expiration, "2026-10-14 12:00:00+00:00");
    }

    #[test]
    fn should_keep_comments_and_macros_when_persisting() {
        let dir = TempDir::new().unwrap();
        let netrc = dir.path().join(".netrc");
        let original = "# my ftp hosts\nmachine ftp.example.com login bob password x\nmacdef init\ncd /pub\nbinary\n\n";
        fs::write(&netrc, original).unwrap();

        persist_netrc(&netrc, URS, "alice", "pw").unwrap();
        let text = fs::read_to_string(&netrc).unwrap();

        assert!(text.starts_with(original));
        assert!(text.contains("macdef init\ncd /pub\nbinary\n"));
        assert_eq!(parse_netrc(&text, URS), Some(("alice".to_string(), "pw".to_string())));
        assert_eq!(
            parse_netrc(&text, "ftp.example.com"),
            Some(("bob".to_string(), "x".to_string()))
        );
    }

    #[test]
    fn should_replace_entry_in_place() {
        let dir = TempDir::new().unwrap();
        let netrc = dir.path().join(".netrc");
        fs::write(
            &netrc,
            "# earthdata\nmachine urs.earthdata.nasa.gov\n  login old\n  password old\n# ftp\nmachine ftp.example.com login bob password x\n",
        )
        .unwrap();

        persist_netrc(&netrc, URS, "new", "pw").unwrap();
        let text = fs::read_to_string(&netrc).unwrap();

        assert_eq!(
            text,
            "# earthdata\nmachine urs.earthdata.nasa.gov login new password pw\n# ftp\nmachine ftp.example.com login bob password x\n"
        );
    }

    #[test]
    fn should_not_append_into_unterminated_macro() {
        let dir = TempDir::new().unwrap();
        let netrc = dir.path().join(".netrc");
        fs::write(&netrc, "machine ftp.example.com login bob password x\nmacdef init\nbinary").unwrap();

        persist_netrc(&netrc, URS, "alice", "pw").unwrap();
        let text = fs::read_to_string(&netrc).unwrap();

        assert!(text.contains("binary\n\nmachine urs.earthdata.nasa.gov"));
        assert_eq!(parse_netrc(&text, URS), Some(("alice".to_string(), "pw".to_string())));
    }

    #[test]
    fn should_round_trip_passwords_with_spaces_and_quotes() {
        let dir = TempDir::new().unwrap();
        let netrc = dir.path().join(".netrc");
        let password = r#"my "pass" \ word"#;

        persist_netrc(&netrc, URS, "alice", password).unwrap();
        let text = fs::read_to_string(&netrc).unwrap();

        assert_eq!(
            parse_netrc(&text, URS),
            Some(("alice".to_string(), password.to_string()))
        );
        assert_eq!(
            parse_netrc("machine urs.earthdata.nasa.gov login alice password \"#hash\"", URS),
            Some(("alice".to_string(), "#hash".to_string()))
        );
    }

    #[test]
    fn should_skip_comments_when_parsing() {
        let text = "# machine urs.earthdata.nasa.gov login wrong password wrong\nmachine urs.earthdata.nasa.gov login right password pw\n";
        assert_eq!(parse_netrc(text, URS), Some(("right".to_string(), "pw".to_string())));
    }

    #[cfg(unix)]
    #[test]
    fn should_write_netrc_readable_by_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let created = dir.path().join("new.netrc");
        persist_netrc(&created, URS, "alice", "pw").unwrap();
        assert_eq!(fs::metadata(&created).unwrap().permissions().mode() & 0o777, 0o600);

        let existing = dir.path().join("old.netrc");
        fs::write(&existing, "machine example.com login bob password x\n").unwrap();
        fs::set_permissions(&existing, fs::Permissions::from_mode(0o644)).unwrap();
        persist_netrc(&existing, URS, "alice", "pw").unwrap();
        assert_eq!(fs::metadata(&existing).unwrap().permissions().mode() & 0o777, 0o600);
    }

    #[tokio::test]
    async fn should_exchange_password_for_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/users/find_or_create_token")
            // alice:pw
            .match_header("authorization", "Basic YWxpY2U6cHc=")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok","token_type":"Bearer","expiration_date":"12/31/2026"}"#)
            .expect(1)
            .create_async()
            .await;

        let source = Source::Password {
            username: "alice".to_string(),
            password: "pw".to_string(),
        };
        let credentials = authenticate(&Client::new(), &server.url(), source).await.unwrap();

        mock.assert_async().await;
        assert_eq!(credentials.username.as_deref(), Some("alice"));
        assert_eq!(credentials.token.access_token, "tok");
        assert_eq!(credentials.token.expiration_date, NaiveDate::from_ymd_opt(2026, 12, 31));
    }

    #[tokio::test]
    async fn should_report_rejected_login() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/users/find_or_create_token")
            .with_status(401)
            .with_body("Invalid user credentials")
            .create_async()
            .await;

        let source = Source::Password {
            username: "alice".to_string(),
            password: "wrong".to_string(),
        };
        let err = authenticate(&Client::new(), &server.url(), source).await.unwrap_err();

        match err {
            AuthError::Rejected { status, body } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(body, "Invalid user credentials");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn should_use_env_token_without_contacting_urs() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let credentials = authenticate(&Client::new(), &server.url(), Source::Token("abc".to_string()))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(credentials.token.access_token, "abc");
        assert_eq!(credentials.token.expiration_date, None);
    }

    fn credentials_with(token: &str) -> Credentials {
        Credentials {
            username: Some("alice".to_string()),
            token: Token {
                access_token: token.to_string(),
                token_type: "Bearer".to_string(),
                expiration_date: None,
            },
        }
    }

    #[tokio::test]
    async fn should_fetch_s3_credentials_with_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/s3credentials")
            .match_header("authorization", "Bearer tok")
            .with_header("content-type", "application/json")
            .with_body(r#"{"accessKeyId":"AKIA","secretAccessKey":"s","sessionToken":"t","expiration":"2026-10-14 12:00:00+00:00"}"#)
            .expect(1)
            .create_async()
            .await;

        let url = format!("{}/s3credentials", server.url());
        let creds = s3_credentials(&Client::new(), &url, &credentials_with("tok")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(creds.access_key_id, "AKIA");
        assert_eq!(creds.session_token, "t");
    }

    #[test]
    fn should_trust_only_configured_domains() {
        let session = Session::new(
            Client::new(),
            credentials_with("tok"),
            vec!["earthdata.nasa.gov".to_string(), "earthdatacloud.nasa.gov".to_string()],
        );

        assert!(session.is_trusted("https://data.lpdaac.earthdatacloud.nasa.gov/lp-prod-protected/a.nc"));
        assert!(session.is_trusted("https://earthdata.nasa.gov/"));
        assert!(!session.is_trusted("https://notearthdata.nasa.gov/a.nc"));
        assert!(!session.is_trusted("https://earthdata.nasa.gov.example.com/a.nc"));
        assert!(!session.is_trusted("https://example.com/?earthdata.nasa.gov"));
        assert!(!session.is_trusted("not a url"));
    }

    #[tokio::test]
    async fn should_send_token_only_to_trusted_hosts() {
        let mut server = Server::new_async().await;
        let with_token = server
            .mock("GET", "/trusted")
            .match_header("authorization", "Bearer tok")
            .expect(1)
            .create_async()
            .await;
        let without_token = server
            .mock("GET", "/untrusted")
            .match_header("authorization", Matcher::Missing)
            .expect(1)
            .create_async()
            .await;

        let trusted = Session::new(Client::new(), credentials_with("tok"), vec!["127.0.0.1".to_string()]);
        let untrusted = Session::new(
            Client::new(),
            credentials_with("tok"),
            vec!["earthdata.nasa.gov".to_string()],
        );

        let status = trusted.get(&format!("{}/trusted", server.url())).send().await.unwrap().status();
        assert_eq!(status, StatusCode::OK);
        let status = untrusted.get(&format!("{}/untrusted", server.url())).send().await.unwrap().status();
        assert_eq!(status, StatusCode::OK);

        with_token.assert_async().await;
        without_token.assert_async().await;
    }
}
