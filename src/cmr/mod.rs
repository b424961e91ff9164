//! Client for the CMR search API.

pub mod query;
pub mod umm;

use reqwest::{header::HeaderMap, Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;

pub use query::{
    BoundingBox, CloudCover, CollectionQuery, GranuleQuery, Params, Point, QueryError,
    SpatialFilter, TemporalRange,
};
pub use umm::{Access, CollectionSummary, Granule};

use crate::config::Config;
use umm::{Item, SearchResponse, UmmCollection, UmmGranule};

const HITS_HEADER: &str = "CMR-Hits";
const SEARCH_AFTER_HEADER: &str = "CMR-Search-After";

pub type Result<T> = std::result::Result<T, CmrError>;

#[derive(Error, Debug)]
pub enum CmrError {
    #[error("http error {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("serde error {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("invalid query: {0}")]
    QueryError(#[from] QueryError),

    #[error("CMR responded with {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("missing or invalid `{0}` header")]
    HeaderError(&'static str),
}

#[derive(Deserialize)]
struct ErrorBody {
    errors: Vec<String>,
}

struct Page<T> {
    hits: Option<u64>,
    search_after: Option<String>,
    items: Vec<Item<T>>,
}

pub struct CmrClient {
    client: Client,
    search_url: String,
    page_size: usize,
}

impl CmrClient {
    pub fn new(client: Client, config: &Config) -> Self {
        CmrClient {
            client,
            search_url: format!("{}/search", config.cmr_url.trim_end_matches('/')),
            page_size: config.page_size,
        }
    }

    pub async fn search_collections(&self, query: &CollectionQuery) -> Result<Vec<CollectionSummary>> {
        let items = self
            .collect::<UmmCollection>("collections.umm_json", query.params(), None)
            .await?;

        Ok(items.into_iter().map(CollectionSummary::from).collect())
    }

    pub async fn search_granules(&self, query: &GranuleQuery) -> Result<Vec<Granule>> {
        let items = self
            .collect::<UmmGranule>("granules.umm_json", query.params()?, query.count)
            .await?;

        Ok(items.into_iter().map(Granule::from).collect())
    }

    /// Number of granules matching the query, without retrieving them.
    pub async fn granule_hits(&self, query: &GranuleQuery) -> Result<u64> {
        let mut params = query.params()?;
        params.push(("page_size", "0".to_string()));

        let response = self.send("granules.umm_json", &params, None).await?;
        hits_header(response.headers())?.ok_or(CmrError::HeaderError(HITS_HEADER))
    }

    async fn collect<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: Params,
        limit: Option<usize>,
    ) -> Result<Vec<Item<T>>> {
        let page_size = limit.map_or(self.page_size, |l| l.clamp(1, self.page_size));
        let mut params = params;
        params.push(("page_size", page_size.to_string()));

        let mut items = Vec::new();
        let mut search_after: Option<String> = None;

        loop {
            let page = self
                .fetch_page::<T>(endpoint, &params, search_after.as_deref())
                .await?;
            let page_len = page.items.len();
            items.extend(page.items);

            tracing::debug!(
                endpoint,
                page_len,
                collected = items.len(),
                hits = ?page.hits,
                "fetched CMR page"
            );

            if !has_more(items.len(), page_len, page.hits, limit, page.search_after.is_some()) {
                break;
            }
            search_after = page.search_after;
        }

        if let Some(limit) = limit {
            items.truncate(limit);
        }

        Ok(items)
    }

    async fn fetch_page<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &Params,
        search_after: Option<&str>,
    ) -> Result<Page<T>> {
        let response = self.send(endpoint, params, search_after).await?;

        let headers = response.headers();
        let header_hits = hits_header(headers)?;
        let next = headers
            .get(SEARCH_AFTER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await?;
        let parsed: SearchResponse<T> = serde_json::from_str(&body)?;

        Ok(Page {
            hits: parsed.hits.or(header_hits),
            search_after: next,
            items: parsed.items,
        })
    }

    async fn send(
        &self,
        endpoint: &str,
        params: &Params,
        search_after: Option<&str>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.search_url, endpoint);

        let mut request = self.client.get(&url).query(params);
        if let Some(token) = search_after {
            request = request.header(SEARCH_AFTER_HEADER, token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(CmrError::Status {
                status,
                message: error_message(&body),
            });
        }

        Ok(response)
    }
}

fn hits_header(headers: &HeaderMap) -> Result<Option<u64>> {
    match headers.get(HITS_HEADER) {
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .map(Some)
            .ok_or(CmrError::HeaderError(HITS_HEADER)),
        None => Ok(None),
    }
}

/// Decides whether another page should be requested.
fn has_more(
    collected: usize,
    page_len: usize,
    hits: Option<u64>,
    limit: Option<usize>,
    has_search_after: bool,
) -> bool {
    if page_len == 0 || !has_search_after {
        return false;
    }
    if limit.is_some_and(|l| collected >= l) {
        return false;
    }
    if hits.is_some_and(|h| collected as u64 >= h) {
        return false;
    }
    true
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join("; "),
        _ => body.trim().to_string(),
    }
}

// -- Tests -------------------------------------------------------------------
