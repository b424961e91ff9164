//! Search granules and download the selected assets.

use std::path::PathBuf;

use anyhow::Result;

use crate::{
    assets::filter_links,
    cli::{create_spinner, SearchArgs},
    cmr::{Access, CmrClient, Granule},
    config::Config,
    download::{fetch_all, FetchSummary},
};

use super::{authorized_session, http_client};

pub async fn download(
    config: &Config,
    search: &SearchArgs,
    markers: &[String],
    dir: Option<PathBuf>,
) -> Result<String> {
    let query = search.to_query(&config.provider)?;
    let (session, _credentials) = authorized_session(config).await?;
    let cmr = CmrClient::new(http_client(config)?, config);

    let bar = create_spinner("Searching granules...".to_string());
    let granules = cmr.search_granules(&query).await?;
    bar.finish_with_message(format!("{} granules found", granules.len()));

    let urls = select_links(&granules, markers);
    if urls.is_empty() {
        return Ok("No files matched".to_string());
    }

    let dir = dir.unwrap_or_else(|| config.download_dir.clone());
    let summary = fetch_all(&session, &urls, &dir, config.chunk_size).await?;

    Ok(describe(&summary, &dir))
}

fn select_links(granules: &[Granule], markers: &[String]) -> Vec<String> {
    let links: Vec<String> = granules
        .iter()
        .flat_map(|g| g.data_links(Access::External))
        .collect();

    filter_links(&links, markers)
}

fn describe(summary: &FetchSummary, dir: &std::path::Path) -> String {
    format!(
        "Downloaded {} files ({:.1} MB), skipped {} already present, in `{}`",
        summary.downloaded,
        summary.bytes as f64 / (1024.0 * 1024.0),
        summary.skipped,
        dir.display()
    )
}

// -- Tests -------------------------------------------------------------------
