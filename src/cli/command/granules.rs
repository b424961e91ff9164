//! Search granules, print a summary and optionally save them to parquet.

use std::path::PathBuf;

use anyhow::Result;

use crate::{
    assets::AssetKind,
    cli::{create_spinner, SearchArgs},
    cmr::{Access, CmrClient, Granule},
    config::Config,
    parquet,
};

use super::{http_client, make_parquet_file_name};

pub async fn granules(config: &Config, search: &SearchArgs, parquet_path: Option<PathBuf>) -> Result<String> {
    let cmr = CmrClient::new(http_client(config)?, config);
    let query = search.to_query(&config.provider)?;

    let bar = create_spinner("Searching granules...".to_string());
    let hits = cmr.granule_hits(&query).await?;
    let granules = cmr.search_granules(&query).await?;
    bar.finish_and_clear();

    for granule in &granules {
        println!("{}", format_granule(granule));
    }

    let mut message = format!("{} of {} matching granules listed", granules.len(), hits);

    if let Some(path) = parquet_path {
        let path = if path.as_os_str().is_empty() {
            make_parquet_file_name("granules")
        } else {
            path
        };
        parquet::save_granules(&granules, &path)?;
        message.push_str(&format!(", saved to `{}`", path.display()));
    }

    Ok(message)
}

fn format_granule(granule: &Granule) -> String {
    let begin = granule
        .begin
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let cloud = granule
        .cloud_cover
        .map(|c| format!("{:.0}%", c))
        .unwrap_or_else(|| "-".to_string());
    let size = granule
        .size_mb()
        .map(|s| format!("{:.1} MB", s))
        .unwrap_or_else(|| "-".to_string());

    let mut text = format!(
        "{}\n  {}  cloud {}  {}",
        granule.granule_ur, begin, cloud, size
    );
    for link in granule.data_links(Access::External) {
        text.push_str(&format!("\n  [{}] {}", AssetKind::from_url(&link), link));
    }
    for link in granule.browse_links() {
        text.push_str(&format!("\n  [{}] {}", AssetKind::Browse, link));
    }

    text
}

// -- Tests -------------------------------------------------------------------
