//! List collections matching a keyword.

use anyhow::Result;

use crate::{
    cli::create_spinner,
    cmr::{CmrClient, CollectionQuery, CollectionSummary},
    config::Config,
};

use super::http_client;

pub async fn collections(
    config: &Config,
    keyword: Option<String>,
    provider: Option<String>,
    short_name: Option<String>,
) -> Result<String> {
    let cmr = CmrClient::new(http_client(config)?, config);
    let query = CollectionQuery {
        keyword,
        provider: Some(provider.unwrap_or_else(|| config.provider.clone())),
        short_name,
        version: None,
        cloud_hosted: true,
    };

    let bar = create_spinner("Searching collections...".to_string());
    let summaries = cmr.search_collections(&query).await?;
    bar.finish_and_clear();

    for summary in &summaries {
        println!("{}", format_collection(summary));
    }

    Ok(format!("{} collections found", summaries.len()))
}

fn format_collection(summary: &CollectionSummary) -> String {
    let mut line = format!(
        "{:<24} {:<20} v{} [{}]",
        summary.concept_id, summary.short_name, summary.version, summary.provider_id
    );
    if let Some(title) = &summary.entry_title {
        line.push_str(&format!("  {}", title));
    }
    for prefix in &summary.s3_prefixes {
        line.push_str(&format!("\n    {}", prefix));
    }

    line
}

// -- Tests -------------------------------------------------------------------
