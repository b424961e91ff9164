//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::{command, Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    auth::Strategy,
    cmr::{BoundingBox, CloudCover, GranuleQuery, Point, SpatialFilter, TemporalRange},
    geometry::load_polygons,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Search and download NASA EMIT data
pub struct Cli {
    /// Config file, defaults to <config dir>/emit-access/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in to Earthdata Login and show the token expiry
    Login {
        #[arg(long, value_enum, default_value_t = Strategy::All)]
        strategy: Strategy,
        /// Save the username and password to the netrc file
        #[arg(long)]
        persist: bool,
    },
    /// Search for collections
    Collections {
        #[arg(long)]
        keyword: Option<String>,
        /// Defaults to the configured provider
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        short_name: Option<String>,
    },
    /// Search for granules
    Granules {
        #[command(flatten)]
        search: SearchArgs,
        /// Also save the results to a parquet file
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        parquet: Option<PathBuf>,
    },
    /// Search for granules and download their assets
    Download {
        #[command(flatten)]
        search: SearchArgs,
        /// Only download URLs containing one of these markers, e.g. RFL_,MASK_
        #[arg(long, value_delimiter = ',')]
        assets: Vec<String>,
        /// Defaults to the configured download directory
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Read the start of a remote file without downloading it
    Peek {
        url: String,
        #[arg(long, default_value_t = 512)]
        bytes: u64,
    },
    /// Get temporary S3 credentials for direct access
    S3Credentials {},
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Collection short name, e.g. EMIT_L2A_RFL
    #[arg(long, required_unless_present = "concept_id")]
    pub short_name: Option<String>,
    #[arg(long)]
    pub version: Option<String>,
    /// Collection concept id, e.g. C2408750690-LPCLOUD
    #[arg(long)]
    pub concept_id: Option<String>,
    /// lon,lat
    #[arg(long, allow_hyphen_values = true, conflicts_with_all = ["bbox", "polygon"])]
    pub point: Option<Point>,
    /// west,south,east,north
    #[arg(long, allow_hyphen_values = true, conflicts_with = "polygon")]
    pub bbox: Option<BoundingBox>,
    /// GeoJSON file with the search polygon
    #[arg(long)]
    pub polygon: Option<PathBuf>,
    /// YYYY-MM-DD or RFC 3339
    #[arg(long)]
    pub start: Option<String>,
    /// YYYY-MM-DD (inclusive) or RFC 3339
    #[arg(long)]
    pub end: Option<String>,
    /// min,max percent
    #[arg(long)]
    pub cloud_cover: Option<CloudCover>,
    /// Maximum number of granules
    #[arg(long)]
    pub count: Option<usize>,
}

impl SearchArgs {
    pub fn to_query(&self, provider: &str) -> Result<GranuleQuery> {
        let spatial = if let Some(point) = self.point {
            Some(SpatialFilter::Point(point))
        } else if let Some(bbox) = self.bbox {
            Some(SpatialFilter::BoundingBox(bbox))
        } else if let Some(path) = &self.polygon {
            let mut polygons = load_polygons(path)?;
            if polygons.len() > 1 {
                tracing::warn!(
                    count = polygons.len(),
                    "GeoJSON holds several polygons, searching with the first"
                );
            }
            Some(SpatialFilter::Polygon(polygons.swap_remove(0)))
        } else {
            None
        };

        Ok(GranuleQuery {
            short_name: self.short_name.clone(),
            version: self.version.clone(),
            collection_concept_id: self.concept_id.clone(),
            provider: Some(provider.to_string()),
            spatial,
            temporal: TemporalRange::from_bounds(self.start.as_deref(), self.end.as_deref())?,
            cloud_cover: self.cloud_cover,
            count: self.count,
        })
    }
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    ProgressBar::new(size).with_message(message).with_style(
        ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("##-"),
    )
}

/// Creates a byte progress bar whose length is set once the response size is known.
pub fn create_download_bar(message: String) -> ProgressBar {
    ProgressBar::new(0).with_message(message).with_style(
        ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {eta}")
            .unwrap()
            .progress_chars("=> "),
    )
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::cmr::query::QueryError;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("emit").chain(args.iter().copied()))
    }

    fn search_args(cli: Cli) -> SearchArgs {
        match cli.command {
            Commands::Granules { search, .. } | Commands::Download { search, .. } => search,
            _ => panic!("not a search command"),
        }
    }

    #[test]
    fn should_parse_point_search() {
        let cli = parse(&[
            "granules",
            "--short-name",
            "EMIT_L2A_RFL",
            "--point",
            "-62.1123,-39.89402",
            "--start",
            "2022-09-03",
            "--end",
            "2022-09-04",
            "--cloud-cover",
            "0,10",
        ])
        .unwrap();
        let query = search_args(cli).to_query("LPCLOUD").unwrap();

        assert_eq!(
            query.spatial,
            Some(SpatialFilter::Point(Point { lon: -62.1123, lat: -39.89402 }))
        );
        assert_eq!(query.provider.as_deref(), Some("LPCLOUD"));
        assert!(query.temporal.is_some());
        assert_eq!(query.cloud_cover, Some(CloudCover::new(0.0, 10.0).unwrap()));
    }

    #[test]
    fn should_reject_two_spatial_filters() {
        let result = parse(&[
            "granules",
            "--short-name",
            "EMIT_L2A_RFL",
            "--point",
            "1,2",
            "--bbox",
            "0,0,3,3",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn should_require_a_collection() {
        assert!(parse(&["granules", "--point", "1,2"]).is_err());
        assert!(parse(&["granules", "--concept-id", "C2408750690-LPCLOUD"]).is_ok());
    }

    #[test]
    fn should_split_asset_markers() {
        let cli = parse(&["download", "--short-name", "EMIT_L2A_RFL", "--assets", "RFL_,MASK_"]).unwrap();
        match cli.command {
            Commands::Download { assets, .. } => assert_eq!(assets, vec!["RFL_", "MASK_"]),
            _ => panic!("expected download"),
        }
    }

    #[test]
    fn should_accept_bare_parquet_flag() {
        let cli = parse(&["granules", "--short-name", "EMIT_L2A_RFL", "--parquet"]).unwrap();
        match cli.command {
            Commands::Granules { parquet, .. } => assert_eq!(parquet, Some(PathBuf::new())),
            _ => panic!("expected granules"),
        }
    }

    #[test]
    fn should_surface_temporal_errors() {
        let cli = parse(&[
            "granules",
            "--short-name",
            "EMIT_L2A_RFL",
            "--start",
            "2023-02-01",
            "--end",
            "2023-01-01",
        ])
        .unwrap();
        let err = search_args(cli).to_query("LPCLOUD").unwrap_err();

        assert_eq!(err.downcast_ref::<QueryError>(), Some(&QueryError::InvertedRange));
    }
}
