//! UMM JSON search responses and the summaries built from them.
//!
//! Only the parts of UMM-C and UMM-G that are displayed, filtered or exported
//! are modelled; everything else in the documents is ignored.

use chrono::{DateTime, Utc};
use geo::{Coord, LineString, Polygon};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SearchResponse<T> {
    #[serde(default)]
    pub hits: Option<u64>,
    #[serde(default = "Vec::new")]
    pub items: Vec<Item<T>>,
}

#[derive(Debug, Deserialize)]
pub struct Item<T> {
    pub meta: Meta,
    pub umm: T,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Meta {
    pub concept_id: String,
    pub provider_id: String,
}

// -- UMM-C -------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UmmCollection {
    pub short_name: String,
    pub version: String,
    #[serde(default)]
    pub entry_title: Option<String>,
    #[serde(default)]
    pub direct_distribution_information: Option<DirectDistribution>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectDistribution {
    #[serde(default, rename = "S3BucketAndObjectPrefixNames")]
    pub s3_prefixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSummary {
    pub concept_id: String,
    pub provider_id: String,
    pub short_name: String,
    pub version: String,
    pub entry_title: Option<String>,
    pub s3_prefixes: Vec<String>,
}

impl From<Item<UmmCollection>> for CollectionSummary {
    fn from(item: Item<UmmCollection>) -> Self {
        let umm = item.umm;
        CollectionSummary {
            concept_id: item.meta.concept_id,
            provider_id: item.meta.provider_id,
            short_name: umm.short_name,
            version: umm.version,
            entry_title: umm.entry_title,
            s3_prefixes: umm
                .direct_distribution_information
                .map(|d| d.s3_prefixes)
                .unwrap_or_default(),
        }
    }
}

// -- UMM-G -------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UmmGranule {
    #[serde(rename = "GranuleUR")]
    pub granule_ur: String,
    #[serde(default)]
    pub collection_reference: Option<CollectionReference>,
    #[serde(default)]
    pub temporal_extent: Option<TemporalExtent>,
    #[serde(default)]
    pub cloud_cover: Option<f64>,
    #[serde(default)]
    pub spatial_extent: Option<SpatialExtent>,
    #[serde(default)]
    pub related_urls: Vec<RelatedUrl>,
    #[serde(default)]
    pub data_granule: Option<DataGranule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CollectionReference {
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemporalExtent {
    #[serde(default)]
    pub range_date_time: Option<RangeDateTime>,
    #[serde(default)]
    pub single_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RangeDateTime {
    pub beginning_date_time: DateTime<Utc>,
    #[serde(default)]
    pub ending_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpatialExtent {
    #[serde(default)]
    pub horizontal_spatial_domain: Option<HorizontalSpatialDomain>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HorizontalSpatialDomain {
    #[serde(default)]
    pub geometry: Option<UmmGeometry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UmmGeometry {
    #[serde(default, rename = "GPolygons")]
    pub gpolygons: Vec<GPolygon>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GPolygon {
    pub boundary: Boundary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Boundary {
    pub points: Vec<UmmPoint>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UmmPoint {
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RelatedUrl {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataGranule {
    #[serde(default)]
    pub archive_and_distribution_information: Vec<ArchiveInfo>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArchiveInfo {
    #[serde(default)]
    pub size_in_bytes: Option<u64>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub size_unit: Option<String>,
}

impl ArchiveInfo {
    pub fn megabytes(&self) -> Option<f64> {
        if let Some(bytes) = self.size_in_bytes {
            return Some(bytes as f64 / (1024.0 * 1024.0));
        }

        let size = self.size?;
        let factor = match self.size_unit.as_deref()?.to_uppercase().as_str() {
            "KB" => 1.0 / 1024.0,
            "MB" => 1.0,
            "GB" => 1024.0,
            "TB" => 1024.0 * 1024.0,
            _ => return None,
        };
        Some(size * factor)
    }
}

/// How a data link is meant to be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// HTTPS through the DAAC distribution endpoint
    External,
    /// s3:// inside the data's AWS region
    Direct,
}

const GET_DATA: &str = "GET DATA";
const GET_DATA_DIRECT: &str = "GET DATA VIA DIRECT ACCESS";
const GET_VISUALIZATION: &str = "GET RELATED VISUALIZATION";

#[derive(Debug, Clone, PartialEq)]
pub struct Granule {
    pub concept_id: String,
    pub granule_ur: String,
    pub short_name: Option<String>,
    pub version: Option<String>,
    pub begin: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub cloud_cover: Option<f64>,
    pub footprint: Vec<Polygon<f64>>,
    pub related_urls: Vec<RelatedUrl>,
    pub files: Vec<ArchiveInfo>,
}

impl From<Item<UmmGranule>> for Granule {
    fn from(item: Item<UmmGranule>) -> Self {
        let umm = item.umm;

        let (short_name, version) = umm
            .collection_reference
            .map(|c| (c.short_name, c.version))
            .unwrap_or_default();

        let (begin, end) = match umm.temporal_extent {
            Some(TemporalExtent {
                range_date_time: Some(range),
                ..
            }) => (Some(range.beginning_date_time), range.ending_date_time),
            Some(TemporalExtent {
                single_date_time: Some(at),
                ..
            }) => (Some(at), Some(at)),
            _ => (None, None),
        };

        let footprint = umm
            .spatial_extent
            .and_then(|s| s.horizontal_spatial_domain)
            .and_then(|h| h.geometry)
            .map(|g| g.gpolygons.iter().map(to_polygon).collect())
            .unwrap_or_default();

        Granule {
            concept_id: item.meta.concept_id,
            granule_ur: umm.granule_ur,
            short_name,
            version,
            begin,
            end,
            cloud_cover: umm.cloud_cover,
            footprint,
            related_urls: umm.related_urls,
            files: umm
                .data_granule
                .map(|d| d.archive_and_distribution_information)
                .unwrap_or_default(),
        }
    }
}

fn to_polygon(gpolygon: &GPolygon) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = gpolygon
        .boundary
        .points
        .iter()
        .map(|p| Coord {
            x: p.longitude,
            y: p.latitude,
        })
        .collect();

    Polygon::new(LineString::from(coords), vec![])
}

impl Granule {
    /// Downloadable asset URLs for the given access mode, without duplicates.
    pub fn data_links(&self, access: Access) -> Vec<String> {
        let mut links: Vec<String> = Vec::new();

        for related in &self.related_urls {
            let kind = related.kind.as_deref().unwrap_or_default();
            let url = related.url.as_str();

            let wanted = match access {
                Access::External => kind == GET_DATA && url.starts_with("http"),
                Access::Direct => kind == GET_DATA_DIRECT && url.starts_with("s3://"),
            };

            if wanted && !links.iter().any(|l| l == url) {
                links.push(url.to_string());
            }
        }

        links
    }

    pub fn browse_links(&self) -> Vec<String> {
        self.related_urls
            .iter()
            .filter(|r| r.kind.as_deref() == Some(GET_VISUALIZATION))
            .map(|r| r.url.clone())
            .collect()
    }

    /// Total size of the granule's files, if the metadata reports any.
    pub fn size_mb(&self) -> Option<f64> {
        let sizes: Vec<f64> = self.files.iter().filter_map(ArchiveInfo::megabytes).collect();
        if sizes.is_empty() {
            None
        } else {
            Some(sizes.iter().sum())
        }
    }
}

// -- Tests -------------------------------------------------------------------
