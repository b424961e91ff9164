//! Search criteria and their CMR query parameters.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use geo::Polygon;
use thiserror::Error;

use crate::geometry::to_cmr_polygon;

pub type Params = Vec<(&'static str, String)>;

#[derive(Error, Debug, PartialEq)]
pub enum QueryError {
    #[error("expected {expected} comma separated numbers, got `{input}`")]
    Arity { expected: usize, input: String },

    #[error("`{0}` is not a number")]
    NotANumber(String),

    #[error("longitude {0} is outside -180..180")]
    Longitude(f64),

    #[error("latitude {0} is outside -90..90")]
    Latitude(f64),

    #[error("south {south} is north of north {north}")]
    InvertedBox { south: f64, north: f64 },

    #[error("cloud cover must satisfy 0 <= min <= max <= 100, got {min},{max}")]
    CloudCover { min: f64, max: f64 },

    #[error("`{0}` is neither a YYYY-MM-DD date nor an RFC 3339 timestamp")]
    DateTime(String),

    #[error("temporal range starts after it ends")]
    InvertedRange,

    #[error("a granule search needs a collection short name or concept id")]
    NoCollection,
}

fn parse_numbers(input: &str, expected: usize) -> Result<Vec<f64>, QueryError> {
    let values = input
        .split(',')
        .map(|s| {
            let s = s.trim();
            s.parse::<f64>()
                .map_err(|_| QueryError::NotANumber(s.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if values.len() != expected {
        return Err(QueryError::Arity {
            expected,
            input: input.to_string(),
        });
    }

    Ok(values)
}

fn check_lon(lon: f64) -> Result<f64, QueryError> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(lon)
    } else {
        Err(QueryError::Longitude(lon))
    }
}

fn check_lat(lat: f64) -> Result<f64, QueryError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(lat)
    } else {
        Err(QueryError::Latitude(lat))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl FromStr for Point {
    type Err = QueryError;

    /// Parses `lon,lat`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v = parse_numbers(s, 2)?;
        Ok(Point {
            lon: check_lon(v[0])?,
            lat: check_lat(v[1])?,
        })
    }
}

/// A west/south/east/north box. West may exceed east for boxes crossing the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl FromStr for BoundingBox {
    type Err = QueryError;

    /// Parses `W,S,E,N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v = parse_numbers(s, 4)?;
        let bbox = BoundingBox {
            west: check_lon(v[0])?,
            south: check_lat(v[1])?,
            east: check_lon(v[2])?,
            north: check_lat(v[3])?,
        };

        if bbox.south > bbox.north {
            return Err(QueryError::InvertedBox {
                south: bbox.south,
                north: bbox.north,
            });
        }

        Ok(bbox)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpatialFilter {
    Point(Point),
    BoundingBox(BoundingBox),
    Polygon(Polygon<f64>),
}

impl SpatialFilter {
    pub fn param(&self) -> (&'static str, String) {
        match self {
            SpatialFilter::Point(p) => ("point", format!("{},{}", p.lon, p.lat)),
            SpatialFilter::BoundingBox(b) => (
                "bounding_box",
                format!("{},{},{},{}", b.west, b.south, b.east, b.north),
            ),
            SpatialFilter::Polygon(polygon) => ("polygon", to_cmr_polygon(polygon)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporalRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TemporalRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, QueryError> {
        if start > end {
            return Err(QueryError::InvertedRange);
        }
        Ok(TemporalRange { start, end })
    }

    /// Builds a range from optional CLI bounds, leaving the missing side open.
    pub fn from_bounds(start: Option<&str>, end: Option<&str>) -> Result<Option<Self>, QueryError> {
        if start.is_none() && end.is_none() {
            return Ok(None);
        }

        let start = match start {
            Some(s) => parse_datetime(s, false)?,
            None => DateTime::<Utc>::MIN_UTC,
        };
        let end = match end {
            Some(s) => parse_datetime(s, true)?,
            None => Utc::now(),
        };

        TemporalRange::new(start, end).map(Some)
    }

    pub fn param(&self) -> String {
        let start = if self.start == DateTime::<Utc>::MIN_UTC {
            String::new()
        } else {
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true)
        };
        format!("{},{}", start, self.end.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

/// Parses a date or timestamp. A bare date is the start of that day, or its
/// last second when `end_of_day` is set.
pub fn parse_datetime(s: &str, end_of_day: bool) -> Result<DateTime<Utc>, QueryError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| QueryError::DateTime(s.to_string()))?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    };
    let time = time.ok_or_else(|| QueryError::DateTime(s.to_string()))?;

    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudCover {
    pub min: f64,
    pub max: f64,
}

impl CloudCover {
    pub fn new(min: f64, max: f64) -> Result<Self, QueryError> {
        if !(0.0..=100.0).contains(&min) || !(0.0..=100.0).contains(&max) || min > max {
            return Err(QueryError::CloudCover { min, max });
        }
        Ok(CloudCover { min, max })
    }

    pub fn param(&self) -> String {
        format!("{},{}", self.min, self.max)
    }
}

impl FromStr for CloudCover {
    type Err = QueryError;

    /// Parses `min,max` in percent.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v = parse_numbers(s, 2)?;
        CloudCover::new(v[0], v[1])
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionQuery {
    pub keyword: Option<String>,
    pub provider: Option<String>,
    pub short_name: Option<String>,
    pub version: Option<String>,
    pub cloud_hosted: bool,
}

impl CollectionQuery {
    pub fn params(&self) -> Params {
        let mut params = Params::new();

        if let Some(keyword) = &self.keyword {
            params.push(("keyword", keyword.clone()));
        }
        if let Some(provider) = &self.provider {
            params.push(("provider", provider.clone()));
        }
        if let Some(short_name) = &self.short_name {
            params.push(("short_name", short_name.clone()));
        }
        if let Some(version) = &self.version {
            params.push(("version", version.clone()));
        }
        if self.cloud_hosted {
            params.push(("cloud_hosted", "true".to_string()));
        }

        params
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GranuleQuery {
    pub short_name: Option<String>,
    pub version: Option<String>,
    pub collection_concept_id: Option<String>,
    pub provider: Option<String>,
    pub spatial: Option<SpatialFilter>,
    pub temporal: Option<TemporalRange>,
    pub cloud_cover: Option<CloudCover>,
    /// Maximum number of granules to return, all matches if unset.
    pub count: Option<usize>,
}

impl GranuleQuery {
    pub fn params(&self) -> Result<Params, QueryError> {
        if self.short_name.is_none() && self.collection_concept_id.is_none() {
            return Err(QueryError::NoCollection);
        }

        let mut params = Params::new();

        if let Some(short_name) = &self.short_name {
            params.push(("short_name", short_name.clone()));
        }
        if let Some(version) = &self.version {
            params.push(("version", version.clone()));
        }
        if let Some(concept_id) = &self.collection_concept_id {
            params.push(("collection_concept_id", concept_id.clone()));
        }
        if let Some(provider) = &self.provider {
            params.push(("provider", provider.clone()));
        }
        if let Some(spatial) = &self.spatial {
            let (key, value) = spatial.param();
            params.push((key, value));
        }
        if let Some(temporal) = &self.temporal {
            params.push(("temporal", temporal.param()));
        }
        if let Some(cloud_cover) = &self.cloud_cover {
            params.push(("cloud_cover", cloud_cover.param()));
        }
        params.push(("sort_key", "start_date".to_string()));

        Ok(params)
    }
}

// -- Tests -------------------------------------------------------------------
