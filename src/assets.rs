//! Selecting granule assets by file name.

use std::fmt;

/// Keeps the URLs that contain at least one of `markers`, in their original order.
///
/// An empty marker list keeps everything.
pub fn filter_links<S: AsRef<str>>(urls: &[String], markers: &[S]) -> Vec<String> {
    if markers.is_empty() {
        return urls.to_vec();
    }

    urls.iter()
        .filter(|url| markers.iter().any(|m| url.contains(m.as_ref())))
        .cloned()
        .collect()
}

/// Last path segment of a URL, without query or fragment.
pub fn file_name(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let without_scheme = path.split_once("://").map_or(path, |(_, rest)| rest);

    // a bare host has no file component
    let (_, rest) = without_scheme.split_once('/')?;
    rest.rsplit('/').next().filter(|name| !name.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Reflectance,
    ReflectanceUncertainty,
    Mask,
    BandMask,
    Radiance,
    Observation,
    Mineral,
    MineralUncertainty,
    Browse,
    Other,
}

impl AssetKind {
    /// Classifies an EMIT product file such as `EMIT_L2A_RFLUNCERT_001_..._012.nc`.
    pub fn from_file_name(name: &str) -> Self {
        if name.ends_with(".png") || name.ends_with(".jpg") {
            return AssetKind::Browse;
        }

        // EMIT_<level>_<product>_<version>_...
        let product = name.split('_').nth(2).unwrap_or_default();
        match product {
            "RFL" => AssetKind::Reflectance,
            "RFLUNCERT" => AssetKind::ReflectanceUncertainty,
            "MASK" => AssetKind::Mask,
            "BANDMASK" => AssetKind::BandMask,
            "RAD" => AssetKind::Radiance,
            "OBS" => AssetKind::Observation,
            "MIN" => AssetKind::Mineral,
            "MINUNCERT" => AssetKind::MineralUncertainty,
            _ => AssetKind::Other,
        }
    }

    pub fn from_url(url: &str) -> Self {
        file_name(url)
            .map(AssetKind::from_file_name)
            .unwrap_or(AssetKind::Other)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AssetKind::Reflectance => "reflectance",
            AssetKind::ReflectanceUncertainty => "reflectance uncertainty",
            AssetKind::Mask => "mask",
            AssetKind::BandMask => "band mask",
            AssetKind::Radiance => "radiance",
            AssetKind::Observation => "observation geometry",
            AssetKind::Mineral => "mineral identification",
            AssetKind::MineralUncertainty => "mineral uncertainty",
            AssetKind::Browse => "browse image",
            AssetKind::Other => "other",
        };
        f.write_str(label)
    }
}

// -- Tests -------------------------------------------------------------------
