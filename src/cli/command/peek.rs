//! Stream the first bytes of a remote file and report what it is.

use anyhow::Result;

use crate::{
    cli::create_spinner,
    config::Config,
    download::{FileFormat, RemoteFile},
};

use super::authorized_session;

pub async fn peek(config: &Config, url: &str, bytes: u64) -> Result<String> {
    let (session, _credentials) = authorized_session(config).await?;

    let bar = create_spinner(format!("Opening {}...", url));
    let remote = RemoteFile::open(&session, url).await?;
    let header = remote.read_range(0, bytes).await?;
    bar.finish_and_clear();

    Ok(describe(remote.len(), &header))
}

fn describe(len: Option<u64>, header: &[u8]) -> String {
    let size = len
        .map(|l| format!("{:.1} MB", l as f64 / (1024.0 * 1024.0)))
        .unwrap_or_else(|| "unknown size".to_string());
    let format = match FileFormat::detect(header) {
        FileFormat::Hdf5 => "HDF5 / netCDF-4",
        FileFormat::NetCdfClassic => "netCDF classic",
        FileFormat::Png => "PNG image",
        FileFormat::Unknown => "unrecognised format",
    };

    format!("{}, {}, read {} bytes", size, format, header.len())
}

// -- Tests -------------------------------------------------------------------
