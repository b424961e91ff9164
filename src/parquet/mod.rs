//! Handles serialising and saving search results to disk in the _parquet_ file format.

pub mod granules;

pub use granules::save_granules;
