//! `shipdash-extract` - source extractors.
//!
//! Each extractor produces zero or more [`RawRecord`]s from one external
//! source and fails locally; the orchestrator decides whether a failure is
//! fatal or skippable. Network access goes through [`http::HttpClient`],
//! which owns timeouts, the user agent, and bounded retry.

pub mod api;
pub mod error;
pub mod file;
mod html;
pub mod http;
pub mod weather;
pub mod web;

pub use api::{KeyedApiExtractor, KeyedProvider, RateLimit};
pub use error::ExtractError;
pub use file::CsvExtractor;
pub use http::HttpClient;
pub use weather::{OpenWeatherProvider, WeatherApiProvider};
pub use web::{ColumnMap, HeaderTarget, WebTableExtractor};

use shipdash_schema::RawRecord;

/// The capability all row sources share: produce a batch of untyped rows.
pub trait Extractor {
    fn source_name(&self) -> &str;

    fn extract(&mut self) -> Result<Vec<RawRecord>, ExtractError>;
}
