pub mod auth;
pub mod client;

use crate::error::CatalogError;
use crate::models::{RawFeatures, SearchPage};

pub use client::SpotifyClient;

/// Search parameters that stay fixed for a whole run.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub predicate: String,
    pub result_type: String,
}

/// The two remote calls the pipeline depends on. Both block until the service answers.
pub trait CatalogService {
    /// One page of search results starting at `offset`. An empty page is a valid answer.
    fn search(&self, query: &SearchQuery, limit: usize, offset: usize) -> Result<SearchPage, CatalogError>;

    /// Feature lookup for a batch of ids. The result is positionally aligned with `ids`;
    /// `None` marks an id the service has no features for.
    fn audio_features(&self, ids: &[String]) -> Result<Vec<Option<RawFeatures>>, CatalogError>;
}
