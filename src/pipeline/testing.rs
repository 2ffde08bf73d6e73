//! In-memory catalog used by the pipeline tests.

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::{json, Value};

use crate::catalog::{CatalogService, SearchQuery};
use crate::error::CatalogError;
use crate::models::{RawArtist, RawFeatures, RawTrack, SearchPage};

pub fn raw_track(id: &str, artist: &str, name: &str, popularity: u32) -> RawTrack {
    RawTrack {
        id: Some(id.into()),
        name: Some(name.into()),
        popularity: Some(popularity),
        artists: vec![RawArtist {
            name: Some(artist.into()),
        }],
    }
}

/// A lookup result as the service returns it, non-analytic fields included.
pub fn raw_features(id: &str, fields: &[(&str, Value)]) -> RawFeatures {
    let mut map = RawFeatures::new();
    for (k, v) in fields {
        map.insert(k.to_string(), v.clone());
    }
    map.insert("id".into(), json!(id));
    map.insert("analysis_url".into(), json!(format!("https://example.test/analysis/{}", id)));
    map.insert("track_href".into(), json!(format!("https://example.test/tracks/{}", id)));
    map.insert("type".into(), json!("audio_features"));
    map.insert("uri".into(), json!(format!("sp:{}", id)));
    map
}

fn failure(status: u16) -> CatalogError {
    CatalogError::Status {
        endpoint: "fake",
        status,
        body: "rate limited".into(),
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    /// Returned in request order; requests past the end get an empty page.
    pages: Vec<Vec<RawTrack>>,
    features: HashMap<String, RawFeatures>,
    fail_search_offset: Option<usize>,
    fail_lookup_batch: Option<usize>,
    drop_last_lookup_slot: bool,
    search_calls: RefCell<Vec<usize>>,
    lookup_calls: RefCell<Vec<Vec<String>>>,
}

impl FakeCatalog {
    pub fn with_pages(pages: Vec<Vec<RawTrack>>) -> Self {
        FakeCatalog {
            pages,
            ..Default::default()
        }
    }

    /// Pages of distinct tracks with the given sizes.
    pub fn with_page_sizes(sizes: &[usize]) -> Self {
        let pages = sizes
            .iter()
            .enumerate()
            .map(|(page, &size)| {
                (0..size)
                    .map(|item| {
                        let id = format!("p{}i{}", page, item);
                        raw_track(&id, &format!("artist {}", id), &format!("title {}", id), 50)
                    })
                    .collect()
            })
            .collect();
        Self::with_pages(pages)
    }

    pub fn with_features(mut self, features: Vec<RawFeatures>) -> Self {
        for f in features {
            if let Some(id) = f.get("id").and_then(Value::as_str) {
                self.features.insert(id.to_string(), f.clone());
            }
        }
        self
    }

    pub fn fail_search_at(mut self, offset: usize) -> Self {
        self.fail_search_offset = Some(offset);
        self
    }

    pub fn fail_lookup_at(mut self, batch: usize) -> Self {
        self.fail_lookup_batch = Some(batch);
        self
    }

    pub fn misaligned_lookups(mut self) -> Self {
        self.drop_last_lookup_slot = true;
        self
    }

    pub fn search_offsets(&self) -> Vec<usize> {
        self.search_calls.borrow().clone()
    }

    pub fn lookup_batches(&self) -> Vec<Vec<String>> {
        self.lookup_calls.borrow().clone()
    }
}

impl CatalogService for FakeCatalog {
    fn search(&self, _query: &SearchQuery, limit: usize, offset: usize) -> Result<SearchPage, CatalogError> {
        let call = {
            let mut calls = self.search_calls.borrow_mut();
            calls.push(offset);
            calls.len() - 1
        };
        if self.fail_search_offset == Some(offset) {
            return Err(failure(429));
        }
        let items = self
            .pages
            .get(call)
            .map(|p| p.iter().take(limit).cloned().collect())
            .unwrap_or_default();
        Ok(SearchPage { items })
    }

    fn audio_features(&self, ids: &[String]) -> Result<Vec<Option<RawFeatures>>, CatalogError> {
        let batch = {
            let mut calls = self.lookup_calls.borrow_mut();
            calls.push(ids.to_vec());
            calls.len() - 1
        };
        if self.fail_lookup_batch == Some(batch) {
            return Err(failure(503));
        }
        let mut slots: Vec<_> = ids.iter().map(|id| self.features.get(id).cloned()).collect();
        if self.drop_last_lookup_slot {
            slots.pop();
        }
        Ok(slots)
    }
}
