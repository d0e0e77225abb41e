//! Test utilities and mock collaborators for harvest testing
//!
//! In-memory implementations of [`ListingSource`] and [`ImageFetcher`] with
//! call histories, so coordinator behaviour can be verified without network
//! access.

use crate::{
    download::{ImageBody, ImageFetcher},
    error::{HarvestError, Result},
    models::{Listing, VehicleRecord},
    source::ListingSource,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::io::StreamReader;

/// Scripted response for one page index
#[derive(Debug, Clone)]
pub enum MockPage {
    Listings(Vec<Listing>),
    Failure,
}

/// Mock listing source; unscripted pages are empty
#[derive(Debug, Clone, Default)]
pub struct MockListingSource {
    pages: HashMap<u32, MockPage>,
    call_history: Arc<Mutex<Vec<u32>>>,
}

impl MockListingSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page(mut self, page_index: u32, listings: Vec<Listing>) -> Self {
        self.pages.insert(page_index, MockPage::Listings(listings));
        self
    }

    #[must_use]
    pub fn with_failure(mut self, page_index: u32) -> Self {
        self.pages.insert(page_index, MockPage::Failure);
        self
    }

    /// Page indices requested so far, in order
    pub fn requested_pages(&self) -> Vec<u32> {
        self.call_history.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingSource for MockListingSource {
    async fn fetch_page(&self, page_index: u32) -> Result<Vec<Listing>> {
        self.call_history.lock().unwrap().push(page_index);
        match self.pages.get(&page_index) {
            Some(MockPage::Listings(listings)) => Ok(listings.clone()),
            Some(MockPage::Failure) => Err(HarvestError::http_status(
                "503 Service Unavailable",
                &format!("mock://page/{}", page_index),
            )),
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Clone)]
enum MockImage {
    Body(Vec<u8>),
    BrokenStream,
}

/// Mock image fetcher; unknown URLs answer 404
#[derive(Debug, Clone, Default)]
pub struct MockImageFetcher {
    images: HashMap<String, MockImage>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl MockImageFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_image(mut self, url: &str, body: &[u8]) -> Self {
        self.images
            .insert(url.to_string(), MockImage::Body(body.to_vec()));
        self
    }

    /// Register a URL whose body fails after the first few bytes
    #[must_use]
    pub fn with_broken_stream(mut self, url: &str) -> Self {
        self.images.insert(url.to_string(), MockImage::BrokenStream);
        self
    }

    /// URLs opened so far, in order
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for MockImageFetcher {
    async fn open(&self, url: &str) -> Result<ImageBody> {
        self.attempts.lock().unwrap().push(url.to_string());
        match self.images.get(url) {
            Some(MockImage::Body(body)) => Ok(Box::new(std::io::Cursor::new(body.clone()))),
            Some(MockImage::BrokenStream) => {
                let chunks: Vec<std::io::Result<&'static [u8]>> = vec![
                    Ok(b"partial".as_slice()),
                    Err(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        "connection reset by peer",
                    )),
                ];
                Ok(Box::new(StreamReader::new(futures_util::stream::iter(chunks))))
            },
            None => Err(HarvestError::http_status("404 Not Found", url)),
        }
    }
}

/// Listing with `count` images named `<prefix>-<n>.jpg`, served in 250x188 webp renditions
pub fn listing_with_images(make: &str, model: &str, prefix: &str, count: usize) -> Listing {
    Listing::new(
        VehicleRecord::new(make, model),
        (1..=count).map(|n| format!("https://img.cdn/listing/{}-{}.jpg/250x188.webp", prefix, n)),
    )
}

/// Canonical URL of image `n` produced by [`listing_with_images`]
pub fn canonical_image_url(prefix: &str, n: usize) -> String {
    format!("https://img.cdn/listing/{}-{}.jpg", prefix, n)
}
