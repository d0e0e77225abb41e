//! Shared fixtures for integration tests
//!
//! Mocks here speak the wire format: listing pages are scripted as JSON bodies
//! and decoded with [`parse_listings`], images are served from memory.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use listing_harvester::{
    parse_listings, HarvestError, ImageBody, ImageFetcher, Listing, ListingSource, Result,
};
use serde_json::json;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

/// Listing source serving scripted JSON pages; unscripted pages answer 404
#[derive(Clone, Default)]
pub struct JsonPageSource {
    pages: HashMap<u32, Vec<u8>>,
    requests: Arc<Mutex<Vec<u32>>>,
}

impl JsonPageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page_index: u32, body: serde_json::Value) -> Self {
        self.pages.insert(page_index, body.to_string().into_bytes());
        self
    }

    pub fn with_raw_page(mut self, page_index: u32, body: &[u8]) -> Self {
        self.pages.insert(page_index, body.to_vec());
        self
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingSource for JsonPageSource {
    async fn fetch_page(&self, page_index: u32) -> Result<Vec<Listing>> {
        self.requests.lock().unwrap().push(page_index);
        match self.pages.get(&page_index) {
            Some(body) => parse_listings(body),
            None => Err(HarvestError::http_status(
                "404 Not Found",
                &format!("mock://lst.json?page={}", page_index),
            )),
        }
    }
}

/// Image fetcher serving in-memory bodies; unknown URLs answer 404
#[derive(Clone, Default)]
pub struct MemoryImageFetcher {
    images: HashMap<String, Vec<u8>>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl MemoryImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, url: &str, body: Vec<u8>) -> Self {
        self.images.insert(url.to_string(), body);
        self
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for MemoryImageFetcher {
    async fn open(&self, url: &str) -> Result<ImageBody> {
        self.attempts.lock().unwrap().push(url.to_string());
        match self.images.get(url) {
            Some(body) => Ok(Box::new(Cursor::new(body.clone()))),
            None => Err(HarvestError::http_status("404 Not Found", url)),
        }
    }
}

/// JSON listings page in the endpoint's `pageProps.listings` shape
pub fn listings_page(listings: &[(&str, &str, Vec<String>)]) -> serde_json::Value {
    let listings: Vec<serde_json::Value> = listings
        .iter()
        .map(|(make, model, images)| {
            json!({
                "id": format!("{}-{}", make, model),
                "vehicle": { "make": make, "model": model, "mileage": 42000 },
                "images": images,
            })
        })
        .collect();

    json!({ "pageProps": { "listings": listings, "numberOfResults": listings.len() } })
}

/// CDN rendition URL of image `n` for a listing
pub fn rendition_url(prefix: &str, n: usize) -> String {
    format!("https://prod.pictures.example/listing-images/{}-{}.jpg/250x188.webp", prefix, n)
}

/// Canonical URL matching [`rendition_url`]
pub fn canonical_url(prefix: &str, n: usize) -> String {
    format!("https://prod.pictures.example/listing-images/{}-{}.jpg", prefix, n)
}

pub fn renditions(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|n| rendition_url(prefix, n)).collect()
}

/// Small baseline JPEG with a gradient, distinct per `seed`
pub fn sample_jpeg(seed: u8) -> Vec<u8> {
    let image = RgbImage::from_fn(24, 16, |x, y| {
        Rgb([(x * 10) as u8, (y * 15) as u8, seed.wrapping_mul(37)])
    });
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buffer, ImageFormat::Jpeg)
        .unwrap();
    buffer.into_inner()
}

/// Bytes from the first SOS marker (0xFFDA) to the end of the file
pub fn scan_data(jpeg: &[u8]) -> &[u8] {
    let start = jpeg
        .windows(2)
        .position(|w| w == [0xFF, 0xDA])
        .expect("JPEG without SOS marker");
    &jpeg[start..]
}
