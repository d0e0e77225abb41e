//! Listing data model
//!
//! Domain values (`VehicleRecord`, `ImageAsset`, `Listing`) plus the wire-level
//! DTOs used to decode a listings page. Decoding goes through the DTOs so that
//! missing required fields surface as [`HarvestError::Decode`] instead of
//! silently producing empty records.

use crate::error::{HarvestError, Result};
use crate::normalize::UrlNormalizer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Make/model attributes of one listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub make: String,
    pub model: String,
}

impl VehicleRecord {
    #[must_use]
    pub fn new<M: Into<String>, N: Into<String>>(make: M, model: N) -> Self {
        Self {
            make: make.into(),
            model: model.into(),
        }
    }
}

/// Provenance payload embedded into each downloaded image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub vehicle: VehicleRecord,
}

impl ImageMetadata {
    /// Serialize to the JSON document stored in the image comment field
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a JSON document previously produced by [`ImageMetadata::to_json`]
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One canonical image URL bound to the vehicle it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    canonical_url: String,
    vehicle: Arc<VehicleRecord>,
}

impl ImageAsset {
    /// Create an asset from a raw CDN reference, normalizing it once
    #[must_use]
    pub fn new(raw_url: &str, vehicle: Arc<VehicleRecord>) -> Self {
        Self {
            canonical_url: UrlNormalizer::normalize(raw_url),
            vehicle,
        }
    }

    #[must_use]
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    #[must_use]
    pub fn vehicle(&self) -> &VehicleRecord {
        &self.vehicle
    }

    /// On-disk name: everything after the final `/` of the canonical URL
    ///
    /// Assets with equal canonical URLs always share a filename. A URL ending
    /// in `/` yields an empty name.
    #[must_use]
    pub fn filename(&self) -> &str {
        self.canonical_url
            .rsplit('/')
            .next()
            .unwrap_or(self.canonical_url.as_str())
    }

    /// Metadata payload describing where this image came from
    #[must_use]
    pub fn metadata(&self) -> ImageMetadata {
        ImageMetadata {
            vehicle: (*self.vehicle).clone(),
        }
    }
}

/// A listing: one vehicle and its images in page order
#[derive(Debug, Clone)]
pub struct Listing {
    pub vehicle: Arc<VehicleRecord>,
    pub images: Vec<ImageAsset>,
}

impl Listing {
    /// Build a listing, constructing one `ImageAsset` per raw image reference
    #[must_use]
    pub fn new<I, S>(vehicle: VehicleRecord, raw_images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let vehicle = Arc::new(vehicle);
        let images = raw_images
            .into_iter()
            .map(|url| ImageAsset::new(url.as_ref(), Arc::clone(&vehicle)))
            .collect();
        Self { vehicle, images }
    }
}

/// Top-level body of a listings page: `{ pageProps: { listings: [...] } }`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PageBody {
    pub(crate) page_props: PageProps,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageProps {
    pub(crate) listings: Vec<RawListing>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawListing {
    pub(crate) vehicle: RawVehicle,
    pub(crate) images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawVehicle {
    pub(crate) make: String,
    pub(crate) model: String,
}

impl From<RawListing> for Listing {
    fn from(raw: RawListing) -> Self {
        Listing::new(
            VehicleRecord::new(raw.vehicle.make, raw.vehicle.model),
            raw.images,
        )
    }
}

/// Decode a listings page body into domain listings
///
/// # Errors
/// - `HarvestError::Decode` when the body is not JSON or a required field
///   (`pageProps.listings`, `vehicle.make`, `vehicle.model`, `images`) is absent
pub fn parse_listings(body: &[u8]) -> Result<Vec<Listing>> {
    let page: PageBody = serde_json::from_slice(body)
        .map_err(|e| HarvestError::decode(format!("Invalid listings page: {}", e)))?;
    Ok(page
        .page_props
        .listings
        .into_iter()
        .map(Listing::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corolla() -> Arc<VehicleRecord> {
        Arc::new(VehicleRecord::new("Toyota", "Corolla"))
    }

    #[test]
    fn test_asset_normalizes_url_once() {
        let asset = ImageAsset::new("https://img.cdn/listing/abc.jpg/640x480.webp", corolla());
        assert_eq!(asset.canonical_url(), "https://img.cdn/listing/abc.jpg");
        assert_eq!(asset.filename(), "abc.jpg");
    }

    #[test]
    fn test_equal_canonical_urls_share_filename() {
        let vehicle = corolla();
        let small = ImageAsset::new("https://img.cdn/l/abc.jpg/250x188.webp", Arc::clone(&vehicle));
        let large = ImageAsset::new("https://img.cdn/l/abc.jpg/1280x960.jpg", vehicle);
        assert_eq!(small.canonical_url(), large.canonical_url());
        assert_eq!(small.filename(), large.filename());
    }

    #[test]
    fn test_filename_edge_cases() {
        let asset = ImageAsset::new("https://img.cdn/dir/", corolla());
        assert_eq!(asset.filename(), "");

        let asset = ImageAsset::new("abc.jpg", corolla());
        assert_eq!(asset.filename(), "abc.jpg");
    }

    #[test]
    fn test_listing_shares_vehicle_across_images() {
        let listing = Listing::new(
            VehicleRecord::new("Volvo", "V60"),
            ["https://img.cdn/a.jpg", "https://img.cdn/b.jpg"],
        );
        assert_eq!(listing.images.len(), 2);
        assert_eq!(Arc::strong_count(&listing.vehicle), 3);
        for image in &listing.images {
            assert_eq!(image.vehicle(), listing.vehicle.as_ref());
        }
    }

    #[test]
    fn test_metadata_json_shape() {
        let asset = ImageAsset::new("https://img.cdn/a.jpg", corolla());
        let json = asset.metadata().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"vehicle": {"make": "Toyota", "model": "Corolla"}})
        );
        assert_eq!(ImageMetadata::from_json(&json).unwrap(), asset.metadata());
    }

    #[test]
    fn test_parse_listings_page() {
        let body = br#"{
            "pageProps": {
                "numberOfResults": 2,
                "listings": [
                    {
                        "id": "1",
                        "vehicle": {"make": "Toyota", "model": "Corolla", "fuel": "Hybrid"},
                        "images": [
                            "https://img.cdn/l/a.jpg/250x188.webp",
                            "https://img.cdn/l/b.jpg/250x188.webp"
                        ]
                    },
                    {
                        "vehicle": {"make": "BMW", "model": "320"},
                        "images": []
                    }
                ]
            }
        }"#;

        let listings = parse_listings(body).unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].vehicle.make, "Toyota");
        assert_eq!(listings[0].images[1].canonical_url(), "https://img.cdn/l/b.jpg");
        assert!(listings[1].images.is_empty());
    }

    #[test]
    fn test_parse_empty_listings_is_success() {
        let listings = parse_listings(br#"{"pageProps": {"listings": []}}"#).unwrap();
        assert!(listings.is_empty());
    }

    #[test]
    fn test_parse_rejects_schema_violations() {
        let cases: [&[u8]; 5] = [
            b"{not json",
            br#"{"props": {}}"#,
            br#"{"pageProps": {}}"#,
            br#"{"pageProps": {"listings": [{"vehicle": {"make": "Audi"}, "images": []}]}}"#,
            br#"{"pageProps": {"listings": [{"vehicle": {"make": "Audi", "model": "A4"}}]}}"#,
        ];

        for body in cases {
            let err = parse_listings(body).unwrap_err();
            assert!(
                matches!(err, HarvestError::Decode(_)),
                "expected decode failure for {}",
                String::from_utf8_lossy(body)
            );
        }
    }
}
