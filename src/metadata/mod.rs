//! EXIF provenance embedding
//!
//! Writes the vehicle provenance JSON into the EXIF `UserComment` tag of a
//! saved JPEG. The update is a read, mutate, verify, replace transaction: the
//! new file is assembled in memory and checked to carry the original scan
//! data and non-EXIF segments unchanged, with no EXIF tag other than the
//! comment altered. The comment must also read back before the file is
//! swapped in via rename. On any failure the file on disk is left as it was.

mod tiff;

use crate::error::{HarvestError, Result};
use crate::models::ImageMetadata;
use image::ImageFormat;
use img_parts::jpeg::{Jpeg, JpegSegment};
use img_parts::{Bytes, ImageEXIF};
use little_exif::exif_tag::ExifTag;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;
use std::path::Path;
use tiff::Tiff;

/// Character-code prefix of a UTF-16 `UserComment`
const UNICODE_PREFIX: &[u8; 8] = b"UNICODE\0";
const ASCII_PREFIX: &[u8; 8] = b"ASCII\0\0\0";
const UNDEFINED_PREFIX: &[u8; 8] = &[0; 8];

// little_exif as_u8_vec(JPEG) returns: [APP1 marker 2B][length 2B][Exif\0\0 6B][TIFF data]
// img-parts set_exif() expects just the TIFF data
const JPEG_EXIF_OVERHEAD: usize = 10;

const EXIF_PREFIX: &[u8] = b"Exif\0\0";
const MARKER_APP1: u8 = 0xE1;
// Segment length field is 16 bits and counts itself
const MAX_SEGMENT_CONTENTS: usize = 0xFFFF - 2;
const INTEROP_INDEX: &str = "R98";

/// Embeds and reads vehicle provenance in JPEG EXIF data
pub struct MetadataEmbedder;

impl MetadataEmbedder {
    /// Set the `UserComment` of the JPEG at `path` to the JSON form of `payload`
    ///
    /// An existing EXIF block is patched in place, so its other tags, GPS
    /// directory and thumbnail are carried over. Pixel data and all other
    /// segments are preserved byte for byte.
    ///
    /// # Errors
    /// - `HarvestError::MetadataContainer` when the file is not a JPEG, its
    ///   EXIF cannot be parsed, or the rewritten file fails verification
    /// - `HarvestError::Io` when reading or replacing the file fails
    pub fn embed(path: &Path, payload: &ImageMetadata) -> Result<()> {
        let original = std::fs::read(path)
            .map_err(|e| HarvestError::file_io_error("read image for tagging", path, &e))?;
        let json = payload.to_json()?;
        let updated = Self::embed_in_bytes(path, &original, &json)?;
        replace_file(path, &updated)?;
        log::debug!(
            "Embedded {} byte provenance comment into {}",
            json.len(),
            path.display()
        );
        Ok(())
    }

    fn embed_in_bytes(path: &Path, original: &[u8], comment: &str) -> Result<Vec<u8>> {
        let mut jpeg = parse_jpeg(original)?;
        let original_exif_pos = find_exif_segment_pos(jpeg.segments());
        let existing = jpeg.exif().filter(|exif| !exif.is_empty());
        let encoded = encode_user_comment(comment);

        let tiff_data = match &existing {
            // Patch the existing block so every other directory survives as is
            Some(exif) => Tiff::parse(exif)?.with_user_comment(&encoded)?,
            None => new_exif_block(&encoded),
        };
        if tiff_data.is_empty() {
            return Err(HarvestError::metadata_container(format!(
                "EXIF serialization produced no data for {}",
                path.display()
            )));
        }
        if tiff_data.len() + EXIF_PREFIX.len() > MAX_SEGMENT_CONTENTS {
            return Err(HarvestError::metadata_container(format!(
                "EXIF data for {} would not fit in one APP1 segment",
                path.display()
            )));
        }
        verify_exif_block(existing.as_deref(), &tiff_data, &encoded)?;

        jpeg.set_exif(Some(Bytes::from(tiff_data)));

        // set_exif() inserts at a fixed position; move the segment back to
        // where the original EXIF lived
        if let (Some(target), Some(current)) =
            (original_exif_pos, find_exif_segment_pos(jpeg.segments()))
        {
            if target < current {
                let segments = jpeg.segments_mut();
                let segment = segments.remove(current);
                segments.insert(target, segment);
            }
        }

        let updated = jpeg.encoder().bytes().to_vec();
        verify_only_exif_changed(original, &updated)?;
        if Self::comment_in_bytes(&updated)?.as_deref() != Some(comment) {
            return Err(HarvestError::metadata_container(format!(
                "Comment written to {} does not read back",
                path.display()
            )));
        }
        Ok(updated)
    }

    /// Read the decoded `UserComment` of the JPEG at `path`
    ///
    /// Returns `Ok(None)` when the image has no EXIF data or no comment.
    ///
    /// # Errors
    /// - `HarvestError::MetadataContainer` when the file is not a readable JPEG
    ///   or its EXIF directories are malformed
    /// - `HarvestError::Io` when the file cannot be read
    pub fn read_comment(path: &Path) -> Result<Option<String>> {
        let bytes = std::fs::read(path)
            .map_err(|e| HarvestError::file_io_error("read image metadata", path, &e))?;
        Self::comment_in_bytes(&bytes)
    }

    fn comment_in_bytes(bytes: &[u8]) -> Result<Option<String>> {
        let jpeg = parse_jpeg(bytes)?;
        let Some(exif) = jpeg.exif().filter(|exif| !exif.is_empty()) else {
            return Ok(None);
        };
        let raw = Tiff::parse(&exif)?.user_comment()?;
        Ok(raw.as_deref().and_then(decode_user_comment))
    }

    /// Read the provenance payload embedded by [`MetadataEmbedder::embed`]
    ///
    /// # Errors
    /// - Same as [`MetadataEmbedder::read_comment`]
    /// - `HarvestError::Decode` when the comment is not a provenance document
    pub fn read_metadata(path: &Path) -> Result<Option<ImageMetadata>> {
        match Self::read_comment(path)? {
            Some(comment) => ImageMetadata::from_json(&comment).map(Some),
            None => Ok(None),
        }
    }
}

/// Encode text as a `UserComment` value in the unicode character code (UTF-16BE)
#[must_use]
pub fn encode_user_comment(text: &str) -> Vec<u8> {
    let mut bytes = UNICODE_PREFIX.to_vec();
    bytes.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
    bytes
}

/// Decode a `UserComment` value written with the unicode, ASCII or undefined code
#[must_use]
pub fn decode_user_comment(raw: &[u8]) -> Option<String> {
    let prefix = raw.get(..8)?;
    let body = raw.get(8..)?;

    if prefix == UNICODE_PREFIX {
        let units = body
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        let text: String = char::decode_utf16(units)
            .collect::<std::result::Result<_, _>>()
            .ok()?;
        Some(text.trim_end_matches('\0').to_string())
    } else if prefix == ASCII_PREFIX || prefix == UNDEFINED_PREFIX {
        Some(
            String::from_utf8_lossy(body)
                .trim_end_matches('\0')
                .to_string(),
        )
    } else {
        None
    }
}

fn parse_jpeg(bytes: &[u8]) -> Result<Jpeg> {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => {},
        Ok(other) => {
            return Err(HarvestError::metadata_container(format!(
                "Unsupported image container {:?}: only JPEG carries EXIF comments",
                other
            )));
        },
        Err(e) => {
            return Err(HarvestError::metadata_container(format!(
                "Unrecognized image data: {}",
                e
            )));
        },
    }

    Jpeg::from_bytes(Bytes::copy_from_slice(bytes))
        .map_err(|e| HarvestError::metadata_container(format!("Failed to parse JPEG: {}", e)))
}

/// Fresh TIFF block holding only the comment
///
/// little_exif links an Interop IFD from the Exif IFD whenever it writes one,
/// so the Interop IFD is given its index tag to keep that pointer valid.
fn new_exif_block(encoded_comment: &[u8]) -> Vec<u8> {
    let mut metadata = Metadata::new();
    metadata.set_tag(ExifTag::UserComment(encoded_comment.to_vec()));
    metadata.set_tag(ExifTag::InteroperabilityIndex(INTEROP_INDEX.to_string()));

    metadata
        .as_u8_vec(FileExtension::JPEG)
        .get(JPEG_EXIF_OVERHEAD..)
        .map(<[u8]>::to_vec)
        .unwrap_or_default()
}

/// Check a rewritten TIFF block before it goes anywhere near the file
///
/// Every directory pointer must resolve, the comment must read back, and
/// apart from `UserComment` the tags must match those of `original`.
fn verify_exif_block(original: Option<&[u8]>, updated: &[u8], encoded_comment: &[u8]) -> Result<()> {
    let mismatch = |what: &str| {
        HarvestError::metadata_container(format!("Rewritten EXIF {}", what))
    };

    let tiff = Tiff::parse(updated)?;
    let after = tiff.tag_records()?;
    if tiff.user_comment()?.as_deref() != Some(encoded_comment) {
        return Err(mismatch("does not carry the new comment"));
    }

    if let Some(original) = original {
        let before = Tiff::parse(original)?.tag_records()?;
        let kept_before = before.iter().filter(|r| !r.is_user_comment());
        let kept_after = after.iter().filter(|r| !r.is_user_comment());
        if !kept_before.eq(kept_after) {
            return Err(mismatch("changed tags other than UserComment"));
        }
    }

    Ok(())
}

/// Position of the EXIF APP1 segment
fn find_exif_segment_pos(segments: &[JpegSegment]) -> Option<usize> {
    segments
        .iter()
        .position(|s| s.marker() == MARKER_APP1 && s.contents().starts_with(EXIF_PREFIX))
}

fn is_exif_segment(segment: &JpegSegment) -> bool {
    segment.marker() == MARKER_APP1 && segment.contents().starts_with(EXIF_PREFIX)
}

/// Check that `updated` differs from `original` only in its EXIF segment
fn verify_only_exif_changed(original: &[u8], updated: &[u8]) -> Result<()> {
    let mismatch = |what: &str| {
        HarvestError::metadata_container(format!("Rewritten JPEG changed {}", what))
    };

    let original_scan = scan_offset(original)
        .and_then(|offset| original.get(offset..))
        .ok_or_else(|| mismatch("an unreadable segment layout"))?;
    let updated_scan = scan_offset(updated)
        .and_then(|offset| updated.get(offset..))
        .ok_or_else(|| mismatch("its segment layout"))?;
    if original_scan != updated_scan {
        return Err(mismatch("the scan data"));
    }

    let before = parse_jpeg(original)?;
    let after = parse_jpeg(updated)?;
    let kept_before = before.segments().iter().filter(|s| !is_exif_segment(s));
    let kept_after = after.segments().iter().filter(|s| !is_exif_segment(s));
    if !kept_before
        .map(|s| (s.marker(), s.contents()))
        .eq(kept_after.map(|s| (s.marker(), s.contents())))
    {
        return Err(mismatch("non-EXIF segments"));
    }

    Ok(())
}

/// Byte offset of the first start-of-scan marker
pub(crate) fn scan_offset(bytes: &[u8]) -> Option<usize> {
    if bytes.get(..2)? != [0xFF, 0xD8] {
        return None;
    }

    let mut pos = 2;
    loop {
        if *bytes.get(pos)? != 0xFF {
            return None;
        }
        let marker = *bytes.get(pos + 1)?;
        match marker {
            // fill byte
            0xFF => pos += 1,
            0xDA => return Some(pos),
            0x01 | 0xD0..=0xD7 => pos += 2,
            _ => {
                let length = usize::from(u16::from_be_bytes([
                    *bytes.get(pos + 2)?,
                    *bytes.get(pos + 3)?,
                ]));
                pos += 2 + length;
            },
        }
    }
}

/// Replace `path` with `contents` via a temporary sibling and rename
fn replace_file(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.exif.part", file_name));

    if let Err(e) = std::fs::write(&temp_path, contents) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(HarvestError::file_io_error("write tagged image", &temp_path, &e));
    }

    std::fs::rename(&temp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        HarvestError::file_io_error("replace image with tagged copy", path, &e)
    })
}
