//! Direct access to the TIFF structure inside a JPEG EXIF segment
//!
//! Updates only ever append to the block. Existing bytes stay where they are,
//! so every offset stored in other directories (GPS, thumbnail, interop,
//! maker notes) keeps pointing at the same data.

use crate::error::{HarvestError, Result};

pub(super) const TAG_EXIF_IFD: u16 = 0x8769;
pub(super) const TAG_GPS_IFD: u16 = 0x8825;
pub(super) const TAG_INTEROP_IFD: u16 = 0xA005;
pub(super) const TAG_USER_COMMENT: u16 = 0x9286;

const FORMAT_LONG: u16 = 4;
const FORMAT_UNDEFINED: u16 = 7;
const ENTRY_LEN: usize = 12;

// Nesting seen in practice is IFD0 -> Exif -> Interop
const MAX_IFD_DEPTH: usize = 3;
const MAX_IFD_CHAIN: usize = 4;

/// One 12-byte directory entry; `value` is kept in the block's byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct IfdEntry {
    pub(super) tag: u16,
    pub(super) format: u16,
    pub(super) count: u32,
    pub(super) value: [u8; 4],
}

#[derive(Debug, Clone)]
pub(super) struct Ifd {
    pub(super) offset: usize,
    pub(super) entries: Vec<IfdEntry>,
    pub(super) next: u32,
}

/// A tag with its value bytes resolved, labelled by the directory it lives in
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct TagRecord {
    pub(super) directory: String,
    pub(super) tag: u16,
    pub(super) format: u16,
    pub(super) count: u32,
    pub(super) data: Vec<u8>,
}

impl TagRecord {
    pub(super) fn is_user_comment(&self) -> bool {
        self.tag == TAG_USER_COMMENT && self.directory.ends_with("/Exif")
    }
}

/// Borrowed TIFF block (the EXIF segment contents after `Exif\0\0`)
pub(super) struct Tiff<'a> {
    data: &'a [u8],
    big_endian: bool,
}

fn malformed(what: &str) -> HarvestError {
    HarvestError::metadata_container(format!("Malformed EXIF data: {}", what))
}

/// Size in bytes of one value of a TIFF field type
fn format_size(format: u16) -> Option<usize> {
    match format {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 | 13 => Some(4),
        5 | 10 | 12 => Some(8),
        _ => None,
    }
}

fn sub_ifd_name(tag: u16) -> Option<&'static str> {
    match tag {
        TAG_EXIF_IFD => Some("Exif"),
        TAG_GPS_IFD => Some("GPS"),
        TAG_INTEROP_IFD => Some("Interop"),
        _ => None,
    }
}

fn pad_to_word(buffer: &mut Vec<u8>) {
    if buffer.len() % 2 == 1 {
        buffer.push(0);
    }
}

/// Replace the entry with the same tag, or insert it keeping tags ascending
fn upsert_entry(entries: &mut Vec<IfdEntry>, entry: IfdEntry) {
    if let Some(existing) = entries.iter_mut().find(|e| e.tag == entry.tag) {
        *existing = entry;
        return;
    }
    let index = entries
        .iter()
        .position(|e| e.tag > entry.tag)
        .unwrap_or(entries.len());
    entries.insert(index, entry);
}

impl<'a> Tiff<'a> {
    pub(super) fn parse(data: &'a [u8]) -> Result<Self> {
        let big_endian = match data.get(..2) {
            Some(b"MM") => true,
            Some(b"II") => false,
            _ => return Err(malformed("unknown byte order")),
        };
        let tiff = Self { data, big_endian };
        if tiff.u16_at(2)? != 42 {
            return Err(malformed("bad TIFF header"));
        }
        Ok(tiff)
    }

    fn u16_at(&self, offset: usize) -> Result<u16> {
        let bytes: [u8; 2] = self
            .data
            .get(offset..offset.saturating_add(2))
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| malformed("offset past end of block"))?;
        Ok(if self.big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        })
    }

    fn u32_at(&self, offset: usize) -> Result<u32> {
        let bytes: [u8; 4] = self
            .data
            .get(offset..offset.saturating_add(4))
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| malformed("offset past end of block"))?;
        Ok(self.decode_u32(bytes))
    }

    fn decode_u32(&self, bytes: [u8; 4]) -> u32 {
        if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        }
    }

    fn encode_u16(&self, value: u16) -> [u8; 2] {
        if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    fn encode_u32(&self, value: u32) -> [u8; 4] {
        if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    fn first_ifd_offset(&self) -> Result<usize> {
        Ok(self.u32_at(4)? as usize)
    }

    pub(super) fn ifd(&self, offset: usize) -> Result<Ifd> {
        let count = usize::from(self.u16_at(offset)?);
        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let pos = offset + 2 + i * ENTRY_LEN;
            let value: [u8; 4] = self
                .data
                .get(pos + 8..pos + 12)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| malformed("directory past end of block"))?;
            entries.push(IfdEntry {
                tag: self.u16_at(pos)?,
                format: self.u16_at(pos + 2)?,
                count: self.u32_at(pos + 4)?,
                value,
            });
        }
        let next = self.u32_at(offset + 2 + count * ENTRY_LEN)?;
        Ok(Ifd {
            offset,
            entries,
            next,
        })
    }

    /// Value bytes of an entry, inline or behind its offset
    pub(super) fn entry_data(&self, entry: &IfdEntry) -> Result<Vec<u8>> {
        let unit = format_size(entry.format).ok_or_else(|| malformed("unknown field type"))?;
        let len = unit
            .checked_mul(entry.count as usize)
            .ok_or_else(|| malformed("field too large"))?;
        if len <= 4 {
            return entry
                .value
                .get(..len)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| malformed("inline value"));
        }

        let offset = self.decode_u32(entry.value) as usize;
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| malformed("value past end of block"))
    }

    /// Every tag in the IFD chain, sub-directories resolved in place
    ///
    /// Fails on any pointer that leads outside the block.
    pub(super) fn tag_records(&self) -> Result<Vec<TagRecord>> {
        let mut records = Vec::new();
        let mut offset = self.first_ifd_offset()?;
        let mut index = 0;
        while offset != 0 {
            if index == MAX_IFD_CHAIN {
                return Err(malformed("IFD chain too long"));
            }
            let next = self.collect_records(offset, &format!("IFD{}", index), 0, &mut records)?;
            offset = next as usize;
            index += 1;
        }
        Ok(records)
    }

    fn collect_records(
        &self,
        offset: usize,
        directory: &str,
        depth: usize,
        records: &mut Vec<TagRecord>,
    ) -> Result<u32> {
        if depth > MAX_IFD_DEPTH {
            return Err(malformed("sub-IFDs nested too deeply"));
        }

        let ifd = self.ifd(offset)?;
        for entry in &ifd.entries {
            if let Some(name) = sub_ifd_name(entry.tag) {
                let target = self.decode_u32(entry.value) as usize;
                self.collect_records(target, &format!("{}/{}", directory, name), depth + 1, records)?;
            } else {
                records.push(TagRecord {
                    directory: directory.to_string(),
                    tag: entry.tag,
                    format: entry.format,
                    count: entry.count,
                    data: self.entry_data(entry)?,
                });
            }
        }
        Ok(ifd.next)
    }

    /// Raw `UserComment` value from the Exif IFD
    pub(super) fn user_comment(&self) -> Result<Option<Vec<u8>>> {
        let ifd0 = self.ifd(self.first_ifd_offset()?)?;
        let Some(pointer) = ifd0.entries.iter().find(|e| e.tag == TAG_EXIF_IFD) else {
            return Ok(None);
        };

        let exif = self.ifd(self.decode_u32(pointer.value) as usize)?;
        exif.entries
            .iter()
            .find(|e| e.tag == TAG_USER_COMMENT)
            .map(|entry| self.entry_data(entry))
            .transpose()
    }

    /// Copy of the block whose Exif IFD carries `comment` as its `UserComment`
    ///
    /// The Exif IFD is rewritten at the end of the block and IFD0's pointer to
    /// it updated. Without an Exif IFD, IFD0 itself is rewritten with the new
    /// pointer. Nothing before the original end of the block moves.
    pub(super) fn with_user_comment(&self, comment: &[u8]) -> Result<Vec<u8>> {
        let ifd0 = self.ifd(self.first_ifd_offset()?)?;
        let pointer_index = ifd0.entries.iter().position(|e| e.tag == TAG_EXIF_IFD);

        let mut exif = match pointer_index.and_then(|i| ifd0.entries.get(i)) {
            Some(pointer) => self.ifd(self.decode_u32(pointer.value) as usize)?,
            None => Ifd {
                offset: 0,
                entries: Vec::new(),
                next: 0,
            },
        };

        let mut out = self.data.to_vec();
        let count = u32::try_from(comment.len()).map_err(|_| malformed("comment too large"))?;
        let value = if comment.len() <= 4 {
            let mut inline = [0u8; 4];
            inline
                .get_mut(..comment.len())
                .ok_or_else(|| malformed("inline value"))?
                .copy_from_slice(comment);
            inline
        } else {
            pad_to_word(&mut out);
            let data_offset = self.block_offset(&out)?;
            out.extend_from_slice(comment);
            self.encode_u32(data_offset)
        };
        upsert_entry(
            &mut exif.entries,
            IfdEntry {
                tag: TAG_USER_COMMENT,
                format: FORMAT_UNDEFINED,
                count,
                value,
            },
        );

        pad_to_word(&mut out);
        let exif_offset = self.block_offset(&out)?;
        self.write_ifd(&mut out, &exif.entries, exif.next)?;

        match pointer_index {
            Some(index) => {
                let pos = ifd0.offset + 2 + index * ENTRY_LEN + 8;
                out.get_mut(pos..pos + 4)
                    .ok_or_else(|| malformed("directory past end of block"))?
                    .copy_from_slice(&self.encode_u32(exif_offset));
            },
            None => {
                let mut entries = ifd0.entries.clone();
                upsert_entry(
                    &mut entries,
                    IfdEntry {
                        tag: TAG_EXIF_IFD,
                        format: FORMAT_LONG,
                        count: 1,
                        value: self.encode_u32(exif_offset),
                    },
                );
                let ifd0_offset = self.block_offset(&out)?;
                self.write_ifd(&mut out, &entries, ifd0.next)?;
                out.get_mut(4..8)
                    .ok_or_else(|| malformed("bad TIFF header"))?
                    .copy_from_slice(&self.encode_u32(ifd0_offset));
            },
        }

        Ok(out)
    }

    fn block_offset(&self, buffer: &[u8]) -> Result<u32> {
        u32::try_from(buffer.len()).map_err(|_| malformed("block too large"))
    }

    fn write_ifd(&self, out: &mut Vec<u8>, entries: &[IfdEntry], next: u32) -> Result<()> {
        let count = u16::try_from(entries.len()).map_err(|_| malformed("too many entries"))?;
        out.extend_from_slice(&self.encode_u16(count));
        for entry in entries {
            out.extend_from_slice(&self.encode_u16(entry.tag));
            out.extend_from_slice(&self.encode_u16(entry.format));
            out.extend_from_slice(&self.encode_u32(entry.count));
            out.extend_from_slice(&entry.value);
        }
        out.extend_from_slice(&self.encode_u32(next));
        Ok(())
    }
}

#[cfg(test)]
/// Big-endian block: IFD0 {Make "Cam", GPSInfo} and a GPS IFD {GPSVersionID}
pub(super) fn gps_tiff() -> Vec<u8> {
    let mut tiff = b"MM\0\x2A\0\0\0\x08".to_vec();
    // IFD0 at 8: two entries
    tiff.extend_from_slice(&[0x00, 0x02]);
    tiff.extend_from_slice(&[0x01, 0x0F, 0x00, 0x02, 0, 0, 0, 4, b'C', b'a', b'm', 0]);
    tiff.extend_from_slice(&[0x88, 0x25, 0x00, 0x04, 0, 0, 0, 1, 0, 0, 0, 38]);
    tiff.extend_from_slice(&[0, 0, 0, 0]);
    // GPS IFD at 38: GPSVersionID 2.2.0.0
    tiff.extend_from_slice(&[0x00, 0x01]);
    tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0, 0, 0, 4, 2, 2, 0, 0]);
    tiff.extend_from_slice(&[0, 0, 0, 0]);
    tiff
}
