//! TIFF container structure writer.
//!
//! Produces little-endian classic TIFF or BigTIFF files with:
//! - tile (or strip) payloads streamed up front, so multi-gigabyte pyramids
//!   never need to be held in memory
//! - chained top-level IFDs written after the payload
//! - optional SubIFD arrays nesting reduced-resolution levels under a frame
//!
//! The writer deals only in container structure. Compressed tile bytes come
//! from the tile encoder; tag values are supplied as [`TagValue`]s.
//!
//! # Usage
//!
//! ```ignore
//! let mut writer = TiffFileWriter::new(file, false)?;
//! let offset = writer.append_payload(&tile_bytes)?;
//! let mut ifd = IfdBuilder::new();
//! ifd.set(TiffTag::ImageWidth, TagValue::long(width));
//! ifd.set(TiffTag::TileOffsets, TagValue::Longs(vec![offset as u32]));
//! // ... remaining tags ...
//! writer.finish(vec![ifd])?;
//! ```

use std::collections::BTreeMap;
use std::io::{Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::TiffError;

use super::tags::TiffTag;
use super::value::TagValue;

/// Maximum byte offset addressable by classic TIFF.
const CLASSIC_MAX_OFFSET: u64 = u32::MAX as u64;

// =============================================================================
// IfdBuilder
// =============================================================================

/// Accumulates the entries of one output IFD.
///
/// Entries are kept keyed by tag ID so they serialize in the ascending tag
/// order the TIFF specification requires. Reduced-resolution levels attached
/// via [`IfdBuilder::push_subifd`] become a SubIFDs entry during layout.
#[derive(Debug, Clone, Default)]
pub struct IfdBuilder {
    entries: BTreeMap<u16, TagValue>,
    subifds: Vec<IfdBuilder>,
}

impl IfdBuilder {
    /// Create an empty IFD builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a tag value, replacing any previous value for the tag.
    pub fn set(&mut self, tag: TiffTag, value: TagValue) {
        self.entries.insert(tag.as_u16(), value);
    }

    /// Set a tag by numeric ID (georeferencing carry-over uses this).
    pub fn set_raw(&mut self, tag: u16, value: TagValue) {
        self.entries.insert(tag, value);
    }

    /// Get a previously set value.
    pub fn get(&self, tag: TiffTag) -> Option<&TagValue> {
        self.entries.get(&tag.as_u16())
    }

    /// Attach a reduced-resolution IFD, nested under this one via SubIFDs.
    pub fn push_subifd(&mut self, ifd: IfdBuilder) {
        self.subifds.push(ifd);
    }

    /// Number of attached sub-IFDs.
    pub fn subifd_count(&self) -> usize {
        self.subifds.len()
    }

    /// Number of entries this IFD serializes with (includes the SubIFDs
    /// entry synthesized during layout).
    fn entry_count(&self) -> usize {
        self.entries.len() + usize::from(!self.subifds.is_empty())
    }
}

// =============================================================================
// Layout
// =============================================================================

/// One IFD with every offset resolved, ready to serialize.
struct LaidOutIfd {
    /// File offset of the IFD table itself
    offset: u64,
    /// (tag, value, out-of-line value offset or None for inline)
    entries: Vec<(u16, TagValue, Option<u64>)>,
    /// Offset of the next IFD in the chain (0 terminates)
    next_offset: u64,
}

// =============================================================================
// TiffFileWriter
// =============================================================================

/// Streaming writer for tiled pyramidal TIFF output.
pub struct TiffFileWriter<W: Write + Seek> {
    inner: W,
    bigtiff: bool,
    pos: u64,
}

impl<W: Write + Seek> TiffFileWriter<W> {
    /// Create a writer and emit the file header.
    ///
    /// The first-IFD offset is left as a placeholder and patched by
    /// [`TiffFileWriter::finish`].
    pub fn new(mut inner: W, bigtiff: bool) -> Result<Self, TiffError> {
        inner.seek(SeekFrom::Start(0))?;
        inner.write_all(&[0x49, 0x49])?; // II
        if bigtiff {
            inner.write_u16::<LittleEndian>(43)?;
            inner.write_u16::<LittleEndian>(8)?;
            inner.write_u16::<LittleEndian>(0)?;
            inner.write_u64::<LittleEndian>(0)?; // first IFD placeholder
        } else {
            inner.write_u16::<LittleEndian>(42)?;
            inner.write_u32::<LittleEndian>(0)?; // first IFD placeholder
        }
        let pos = if bigtiff { 16 } else { 8 };
        Ok(TiffFileWriter {
            inner,
            bigtiff,
            pos,
        })
    }

    /// Whether this writer emits BigTIFF.
    pub fn is_bigtiff(&self) -> bool {
        self.bigtiff
    }

    /// Current write position (next payload lands at or just after this).
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Append a payload block (one compressed tile or strip), returning its
    /// file offset. Payloads are word-aligned per the TIFF spec.
    pub fn append_payload(&mut self, data: &[u8]) -> Result<u64, TiffError> {
        self.align()?;
        let offset = self.pos;
        self.check_offset(offset + data.len() as u64)?;
        self.inner.write_all(data)?;
        self.pos += data.len() as u64;
        Ok(offset)
    }

    /// Write all IFDs and patch the header, consuming the writer.
    ///
    /// `ifds` become the top-level chain in order; sub-IFDs attached to each
    /// are laid out immediately after their parent and referenced through a
    /// SubIFDs entry.
    pub fn finish(mut self, ifds: Vec<IfdBuilder>) -> Result<W, TiffError> {
        if ifds.is_empty() {
            return Err(TiffError::MissingTag("no IFDs to write"));
        }
        self.align()?;

        let laid_out = self.layout(&ifds)?;
        let first_ifd_offset = laid_out[0].offset;

        for ifd in &laid_out {
            self.write_ifd(ifd)?;
        }

        // Patch the header's first-IFD pointer
        if self.bigtiff {
            self.inner.seek(SeekFrom::Start(8))?;
            self.inner.write_u64::<LittleEndian>(first_ifd_offset)?;
        } else {
            self.inner.seek(SeekFrom::Start(4))?;
            self.inner
                .write_u32::<LittleEndian>(first_ifd_offset as u32)?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Resolve file offsets for every IFD (including nested ones), every
    /// out-of-line value, the SubIFDs arrays, and the chain pointers.
    fn layout(&self, ifds: &[IfdBuilder]) -> Result<Vec<LaidOutIfd>, TiffError> {
        let entry_size = if self.bigtiff { 20u64 } else { 12 };
        let count_size = if self.bigtiff { 8u64 } else { 2 };
        let next_size = if self.bigtiff { 8u64 } else { 4 };
        let inline_max = if self.bigtiff { 8u64 } else { 4 };

        // First pass: assign table offsets and value-area offsets. Sub-IFDs
        // follow their parent so a flat walk covers everything.
        let mut cursor = align2(self.pos);
        let mut tables: Vec<(usize, Option<usize>, u64)> = Vec::new(); // (top idx, sub idx, offset)
        let mut sub_offsets: Vec<Vec<u64>> = vec![Vec::new(); ifds.len()];

        for (i, top) in ifds.iter().enumerate() {
            for (sub, builder) in std::iter::once((None, top))
                .chain(top.subifds.iter().enumerate().map(|(j, s)| (Some(j), s)))
            {
                let table_size =
                    count_size + builder.entry_count() as u64 * entry_size + next_size;
                let table_offset = cursor;
                cursor = align2(cursor + table_size);

                // Out-of-line values land directly after the table
                for value in builder.entries.values() {
                    let size = value.to_le_bytes().len() as u64;
                    if size > inline_max {
                        cursor = align2(cursor + size);
                    }
                }
                // The synthesized SubIFDs entry (LONG/LONG8 per sub) is
                // inline up to 1 (classic) or 2 (BigTIFF) levels, else
                // out-of-line.
                if !builder.subifds.is_empty() {
                    let size = builder.subifds.len() as u64 * if self.bigtiff { 8 } else { 4 };
                    if size > inline_max {
                        cursor = align2(cursor + size);
                    }
                }

                if let Some(j) = sub {
                    debug_assert_eq!(sub_offsets[i].len(), j);
                    sub_offsets[i].push(table_offset);
                }
                tables.push((i, sub, table_offset));
            }
        }
        self.check_offset(cursor)?;

        // Top-level chain pointers skip the interleaved sub-IFDs
        let top_offsets: Vec<u64> = tables
            .iter()
            .filter(|(_, sub, _)| sub.is_none())
            .map(|&(_, _, off)| off)
            .collect();

        // Second pass: materialize entries with resolved value offsets.
        let mut result = Vec::with_capacity(tables.len());
        for &(i, sub, table_offset) in &tables {
            let builder = match sub {
                None => &ifds[i],
                Some(j) => &ifds[i].subifds[j],
            };

            let mut entries: Vec<(u16, TagValue)> = builder
                .entries
                .iter()
                .map(|(&tag, v)| (tag, v.clone()))
                .collect();
            if !builder.subifds.is_empty() {
                let value = if self.bigtiff {
                    TagValue::Long8s(sub_offsets[i].clone())
                } else {
                    TagValue::Longs(sub_offsets[i].iter().map(|&o| o as u32).collect())
                };
                entries.push((TiffTag::SubIfds.as_u16(), value));
                entries.sort_by_key(|(tag, _)| *tag);
            }

            let table_size = count_size + entries.len() as u64 * entry_size + next_size;
            let mut value_cursor = align2(table_offset + table_size);
            let mut resolved = Vec::with_capacity(entries.len());
            for (tag, value) in entries {
                let size = value.to_le_bytes().len() as u64;
                let offset = if size > inline_max {
                    let at = value_cursor;
                    value_cursor = align2(value_cursor + size);
                    Some(at)
                } else {
                    None
                };
                resolved.push((tag, value, offset));
            }

            let next_offset = match sub {
                // Sub-IFDs are referenced only through the SubIFDs array
                Some(_) => 0,
                None => {
                    let chain_pos = top_offsets
                        .iter()
                        .position(|&o| o == table_offset)
                        .unwrap_or(0);
                    top_offsets.get(chain_pos + 1).copied().unwrap_or(0)
                }
            };

            result.push(LaidOutIfd {
                offset: table_offset,
                entries: resolved,
                next_offset,
            });
        }
        Ok(result)
    }

    /// Serialize one laid-out IFD: table, then its out-of-line values.
    fn write_ifd(&mut self, ifd: &LaidOutIfd) -> Result<(), TiffError> {
        self.seek_to(ifd.offset)?;

        if self.bigtiff {
            self.inner
                .write_u64::<LittleEndian>(ifd.entries.len() as u64)?;
            self.pos += 8;
        } else {
            self.inner
                .write_u16::<LittleEndian>(ifd.entries.len() as u16)?;
            self.pos += 2;
        }

        let inline_max = if self.bigtiff { 8usize } else { 4 };
        for (tag, value, value_offset) in &ifd.entries {
            self.inner.write_u16::<LittleEndian>(*tag)?;
            self.inner
                .write_u16::<LittleEndian>(value.field_type().as_u16())?;
            if self.bigtiff {
                self.inner.write_u64::<LittleEndian>(value.count())?;
            } else {
                self.inner.write_u32::<LittleEndian>(value.count() as u32)?;
            }

            let mut field = vec![0u8; inline_max];
            match value_offset {
                Some(offset) => {
                    if self.bigtiff {
                        field[..8].copy_from_slice(&offset.to_le_bytes());
                    } else {
                        field[..4].copy_from_slice(&(*offset as u32).to_le_bytes());
                    }
                }
                None => {
                    let bytes = value.to_le_bytes();
                    field[..bytes.len()].copy_from_slice(&bytes);
                }
            }
            self.inner.write_all(&field)?;
            self.pos += 4 + if self.bigtiff { 16 } else { 8 };
        }

        if self.bigtiff {
            self.inner.write_u64::<LittleEndian>(ifd.next_offset)?;
            self.pos += 8;
        } else {
            self.inner
                .write_u32::<LittleEndian>(ifd.next_offset as u32)?;
            self.pos += 4;
        }

        for (_, value, value_offset) in &ifd.entries {
            if let Some(offset) = value_offset {
                self.seek_to(*offset)?;
                let bytes = value.to_le_bytes();
                self.inner.write_all(&bytes)?;
                self.pos += bytes.len() as u64;
            }
        }
        Ok(())
    }

    fn seek_to(&mut self, offset: u64) -> Result<(), TiffError> {
        if offset != self.pos {
            // Pad forward if the target is beyond what we have written
            if offset > self.pos {
                let gap = (offset - self.pos) as usize;
                self.inner.write_all(&vec![0u8; gap])?;
            } else {
                self.inner.seek(SeekFrom::Start(offset))?;
            }
            self.pos = offset;
        }
        Ok(())
    }

    fn align(&mut self) -> Result<(), TiffError> {
        if self.pos % 2 != 0 {
            self.inner.write_all(&[0])?;
            self.pos += 1;
        }
        Ok(())
    }

    fn check_offset(&self, offset: u64) -> Result<(), TiffError> {
        if !self.bigtiff && offset > CLASSIC_MAX_OFFSET {
            return Err(TiffError::OffsetOverflow(offset));
        }
        Ok(())
    }
}

#[inline]
fn align2(offset: u64) -> u64 {
    offset + (offset % 2)
}

// =============================================================================
// Tests
// =============================================================================
