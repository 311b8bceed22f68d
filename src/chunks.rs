//! Chunk dispatch and the per-chunk handlers that grow the document.

use parsing::ReadBytes;
use rgb::{RGB8, RGBA8};
use tracing::trace;

use crate::document::{
    Cel, CelContent, ColourDepth, Document, Frame, Grid, Layer, LayerFlags, LayerKind, Palette,
    Tag,
};
use crate::inflate::inflate_exact;
use crate::records::{
    chunk_type, CelRecord, CelSize, ChunkHeader, FileHeader, LayerRecord, LinkedCelRecord,
    PaletteEntry, PaletteRecord, TagEntry, TagsRecord, PALETTE_ENTRY_SIZE, TAG_ENTRY_MIN_SIZE,
};
use crate::AseError;

type Result<T> = std::result::Result<T, AseError>;

/// The document under construction. Only handed out by [`finish`] once every
/// frame decoded.
///
/// [`finish`]: DocumentBuilder::finish
pub(crate) struct DocumentBuilder {
    doc: Document,
    declared_frames: usize,
}

impl DocumentBuilder {
    pub fn new(header: &FileHeader<'_>, colour_depth: ColourDepth) -> Self {
        Self {
            doc: Document {
                width: header.width,
                height: header.height,
                colour_depth,
                flags: header.flags,
                transparent_index: header.invis_palette_ind,
                colour_count: header.color_num,
                speed: header.frame_ms_dur,
                pixel_ratio: (header.pix_width, header.pix_height),
                grid: Grid {
                    x: header.grid_x_pos,
                    y: header.grid_y_pos,
                    width: header.grid_width,
                    height: header.grid_height,
                },
                frames: Vec::with_capacity(header.num_frames as usize),
                layers: Vec::new(),
                tags: Vec::new(),
                palette: Palette::default(),
            },
            declared_frames: header.num_frames as usize,
        }
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.doc.frames.push(frame);
    }

    pub fn finish(self) -> Document {
        self.doc
    }

    /// Reads one chunk and hands its span to the matching handler. The cursor
    /// always ends at the chunk's declared end, however much the handler read.
    pub fn read_chunk(&mut self, frame: &mut Frame, input: &mut &[u8]) -> Result<()> {
        let chunk: ChunkHeader = input.read_type()?;
        match chunk.chunk_type {
            chunk_type::LAYER => self.add_layer(chunk.data),
            chunk_type::CEL => self.add_cel(frame, chunk.data),
            chunk_type::CEL_EXTRA => Ok(()),
            chunk_type::PALETTE => self.add_palette(chunk.data),
            chunk_type::TAGS => self.add_tags(chunk.data),
            chunk_type::OLD_PALETTE_1
            | chunk_type::OLD_PALETTE_2
            | chunk_type::MASK
            | chunk_type::PATH
            | chunk_type::USER_DATA
            | chunk_type::SLICE => {
                trace!("skipping chunk {:#06x}", chunk.chunk_type);
                Ok(())
            }
            other => {
                trace!("skipping unknown chunk {other:#06x}");
                Ok(())
            }
        }
    }

    fn add_layer(&mut self, mut data: &[u8]) -> Result<()> {
        let record: LayerRecord = data.read_type()?;
        let kind = match (record.layer_type, record.tileset_index) {
            (0, _) => LayerKind::Normal,
            (1, _) => LayerKind::Group,
            (2, Some(tileset_index)) => LayerKind::Tilemap { tileset_index },
            (other, _) => LayerKind::Unknown(other),
        };
        let opacity = if self.doc.has_layer_opacity() {
            record.opacity
        } else {
            255
        };
        self.doc.layers.push(Layer {
            kind,
            child_level: record.child_level,
            flags: LayerFlags::from_bits(record.flags),
            blend_mode: record.blend_mode,
            opacity,
            name: record.layer_name.to_owned(),
        });
        Ok(())
    }

    fn add_cel(&mut self, frame: &mut Frame, mut data: &[u8]) -> Result<()> {
        let record: CelRecord = data.read_type()?;
        let mut rest = record.rest;
        let content = match record.cel_type {
            0 => {
                let size: CelSize = rest.read_type()?;
                let len = pixel_len(size, self.doc.colour_depth, rest.len())?;
                CelContent::Raw {
                    width: size.width,
                    height: size.height,
                    pixels: rest.read_bytes(len)?.to_vec(),
                }
            }
            1 => {
                let link: LinkedCelRecord = rest.read_type()?;
                CelContent::Linked {
                    frame_position: link.frame_position,
                }
            }
            2 => {
                let size: CelSize = rest.read_type()?;
                let len = pixel_len(size, self.doc.colour_depth, rest.len())?;
                CelContent::Compressed {
                    width: size.width,
                    height: size.height,
                    pixels: inflate_exact(rest, len)?,
                }
            }
            other => return Err(AseError::InvalidCelType(other)),
        };
        frame.cels.push(Cel {
            layer: record.layer_ind,
            x: record.x_pos,
            y: record.y_pos,
            opacity: record.opacity,
            z_index: record.z_ind,
            content,
        });
        Ok(())
    }

    fn add_palette(&mut self, mut data: &[u8]) -> Result<()> {
        let record: PaletteRecord = data.read_type()?;
        let (first, last, size) = (record.first_ind, record.last_ind, record.new_palette_size);
        if first > last || last >= size {
            return Err(AseError::InvalidPaletteRange { first, last, size });
        }

        let mut entries = record.palette_bytes;
        entries.ensure_records((last - first) as usize + 1, PALETTE_ENTRY_SIZE)?;

        self.doc.palette.resize(size);
        for index in first..=last {
            // names are read to keep the cursor aligned, then dropped
            let entry: PaletteEntry = entries.read_type()?;
            self.doc.palette.set(
                index,
                RGBA8::new(entry.red, entry.green, entry.blue, entry.alpha),
            );
        }
        Ok(())
    }

    fn add_tags(&mut self, mut data: &[u8]) -> Result<()> {
        let record: TagsRecord = data.read_type()?;
        let mut entries = record.tag_bytes;
        entries.ensure_records(record.num_tags as usize, TAG_ENTRY_MIN_SIZE)?;

        for _ in 0..record.num_tags {
            let entry: TagEntry = entries.read_type()?;
            let (from, to) = (entry.start_ind, entry.end_ind);
            if from > to || to as usize >= self.declared_frames {
                return Err(AseError::InvalidTagRange {
                    from,
                    to,
                    frames: self.declared_frames,
                });
            }
            let [r, g, b] = entry.color;
            self.doc.tags.push(Tag {
                from,
                to,
                direction: entry.direction.into(),
                repeat: entry.repeat,
                colour: RGB8::new(r, g, b),
                name: entry.tag_name.to_owned(),
            });
        }
        Ok(())
    }
}

/// Byte length of a cel's pixels. Sizes that overflow cannot be present in a
/// buffer of `available` bytes.
fn pixel_len(size: CelSize, depth: ColourDepth, available: usize) -> Result<usize> {
    (size.width as usize)
        .checked_mul(size.height as usize)
        .and_then(|n| n.checked_mul(depth.bytes_per_pixel()))
        .ok_or(AseError::Truncated {
            needed: usize::MAX,
            available,
        })
}
