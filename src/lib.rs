//! Decoder for Aseprite `.ase`/`.aseprite` sprite files.
//!
//! [`load`] turns the raw bytes of a file into a [`Document`]: canvas
//! information, frames with their cels, layers, palette and animation tags.
//! Chunk types the document has no use for are skipped.
//!
//! Linked cels are kept as references to another frame; use
//! [`Document::resolve_cel`] once the whole file is decoded to reach the cel
//! that owns the pixels.

mod chunks;
pub mod document;
mod error;
mod inflate;
pub mod records;

use parsing::ReadBytes;
use tracing::info;

use chunks::DocumentBuilder;
pub use document::{
    Cel, CelContent, ColourDepth, Document, Frame, Grid, Layer, LayerFlags, LayerKind,
    LoopDirection, Palette, Tag,
};
pub use error::AseError;
use records::{FileHeader, FrameHeader, CHUNK_HEADER_SIZE, FILE_HEADER_SIZE, FRAME_HEADER_SIZE};

/// Decodes a complete `.aseprite` file.
///
/// Nothing is returned unless every frame and chunk decoded; the first
/// malformed record aborts the load.
pub fn load(buffer: &[u8]) -> Result<Document, AseError> {
    if buffer.len() < FILE_HEADER_SIZE {
        return Err(AseError::TooSmall { len: buffer.len() });
    }

    let mut input = buffer;
    let header: FileHeader = input.read_type().map_err(|err| match err {
        parsing::Error::MagicCheckFailed { found, .. } => AseError::BadMagic {
            found: found as u16,
        },
        other => other.into(),
    })?;
    let colour_depth = ColourDepth::from_bits(header.color_depth)
        .ok_or(AseError::UnsupportedColourDepth(header.color_depth))?;

    let mut builder = DocumentBuilder::new(&header, colour_depth);
    let mut frame_bytes = header.frame_bytes;
    frame_bytes.ensure_records(header.num_frames as usize, FRAME_HEADER_SIZE)?;

    for index in 0..header.num_frames as usize {
        // the frame header narrows the cursor to the frame's declared size,
        // so the next frame starts there whatever the chunks consumed
        let frame_header: FrameHeader = frame_bytes.read_type().map_err(|err| match err {
            parsing::Error::MagicCheckFailed { found, .. } => AseError::BadFrameMagic {
                frame: index,
                found: found as u16,
            },
            other => other.into(),
        })?;

        let mut frame = Frame::new(frame_header.frame_dur_ms);
        let mut chunk_bytes = frame_header.chunk_bytes;
        let num_chunks = frame_header.num_chunks();
        chunk_bytes.ensure_records(num_chunks, CHUNK_HEADER_SIZE)?;
        for _ in 0..num_chunks {
            builder.read_chunk(&mut frame, &mut chunk_bytes)?;
        }
        builder.push_frame(frame);
    }

    let doc = builder.finish();
    info!(
        frames = doc.frames.len(),
        layers = doc.layers.len(),
        tags = doc.tags.len(),
        "parsed aseprite file {}x{}",
        doc.width,
        doc.height
    );
    Ok(doc)
}
