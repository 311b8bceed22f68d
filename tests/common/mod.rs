//! Builds synthetic `.aseprite` files byte by byte.
#![allow(dead_code)]

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::{write::ZlibEncoder, Compression};

pub const LAYER: u16 = 0x2004;
pub const CEL: u16 = 0x2005;
pub const CEL_EXTRA: u16 = 0x2006;
pub const TAGS: u16 = 0x2018;
pub const PALETTE: u16 = 0x2019;
pub const USER_DATA: u16 = 0x2020;
pub const OLD_PALETTE: u16 = 0x0004;

pub struct FileBuilder {
    width: u16,
    height: u16,
    depth: u16,
    flags: u32,
    frames: Vec<(u16, Vec<Vec<u8>>)>,
}

impl FileBuilder {
    pub fn new(width: u16, height: u16, depth: u16) -> Self {
        Self {
            width,
            height,
            depth,
            flags: 1,
            frames: Vec::new(),
        }
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn frame(mut self, duration: u16, chunks: Vec<Vec<u8>>) -> Self {
        self.frames.push((duration, chunks));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut frames = Vec::new();
        for (duration, chunks) in &self.frames {
            let body: Vec<u8> = chunks.concat();
            let w = &mut frames;
            w.write_u32::<LittleEndian>(16 + body.len() as u32).unwrap();
            w.write_u16::<LittleEndian>(0xF1FA).unwrap();
            w.write_u16::<LittleEndian>(chunks.len() as u16).unwrap();
            w.write_u16::<LittleEndian>(*duration).unwrap();
            w.write_all(&[0; 2]).unwrap();
            w.write_u32::<LittleEndian>(chunks.len() as u32).unwrap();
            w.write_all(&body).unwrap();
        }

        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(128 + frames.len() as u32).unwrap();
        out.write_u16::<LittleEndian>(0xA5E0).unwrap();
        out.write_u16::<LittleEndian>(self.frames.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(self.width).unwrap();
        out.write_u16::<LittleEndian>(self.height).unwrap();
        out.write_u16::<LittleEndian>(self.depth).unwrap();
        out.write_u32::<LittleEndian>(self.flags).unwrap();
        out.write_u16::<LittleEndian>(100).unwrap(); // speed
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u8(3).unwrap(); // transparent index
        out.write_all(&[0; 3]).unwrap();
        out.write_u16::<LittleEndian>(32).unwrap(); // colour count
        out.write_u8(1).unwrap();
        out.write_u8(2).unwrap();
        out.write_i16::<LittleEndian>(-4).unwrap();
        out.write_i16::<LittleEndian>(5).unwrap();
        out.write_u16::<LittleEndian>(16).unwrap();
        out.write_u16::<LittleEndian>(16).unwrap();
        out.write_all(&[0; 84]).unwrap();
        assert_eq!(out.len(), 128);
        out.extend_from_slice(&frames);
        out
    }
}

pub fn write_string(out: &mut Vec<u8>, s: &str) {
    out.write_u16::<LittleEndian>(s.len() as u16).unwrap();
    out.write_all(s.as_bytes()).unwrap();
}

pub fn chunk(kind: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.write_u32::<LittleEndian>(6 + payload.len() as u32).unwrap();
    out.write_u16::<LittleEndian>(kind).unwrap();
    out.write_all(payload).unwrap();
    out
}

pub fn layer_chunk(flags: u16, layer_type: u16, child_level: u16, opacity: u8, name: &str) -> Vec<u8> {
    let mut p = Vec::new();
    p.write_u16::<LittleEndian>(flags).unwrap();
    p.write_u16::<LittleEndian>(layer_type).unwrap();
    p.write_u16::<LittleEndian>(child_level).unwrap();
    p.write_u16::<LittleEndian>(0).unwrap();
    p.write_u16::<LittleEndian>(0).unwrap();
    p.write_u16::<LittleEndian>(0).unwrap(); // blend mode
    p.write_u8(opacity).unwrap();
    p.write_all(&[0; 3]).unwrap();
    write_string(&mut p, name);
    if layer_type == 2 {
        p.write_u32::<LittleEndian>(7).unwrap();
    }
    chunk(LAYER, &p)
}

fn cel_base(layer: u16, x: i16, y: i16, opacity: u8, cel_type: u8) -> Vec<u8> {
    let mut p = Vec::new();
    p.write_u16::<LittleEndian>(layer).unwrap();
    p.write_i16::<LittleEndian>(x).unwrap();
    p.write_i16::<LittleEndian>(y).unwrap();
    p.write_u8(opacity).unwrap();
    p.write_u8(cel_type).unwrap();
    p.write_u8(0).unwrap();
    p.write_i16::<LittleEndian>(0).unwrap(); // z-index
    p.write_all(&[0; 5]).unwrap();
    p
}

pub fn raw_cel_chunk(layer: u16, x: i16, y: i16, width: u16, height: u16, pixels: &[u8]) -> Vec<u8> {
    let mut p = cel_base(layer, x, y, 255, 0);
    p.write_u16::<LittleEndian>(width).unwrap();
    p.write_u16::<LittleEndian>(height).unwrap();
    p.write_all(pixels).unwrap();
    chunk(CEL, &p)
}

pub fn compressed_cel_chunk(layer: u16, width: u16, height: u16, pixels: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(pixels).unwrap();
    let packed = encoder.finish().unwrap();

    let mut p = cel_base(layer, 0, 0, 128, 2);
    p.write_u16::<LittleEndian>(width).unwrap();
    p.write_u16::<LittleEndian>(height).unwrap();
    p.write_all(&packed).unwrap();
    chunk(CEL, &p)
}

pub fn linked_cel_chunk(layer: u16, frame_position: u16) -> Vec<u8> {
    let mut p = cel_base(layer, 0, 0, 255, 1);
    p.write_u16::<LittleEndian>(frame_position).unwrap();
    chunk(CEL, &p)
}

pub fn cel_chunk_with_type(cel_type: u8) -> Vec<u8> {
    let mut p = cel_base(0, 0, 0, 255, cel_type);
    p.write_all(&[0; 4]).unwrap();
    chunk(CEL, &p)
}

pub struct PaletteEntry<'a> {
    pub rgba: [u8; 4],
    pub name: Option<&'a str>,
}

pub fn palette_chunk(size: u32, first: u32, entries: &[PaletteEntry]) -> Vec<u8> {
    let last = first + entries.len() as u32 - 1;
    palette_chunk_with_range(size, first, last, entries)
}

pub fn palette_chunk_with_range(size: u32, first: u32, last: u32, entries: &[PaletteEntry]) -> Vec<u8> {
    let mut p = Vec::new();
    p.write_u32::<LittleEndian>(size).unwrap();
    p.write_u32::<LittleEndian>(first).unwrap();
    p.write_u32::<LittleEndian>(last).unwrap();
    p.write_all(&[0; 8]).unwrap();
    for entry in entries {
        p.write_u16::<LittleEndian>(entry.name.is_some() as u16).unwrap();
        p.write_all(&entry.rgba).unwrap();
        if let Some(name) = entry.name {
            write_string(&mut p, name);
        }
    }
    chunk(PALETTE, &p)
}

pub struct TagDef<'a> {
    pub from: u16,
    pub to: u16,
    pub direction: u8,
    pub colour: [u8; 3],
    pub name: &'a str,
}

pub fn tags_chunk(tags: &[TagDef]) -> Vec<u8> {
    let mut p = Vec::new();
    p.write_u16::<LittleEndian>(tags.len() as u16).unwrap();
    p.write_all(&[0; 8]).unwrap();
    for tag in tags {
        p.write_u16::<LittleEndian>(tag.from).unwrap();
        p.write_u16::<LittleEndian>(tag.to).unwrap();
        p.write_u8(tag.direction).unwrap();
        p.write_u16::<LittleEndian>(0).unwrap(); // repeat
        p.write_all(&[0; 6]).unwrap();
        p.write_all(&tag.colour).unwrap();
        p.write_u8(0).unwrap();
        write_string(&mut p, tag.name);
    }
    chunk(TAGS, &p)
}
