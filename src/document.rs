//! The decoded sprite: frames, layers, cels, palette and tags.
//!
//! Everything here is owned. Cross references (a cel's layer, a linked cel's
//! source frame) are plain indices that the consumer resolves.

use std::collections::BTreeMap;

use rgb::{RGB8, RGBA8};
use serde::Serialize;

/// Pixel encoding of every cel in the document.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum ColourDepth {
    Indexed8,
    Greyscale16,
    Rgba32,
}

impl ColourDepth {
    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            8 => Some(Self::Indexed8),
            16 => Some(Self::Greyscale16),
            32 => Some(Self::Rgba32),
            _ => None,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Indexed8 => 1,
            Self::Greyscale16 => 2,
            Self::Rgba32 => 4,
        }
    }
}

/// Header flag: layer opacity values are valid.
pub const FLAG_LAYER_OPACITY: u32 = 1;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize)]
pub struct Grid {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct Document {
    pub width: u16,
    pub height: u16,
    pub colour_depth: ColourDepth,
    pub flags: u32,
    pub transparent_index: u8,
    /// As declared in the header; 0 means 256 on files from old versions.
    pub colour_count: u16,
    /// Deprecated header speed, superseded by per-frame durations.
    pub speed: u16,
    /// Pixel aspect ratio; 0 in either component means 1:1.
    pub pixel_ratio: (u8, u8),
    pub grid: Grid,
    pub frames: Vec<Frame>,
    pub layers: Vec<Layer>,
    pub tags: Vec<Tag>,
    pub palette: Palette,
}

impl Document {
    pub fn has_layer_opacity(&self) -> bool {
        self.flags & FLAG_LAYER_OPACITY != 0
    }

    pub fn layer_by_name(&self, name: &str) -> Option<(usize, &Layer)> {
        self.layers.iter().enumerate().find(|(_, l)| l.name == name)
    }

    pub fn cel(&self, frame: usize, layer: u16) -> Option<&Cel> {
        self.frames.get(frame)?.cel_at(layer)
    }

    /// Returns the cel that owns the pixels shown by `layer` at `frame`,
    /// following linked cels. Dangling links and link cycles give `None`.
    pub fn resolve_cel(&self, frame: usize, layer: u16) -> Option<&Cel> {
        let mut cel = self.cel(frame, layer)?;
        // a chain longer than the frame count must revisit a frame
        for _ in 0..=self.frames.len() {
            match cel.content {
                CelContent::Linked { frame_position } => {
                    cel = self.cel(frame_position as usize, layer)?;
                }
                CelContent::Raw { .. } | CelContent::Compressed { .. } => return Some(cel),
            }
        }
        None
    }
}

#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct Frame {
    pub duration_ms: u16,
    /// In file order, which is not necessarily layer order.
    pub cels: Vec<Cel>,
}

impl Frame {
    pub fn new(duration_ms: u16) -> Self {
        Self {
            duration_ms,
            cels: Vec::new(),
        }
    }

    pub fn cel_at(&self, layer: u16) -> Option<&Cel> {
        self.cels.iter().find(|c| c.layer == layer)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum LayerKind {
    Normal,
    Group,
    Tilemap { tileset_index: u32 },
    Unknown(u16),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize)]
pub struct LayerFlags {
    pub visible: bool,
    pub editable: bool,
    pub lock_movement: bool,
    pub background: bool,
    pub prefer_linked_cels: bool,
    pub group_collapsed: bool,
    pub reference: bool,
}

impl LayerFlags {
    pub fn from_bits(bits: u16) -> Self {
        let bit = |n: u16| bits & (1 << n) != 0;
        Self {
            visible: bit(0),
            editable: bit(1),
            lock_movement: bit(2),
            background: bit(3),
            prefer_linked_cels: bit(4),
            group_collapsed: bit(5),
            reference: bit(6),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Layer {
    pub kind: LayerKind,
    pub child_level: u16,
    pub flags: LayerFlags,
    pub blend_mode: u16,
    /// 255 unless the document carries the layer-opacity flag.
    pub opacity: u8,
    pub name: String,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Cel {
    pub layer: u16,
    pub x: i16,
    pub y: i16,
    pub opacity: u8,
    pub z_index: i16,
    pub content: CelContent,
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub enum CelContent {
    Raw {
        width: u16,
        height: u16,
        #[serde(skip)]
        pixels: Vec<u8>,
    },
    /// Stored deflated on disk; `pixels` holds the expanded bytes.
    Compressed {
        width: u16,
        height: u16,
        #[serde(skip)]
        pixels: Vec<u8>,
    },
    /// Shows the cel of the same layer at another frame. Not resolved while
    /// decoding since the source may come later in the file.
    Linked { frame_position: u16 },
}

impl std::fmt::Debug for CelContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw {
                width,
                height,
                pixels,
            } => f
                .debug_struct("Raw")
                .field("width", width)
                .field("height", height)
                .field("pixels", &pixels.len())
                .finish(),
            Self::Compressed {
                width,
                height,
                pixels,
            } => f
                .debug_struct("Compressed")
                .field("width", width)
                .field("height", height)
                .field("pixels", &pixels.len())
                .finish(),
            Self::Linked { frame_position } => f
                .debug_struct("Linked")
                .field("frame_position", frame_position)
                .finish(),
        }
    }
}

impl Cel {
    pub fn size(&self) -> Option<(u16, u16)> {
        match self.content {
            CelContent::Raw { width, height, .. } | CelContent::Compressed { width, height, .. } => {
                Some((width, height))
            }
            CelContent::Linked { .. } => None,
        }
    }

    pub fn pixels(&self) -> Option<&[u8]> {
        match &self.content {
            CelContent::Raw { pixels, .. } | CelContent::Compressed { pixels, .. } => {
                Some(pixels.as_slice())
            }
            CelContent::Linked { .. } => None,
        }
    }

    pub fn is_linked(&self) -> bool {
        matches!(self.content, CelContent::Linked { .. })
    }

    /// Pixel data viewed as RGBA, for documents in [`ColourDepth::Rgba32`].
    pub fn rgba_pixels(&self, depth: ColourDepth) -> Option<&[RGBA8]> {
        if depth != ColourDepth::Rgba32 {
            return None;
        }
        bytemuck::try_cast_slice(self.pixels()?).ok()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum LoopDirection {
    Forward,
    Reverse,
    PingPong,
    PingPongReverse,
    Unknown(u8),
}

impl From<u8> for LoopDirection {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Forward,
            1 => Self::Reverse,
            2 => Self::PingPong,
            3 => Self::PingPongReverse,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Tag {
    /// First frame, inclusive.
    pub from: u16,
    /// Last frame, inclusive.
    pub to: u16,
    pub direction: LoopDirection,
    /// 0 repeats forever.
    pub repeat: u16,
    pub colour: RGB8,
    pub name: String,
}

impl Tag {
    pub fn frames(&self) -> std::ops::RangeInclusive<usize> {
        self.from as usize..=self.to as usize
    }
}

/// Sparse palette. `len` is the size declared by the last palette chunk;
/// indices below it that no chunk wrote have no colour.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize)]
pub struct Palette {
    len: u32,
    entries: BTreeMap<u32, RGBA8>,
}

impl Palette {
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: u32) -> Option<RGBA8> {
        self.entries.get(&index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, RGBA8)> + '_ {
        self.entries.iter().map(|(&i, &c)| (i, c))
    }

    pub(crate) fn resize(&mut self, len: u32) {
        self.len = len;
        self.entries.retain(|&index, _| index < len);
    }

    pub(crate) fn set(&mut self, index: u32, colour: RGBA8) {
        debug_assert!(index < self.len);
        self.entries.insert(index, colour);
    }
}
