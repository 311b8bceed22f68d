//! On-disk records of the `.aseprite` container.
//!
//! Layouts follow <https://github.com/aseprite/aseprite/blob/main/docs/ase-file-specs.md>.
//! Every record is decoded field by field from a little-endian cursor; none of
//! these structs is ever reinterpreted from raw memory.

use parsing::Parse;

pub type Byte = u8;
pub type Word = u16;
pub type Short = i16;
pub type Dword = u32;

pub const FILE_MAGIC: Word = 0xA5E0;
pub const FRAME_MAGIC: Word = 0xF1FA;

pub const FILE_HEADER_SIZE: usize = 128;
pub const FRAME_HEADER_SIZE: usize = 16;
pub const CHUNK_HEADER_SIZE: usize = 6;
pub const PALETTE_ENTRY_SIZE: usize = 6;
/// Fixed part of a tag entry plus the length of its name.
pub const TAG_ENTRY_MIN_SIZE: usize = 19;

pub mod chunk_type {
    use super::Word;

    pub const OLD_PALETTE_1: Word = 0x0004;
    pub const OLD_PALETTE_2: Word = 0x0011;
    pub const LAYER: Word = 0x2004;
    pub const CEL: Word = 0x2005;
    pub const CEL_EXTRA: Word = 0x2006;
    pub const MASK: Word = 0x2016;
    pub const PATH: Word = 0x2017;
    pub const TAGS: Word = 0x2018;
    pub const PALETTE: Word = 0x2019;
    pub const USER_DATA: Word = 0x2020;
    pub const SLICE: Word = 0x2022;
}

parsing::parsable_struct! {
    #[derive(Clone, PartialEq, Debug)]
    pub struct FileHeader<'a> {
        /// Informational only; frames are bounded by their own sizes.
        pub file_size: Dword,
        [[magic: Word = FILE_MAGIC]]
        pub num_frames: Word,
        pub width: Word,
        pub height: Word,
        /// 32=RGBA, 16=Grayscale, 8=Indexed
        pub color_depth: Word,
        pub flags: Dword,
        /// Deprecated, now on each frame
        pub frame_ms_dur: Word,
        [[ignore: Dword]]
        [[ignore: Dword]]
        pub invis_palette_ind: Byte,
        [[padding_bytes = 3]]
        /// 0 means 256 for old sprites
        pub color_num: Word,
        pub pix_width: Byte,
        pub pix_height: Byte,
        pub grid_x_pos: Short,
        pub grid_y_pos: Short,
        pub grid_width: Word,
        pub grid_height: Word,
        [[padding_bytes = 84]]
        #[parse(rest_of_buf)]
        pub frame_bytes: &'a [u8],
    }
}

parsing::parsable_struct! {
    #[derive(Clone, PartialEq, Debug)]
    pub struct FrameHeader<'a> {
        [[size_prefix: Dword = frame_size, magic: Word = FRAME_MAGIC]]
        old_num_chunks: Word,
        pub frame_dur_ms: Word,
        [[padding_bytes = 2]]
        new_num_chunks: Dword,
        #[parse(rest_of_buf)]
        pub chunk_bytes: &'a [u8],
    }
}

impl FrameHeader<'_> {
    pub fn num_chunks(&self) -> usize {
        if self.old_num_chunks == 0xFFFF && self.new_num_chunks > 0xFFFF {
            self.new_num_chunks as usize
        } else {
            self.old_num_chunks as usize
        }
    }
}

parsing::parsable_struct! {
    #[derive(Clone, PartialEq, Debug)]
    pub struct ChunkHeader<'a> {
        [[size_prefix: Dword = chunk_size]]
        pub chunk_type: Word,
        #[parse(rest_of_buf)]
        pub data: &'a [u8],
    }
}

parsing::parsable_struct! {
    #[derive(Clone, PartialEq, Eq, Debug)]
    pub struct LayerRecord<'a> {
        pub flags: Word,
        pub layer_type: Word,
        pub child_level: Word,
        [[ignore: Word]]
        [[ignore: Word]]
        pub blend_mode: Word,
        pub opacity: Byte,
        [[padding_bytes = 3]]
        [[param: Word = string_size]]
        #[parse(sized_utf8_string = string_size)]
        pub layer_name: &'a str,
        #[parse(option_if: Dword = layer_type == 2)]
        pub tileset_index: Option<Dword>,
    }
}

parsing::parsable_struct! {
    #[derive(Clone, PartialEq, Eq, Debug)]
    pub struct CelRecord<'a> {
        pub layer_ind: Word,
        pub x_pos: Short,
        pub y_pos: Short,
        pub opacity: Byte,
        /// Low byte of the on-disk type word. The selector lives here; the
        /// byte after it is not part of it.
        pub cel_type: Byte,
        [[ignore: Byte]]
        pub z_ind: Short,
        [[padding_bytes = 5]]
        #[parse(rest_of_buf)]
        pub rest: &'a [u8],
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Parse)]
pub struct CelSize {
    pub width: Word,
    pub height: Word,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Parse)]
pub struct LinkedCelRecord {
    pub frame_position: Word,
}

parsing::parsable_struct! {
    #[derive(Clone, PartialEq, Eq, Debug)]
    pub struct PaletteRecord<'a> {
        pub new_palette_size: Dword,
        pub first_ind: Dword,
        pub last_ind: Dword,
        [[padding_bytes = 8]]
        #[parse(rest_of_buf)]
        pub palette_bytes: &'a [u8],
    }
}

parsing::parsable_struct! {
    #[derive(Clone, PartialEq, Eq, Debug)]
    pub struct PaletteEntry<'a> {
        pub flags: Word,
        pub red: Byte,
        pub green: Byte,
        pub blue: Byte,
        pub alpha: Byte,
        #[parse(option_if: EntryName<'a> = flags & 1 != 0)]
        pub name: Option<EntryName<'a>>,
    }
}

parsing::parsable_struct! {
    #[derive(Clone, PartialEq, Eq, Debug)]
    pub struct EntryName<'a> {
        [[param: Word = string_size]]
        #[parse(sized_utf8_string = string_size)]
        pub name: &'a str,
    }
}

parsing::parsable_struct! {
    #[derive(Clone, PartialEq, Eq, Debug)]
    pub struct TagsRecord<'a> {
        pub num_tags: Word,
        [[padding_bytes = 8]]
        #[parse(rest_of_buf)]
        pub tag_bytes: &'a [u8],
    }
}

parsing::parsable_struct! {
    #[derive(Clone, PartialEq, Eq, Debug)]
    pub struct TagEntry<'a> {
        pub start_ind: Word,
        pub end_ind: Word,
        pub direction: Byte,
        pub repeat: Word,
        [[padding_bytes = 6]]
        pub color: [Byte; 3],
        [[ignore: Byte]]
        [[param: Word = string_size]]
        #[parse(sized_utf8_string = string_size)]
        pub tag_name: &'a str,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parsing::ReadBytes;

    #[test]
    fn cel_type_is_read_from_the_low_byte() {
        let mut bytes = vec![
            3, 0, // layer
            0xFE, 0xFF, // x
            4, 0, // y
            200, // opacity
            2, 1, // type selector + high byte
            7, 0, // z-index
        ];
        bytes.extend_from_slice(&[0; 5]);
        bytes.extend_from_slice(&[9, 9]);
        let mut b = bytes.as_slice();
        let cel: CelRecord = b.read_type().unwrap();
        assert_eq!(cel.layer_ind, 3);
        assert_eq!(cel.x_pos, -2);
        assert_eq!(cel.opacity, 200);
        assert_eq!(cel.cel_type, 2);
        assert_eq!(cel.z_ind, 7);
        assert_eq!(cel.rest, &[9, 9]);
    }

    #[test]
    fn new_chunk_count_only_when_old_field_saturates() {
        let header = |old: Word, new: Dword| FrameHeader {
            old_num_chunks: old,
            frame_dur_ms: 100,
            new_num_chunks: new,
            chunk_bytes: &[],
        };
        assert_eq!(header(3, 0).num_chunks(), 3);
        assert_eq!(header(3, 3).num_chunks(), 3);
        assert_eq!(header(0xFFFF, 70_000).num_chunks(), 70_000);
        assert_eq!(header(0xFFFF, 0).num_chunks(), 0xFFFF);
    }

    #[test]
    fn frame_magic_is_checked_before_the_declared_size() {
        let bytes = [0xFF_u8, 0xFF, 0, 0, 0, 0, 1, 0];
        let mut b = bytes.as_slice();
        assert_eq!(
            b.read_type::<FrameHeader>(),
            Err(parsing::Error::MagicCheckFailed {
                expected: FRAME_MAGIC as u64,
                found: 0
            })
        );

        let bytes = [0xFF_u8, 0xFF, 0, 0, 0xFA, 0xF1, 1, 0];
        let mut b = bytes.as_slice();
        assert!(matches!(
            b.read_type::<FrameHeader>(),
            Err(parsing::Error::SliceTooSmall { .. })
        ));
    }

    #[test]
    fn palette_entry_name_is_conditional() {
        let bytes = [1_u8, 0, 10, 20, 30, 40, 3, 0, b'r', b'e', b'd', 0xAB];
        let mut b = bytes.as_slice();
        let entry: PaletteEntry = b.read_type().unwrap();
        assert_eq!((entry.red, entry.alpha), (10, 40));
        assert_eq!(entry.name.map(|n| n.name), Some("red"));
        assert_eq!(b, &[0xAB]);
    }
}
