use thiserror::Error;

/// Why a buffer could not be decoded. The first violation aborts the load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AseError {
    #[error("buffer of {len} bytes is smaller than the file header")]
    TooSmall { len: usize },

    #[error("invalid file magic number {found:#06x}")]
    BadMagic { found: u16 },

    #[error("invalid magic number {found:#06x} in frame {frame}")]
    BadFrameMagic { frame: usize, found: u16 },

    #[error("truncated data: need {needed} bytes but only {available} remain")]
    Truncated { needed: usize, available: usize },

    #[error("unsupported colour depth {0}")]
    UnsupportedColourDepth(u16),

    #[error("invalid cel type {0}")]
    InvalidCelType(u8),

    #[error("cel decompression failed: {0}")]
    Decompression(String),

    #[error("palette range {first}..={last} does not fit a palette of {size} entries")]
    InvalidPaletteRange { first: u32, last: u32, size: u32 },

    #[error("tag range {from}..={to} does not fit {frames} frames")]
    InvalidTagRange { from: u16, to: u16, frames: usize },

    #[error("string is not valid utf-8")]
    InvalidString,
}

impl From<parsing::Error> for AseError {
    fn from(err: parsing::Error) -> Self {
        match err {
            parsing::Error::SliceTooSmall { needed, available } => {
                AseError::Truncated { needed, available }
            }
            // every size prefix in the format is a dword
            parsing::Error::SizeFieldTooSmall { declared } => AseError::Truncated {
                needed: std::mem::size_of::<u32>(),
                available: declared,
            },
            parsing::Error::InterpretStrFailed(_) => AseError::InvalidString,
            // magic checks are mapped where the record is read; one slipping
            // through here is still a malformed record
            parsing::Error::MagicCheckFailed { found, .. } => AseError::BadMagic {
                found: found as u16,
            },
        }
    }
}
