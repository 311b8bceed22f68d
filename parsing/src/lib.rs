pub use parsing_macro::*;

/// Failure while decoding a record from a byte cursor.
///
/// Every variant is recoverable by the caller; no read ever goes past the
/// end of the underlying slice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("need {needed} bytes but only {available} remain")]
    SliceTooSmall { needed: usize, available: usize },
    #[error("magic number mismatch: expected {expected:#x}, found {found:#x}")]
    MagicCheckFailed { expected: u64, found: u64 },
    /// A size prefix declared fewer bytes than the size field (and magic)
    /// in front of the body occupy.
    #[error("declared size {declared} is smaller than the record prefix")]
    SizeFieldTooSmall { declared: usize },
    #[error("string is not valid utf-8: {0}")]
    InterpretStrFailed(std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub trait ReadBytes<'a> {
    fn read_bytes(&mut self, num: usize) -> Result<&'a [u8]>;
    fn read_rest(&mut self) -> &'a [u8];
    fn remaining(&self) -> usize;

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0_u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn skip(&mut self, num: usize) -> Result<()> {
        self.read_bytes(num).map(|_| ())
    }

    /// Fails unless at least `count` records of `record_size` bytes could
    /// still follow. Used to sanity check on-disk counts before looping.
    fn ensure_records(&self, count: usize, record_size: usize) -> Result<()> {
        let available = self.remaining();
        match count.checked_mul(record_size) {
            Some(needed) if needed <= available => Ok(()),
            Some(needed) => Err(Error::SliceTooSmall { needed, available }),
            None => Err(Error::SliceTooSmall {
                needed: usize::MAX,
                available,
            }),
        }
    }

    fn read_type<T: Parse<'a>>(&mut self) -> Result<T>
    where
        Self: Sized,
    {
        T::parse(self)
    }
}

impl<'a> ReadBytes<'a> for &'a [u8] {
    fn read_bytes(&mut self, num: usize) -> Result<&'a [u8]> {
        match self.split_at_checked(num) {
            Some((front, back)) => {
                *self = back;
                Ok(front)
            }
            None => Err(Error::SliceTooSmall {
                needed: num,
                available: self.len(),
            }),
        }
    }

    fn read_rest(&mut self) -> &'a [u8] {
        std::mem::take(self)
    }

    fn remaining(&self) -> usize {
        self.len()
    }
}

/// A record with a fixed little-endian on-disk layout.
pub trait Parse<'a>: Sized {
    fn parse(input: &mut impl ReadBytes<'a>) -> Result<Self>;
}

macro_rules! impl_primitive_parse {
    ($typ: ty) => {
        impl<'a> Parse<'a> for $typ {
            fn parse(input: &mut impl ReadBytes<'a>) -> Result<Self> {
                Ok(<$typ>::from_le_bytes(input.read_array()?))
            }
        }

        impl<'a, const N: usize> Parse<'a> for [$typ; N] {
            fn parse(input: &mut impl ReadBytes<'a>) -> Result<Self> {
                let mut out = [<$typ>::default(); N];
                for i in out.iter_mut() {
                    *i = <$typ as Parse<'a>>::parse(input)?;
                }
                Ok(out)
            }
        }
    };
}

impl_primitive_parse!(u8);
impl_primitive_parse!(u16);
impl_primitive_parse!(u32);
impl_primitive_parse!(u64);

impl_primitive_parse!(i8);
impl_primitive_parse!(i16);
impl_primitive_parse!(i32);
impl_primitive_parse!(i64);
