//! Four-character codes used for format identifiers and CAF chunk types

use std::fmt;

/// A four-character code stored big-endian in a `u32`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub u32);

impl FourCC {
    /// Build a code from its four ASCII bytes
    pub const fn new(code: &[u8; 4]) -> Self {
        FourCC(u32::from_be_bytes(*code))
    }

    /// The four bytes of the code
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(code: [u8; 4]) -> Self {
        FourCC(u32::from_be_bytes(code))
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_bytes();
        if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            for b in bytes {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            write!(f, "0x{:08x}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_display() {
        assert_eq!(FourCC::new(b"lpcm").to_string(), "lpcm");
        assert_eq!(FourCC::new(b"fmt ").to_string(), "fmt ");
        assert_eq!(FourCC(1).to_string(), "0x00000001");
    }

    #[test]
    fn test_fourcc_bytes() {
        let code = FourCC::from(*b"caff");
        assert_eq!(code.to_bytes(), *b"caff");
        assert_eq!(code, FourCC::new(b"caff"));
    }
}
