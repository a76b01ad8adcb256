//! EBCDIC decoding for IBM mainframe code pages.
//!
//! SMF text fields are fixed-width and padded with the EBCDIC space byte
//! (`0x40`). [`CodePage::decode_trimmed`] strips that fill before mapping
//! to Unicode; [`CodePage::decode`] maps every byte as-is.
//!
//! # Supported Code Pages
//!
//! - **CP037**: US/Canada
//! - **CP500**: International Latin-1 (default for SMF dumps)
//! - **CP1047**: Open Systems Latin-1
//!
//! Use [`CodePageRegistry`] or [`CodePage::from_ccsid`] for runtime lookup.

mod registry;
mod tables;

pub use registry::CodePageRegistry;
pub use tables::{CodePage, CP037, CP1047, CP500};

use crate::error::EncodingError;

/// The EBCDIC space, used as fill in fixed-width text fields.
pub const EBCDIC_SPACE: u8 = 0x40;

impl CodePage {
    /// Decode EBCDIC bytes to a UTF-8 string.
    ///
    /// Total: every byte maps to one character. Control positions map to
    /// the corresponding C0/C1 control characters.
    pub fn decode(&self, bytes: &[u8]) -> String {
        bytes.iter().map(|&b| self.ebcdic_to_char(b)).collect()
    }

    /// Decode a fixed-width field, dropping trailing EBCDIC spaces.
    ///
    /// Idempotent on input that carries no fill.
    pub fn decode_trimmed(&self, bytes: &[u8]) -> String {
        let end = bytes
            .iter()
            .rposition(|&b| b != EBCDIC_SPACE)
            .map_or(0, |pos| pos + 1);
        self.decode(&bytes[..end])
    }

    /// Encode a UTF-8 string to EBCDIC bytes.
    ///
    /// # Errors
    /// Returns [`EncodingError::Unmappable`] for characters outside Latin-1.
    pub fn encode(&self, s: &str) -> Result<Vec<u8>, EncodingError> {
        s.chars().map(|ch| self.char_to_ebcdic(ch)).collect()
    }

    /// Encode into a fixed-width field: truncated to `width` bytes, or
    /// padded with EBCDIC spaces.
    pub fn encode_padded(&self, s: &str, width: usize) -> Result<Vec<u8>, EncodingError> {
        let mut bytes = self.encode(s)?;
        bytes.resize(width, EBCDIC_SPACE);
        Ok(bytes)
    }

    /// Convert a single EBCDIC byte to its Unicode character.
    #[inline]
    pub fn ebcdic_to_char(&self, ebcdic: u8) -> char {
        char::from(self.ebcdic_to_latin1[ebcdic as usize])
    }

    /// Convert a single character to EBCDIC.
    pub fn char_to_ebcdic(&self, ch: char) -> Result<u8, EncodingError> {
        u8::try_from(u32::from(ch))
            .map(|latin1| self.latin1_to_ebcdic[latin1 as usize])
            .map_err(|_| EncodingError::Unmappable {
                ch,
                code: u32::from(ch),
                code_page: self.name,
            })
    }

    /// Look up a code page by CCSID number.
    pub fn from_ccsid(ccsid: u16) -> Result<&'static CodePage, EncodingError> {
        CodePageRegistry::from_ccsid(ccsid)
    }

    /// Look up a code page by name (e.g., "CP037", "IBM-1047").
    pub fn by_name(name: &str) -> Result<&'static CodePage, EncodingError> {
        CodePageRegistry::by_name(name)
    }
}
