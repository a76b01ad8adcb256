//! Runtime code page lookup by CCSID or name.

use super::tables::{CodePage, CP037, CP1047, CP500};
use crate::error::EncodingError;

/// Lookup table of the supported EBCDIC code pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodePageRegistry;

impl CodePageRegistry {
    /// All supported code pages.
    pub fn all() -> [&'static CodePage; 3] {
        [&CP037, &CP500, &CP1047]
    }

    /// Look up a code page by CCSID number.
    pub fn from_ccsid(ccsid: u16) -> Result<&'static CodePage, EncodingError> {
        Self::all()
            .into_iter()
            .find(|cp| cp.ccsid == ccsid)
            .ok_or(EncodingError::UnknownCcsid { ccsid })
    }

    /// Look up a code page by name.
    ///
    /// Accepts "CP037", "IBM-037", "IBM037", "EBCDIC-037" and the bare CCSID
    /// ("37", "037"), case-insensitively.
    pub fn by_name(name: &str) -> Result<&'static CodePage, EncodingError> {
        let upper = name.trim().to_ascii_uppercase();
        let digits = ["CP", "IBM-", "IBM", "EBCDIC-"]
            .iter()
            .find_map(|prefix| upper.strip_prefix(prefix))
            .unwrap_or(upper.as_str());

        digits
            .parse::<u16>()
            .ok()
            .and_then(|ccsid| Self::from_ccsid(ccsid).ok())
            .ok_or_else(|| EncodingError::UnknownCodePage {
                name: name.to_string(),
            })
    }
}
