#![forbid(unsafe_code)]
//! EBCDIC text support for SMF dump decoding.
//!
//! SMF records carry identification fields (job names, program names, system
//! IDs) as fixed-width EBCDIC text padded with EBCDIC spaces. This crate maps
//! those bytes to Unicode.
//!
//! # Features
//!
//! - **Total decoding**: every byte value of a supported code page maps to
//!   exactly one Unicode code point, so decoding never fails
//! - **Fill trimming**: trailing EBCDIC spaces (`0x40`) are removed from
//!   fixed-width fields
//! - **Code pages**: CP037, CP500 and CP1047, looked up by CCSID or name
//!
//! # Example
//!
//! ```rust
//! use smfdump_encoding::ebcdic::{CodePage, CP500};
//!
//! let field = [0xC1, 0xC2, 0xC3, 0x40, 0x40];
//! assert_eq!(CP500.decode_trimmed(&field), "ABC");
//!
//! let cp = CodePage::by_name("IBM-1047").unwrap();
//! assert_eq!(cp.ccsid, 1047);
//! ```

pub mod ebcdic;
pub mod error;

pub use ebcdic::{CodePage, CodePageRegistry, CP037, CP1047, CP500, EBCDIC_SPACE};
pub use error::EncodingError;

/// Result type for encoding operations.
pub type Result<T> = std::result::Result<T, EncodingError>;
