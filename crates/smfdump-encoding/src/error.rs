//! Encoding error types.

use miette::Diagnostic;
use thiserror::Error;

/// Errors returned by code page lookup and text encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum EncodingError {
    /// No code page is registered under the requested CCSID.
    #[error("unsupported CCSID {ccsid}")]
    #[diagnostic(code(encoding::unknown_ccsid))]
    UnknownCcsid { ccsid: u16 },

    /// No code page is registered under the requested name.
    #[error("unsupported code page '{name}'")]
    #[diagnostic(
        code(encoding::unknown_code_page),
        help("supported code pages are CP037, CP500 and CP1047")
    )]
    UnknownCodePage { name: String },

    /// A character has no representation in the target code page.
    #[error("character '{ch}' (U+{code:04X}) cannot be encoded in {code_page}")]
    #[diagnostic(code(encoding::unmappable))]
    Unmappable {
        ch: char,
        code: u32,
        code_page: &'static str,
    },
}
