//! Decoder configuration.
//!
//! Settings can be built in code or loaded from TOML:
//!
//! ```toml
//! code_page = "IBM-037"
//! window_size = 131072
//! max_frame_size = 32760
//!
//! [filter]
//! include_types = [30, 110]
//! include_subtypes = [[30, 1], [110, 1]]
//! system_id = "PRD*"
//! ```

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use smfdump_encoding::{CodePage, EncodingError};
use thiserror::Error;

use crate::header::{FrameHeader, DEFAULT_MAX_FRAME_SIZE, MIN_FRAME_SIZE};
use crate::source::{DEFAULT_WINDOW_SIZE, MIN_WINDOW_SIZE};

// ---------------------------------------------------------------------------
//  Errors
// ---------------------------------------------------------------------------

/// Errors from loading or validating a configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config file {path}: {error}")]
    #[diagnostic(code(smfdump::config::read))]
    Read {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// The configuration is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    #[diagnostic(code(smfdump::config::parse))]
    Parse(#[from] toml::de::Error),

    /// The code page name is not supported.
    #[error("unsupported code page: {0}")]
    #[diagnostic(
        code(smfdump::config::code_page),
        help("supported code pages are CP037, CP500 and CP1047")
    )]
    CodePage(#[from] EncodingError),

    /// The window is too small to be useful.
    #[error("window size {size} is below the minimum of {min}")]
    #[diagnostic(code(smfdump::config::window_size))]
    WindowTooSmall { size: usize, min: usize },

    /// The frame size limit is below the smallest legal frame.
    #[error("max frame size {size} is below the minimum frame size {min}")]
    #[diagnostic(code(smfdump::config::max_frame_size))]
    MaxFrameTooSmall { size: u16, min: usize },
}

// ---------------------------------------------------------------------------
//  Record filter
// ---------------------------------------------------------------------------

/// Selects frames by header fields before they are decoded.
///
/// Empty lists place no restriction. When several criteria are set a frame
/// must satisfy all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordFilter {
    /// Record families to keep.
    pub include_types: Vec<u8>,
    /// Record families to drop.
    pub exclude_types: Vec<u8>,
    /// `(record_family, subtype)` pairs to keep.
    pub include_subtypes: Vec<(u8, u8)>,
    /// System ID, optionally ending in `*` for a prefix match.
    pub system_id: Option<String>,
}

impl RecordFilter {
    /// Whether the filter places no restriction.
    pub fn is_empty(&self) -> bool {
        self.include_types.is_empty()
            && self.exclude_types.is_empty()
            && self.include_subtypes.is_empty()
            && self.system_id.is_none()
    }

    /// Check whether a frame header passes the filter.
    pub fn matches(&self, header: &FrameHeader) -> bool {
        let family = header.record_family;
        if !self.include_types.is_empty() && !self.include_types.contains(&family) {
            return false;
        }
        if self.exclude_types.contains(&family) {
            return false;
        }
        if !self.include_subtypes.is_empty() && !self.include_subtypes.contains(&header.key()) {
            return false;
        }
        if let Some(pattern) = &self.system_id {
            if !matches_pattern(&header.system_id, pattern) {
                return false;
            }
        }
        true
    }
}

/// Simple pattern matching with trailing '*' wildcard.
fn matches_pattern(value: &str, pattern: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        value.starts_with(prefix)
    } else {
        value == pattern
    }
}

// ---------------------------------------------------------------------------
//  Decoder config
// ---------------------------------------------------------------------------

/// Settings for a decode session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// EBCDIC code page name or CCSID, e.g. `CP500` or `1047`.
    pub code_page: String,
    /// Read-ahead window in bytes.
    pub window_size: usize,
    /// Frames longer than this are treated as corrupt.
    pub max_frame_size: u16,
    pub filter: RecordFilter,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            code_page: "CP500".to_string(),
            window_size: DEFAULT_WINDOW_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            filter: RecordFilter::default(),
        }
    }
}

impl DecoderConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.to_path_buf(),
            error,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolve_code_page()?;
        if self.window_size < MIN_WINDOW_SIZE {
            return Err(ConfigError::WindowTooSmall {
                size: self.window_size,
                min: MIN_WINDOW_SIZE,
            });
        }
        if (self.max_frame_size as usize) < MIN_FRAME_SIZE {
            return Err(ConfigError::MaxFrameTooSmall {
                size: self.max_frame_size,
                min: MIN_FRAME_SIZE,
            });
        }
        Ok(())
    }

    /// Look up the configured code page.
    pub fn resolve_code_page(&self) -> Result<&'static CodePage, ConfigError> {
        Ok(CodePage::by_name(&self.code_page)?)
    }

    pub fn with_code_page(mut self, name: &str) -> Self {
        self.code_page = name.to_string();
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: u16) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = filter;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::TodClock;

    fn header(family: u8, subtype: u8, system_id: &str) -> FrameHeader {
        FrameHeader {
            offset: 0,
            total_length: 100,
            record_length: 96,
            segment: 0,
            flags: 0,
            record_family: family,
            timestamp: TodClock::default(),
            system_id: system_id.to_string(),
            subsystem_id: String::new(),
            subtype,
        }
    }

    #[test]
    fn test_defaults() {
        let config = DecoderConfig::default();
        assert_eq!(config.code_page, "CP500");
        assert_eq!(config.window_size, 64 * 1024);
        assert_eq!(config.max_frame_size, 32_760);
        assert!(config.filter.is_empty());
        assert_eq!(config.resolve_code_page().unwrap().ccsid, 500);
    }

    #[test]
    fn test_from_toml_str() {
        let config = DecoderConfig::from_toml_str(
            r#"
            code_page = "IBM-1047"
            window_size = 4096

            [filter]
            include_types = [30]
            include_subtypes = [[30, 1], [30, 2]]
            system_id = "PRD*"
            "#,
        )
        .unwrap();
        assert_eq!(config.resolve_code_page().unwrap().ccsid, 1047);
        assert_eq!(config.window_size, 4096);
        assert_eq!(config.max_frame_size, 32_760);
        assert_eq!(config.filter.include_subtypes, vec![(30, 1), (30, 2)]);
        assert_eq!(config.filter.system_id.as_deref(), Some("PRD*"));
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(DecoderConfig::from_toml_str("").unwrap(), DecoderConfig::default());
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            DecoderConfig::from_toml_str("code_page = \"CP9999\""),
            Err(ConfigError::CodePage(_))
        ));
        assert!(matches!(
            DecoderConfig::from_toml_str("window_size = 4"),
            Err(ConfigError::WindowTooSmall { size: 4, .. })
        ));
        assert!(matches!(
            DecoderConfig::from_toml_str("max_frame_size = 10"),
            Err(ConfigError::MaxFrameTooSmall { size: 10, .. })
        ));
        assert!(matches!(
            DecoderConfig::from_toml_str("window_size = \"big\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_missing_file() {
        let err = DecoderConfig::from_file("/nonexistent/smfdump.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_filter_types() {
        let filter = RecordFilter {
            include_types: vec![30, 110],
            exclude_types: vec![110],
            ..Default::default()
        };
        assert!(filter.matches(&header(30, 1, "SYS1")));
        assert!(!filter.matches(&header(110, 1, "SYS1")));
        assert!(!filter.matches(&header(70, 1, "SYS1")));
    }

    #[test]
    fn test_filter_subtypes() {
        let filter = RecordFilter {
            include_subtypes: vec![(30, 4)],
            ..Default::default()
        };
        assert!(filter.matches(&header(30, 4, "SYS1")));
        assert!(!filter.matches(&header(30, 1, "SYS1")));
    }

    #[test]
    fn test_filter_system_id() {
        let exact = RecordFilter {
            system_id: Some("SYS1".to_string()),
            ..Default::default()
        };
        assert!(exact.matches(&header(30, 1, "SYS1")));
        assert!(!exact.matches(&header(30, 1, "SYS2")));

        let prefix = RecordFilter {
            system_id: Some("PRD*".to_string()),
            ..Default::default()
        };
        assert!(prefix.matches(&header(30, 1, "PRDA")));
        assert!(!prefix.matches(&header(30, 1, "TST1")));
    }

    #[test]
    fn test_builder_methods() {
        let config = DecoderConfig::default()
            .with_code_page("CP037")
            .with_window_size(128)
            .with_max_frame_size(4096);
        config.validate().unwrap();
        assert_eq!(config.resolve_code_page().unwrap().ccsid, 37);
    }
}
