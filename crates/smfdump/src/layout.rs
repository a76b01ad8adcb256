//! Record layouts and the layout registry.
//!
//! A [`Layout`] describes where each field of one `(record_family, subtype)`
//! lives inside a frame. Layouts are validated when they are registered, so
//! per-record decoding never re-checks overlap or bounds.

use std::collections::{HashMap, HashSet};
use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::extract::{TextEncoding, TimeScale};
use crate::header::{FrameHeader, HEADER_SIZE, MIN_FRAME_SIZE};
use crate::record::{DecodedFields, DecodedRecord};
use crate::{type110, type30};

// ---------------------------------------------------------------------------
//  Errors
// ---------------------------------------------------------------------------

/// A layout rejected at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum LayoutError {
    /// Two fields share bytes.
    #[error("layout {layout}: field '{first}' overlaps field '{second}'")]
    #[diagnostic(code(smfdump::layout::overlap))]
    Overlap {
        layout: &'static str,
        first: &'static str,
        second: &'static str,
    },

    /// A field reaches past the layout's minimum length.
    #[error("layout {layout}: field '{field}' ends at {end}, past minimum length {min_length}")]
    #[diagnostic(code(smfdump::layout::exceeds_minimum))]
    ExceedsMinimum {
        layout: &'static str,
        field: &'static str,
        end: u64,
        min_length: u32,
    },

    /// A field starts inside the frame header.
    #[error("layout {layout}: field '{field}' at offset {offset} overlaps the frame header")]
    #[diagnostic(code(smfdump::layout::header_overlap))]
    HeaderOverlap {
        layout: &'static str,
        field: &'static str,
        offset: u32,
    },

    /// The width is not usable for the field kind.
    #[error("layout {layout}: field '{field}' has invalid width {width}")]
    #[diagnostic(code(smfdump::layout::invalid_width))]
    InvalidWidth {
        layout: &'static str,
        field: &'static str,
        width: u32,
    },

    /// A field name appears twice.
    #[error("layout {layout}: duplicate field '{field}'")]
    #[diagnostic(code(smfdump::layout::duplicate_field))]
    DuplicateField {
        layout: &'static str,
        field: &'static str,
    },

    /// The minimum length is below the smallest legal frame.
    #[error("layout {layout}: minimum length {min_length} is below the frame minimum")]
    #[diagnostic(code(smfdump::layout::minimum_too_small))]
    MinimumTooSmall { layout: &'static str, min_length: u32 },

    /// A layout is already registered for the key.
    #[error("a layout is already registered for type {family} subtype {subtype}")]
    #[diagnostic(code(smfdump::layout::duplicate_layout))]
    DuplicateLayout { family: u8, subtype: u8 },
}

// ---------------------------------------------------------------------------
//  Field descriptors
// ---------------------------------------------------------------------------

/// How a field's bytes are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Big-endian unsigned integer, 1 to 8 bytes.
    Integer,
    /// Unsigned integer scaled to a duration.
    ScaledTime(TimeScale),
    /// Fixed-width text with trailing fill removed.
    Text(TextEncoding),
}

/// Location and interpretation of one field, relative to the frame start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub offset: u32,
    pub width: u32,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, offset: u32, width: u32, kind: FieldKind) -> Self {
        Self {
            name,
            offset,
            width,
            kind,
        }
    }

    /// Unsigned integer field.
    pub const fn integer(name: &'static str, offset: u32, width: u32) -> Self {
        Self::new(name, offset, width, FieldKind::Integer)
    }

    /// Scaled-time field.
    pub const fn time(name: &'static str, offset: u32, width: u32, scale: TimeScale) -> Self {
        Self::new(name, offset, width, FieldKind::ScaledTime(scale))
    }

    /// EBCDIC text field.
    pub const fn text(name: &'static str, offset: u32, width: u32) -> Self {
        Self::new(name, offset, width, FieldKind::Text(TextEncoding::Ebcdic))
    }

    /// ASCII text field.
    pub const fn ascii(name: &'static str, offset: u32, width: u32) -> Self {
        Self::new(name, offset, width, FieldKind::Text(TextEncoding::Ascii))
    }

    /// One past the last byte of the field.
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.width)
    }

    fn width_is_valid(&self) -> bool {
        match self.kind {
            FieldKind::Integer | FieldKind::ScaledTime(_) => (1..=8).contains(&self.width),
            FieldKind::Text(_) => self.width > 0,
        }
    }
}

// ---------------------------------------------------------------------------
//  Layouts
// ---------------------------------------------------------------------------

/// Builds a typed record from extracted fields.
pub type RecordBuilder = fn(FrameHeader, &DecodedFields) -> DecodedRecord;

/// Field map for one `(record_family, subtype)`.
#[derive(Clone)]
pub struct Layout {
    pub family: u8,
    pub subtype: u8,
    /// Short name used in logs and generic records.
    pub name: &'static str,
    /// Frames of this subtype are expected to be at least this long.
    pub min_length: u32,
    fields: Vec<FieldDescriptor>,
    builder: Option<RecordBuilder>,
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layout")
            .field("family", &self.family)
            .field("subtype", &self.subtype)
            .field("name", &self.name)
            .field("min_length", &self.min_length)
            .field("fields", &self.fields)
            .field("typed", &self.builder.is_some())
            .finish()
    }
}

impl Layout {
    /// A layout that produces [`DecodedRecord::Generic`] records.
    pub fn new(
        family: u8,
        subtype: u8,
        name: &'static str,
        min_length: u32,
        fields: impl Into<Vec<FieldDescriptor>>,
    ) -> Self {
        Self {
            family,
            subtype,
            name,
            min_length,
            fields: fields.into(),
            builder: None,
        }
    }

    /// Attach a typed record builder.
    pub fn with_builder(mut self, builder: RecordBuilder) -> Self {
        self.builder = Some(builder);
        self
    }

    pub fn key(&self) -> (u8, u8) {
        (self.family, self.subtype)
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Build the record for extracted fields.
    pub fn build(&self, header: FrameHeader, fields: DecodedFields) -> DecodedRecord {
        match self.builder {
            Some(build) => build(header, &fields),
            None => DecodedRecord::generic(header, self.name, fields),
        }
    }

    /// Check widths, bounds, names and overlap.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let layout = self.name;
        if (self.min_length as usize) < MIN_FRAME_SIZE {
            return Err(LayoutError::MinimumTooSmall {
                layout,
                min_length: self.min_length,
            });
        }

        let mut names = HashSet::new();
        for field in &self.fields {
            if !field.width_is_valid() {
                return Err(LayoutError::InvalidWidth {
                    layout,
                    field: field.name,
                    width: field.width,
                });
            }
            if (field.offset as usize) < HEADER_SIZE {
                return Err(LayoutError::HeaderOverlap {
                    layout,
                    field: field.name,
                    offset: field.offset,
                });
            }
            if field.end() > u64::from(self.min_length) {
                return Err(LayoutError::ExceedsMinimum {
                    layout,
                    field: field.name,
                    end: field.end(),
                    min_length: self.min_length,
                });
            }
            if !names.insert(field.name) {
                return Err(LayoutError::DuplicateField {
                    layout,
                    field: field.name,
                });
            }
        }

        let mut sorted: Vec<&FieldDescriptor> = self.fields.iter().collect();
        sorted.sort_by_key(|f| f.offset);
        for pair in sorted.windows(2) {
            if pair[0].end() > u64::from(pair[1].offset) {
                return Err(LayoutError::Overlap {
                    layout,
                    first: pair[0].name,
                    second: pair[1].name,
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
//  Registry
// ---------------------------------------------------------------------------

/// Validated layouts keyed by `(record_family, subtype)`.
///
/// Built once at session start and read-only afterwards.
#[derive(Clone, Default)]
pub struct LayoutRegistry {
    layouts: HashMap<(u8, u8), Layout>,
}

impl fmt::Debug for LayoutRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutRegistry")
            .field("registered", &self.registered_keys())
            .finish()
    }
}

impl LayoutRegistry {
    /// An empty registry. Every frame decodes as unrecognized.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in type 30 and type 110 layouts.
    pub fn standard() -> Result<Self, LayoutError> {
        let mut registry = Self::new();
        for layout in type30::layouts().into_iter().chain(type110::layouts()) {
            registry.register(layout)?;
        }
        Ok(registry)
    }

    /// Validate and add a layout.
    pub fn register(&mut self, layout: Layout) -> Result<(), LayoutError> {
        layout.validate()?;
        let (family, subtype) = layout.key();
        if self.layouts.contains_key(&(family, subtype)) {
            return Err(LayoutError::DuplicateLayout { family, subtype });
        }
        self.layouts.insert((family, subtype), layout);
        Ok(())
    }

    /// Add a layout, replacing any layout already registered for its key.
    pub fn replace(&mut self, layout: Layout) -> Result<Option<Layout>, LayoutError> {
        layout.validate()?;
        Ok(self.layouts.insert(layout.key(), layout))
    }

    pub fn layout_for(&self, family: u8, subtype: u8) -> Option<&Layout> {
        self.layouts.get(&(family, subtype))
    }

    pub fn is_registered(&self, family: u8, subtype: u8) -> bool {
        self.layouts.contains_key(&(family, subtype))
    }

    /// Registered keys in ascending order.
    pub fn registered_keys(&self) -> Vec<(u8, u8)> {
        let mut keys: Vec<(u8, u8)> = self.layouts.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}
