//! Layout-driven subtype decoding.

use smfdump_encoding::CodePage;

use crate::error::DecodeError;
use crate::extract::{read_scaled_time, read_text, read_uint, ExtractError};
use crate::header::FrameHeader;
use crate::layout::{FieldDescriptor, FieldKind, Layout, LayoutRegistry};
use crate::record::{DecodedFields, DecodedRecord, FieldValue};

/// Decodes one frame through its registered layout.
#[derive(Debug, Clone, Copy)]
pub struct SubtypeDecoder<'a> {
    registry: &'a LayoutRegistry,
    code_page: &'a CodePage,
}

impl<'a> SubtypeDecoder<'a> {
    pub fn new(registry: &'a LayoutRegistry, code_page: &'a CodePage) -> Self {
        Self {
            registry,
            code_page,
        }
    }

    /// Decode `frame`, whose header has already been parsed.
    ///
    /// Frames without a registered layout decode as
    /// [`DecodedRecord::Unrecognized`]. A field that lies outside the frame
    /// or fails text validation yields an error tagged with the field's
    /// name and absolute offset.
    pub fn decode(&self, header: &FrameHeader, frame: &[u8]) -> Result<DecodedRecord, DecodeError> {
        match self.registry.layout_for(header.record_family, header.subtype) {
            Some(layout) => {
                let fields = self.extract_fields(layout, header.offset, frame)?;
                Ok(layout.build(header.clone(), fields))
            }
            None => Ok(DecodedRecord::unrecognized(header.clone(), frame)),
        }
    }

    /// Extract every field of `layout` from `frame`.
    pub fn extract_fields(
        &self,
        layout: &Layout,
        frame_offset: u64,
        frame: &[u8],
    ) -> Result<DecodedFields, DecodeError> {
        let mut fields = DecodedFields::with_capacity(layout.fields().len());
        for field in layout.fields() {
            let value = self.extract(field, frame).map_err(|err| {
                let offset = frame_offset + u64::from(field.offset);
                match err {
                    ExtractError::Encoding { .. } => DecodeError::EncodingFailure {
                        offset,
                        field: field.name,
                    },
                    ExtractError::OutOfRange { .. } | ExtractError::BadWidth { .. } => {
                        DecodeError::OffsetOutOfRange {
                            offset,
                            field: field.name,
                            record_length: frame.len(),
                        }
                    }
                }
            })?;
            fields.insert(field.name, value);
        }
        Ok(fields)
    }

    fn extract(&self, field: &FieldDescriptor, frame: &[u8]) -> Result<FieldValue, ExtractError> {
        let offset = field.offset as usize;
        let width = field.width as usize;
        Ok(match field.kind {
            FieldKind::Integer => FieldValue::Integer(read_uint(frame, offset, width)?),
            FieldKind::ScaledTime(scale) => {
                FieldValue::Duration(read_scaled_time(frame, offset, width, scale)?)
            }
            FieldKind::Text(encoding) => {
                FieldValue::Text(read_text(frame, offset, width, encoding, self.code_page)?)
            }
        })
    }
}
