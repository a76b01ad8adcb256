//! Routes frames to the decoder for their `(record_family, subtype)`.

use std::sync::Arc;

use smfdump_encoding::CodePage;
use tracing::{debug, trace};

use crate::decoder::SubtypeDecoder;
use crate::error::DecodeError;
use crate::header::FrameHeader;
use crate::layout::LayoutRegistry;
use crate::record::DecodedRecord;

/// Dispatches frames to layout-driven decoding.
///
/// The registry is shared and read-only, so one dispatcher can serve any
/// number of sessions.
#[derive(Debug, Clone)]
pub struct RecordDispatcher {
    registry: Arc<LayoutRegistry>,
    code_page: &'static CodePage,
}

impl RecordDispatcher {
    pub fn new(registry: Arc<LayoutRegistry>, code_page: &'static CodePage) -> Self {
        Self {
            registry,
            code_page,
        }
    }

    pub fn registry(&self) -> &LayoutRegistry {
        &self.registry
    }

    pub fn code_page(&self) -> &'static CodePage {
        self.code_page
    }

    /// Decode one frame.
    pub fn dispatch(&self, header: &FrameHeader, frame: &[u8]) -> Result<DecodedRecord, DecodeError> {
        let result = SubtypeDecoder::new(&self.registry, self.code_page).decode(header, frame);
        match &result {
            Ok(DecodedRecord::Unrecognized(_)) => debug!(
                offset = header.offset,
                record_family = header.record_family,
                subtype = header.subtype,
                "no layout registered, passing frame through raw"
            ),
            Ok(record) => trace!(offset = header.offset, kind = record.kind(), "frame decoded"),
            Err(err) => debug!(offset = header.offset, error = %err, "frame failed to decode"),
        }
        result
    }
}
