//! Frame reader: splits a dump into length-prefixed frames.
//!
//! The reader is a small state machine:
//!
//! ```text
//! ScanningHeader -> ValidatingFrame -> EmittingFrame -> ScanningHeader
//!                          |  ^
//!                          |  +-- Resyncing
//!                          +-> Resyncing
//!                          +-> EndOfStream
//! ```
//!
//! A header whose length prefix is out of bounds or not self-consistent is
//! reported once as [`DecodeError::BadFrameLength`]; the reader then scans
//! forward one byte at a time until a self-consistent header starts, without
//! reporting the candidates it discards. A consistent frame that runs past
//! the end of the stream is reported as [`DecodeError::Truncated`] and ends
//! the stream, whether or not it was found by resynchronizing.

use std::io::Read;

use smfdump_encoding::CodePage;
use tracing::{debug, info, warn};

use crate::error::{DecodeError, FrameFault};
use crate::header::{FrameHeader, HEADER_SIZE, LENGTH_PREFIX_SIZE, MIN_FRAME_SIZE};
use crate::source::ByteWindow;

/// Reader state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Waiting for a header at the cursor.
    ScanningHeader,
    /// A header is buffered and its lengths are being checked.
    ValidatingFrame { total_length: u16, record_length: u16 },
    /// A complete frame is buffered at the cursor.
    EmittingFrame { total_length: u16 },
    /// Scanning byte by byte for the next plausible frame.
    Resyncing,
    /// No more frames.
    EndOfStream,
}

/// One raw frame and its parsed header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub bytes: Vec<u8>,
}

/// Iterator over the frames of a dump.
#[derive(Debug)]
pub struct DumpReader<R> {
    window: ByteWindow<R>,
    state: FrameState,
    code_page: &'static CodePage,
    max_frame_size: u16,
    resync_from: u64,
    bytes_skipped: u64,
    frames: u64,
}

impl<R: Read> DumpReader<R> {
    pub fn new(
        source: R,
        code_page: &'static CodePage,
        window_size: usize,
        max_frame_size: u16,
    ) -> Self {
        Self {
            window: ByteWindow::new(source, window_size),
            state: FrameState::ScanningHeader,
            code_page,
            max_frame_size,
            resync_from: 0,
            bytes_skipped: 0,
            frames: 0,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Absolute stream offset of the cursor.
    pub fn offset(&self) -> u64 {
        self.window.position()
    }

    /// Total bytes discarded while resynchronizing.
    pub fn bytes_skipped(&self) -> u64 {
        self.bytes_skipped
    }

    /// Frames emitted so far.
    pub fn frames_emitted(&self) -> u64 {
        self.frames
    }

    /// Check a length prefix against the frame bounds.
    pub fn check_lengths(&self, total_length: u16, record_length: u16) -> Option<FrameFault> {
        if (total_length as usize) < MIN_FRAME_SIZE {
            Some(FrameFault::TooShort)
        } else if total_length > self.max_frame_size {
            Some(FrameFault::TooLong)
        } else if total_length % 2 != 0 {
            Some(FrameFault::OddLength)
        } else if record_length != total_length - LENGTH_PREFIX_SIZE {
            Some(FrameFault::LengthMismatch { record_length })
        } else {
            None
        }
    }

    /// Advance to the next frame or error.
    pub fn next_frame(&mut self) -> Option<Result<Frame, DecodeError>> {
        loop {
            match self.state {
                FrameState::ScanningHeader => match self.fill_header() {
                    Err(err) => return Some(Err(self.source_failed(&err))),
                    Ok(Some((total_length, record_length))) => {
                        self.state = FrameState::ValidatingFrame {
                            total_length,
                            record_length,
                        };
                    }
                    Ok(None) => {
                        let available = self.window.available();
                        if available > 0 {
                            debug!(
                                offset = self.offset(),
                                trailing = available,
                                "ignoring trailing bytes shorter than a header"
                            );
                        }
                        self.state = FrameState::EndOfStream;
                    }
                },

                FrameState::ValidatingFrame {
                    total_length,
                    record_length,
                } => {
                    let offset = self.offset();
                    if let Some(reason) = self.check_lengths(total_length, record_length) {
                        warn!(offset, length = total_length, %reason, "bad frame length, resynchronizing");
                        self.state = FrameState::Resyncing;
                        self.resync_from = offset;
                        self.skip(1);
                        return Some(Err(DecodeError::BadFrameLength {
                            offset,
                            length: total_length,
                            reason,
                        }));
                    }
                    match self.window.fill(total_length as usize) {
                        Err(err) => return Some(Err(self.source_failed(&err))),
                        Ok(available) if available < total_length as usize => {
                            warn!(offset, declared = total_length, available, "truncated frame at end of stream");
                            self.state = FrameState::EndOfStream;
                            return Some(Err(DecodeError::Truncated {
                                offset,
                                declared: total_length,
                                available: available as u64,
                            }));
                        }
                        Ok(_) => self.state = FrameState::EmittingFrame { total_length },
                    }
                }

                FrameState::EmittingFrame { total_length } => {
                    return Some(self.emit(total_length as usize));
                }

                FrameState::Resyncing => match self.fill_header() {
                    Err(err) => return Some(Err(self.source_failed(&err))),
                    Ok(None) => {
                        let available = self.window.available();
                        info!(
                            skipped = self.offset() - self.resync_from + available as u64,
                            "stream ended while resynchronizing"
                        );
                        self.skip(available);
                        self.state = FrameState::EndOfStream;
                    }
                    Ok(Some((total_length, record_length))) => {
                        if self.check_lengths(total_length, record_length).is_some() {
                            self.skip(1);
                            continue;
                        }
                        info!(
                            offset = self.offset(),
                            skipped = self.offset() - self.resync_from,
                            "resynchronized"
                        );
                        self.state = FrameState::ValidatingFrame {
                            total_length,
                            record_length,
                        };
                    }
                },

                FrameState::EndOfStream => return None,
            }
        }
    }

    /// Buffer a header at the cursor and read its length prefixes.
    ///
    /// `Ok(None)` means fewer than `HEADER_SIZE` bytes remain.
    fn fill_header(&mut self) -> std::io::Result<Option<(u16, u16)>> {
        self.window.fill(HEADER_SIZE)?;
        Ok(self.window.peek(HEADER_SIZE).and_then(FrameHeader::peek_lengths))
    }

    fn skip(&mut self, n: usize) {
        self.window.advance(n);
        self.bytes_skipped += n as u64;
    }

    fn emit(&mut self, total_length: usize) -> Result<Frame, DecodeError> {
        let offset = self.offset();
        let bytes = self.window.buffered()[..total_length].to_vec();
        self.window.advance(total_length);
        self.state = FrameState::ScanningHeader;
        self.frames += 1;
        let header = FrameHeader::parse(&bytes, offset, self.code_page).map_err(|_| {
            DecodeError::OffsetOutOfRange {
                offset,
                field: "frame_header",
                record_length: bytes.len(),
            }
        })?;
        Ok(Frame { header, bytes })
    }

    fn source_failed(&mut self, err: &std::io::Error) -> DecodeError {
        let failure = DecodeError::source_failure(self.offset(), err);
        warn!(offset = self.offset(), error = %err, "source read failed");
        self.state = FrameState::EndOfStream;
        failure
    }
}

impl<R: Read> Iterator for DumpReader<R> {
    type Item = Result<Frame, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::DEFAULT_MAX_FRAME_SIZE;
    use crate::writer::FrameWriter;
    use smfdump_encoding::CP500;

    fn reader(data: &[u8]) -> DumpReader<&[u8]> {
        DumpReader::new(data, &CP500, 64, DEFAULT_MAX_FRAME_SIZE)
    }

    fn frame(family: u8, subtype: u8, len: usize) -> Vec<u8> {
        FrameWriter::new(family, subtype, len).finish().unwrap()
    }

    #[test]
    fn test_empty_stream() {
        let mut r = reader(&[]);
        assert!(r.next().is_none());
        assert_eq!(r.state(), FrameState::EndOfStream);
    }

    #[test]
    fn test_short_trailing_bytes_end_stream() {
        let mut r = reader(&[0u8; 10]);
        assert!(r.next().is_none());
    }

    #[test]
    fn test_frames_in_order() {
        let mut data = frame(30, 1, 116);
        data.extend(frame(110, 1, 134));
        let frames: Vec<Frame> = reader(&data).map(Result::unwrap).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].header.offset, 0);
        assert_eq!(frames[0].header.key(), (30, 1));
        assert_eq!(frames[1].header.offset, 116);
        assert_eq!(frames[1].bytes.len(), 134);
    }

    #[test]
    fn test_truncated_frame() {
        let mut data = frame(30, 1, 116);
        data.truncate(80);
        let mut r = reader(&data);
        assert_eq!(
            r.next(),
            Some(Err(DecodeError::Truncated { offset: 0, declared: 116, available: 80 }))
        );
        assert!(r.next().is_none());
    }

    #[test]
    fn test_bad_length_then_resync() {
        let mut data = vec![0x00, 0x01];
        data.extend(vec![0u8; 22]);
        data.extend(frame(30, 4, 76));
        let mut r = reader(&data);
        assert!(matches!(
            r.next(),
            Some(Err(DecodeError::BadFrameLength { offset: 0, length: 1, reason: FrameFault::TooShort }))
        ));
        let resynced = r.next().unwrap().unwrap();
        assert_eq!(resynced.header.offset, 24);
        assert_eq!(resynced.header.key(), (30, 4));
        assert_eq!(r.bytes_skipped(), 24);
        assert!(r.next().is_none());
    }

    #[test]
    fn test_truncated_frame_after_bad_length() {
        let mut data = frame(30, 1, 116);
        data.extend([0x00, 0x01]);
        data.extend([0u8; 22]);
        let mut last = frame(30, 1, 116);
        last.truncate(60);
        data.extend(&last);

        let mut r = reader(&data);
        assert!(r.next().unwrap().is_ok());
        assert!(matches!(
            r.next(),
            Some(Err(DecodeError::BadFrameLength { offset: 116, length: 1, .. }))
        ));
        assert_eq!(
            r.next(),
            Some(Err(DecodeError::Truncated { offset: 140, declared: 116, available: 60 }))
        );
        assert!(r.next().is_none());
        assert_eq!(r.bytes_skipped(), 24);
        assert_eq!(r.offset(), 140);
    }

    #[test]
    fn test_odd_and_mismatched_lengths() {
        let mut odd = frame(30, 1, 116);
        odd[0..2].copy_from_slice(&115u16.to_be_bytes());
        odd[4..6].copy_from_slice(&111u16.to_be_bytes());
        assert!(matches!(
            reader(&odd).next(),
            Some(Err(DecodeError::BadFrameLength { reason: FrameFault::OddLength, .. }))
        ));

        let mut mismatch = frame(30, 1, 116);
        mismatch[4..6].copy_from_slice(&50u16.to_be_bytes());
        assert!(matches!(
            reader(&mismatch).next(),
            Some(Err(DecodeError::BadFrameLength {
                reason: FrameFault::LengthMismatch { record_length: 50 },
                ..
            }))
        ));
    }

    #[test]
    fn test_max_frame_size() {
        let data = frame(30, 1, 200);
        let mut r = DumpReader::new(&data[..], &CP500, 64, 128);
        assert!(matches!(
            r.next(),
            Some(Err(DecodeError::BadFrameLength { length: 200, reason: FrameFault::TooLong, .. }))
        ));
    }

    #[test]
    fn test_resync_reaches_end_of_stream() {
        let mut data = vec![0xFF, 0xFF];
        data.extend(vec![0xEE; 60]);
        let mut r = reader(&data);
        assert!(matches!(r.next(), Some(Err(DecodeError::BadFrameLength { .. }))));
        assert!(r.next().is_none());
        assert_eq!(r.state(), FrameState::EndOfStream);
        assert_eq!(r.bytes_skipped(), 62);
    }

    #[test]
    fn test_source_failure_ends_stream() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"))
            }
        }
        let mut r = DumpReader::new(Failing, &CP500, 64, DEFAULT_MAX_FRAME_SIZE);
        let err = r.next().unwrap().unwrap_err();
        assert!(err.is_fatal());
        assert!(r.next().is_none());
    }

    #[test]
    fn test_window_smaller_than_frame() {
        let mut data = frame(110, 2, 170);
        data.extend(frame(30, 1, 116));
        let mut r = DumpReader::new(&data[..], &CP500, 16, DEFAULT_MAX_FRAME_SIZE);
        assert_eq!(r.next().unwrap().unwrap().bytes.len(), 170);
        assert_eq!(r.next().unwrap().unwrap().header.offset, 170);
        assert!(r.next().is_none());
        assert_eq!(r.frames_emitted(), 2);
    }
}
