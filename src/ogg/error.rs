// Page and packet codec errors

use thiserror::Error;

/// Errors from decoding or encoding OGG pages.
///
/// Every variant ends the operation in progress; nothing is retried
/// internally. A clean end of stream at a page boundary is not an error.
#[derive(Debug, Error)]
pub enum OggError {
    /// The first four bytes of a page were not `OggS`.
    #[error("data does not start with capture pattern (found {found:02X?})")]
    BadCapturePattern { found: [u8; 4] },

    /// Stream structure version other than 0.
    #[error("unsupported ogg version {0}")]
    UnsupportedVersion(u8),

    /// The stream ended inside a page. Both counts are bytes of the page
    /// from its capture pattern on; `expected` covers the parts whose size
    /// was known when input ran out.
    #[error("truncated input: page needs {expected} bytes, got {got}")]
    TruncatedInput { expected: usize, got: usize },

    /// Stored checksum does not match the page contents.
    #[error("invalid crc: computed 0x{computed:08X}, field was 0x{stored:08X}")]
    CorruptPage { stored: u32, computed: u32 },

    /// More than 255 segment table entries.
    #[error("segment table too long: {0} entries")]
    SegmentTableTooLarge(usize),

    /// Page data length disagrees with its segment table.
    #[error("segment table describes {expected} bytes but page holds {actual}")]
    SegmentTableMismatch { expected: usize, actual: usize },

    /// The stream ended before the current packet's final segment.
    #[error("stream ended inside a packet ({buffered} bytes buffered)")]
    UnterminatedPacket { buffered: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
