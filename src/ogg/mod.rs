// OGG container support
//
// OGG File Structure:
// - OGG Page Header (27 bytes, little-endian fields)
//   - Capture Pattern: "OggS" (4 bytes)
//   - Version: 0 (1 byte)
//   - Header Type: 1=continuation, 2=bos, 4=eos (1 byte)
//   - Granule Position (8 bytes)
//   - Bitstream Serial Number (4 bytes)
//   - Page Sequence Number (4 bytes)
//   - CRC Checksum (4 bytes)
//   - Number of Page Segments (1 byte)
//   - Segment Table (variable)
// - Page data, sum of the segment table
//
// Packets are cut into 255-byte segments; a segment shorter than 255
// (including 0) ends the packet. A packet may span any number of pages.

pub mod crc;
pub mod error;
pub mod packet;
pub mod page;

use bitflags::bitflags;

pub use crc::{crc32, extend_crc32};
pub use error::OggError;
pub use packet::{read_packet, split_page, write_packet, PacketRead, PacketReader};
pub use page::{Page, PageDecoder, PageEncoder};

// OGG signature
pub const OGG_SIGNATURE: &[u8; 4] = b"OggS";

/// Only stream structure version 0 exists.
pub const OGG_VERSION: u8 = 0;

/// Fixed header length, up to and including the segment count.
pub const HEADER_SIZE: usize = 27;

/// Largest segment; also the "packet continues" marker.
pub const MAX_SEGMENT_SIZE: usize = 255;

/// Segment table entries per page.
pub const MAX_SEGMENTS: usize = 255;

/// Largest possible encoded page.
pub const MAX_PAGE_SIZE: usize = HEADER_SIZE + MAX_SEGMENTS + MAX_SEGMENTS * MAX_SEGMENT_SIZE;

/// On-disk granule value meaning "no packet finishes on this page".
pub const GRANULE_UNDETERMINED: u64 = u64::MAX;

bitflags! {
    /// Page header type flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PageType: u8 {
        /// First segment continues a packet from the previous page.
        const CONTINUATION = 0x01;
        /// First page of a logical stream.
        const BEGINNING_OF_STREAM = 0x02;
        /// Last page of a logical stream.
        const END_OF_STREAM = 0x04;
    }
}

impl Default for PageType {
    fn default() -> Self {
        PageType::empty()
    }
}

/// Map the on-disk granule to its optional form.
pub fn granule_from_raw(raw: u64) -> Option<u64> {
    if raw == GRANULE_UNDETERMINED {
        None
    } else {
        Some(raw)
    }
}

/// Inverse of [`granule_from_raw`].
pub fn granule_to_raw(granule: Option<u64>) -> u64 {
    granule.unwrap_or(GRANULE_UNDETERMINED)
}
