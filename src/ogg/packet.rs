// Packet framing on top of pages
//
// Reading: `read_packet` pulls one packet's segments out of a page, handing
// back what is left of the page. Writing: `write_packet` cuts a packet into
// segments and pages.

use std::io::{Read, Write};
use std::mem;

use log::{debug, warn};

use crate::ogg::page::{Page, PageDecoder, PageEncoder};
use crate::ogg::{OggError, PageType, MAX_SEGMENTS, MAX_SEGMENT_SIZE};

/// Split a page in two at a segment table index.
///
/// `segment_index` is clamped to the table length; the segment at the index
/// goes to the second page. Both halves keep the original type, granule,
/// serial, sequence and crc. The crc is stale on both; `PageEncoder`
/// recomputes it on write.
pub fn split_page(page: Page, segment_index: usize) -> (Page, Page) {
    let index = segment_index.min(page.segment_table.len());
    let offset: usize = page.segment_table[..index]
        .iter()
        .map(|&s| s as usize)
        .sum();

    let Page {
        page_type,
        granule,
        serial,
        sequence,
        crc,
        mut segment_table,
        mut data,
    } = page;

    let second_table = segment_table.split_off(index);
    let second_data = data.split_off(offset.min(data.len()));

    let second = Page {
        page_type,
        granule,
        serial,
        sequence,
        crc,
        segment_table: second_table,
        data: second_data,
    };
    let first = Page {
        page_type,
        granule,
        serial,
        sequence,
        crc,
        segment_table,
        data,
    };
    (first, second)
}

/// Result of [`read_packet`].
#[derive(Debug, Clone)]
pub struct PacketRead {
    /// The packet's last segment was on this page.
    pub finished: bool,
    /// Part of the page that belongs to the current packet.
    pub fragment: Page,
    /// Unconsumed tail of the page; starts the next packet. May be empty.
    pub remainder: Page,
}

/// Append the current packet's segments from `page` to `packet`.
///
/// Scans the segment table for the first length below 255. The page is split
/// just after it; everything up to and including that segment is appended
/// to `packet`. Without such a segment the whole page is appended and
/// `finished` is false.
///
/// Continuation across pages is carried only by `packet`: when `finished` is
/// false, decode the next page and call again with the same buffer. A
/// non-empty `remainder` must be fed back in to start the next packet. Header
/// parsers rely on this exact grouping, so it is kept as is.
pub fn read_packet(page: Page, packet: &mut Vec<u8>) -> PacketRead {
    let end = page
        .segment_table
        .iter()
        .position(|&s| (s as usize) < MAX_SEGMENT_SIZE);

    let (finished, split_at) = match end {
        Some(i) => (true, i + 1),
        None => (false, page.segment_table.len()),
    };

    let (fragment, remainder) = split_page(page, split_at);
    packet.extend_from_slice(&fragment.data);

    PacketRead {
        finished,
        fragment,
        remainder,
    }
}

/// Segment table for a packet of `len` bytes, before grouping into pages.
///
/// Always ends in an entry below 255, so an exact multiple of 255 gets a
/// trailing zero.
fn lacing_values(len: usize) -> Vec<u8> {
    let mut table = vec![MAX_SEGMENT_SIZE as u8; len / MAX_SEGMENT_SIZE + 1];
    if let Some(last) = table.last_mut() {
        *last = (len % MAX_SEGMENT_SIZE) as u8;
    }
    table
}

impl<W: Write> PageEncoder<W> {
    /// Write one packet as one or more pages.
    ///
    /// Pages after the first are flagged as continuations. `flags` may ask for
    /// beginning-of-stream (first page only) and end-of-stream (last page
    /// only). Only the last page carries `granule`; the others are
    /// undetermined. Returns the sequence number for the next page.
    ///
    /// A write error stops immediately; pages already written stay written.
    pub fn write_packet(
        &mut self,
        packet: &[u8],
        granule: Option<u64>,
        serial: u32,
        sequence_start: u32,
        flags: PageType,
    ) -> Result<u32, OggError> {
        let lacing = lacing_values(packet.len());
        let page_count = lacing.chunks(MAX_SEGMENTS).len();

        let mut sequence = sequence_start;
        let mut offset = 0;
        for (index, table) in lacing.chunks(MAX_SEGMENTS).enumerate() {
            let last = index + 1 == page_count;

            let mut page_type = PageType::empty();
            if index == 0 {
                page_type |= flags & PageType::BEGINNING_OF_STREAM;
            } else {
                page_type |= PageType::CONTINUATION;
            }
            if last {
                page_type |= flags & PageType::END_OF_STREAM;
            }

            let len: usize = table.iter().map(|&s| s as usize).sum();
            let page = Page {
                page_type,
                granule: if last { granule } else { None },
                serial,
                sequence,
                crc: 0,
                segment_table: table.to_vec(),
                data: packet[offset..offset + len].to_vec(),
            };
            self.write_page(&page)?;

            offset += len;
            sequence = sequence.wrapping_add(1);
        }

        debug!(
            "wrote packet serial={:#x} bytes={} pages={}",
            serial,
            packet.len(),
            page_count
        );
        Ok(sequence)
    }
}

/// Write one packet to `writer`; see [`PageEncoder::write_packet`].
pub fn write_packet<W: Write>(
    writer: W,
    packet: &[u8],
    granule: Option<u64>,
    serial: u32,
    sequence_start: u32,
    flags: PageType,
) -> Result<u32, OggError> {
    PageEncoder::new(writer).write_packet(packet, granule, serial, sequence_start, flags)
}

/// Reassembles the packets of one logical stream.
///
/// Follows the serial of the first page it sees (or the one it was given)
/// and skips pages of any other stream.
pub struct PacketReader<R> {
    decoder: PageDecoder<R>,
    serial: Option<u32>,
    pending: Option<Page>,
    packet: Vec<u8>,
}

impl<R: Read> PacketReader<R> {
    pub fn new(reader: R) -> Self {
        PacketReader {
            decoder: PageDecoder::new(reader),
            serial: None,
            pending: None,
            packet: Vec::new(),
        }
    }

    /// Only return packets of the stream with this serial.
    pub fn with_serial(reader: R, serial: u32) -> Self {
        PacketReader {
            serial: Some(serial),
            ..PacketReader::new(reader)
        }
    }

    /// Serial being followed, once known.
    pub fn serial(&self) -> Option<u32> {
        self.serial
    }

    /// Next complete packet, or `None` at a clean end of stream.
    pub fn next_packet(&mut self) -> Result<Option<Vec<u8>>, OggError> {
        loop {
            let page = match self.pending.take() {
                Some(page) => page,
                None => match self.decoder.read_page()? {
                    Some(page) => {
                        match self.serial {
                            None => self.serial = Some(page.serial),
                            Some(serial) if serial != page.serial => {
                                debug!(
                                    "skipping page seq={} of serial {:#x}",
                                    page.sequence, page.serial
                                );
                                continue;
                            }
                            Some(_) => {}
                        }
                        if page.is_continuation() && self.packet.is_empty() {
                            // joined mid-packet; drop the orphaned tail
                            warn!(
                                "dropping continued segments on page seq={} of serial {:#x}",
                                page.sequence, page.serial
                            );
                            let read = read_packet(page, &mut Vec::new());
                            if read.remainder.is_empty() {
                                continue;
                            }
                            read.remainder
                        } else {
                            page
                        }
                    }
                    None if self.packet.is_empty() => return Ok(None),
                    None => {
                        return Err(OggError::UnterminatedPacket {
                            buffered: self.packet.len(),
                        })
                    }
                },
            };

            let read = read_packet(page, &mut self.packet);
            if !read.remainder.is_empty() {
                self.pending = Some(read.remainder);
            }
            if read.finished {
                return Ok(Some(mem::take(&mut self.packet)));
            }
        }
    }
}

impl<R: Read> Iterator for PacketReader<R> {
    type Item = Result<Vec<u8>, OggError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn page_with(table: Vec<u8>) -> Page {
        let len: usize = table.iter().map(|&s| s as usize).sum();
        Page {
            page_type: PageType::CONTINUATION,
            granule: Some(99),
            serial: 7,
            sequence: 3,
            crc: 0xabcd,
            segment_table: table,
            data: (0..len).map(|i| i as u8).collect(),
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 253) as u8).collect()
    }

    fn decode_all(bytes: &[u8]) -> Vec<Page> {
        PageDecoder::new(bytes).map(|p| p.unwrap()).collect()
    }

    #[test]
    fn split_at_zero_and_end() {
        let page = page_with(vec![255, 10, 0, 4]);

        let (first, second) = split_page(page.clone(), 0);
        assert!(first.is_empty());
        assert!(first.data.is_empty());
        assert_eq!(second, page);

        let (first, second) = split_page(page.clone(), 4);
        assert_eq!(first, page);
        assert!(second.is_empty());
        assert!(second.data.is_empty());

        let (first, second) = split_page(page.clone(), 1000);
        assert_eq!(first, page);
        assert!(second.is_empty());
    }

    #[test]
    fn split_in_the_middle_keeps_metadata() {
        let page = page_with(vec![255, 10, 0, 4]);
        let (first, second) = split_page(page.clone(), 2);
        assert_eq!(first.segment_table, vec![255, 10]);
        assert_eq!(first.data, page.data[..265]);
        assert_eq!(second.segment_table, vec![0, 4]);
        assert_eq!(second.data, page.data[265..]);
        for half in [&first, &second] {
            assert_eq!(half.page_type, page.page_type);
            assert_eq!(half.granule, page.granule);
            assert_eq!(half.serial, page.serial);
            assert_eq!(half.sequence, page.sequence);
            assert_eq!(half.crc, page.crc);
        }
    }

    #[test]
    fn read_packet_stops_at_short_segment() {
        let page = page_with(vec![255, 20, 255, 255, 1]);
        let mut packet = Vec::new();

        let read = read_packet(page.clone(), &mut packet);
        assert!(read.finished);
        assert_eq!(read.fragment.segment_table, vec![255, 20]);
        assert_eq!(packet, page.data[..275]);
        assert_eq!(read.remainder.segment_table, vec![255, 255, 1]);

        let mut next = Vec::new();
        let read = read_packet(read.remainder, &mut next);
        assert!(read.finished);
        assert_eq!(next, page.data[275..]);
        assert!(read.remainder.is_empty());
    }

    #[test]
    fn read_packet_zero_length_segment_ends_packet() {
        let page = page_with(vec![0, 0, 3]);
        let mut packet = Vec::new();
        let read = read_packet(page, &mut packet);
        assert!(read.finished);
        assert!(packet.is_empty());
        assert_eq!(read.remainder.segment_table, vec![0, 3]);
    }

    #[test]
    fn read_packet_without_terminator_takes_whole_page() {
        let page = page_with(vec![255, 255]);
        let mut packet = vec![1, 2, 3];
        let read = read_packet(page.clone(), &mut packet);
        assert!(!read.finished);
        assert_eq!(read.fragment, page);
        assert!(read.remainder.is_empty());
        assert_eq!(packet.len(), 3 + 510);
        assert_eq!(packet[3..], page.data[..]);
    }

    #[test]
    fn read_packet_on_empty_page() {
        let mut packet = Vec::new();
        let read = read_packet(page_with(Vec::new()), &mut packet);
        assert!(!read.finished);
        assert!(packet.is_empty());
    }

    #[test]
    fn lacing_values_end_below_255() {
        assert_eq!(lacing_values(0), vec![0]);
        assert_eq!(lacing_values(254), vec![254]);
        assert_eq!(lacing_values(255), vec![255, 0]);
        assert_eq!(lacing_values(256), vec![255, 1]);
        assert_eq!(lacing_values(510), vec![255, 255, 0]);
    }

    #[test]
    fn exact_segment_multiple_gets_trailing_zero() {
        let mut out = Vec::new();
        let next = write_packet(&mut out, &pattern(255), Some(5), 1, 0, PageType::empty()).unwrap();
        assert_eq!(next, 1);
        let pages = decode_all(&out);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].segment_table, vec![255, 0]);
    }

    #[test]
    fn large_packet_spans_pages() {
        let packet = pattern(70_000);
        let mut out = Vec::new();
        let flags = PageType::BEGINNING_OF_STREAM | PageType::END_OF_STREAM;
        let next = write_packet(&mut out, &packet, Some(1234), 9, 10, flags).unwrap();
        assert_eq!(next, 12);

        let pages = decode_all(&out);
        assert_eq!(pages.len(), 2);

        assert_eq!(pages[0].sequence, 10);
        assert_eq!(pages[0].page_type, PageType::BEGINNING_OF_STREAM);
        assert_eq!(pages[0].granule, None);
        assert_eq!(pages[0].segment_table.len(), 255);
        assert_eq!(pages[0].data.len(), 65_025);

        assert_eq!(pages[1].sequence, 11);
        assert_eq!(
            pages[1].page_type,
            PageType::CONTINUATION | PageType::END_OF_STREAM
        );
        assert_eq!(pages[1].granule, Some(1234));
        assert_eq!(pages[1].segment_table.len(), 20);
        assert_eq!(*pages[1].segment_table.last().unwrap(), 130);
    }

    #[test]
    fn full_page_packet_emits_lone_zero_segment_page() {
        let mut out = Vec::new();
        write_packet(&mut out, &pattern(65_025), Some(0), 1, 0, PageType::empty()).unwrap();
        let pages = decode_all(&out);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].segment_table, vec![0]);
        assert!(pages[1].data.is_empty());
        assert!(pages[1].is_continuation());
    }

    #[test]
    fn write_then_read_reconstructs_packet() {
        for len in [0usize, 1, 254, 255, 510, 65_025, 65_026] {
            let packet = pattern(len);
            let mut out = Vec::new();
            write_packet(&mut out, &packet, Some(77), 3, 0, PageType::empty()).unwrap();

            let pages = decode_all(&out);
            let mut buffer = Vec::new();
            for (i, page) in pages.iter().enumerate() {
                let read = read_packet(page.clone(), &mut buffer);
                assert_eq!(read.finished, i + 1 == pages.len(), "len {} page {}", len, i);
                assert!(read.remainder.is_empty());
            }
            assert_eq!(buffer, packet, "len {}", len);
        }
    }

    #[test]
    fn sequence_wraps() {
        let mut out = Vec::new();
        let next = write_packet(&mut out, b"x", None, 1, u32::MAX, PageType::empty()).unwrap();
        assert_eq!(next, 0);
    }

    /// Accepts `budget` writes, then fails.
    struct FailingWriter {
        budget: usize,
        writes: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.writes == self.budget {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            self.writes += 1;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_error_aborts() {
        let mut writer = FailingWriter {
            budget: 1,
            writes: 0,
        };
        let result = write_packet(&mut writer, &pattern(140_000), None, 1, 0, PageType::empty());
        assert!(matches!(result, Err(OggError::Io(_))));
        assert_eq!(writer.writes, 1);
    }

    #[test]
    fn packet_reader_handles_shared_and_spanning_pages() {
        let data: Vec<u8> = (0..265u32).map(|i| i as u8).collect();
        let first = Page {
            page_type: PageType::BEGINNING_OF_STREAM,
            granule: Some(0),
            serial: 5,
            sequence: 0,
            crc: 0,
            segment_table: vec![5, 5, 255],
            data: data.clone(),
        };
        let second = Page {
            page_type: PageType::CONTINUATION,
            granule: Some(10),
            serial: 5,
            sequence: 1,
            crc: 0,
            segment_table: vec![100],
            data: vec![9; 100],
        };
        let mut stream = first.encode().unwrap();
        stream.extend(second.encode().unwrap());

        let packets: Vec<Vec<u8>> = PacketReader::new(stream.as_slice())
            .map(|p| p.unwrap())
            .collect();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0], data[..5]);
        assert_eq!(packets[1], data[5..10]);
        let mut expected = data[10..].to_vec();
        expected.extend(vec![9; 100]);
        assert_eq!(packets[2], expected);
    }

    #[test]
    fn packet_reader_skips_other_streams() {
        let mut stream = Vec::new();
        let mut encoder = PageEncoder::new(&mut stream);
        let mut seq_a = 0;
        let mut seq_b = 0;
        for i in 0..3u8 {
            seq_a = encoder
                .write_packet(&[i; 300], Some(i as u64), 0xaa, seq_a, PageType::empty())
                .unwrap();
            seq_b = encoder
                .write_packet(&[0xee; 10], None, 0xbb, seq_b, PageType::empty())
                .unwrap();
        }

        let mut reader = PacketReader::new(stream.as_slice());
        for i in 0..3u8 {
            assert_eq!(reader.next_packet().unwrap().unwrap(), vec![i; 300]);
        }
        assert!(reader.next_packet().unwrap().is_none());
        assert_eq!(reader.serial(), Some(0xaa));

        let other: Vec<Vec<u8>> = PacketReader::with_serial(stream.as_slice(), 0xbb)
            .map(|p| p.unwrap())
            .collect();
        assert_eq!(other, vec![vec![0xee; 10]; 3]);
    }

    #[test]
    fn packet_reader_reports_unterminated_packet() {
        let mut stream = Vec::new();
        write_packet(&mut stream, &pattern(70_000), None, 1, 0, PageType::empty()).unwrap();
        let first_page_len = Page::decode(&stream).unwrap().encoded_len();
        stream.truncate(first_page_len);

        let mut reader = PacketReader::new(stream.as_slice());
        assert!(matches!(
            reader.next_packet(),
            Err(OggError::UnterminatedPacket { buffered: 65_025 })
        ));
    }

    #[test]
    fn packet_reader_drops_orphaned_continuation() {
        let orphan = Page {
            page_type: PageType::CONTINUATION,
            granule: Some(1),
            serial: 1,
            sequence: 4,
            crc: 0,
            segment_table: vec![255, 3, 2],
            data: vec![1; 260],
        };
        let stream = orphan.encode().unwrap();
        let packets: Vec<Vec<u8>> = PacketReader::new(stream.as_slice())
            .map(|p| p.unwrap())
            .collect();
        assert_eq!(packets, vec![vec![1, 1]]);
    }
}
