use std::io::{Read, Write};

use log::{debug, warn};

use crate::ogg::crc::{crc32, extend_crc32};
use crate::ogg::{
    granule_from_raw, granule_to_raw, OggError, PageType, HEADER_SIZE, MAX_PAGE_SIZE,
    MAX_SEGMENTS, OGG_SIGNATURE, OGG_VERSION,
};
use crate::utils::io::{le_u32, le_u64, read_full};

/// One physical OGG page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Page {
    pub page_type: PageType,
    /// `None` is stored on disk as all ones ("undetermined").
    pub granule: Option<u64>,
    pub serial: u32,
    pub sequence: u32,
    /// Checksum as read from disk. The encoder ignores it and recomputes.
    pub crc: u32,
    pub segment_table: Vec<u8>,
    pub data: Vec<u8>,
}

impl Page {
    /// Calculate total page data size from segment table
    pub fn data_size(&self) -> usize {
        self.segment_table.iter().map(|&x| x as usize).sum()
    }

    /// True when the page carries no segments at all.
    pub fn is_empty(&self) -> bool {
        self.segment_table.is_empty()
    }

    pub fn is_continuation(&self) -> bool {
        self.page_type.contains(PageType::CONTINUATION)
    }

    pub fn is_bos(&self) -> bool {
        self.page_type.contains(PageType::BEGINNING_OF_STREAM)
    }

    pub fn is_eos(&self) -> bool {
        self.page_type.contains(PageType::END_OF_STREAM)
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.segment_table.len() + self.data.len()
    }

    /// Encode into a fresh buffer with a recomputed checksum.
    pub fn encode(&self) -> Result<Vec<u8>, OggError> {
        let mut out = Vec::with_capacity(self.encoded_len());
        PageEncoder::new(&mut out).write_page(self)?;
        Ok(out)
    }

    /// Decode the page at the start of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Page, OggError> {
        PageDecoder::new(bytes)
            .read_page()?
            .ok_or(OggError::TruncatedInput {
                expected: HEADER_SIZE,
                got: 0,
            })
    }
}

/// Reads pages one at a time from a byte stream.
///
/// The header and segment table are read into a scratch buffer owned by the
/// decoder; one decoder must not be shared between threads without a lock.
pub struct PageDecoder<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: Read> PageDecoder<R> {
    pub fn new(reader: R) -> Self {
        PageDecoder {
            reader,
            buf: vec![0u8; HEADER_SIZE + MAX_SEGMENTS],
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read the next page.
    ///
    /// Returns `Ok(None)` when the stream ends exactly at a page boundary.
    /// The capture pattern is checked before anything past it is read.
    pub fn read_page(&mut self) -> Result<Option<Page>, OggError> {
        let header = &mut self.buf[..HEADER_SIZE];

        let got = read_full(&mut self.reader, &mut header[..4])?;
        if got == 0 {
            return Ok(None);
        }
        if got < 4 {
            return Err(OggError::TruncatedInput {
                expected: HEADER_SIZE,
                got,
            });
        }
        if &header[..4] != OGG_SIGNATURE {
            let mut found = [0u8; 4];
            found.copy_from_slice(&header[..4]);
            return Err(OggError::BadCapturePattern { found });
        }

        let got = read_full(&mut self.reader, &mut header[4..])?;
        if got < HEADER_SIZE - 4 {
            return Err(OggError::TruncatedInput {
                expected: HEADER_SIZE,
                got: got + 4,
            });
        }

        let version = header[4];
        if version != OGG_VERSION {
            return Err(OggError::UnsupportedVersion(version));
        }

        let page_type = PageType::from_bits_retain(header[5]);
        let granule = granule_from_raw(le_u64(&header[6..14]));
        let serial = le_u32(&header[14..18]);
        let sequence = le_u32(&header[18..22]);
        let crc = le_u32(&header[22..26]);
        let segment_count = header[26] as usize;

        // crc is computed with its own field zeroed
        header[22..26].fill(0);
        let mut computed = crc32(header);

        let segment_table = &mut self.buf[HEADER_SIZE..HEADER_SIZE + segment_count];
        let got = read_full(&mut self.reader, segment_table)?;
        if got < segment_count {
            return Err(OggError::TruncatedInput {
                expected: HEADER_SIZE + segment_count,
                got: HEADER_SIZE + got,
            });
        }
        computed = extend_crc32(computed, segment_table);
        let segment_table = segment_table.to_vec();

        let data_size: usize = segment_table.iter().map(|&x| x as usize).sum();
        let mut data = vec![0u8; data_size];
        let got = read_full(&mut self.reader, &mut data)?;
        if got < data_size {
            return Err(OggError::TruncatedInput {
                expected: HEADER_SIZE + segment_count + data_size,
                got: HEADER_SIZE + segment_count + got,
            });
        }
        computed = extend_crc32(computed, &data);

        if computed != crc {
            warn!(
                "rejecting page serial={:#x} seq={}: crc 0x{:08X} != 0x{:08X}",
                serial, sequence, crc, computed
            );
            return Err(OggError::CorruptPage {
                stored: crc,
                computed,
            });
        }

        debug!(
            "read page serial={:#x} seq={} type={:?} segments={} bytes={}",
            serial, sequence, page_type, segment_count, data_size
        );

        Ok(Some(Page {
            page_type,
            granule,
            serial,
            sequence,
            crc,
            segment_table,
            data,
        }))
    }
}

impl<R: Read> Iterator for PageDecoder<R> {
    type Item = Result<Page, OggError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_page().transpose()
    }
}

/// Writes pages to a byte stream.
///
/// Each page is assembled in full in a scratch buffer owned by the encoder and
/// handed to the writer with a single `write_all`.
pub struct PageEncoder<W> {
    writer: W,
    buf: Vec<u8>,
}

impl<W: Write> PageEncoder<W> {
    pub fn new(writer: W) -> Self {
        PageEncoder {
            writer,
            buf: Vec::with_capacity(MAX_PAGE_SIZE),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn flush(&mut self) -> Result<(), OggError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Write `page` with a freshly computed checksum; `page.crc` is ignored.
    pub fn write_page(&mut self, page: &Page) -> Result<(), OggError> {
        let segment_count = page.segment_table.len();
        if segment_count > MAX_SEGMENTS {
            return Err(OggError::SegmentTableTooLarge(segment_count));
        }
        let expected = page.data_size();
        if expected != page.data.len() {
            return Err(OggError::SegmentTableMismatch {
                expected,
                actual: page.data.len(),
            });
        }

        let buf = &mut self.buf;
        buf.clear();
        buf.extend_from_slice(OGG_SIGNATURE);
        buf.push(OGG_VERSION);
        buf.push(page.page_type.bits());
        buf.extend_from_slice(&granule_to_raw(page.granule).to_le_bytes());
        buf.extend_from_slice(&page.serial.to_le_bytes());
        buf.extend_from_slice(&page.sequence.to_le_bytes());
        buf.extend_from_slice(&[0u8; 4]);
        buf.push(segment_count as u8);
        buf.extend_from_slice(&page.segment_table);
        buf.extend_from_slice(&page.data);

        let crc = crc32(buf);
        buf[22..26].copy_from_slice(&crc.to_le_bytes());

        self.writer.write_all(buf)?;

        debug!(
            "wrote page serial={:#x} seq={} type={:?} segments={} bytes={}",
            page.serial,
            page.sequence,
            page.page_type,
            segment_count,
            page.data.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_page() -> Page {
        Page {
            page_type: PageType::BEGINNING_OF_STREAM,
            granule: Some(0),
            serial: 0x1234,
            sequence: 0,
            crc: 0,
            segment_table: vec![3],
            data: b"abc".to_vec(),
        }
    }

    fn multi_segment_page() -> Page {
        let data: Vec<u8> = (0..600u32).map(|i| (i * 7 % 251) as u8).collect();
        Page {
            page_type: PageType::CONTINUATION | PageType::END_OF_STREAM,
            granule: Some(0x0102_0304_0506_0708),
            serial: 0xdead_beef,
            sequence: 42,
            crc: 0,
            segment_table: vec![255, 255, 90],
            data,
        }
    }

    #[test]
    fn reference_page_bytes() {
        let bytes = sample_page().encode().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + 1 + 3);
        assert_eq!(&bytes[0..4], b"OggS");
        assert_eq!(bytes[4], 0);
        assert_eq!(bytes[5], 0x02);
        assert_eq!(&bytes[6..14], &[0u8; 8]);
        assert_eq!(&bytes[14..18], &[0x34, 0x12, 0, 0]);
        assert_eq!(&bytes[22..26], &0x7ae9_87a8u32.to_le_bytes());
        assert_eq!(bytes[26], 1);
        assert_eq!(bytes[27], 3);
        assert_eq!(&bytes[28..], b"abc");
    }

    #[test]
    fn encode_decode_roundtrip() {
        for page in [sample_page(), multi_segment_page(), Page::default()] {
            let bytes = page.encode().unwrap();
            let decoded = Page::decode(&bytes).unwrap();
            assert_eq!(decoded.page_type, page.page_type);
            assert_eq!(decoded.granule, page.granule);
            assert_eq!(decoded.serial, page.serial);
            assert_eq!(decoded.sequence, page.sequence);
            assert_eq!(decoded.segment_table, page.segment_table);
            assert_eq!(decoded.data, page.data);
            assert_eq!(decoded.crc, le_u32(&bytes[22..26]));
            assert_eq!(decoded.encode().unwrap(), bytes);
        }
    }

    #[test]
    fn undetermined_granule_is_all_ones() {
        let mut page = sample_page();
        page.granule = None;
        let bytes = page.encode().unwrap();
        assert_eq!(&bytes[6..14], &[0xff; 8]);
        assert_eq!(Page::decode(&bytes).unwrap().granule, None);
    }

    #[test]
    fn unknown_type_bits_survive() {
        let mut page = sample_page();
        page.page_type = PageType::from_bits_retain(0x82);
        let decoded = Page::decode(&page.encode().unwrap()).unwrap();
        assert_eq!(decoded.page_type.bits(), 0x82);
    }

    #[test]
    fn single_bit_flips_are_rejected() {
        let bytes = multi_segment_page().encode().unwrap();
        let data_start = HEADER_SIZE + 3;
        let positions = (5..26).chain(data_start..bytes.len());
        for pos in positions {
            for bit in 0..8 {
                let mut corrupted = bytes.clone();
                corrupted[pos] ^= 1 << bit;
                match Page::decode(&corrupted) {
                    Err(OggError::CorruptPage { .. }) => {}
                    other => panic!("byte {} bit {}: {:?}", pos, bit, other),
                }
            }
        }
    }

    #[test]
    fn bad_capture_pattern_stops_after_four_bytes() {
        let mut bytes = sample_page().encode().unwrap();
        bytes[0] = b'X';
        let mut decoder = PageDecoder::new(Cursor::new(bytes));
        match decoder.read_page() {
            Err(OggError::BadCapturePattern { found }) => assert_eq!(&found, b"XggS"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(decoder.get_ref().position(), 4);
    }

    #[test]
    fn nonzero_version_is_rejected() {
        let mut bytes = sample_page().encode().unwrap();
        bytes[4] = 1;
        assert!(matches!(
            Page::decode(&bytes),
            Err(OggError::UnsupportedVersion(1))
        ));
    }

    #[test]
    fn clean_eof_between_pages() {
        let mut stream = sample_page().encode().unwrap();
        stream.extend(multi_segment_page().encode().unwrap());
        let mut decoder = PageDecoder::new(Cursor::new(stream));
        assert_eq!(decoder.read_page().unwrap().unwrap().serial, 0x1234);
        assert_eq!(decoder.read_page().unwrap().unwrap().sequence, 42);
        assert!(decoder.read_page().unwrap().is_none());
        assert!(decoder.read_page().unwrap().is_none());
    }

    #[test]
    fn truncation_anywhere_is_an_error() {
        let bytes = multi_segment_page().encode().unwrap();
        for cut in [1, 3, 4, 10, HEADER_SIZE, HEADER_SIZE + 2, HEADER_SIZE + 3, bytes.len() - 1] {
            match Page::decode(&bytes[..cut]) {
                Err(OggError::TruncatedInput { expected, got }) => {
                    assert_eq!(got, cut);
                    assert!(expected > cut && expected <= bytes.len());
                }
                other => panic!("cut at {}: {:?}", cut, other),
            }
        }
    }

    #[test]
    fn truncation_counts_whole_page_bytes() {
        let bytes = multi_segment_page().encode().unwrap();
        let segments = bytes[26] as usize;

        match Page::decode(&bytes[..HEADER_SIZE + 1]) {
            Err(OggError::TruncatedInput { expected, got }) => {
                assert_eq!((expected, got), (HEADER_SIZE + segments, HEADER_SIZE + 1));
            }
            other => panic!("{:?}", other),
        }
        match Page::decode(&bytes[..bytes.len() - 10]) {
            Err(OggError::TruncatedInput { expected, got }) => {
                assert_eq!((expected, got), (bytes.len(), bytes.len() - 10));
            }
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn encode_rejects_oversized_segment_table() {
        let page = Page {
            segment_table: vec![0; 256],
            ..Page::default()
        };
        assert!(matches!(
            page.encode(),
            Err(OggError::SegmentTableTooLarge(256))
        ));
    }

    #[test]
    fn encode_rejects_length_mismatch() {
        let mut page = sample_page();
        page.data.push(b'd');
        assert!(matches!(
            page.encode(),
            Err(OggError::SegmentTableMismatch {
                expected: 3,
                actual: 4
            })
        ));
    }

    #[test]
    fn stale_crc_is_ignored_on_encode() {
        let mut page = sample_page();
        page.crc = 0xffff_ffff;
        let decoded = Page::decode(&page.encode().unwrap()).unwrap();
        assert_eq!(decoded.crc, 0x7ae9_87a8);
    }

    #[test]
    fn decoder_iterates_pages() {
        let mut stream = Vec::new();
        let mut encoder = PageEncoder::new(&mut stream);
        for seq in 0..3 {
            let mut page = sample_page();
            page.sequence = seq;
            encoder.write_page(&page).unwrap();
        }
        let sequences: Vec<u32> = PageDecoder::new(stream.as_slice())
            .map(|p| p.unwrap().sequence)
            .collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }
}
