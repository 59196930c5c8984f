// OGG Vorbis comment reader/writer

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::{debug, info, warn};

use crate::ogg::{read_packet, OggError, Page, PageDecoder, PageEncoder, PageType};
use crate::vorbis::{CommentError, VorbisComment, HEADER_PACKETS};

/// An OGG Vorbis stream split into what is edited and what is carried through.
///
/// Header packets 1 and 3 are kept verbatim. Every page after the one holding
/// the end of packet 3 is kept as-is in `post_pages`, together with the tail
/// of that page if packet 3 did not fill it. Pages of other logical streams
/// are kept in order and never re-sequenced.
#[derive(Debug, Clone)]
pub struct OggVorbis {
    headers: [Vec<u8>; HEADER_PACKETS],
    post_pages: Vec<Page>,
    serial: u32,
    first_sequence: u32,
    pub comment: VorbisComment,
}

impl OggVorbis {
    /// Read OGG Vorbis stream from a reader
    pub fn read<R: Read>(reader: R) -> Result<Self, CommentError> {
        let mut decoder = PageDecoder::new(reader);
        let mut headers: [Vec<u8>; HEADER_PACKETS] = Default::default();
        let mut packet_num = 0;
        let mut stream: Option<(u32, u32)> = None;
        let mut post_pages = Vec::new();

        loop {
            let page = match decoder.read_page() {
                Ok(Some(page)) => page,
                Ok(None) => break,
                // a cut-off audio page ends the stream; the headers are intact
                Err(OggError::TruncatedInput { expected, got }) if packet_num == HEADER_PACKETS => {
                    warn!(
                        "stream ends in a truncated page ({} of {} bytes), ignoring it",
                        got, expected
                    );
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            let (serial, _) = *stream.get_or_insert((page.serial, page.sequence));
            if page.serial != serial {
                post_pages.push(page);
                continue;
            }

            let mut page = page;
            let mut tail = false;
            loop {
                if packet_num < HEADER_PACKETS {
                    let read = read_packet(page, &mut headers[packet_num]);
                    if !read.finished {
                        break;
                    }
                    packet_num += 1;
                    page = read.remainder;
                    tail = true;
                } else {
                    if tail {
                        if page.is_empty() {
                            break;
                        }
                        // the first packet of the tail starts fresh
                        page.page_type
                            .remove(PageType::CONTINUATION | PageType::BEGINNING_OF_STREAM);
                    }
                    post_pages.push(page);
                    break;
                }
            }
        }

        let (serial, first_sequence) = stream.ok_or(CommentError::MissingHeaders { found: 0 })?;
        if packet_num < HEADER_PACKETS {
            return Err(CommentError::MissingHeaders { found: packet_num });
        }

        let comment = VorbisComment::from_packet(&headers[1])?;
        debug!(
            "read vorbis stream serial={:#x}: {} comments, {} trailing pages",
            serial,
            comment.comments.len(),
            post_pages.len()
        );

        Ok(OggVorbis {
            headers,
            post_pages,
            serial,
            first_sequence,
            comment,
        })
    }

    /// Read OGG Vorbis file from disk
    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self, CommentError> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    /// Write the stream with a comment header regenerated from `comment`.
    ///
    /// Each header packet starts on a fresh page. Pages of this stream that
    /// follow are renumbered so sequence numbers stay contiguous.
    pub fn write<W: Write>(&self, writer: W) -> Result<(), CommentError> {
        let mut encoder = PageEncoder::new(writer);
        let comment_packet = self.comment.to_packet();

        let packets: [&[u8]; HEADER_PACKETS] =
            [&self.headers[0], &comment_packet, &self.headers[2]];

        let mut sequence = self.first_sequence;
        for (i, packet) in packets.iter().enumerate() {
            let flags = if i == 0 {
                PageType::BEGINNING_OF_STREAM
            } else {
                PageType::empty()
            };
            sequence = encoder.write_packet(packet, Some(0), self.serial, sequence, flags)?;
        }

        for page in &self.post_pages {
            if page.serial == self.serial {
                let mut page = page.clone();
                page.sequence = sequence;
                sequence = sequence.wrapping_add(1);
                encoder.write_page(&page)?;
            } else {
                encoder.write_page(page)?;
            }
        }

        encoder.flush()?;
        Ok(())
    }

    /// Write to `path`, replacing it only once the new stream is complete.
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), CommentError> {
        let path = path.as_ref();
        let tmp = path.with_extension("oggtag-tmp");

        let result = File::create(&tmp)
            .map_err(CommentError::from)
            .and_then(|file| {
                let mut writer = BufWriter::new(file);
                self.write(&mut writer)?;
                writer.flush()?;
                Ok(())
            });
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        fs::rename(&tmp, path)?;
        info!("updated {}", path.display());
        Ok(())
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Identification header, packet 1.
    pub fn identification_packet(&self) -> &[u8] {
        &self.headers[0]
    }

    /// Comment header as read from the stream, packet 2.
    pub fn original_comment_packet(&self) -> &[u8] {
        &self.headers[1]
    }

    /// Setup header, packet 3.
    pub fn setup_packet(&self) -> &[u8] {
        &self.headers[2]
    }

    /// Pages following the header packets.
    pub fn post_pages(&self) -> &[Page] {
        &self.post_pages
    }
}
