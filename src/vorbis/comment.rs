// Vorbis comment header packet
//
// Layout after the 7-byte "\x03vorbis" prefix (all lengths little-endian):
//   vendor length (4) + vendor string
//   comment count (4)
//   per comment: length (4) + "FIELD=value"
//   framing byte, must be 1

use std::io::{Cursor, Read};

use crate::utils::io::read_le_u32;
use crate::vorbis::{CommentError, COMMENT_HEADER_TYPE, VORBIS_SIGNATURE};

/// Vorbis comment structure
///
/// Comments are kept as raw `FIELD=value` strings in file order so a rewrite
/// does not reorder or drop anything the caller did not touch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VorbisComment {
    pub vendor: String,
    pub comments: Vec<String>,
}

impl VorbisComment {
    pub fn new(vendor: impl Into<String>) -> Self {
        VorbisComment {
            vendor: vendor.into(),
            comments: Vec::new(),
        }
    }

    /// Parse a complete comment header packet.
    pub fn from_packet(packet: &[u8]) -> Result<Self, CommentError> {
        if packet.len() < 7 || &packet[1..7] != VORBIS_SIGNATURE {
            return Err(CommentError::NotVorbisHeader);
        }
        if packet[0] != COMMENT_HEADER_TYPE {
            return Err(CommentError::NotCommentHeader(packet[0]));
        }

        let mut cursor = Cursor::new(&packet[7..]);

        let vendor = read_string(&mut cursor, "vendor string")?;

        let count = read_le_u32(&mut cursor).map_err(|_| truncated("comment count"))? as usize;
        let mut comments = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            comments.push(read_string(&mut cursor, "comment")?);
        }

        let mut framing = [0u8; 1];
        if cursor.read_exact(&mut framing).is_err() || framing[0] & 1 == 0 {
            return Err(CommentError::MissingFramingBit);
        }

        Ok(VorbisComment { vendor, comments })
    }

    /// Regenerate the comment header packet.
    pub fn to_packet(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(
            7 + 4 + self.vendor.len() + 4 + self.comments.iter().map(|c| 4 + c.len()).sum::<usize>() + 1,
        );
        packet.push(COMMENT_HEADER_TYPE);
        packet.extend_from_slice(VORBIS_SIGNATURE);

        packet.extend_from_slice(&(self.vendor.len() as u32).to_le_bytes());
        packet.extend_from_slice(self.vendor.as_bytes());

        packet.extend_from_slice(&(self.comments.len() as u32).to_le_bytes());
        for comment in &self.comments {
            packet.extend_from_slice(&(comment.len() as u32).to_le_bytes());
            packet.extend_from_slice(comment.as_bytes());
        }

        packet.push(1);
        packet
    }

    /// Field/value pairs; entries without `=` are skipped.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.comments.iter().filter_map(|c| c.split_once('='))
    }

    /// Get the first value of a field, matched case-insensitively.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.pairs()
            .find(|(f, _)| f.eq_ignore_ascii_case(field))
            .map(|(_, v)| v)
    }

    /// All values of a field in file order.
    pub fn get_all<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs()
            .filter(move |(f, _)| f.eq_ignore_ascii_case(field))
            .map(|(_, v)| v)
    }

    /// Append a value, keeping existing ones.
    pub fn add(&mut self, field: &str, value: &str) {
        self.comments.push(format!("{}={}", field, value));
    }

    /// Replace every value of a field with a single one.
    ///
    /// The new entry takes the position of the first removed one, or goes at
    /// the end when the field was absent.
    pub fn set(&mut self, field: &str, value: &str) {
        let entry = format!("{}={}", field, value);
        match self.comments.iter().position(|c| field_matches(c, field)) {
            Some(pos) => {
                self.comments[pos] = entry;
                let mut index = 0;
                self.comments.retain(|c| {
                    let keep = index <= pos || !field_matches(c, field);
                    index += 1;
                    keep
                });
            }
            None => self.comments.push(entry),
        }
    }

    /// Remove every value of a field; returns how many were removed.
    pub fn remove(&mut self, field: &str) -> usize {
        let before = self.comments.len();
        self.comments.retain(|c| !field_matches(c, field));
        before - self.comments.len()
    }
}

fn field_matches(comment: &str, field: &str) -> bool {
    comment
        .split_once('=')
        .map_or(false, |(f, _)| f.eq_ignore_ascii_case(field))
}

fn truncated(what: &'static str) -> CommentError {
    CommentError::Malformed(what)
}

fn read_string(cursor: &mut Cursor<&[u8]>, what: &'static str) -> Result<String, CommentError> {
    let len = read_le_u32(cursor).map_err(|_| truncated(what))? as usize;
    let remaining = cursor.get_ref().len() - cursor.position() as usize;
    if len > remaining {
        return Err(truncated(what));
    }
    let mut bytes = vec![0u8; len];
    cursor.read_exact(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Common Vorbis comment field names
pub struct VorbisFields;
impl VorbisFields {
    pub const TITLE: &'static str = "TITLE";
    pub const ARTIST: &'static str = "ARTIST";
    pub const ALBUM: &'static str = "ALBUM";
    pub const DATE: &'static str = "DATE";
    pub const TRACKNUMBER: &'static str = "TRACKNUMBER";
    pub const GENRE: &'static str = "GENRE";
    pub const COMMENT: &'static str = "COMMENT";
    pub const METADATA_BLOCK_PICTURE: &'static str = "METADATA_BLOCK_PICTURE";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VorbisComment {
        VorbisComment {
            vendor: "Xiph.Org libVorbis I 20200704".to_string(),
            comments: vec![
                "TITLE=Song".to_string(),
                "ARTIST=First".to_string(),
                "artist=Second".to_string(),
                "no separator".to_string(),
            ],
        }
    }

    #[test]
    fn packet_layout() {
        let comment = VorbisComment {
            vendor: "ab".to_string(),
            comments: vec!["X=1".to_string()],
        };
        let packet = comment.to_packet();
        let mut expected = vec![3];
        expected.extend_from_slice(b"vorbis");
        expected.extend_from_slice(&[2, 0, 0, 0]);
        expected.extend_from_slice(b"ab");
        expected.extend_from_slice(&[1, 0, 0, 0]);
        expected.extend_from_slice(&[3, 0, 0, 0]);
        expected.extend_from_slice(b"X=1");
        expected.push(1);
        assert_eq!(packet, expected);
    }

    #[test]
    fn parse_what_was_built() {
        let comment = sample();
        let parsed = VorbisComment::from_packet(&comment.to_packet()).unwrap();
        assert_eq!(parsed, comment);
    }

    #[test]
    fn rejects_wrong_signature_and_type() {
        let mut packet = sample().to_packet();
        packet[3] = b'X';
        assert!(matches!(
            VorbisComment::from_packet(&packet),
            Err(CommentError::NotVorbisHeader)
        ));

        let mut packet = sample().to_packet();
        packet[0] = 1;
        assert!(matches!(
            VorbisComment::from_packet(&packet),
            Err(CommentError::NotCommentHeader(1))
        ));

        assert!(matches!(
            VorbisComment::from_packet(b"\x03vor"),
            Err(CommentError::NotVorbisHeader)
        ));
    }

    #[test]
    fn rejects_missing_framing_bit() {
        let mut packet = sample().to_packet();
        packet.pop();
        assert!(matches!(
            VorbisComment::from_packet(&packet),
            Err(CommentError::MissingFramingBit)
        ));

        let mut packet = sample().to_packet();
        *packet.last_mut().unwrap() = 0;
        assert!(matches!(
            VorbisComment::from_packet(&packet),
            Err(CommentError::MissingFramingBit)
        ));
    }

    #[test]
    fn rejects_lengths_past_the_end() {
        let mut packet = b"\x03vorbis".to_vec();
        packet.extend_from_slice(&1000u32.to_le_bytes());
        packet.extend_from_slice(b"short");
        assert!(matches!(
            VorbisComment::from_packet(&packet),
            Err(CommentError::Malformed("vendor string"))
        ));
    }

    #[test]
    fn field_lookup_is_case_insensitive() {
        let comment = sample();
        assert_eq!(comment.get("title"), Some("Song"));
        assert_eq!(
            comment.get_all(VorbisFields::ARTIST).collect::<Vec<_>>(),
            vec!["First", "Second"]
        );
        assert_eq!(comment.get("ALBUM"), None);
    }

    #[test]
    fn set_replaces_all_values_in_place() {
        let mut comment = sample();
        comment.set("Artist", "Only");
        assert_eq!(
            comment.comments,
            vec!["TITLE=Song", "Artist=Only", "no separator"]
        );

        comment.set("ALBUM", "New");
        assert_eq!(comment.comments.last().unwrap(), "ALBUM=New");
    }

    #[test]
    fn add_and_remove() {
        let mut comment = sample();
        comment.add("GENRE", "Rock");
        assert_eq!(comment.get("genre"), Some("Rock"));
        assert_eq!(comment.remove("artist"), 2);
        assert_eq!(comment.remove("artist"), 0);
        assert_eq!(comment.comments.len(), 3);
    }
}
