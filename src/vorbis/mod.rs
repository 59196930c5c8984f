// Vorbis comment support
//
// Vorbis Structure:
// 1. Identification Header (packet 1, alone on the first page)
// 2. Comment Header (packet 2) - contains the Vorbis Comment
// 3. Setup Header (packet 3)
// 4. Audio Data pages
//
// The comment header is rewritten here; packets 1 and 3 and all audio pages
// are carried through untouched.

pub mod comment;
pub mod file;
pub mod picture;

use thiserror::Error;

use crate::ogg::OggError;

pub use comment::{VorbisComment, VorbisFields};
pub use file::OggVorbis;
pub use picture::{generate_image_comment, Picture, PictureType};

/// "vorbis" signature following the header type byte.
pub const VORBIS_SIGNATURE: &[u8; 6] = b"vorbis";

/// Header type byte of the comment header.
pub const COMMENT_HEADER_TYPE: u8 = 0x03;

/// Identification, comment and setup.
pub const HEADER_PACKETS: usize = 3;

/// Errors from reading or writing Vorbis headers and picture comments.
#[derive(Debug, Error)]
pub enum CommentError {
    #[error(transparent)]
    Ogg(#[from] OggError),

    /// The stream ended before all three header packets were seen.
    #[error("stream holds {found} of {HEADER_PACKETS} vorbis header packets")]
    MissingHeaders { found: usize },

    #[error("second packet is not a vorbis header packet")]
    NotVorbisHeader,

    #[error("header is not a comment header packet (type {0})")]
    NotCommentHeader(u8),

    #[error("malformed comment header: {0}")]
    Malformed(&'static str),

    #[error("framing bit unset or missing")]
    MissingFramingBit,

    #[error("not a recognized image format")]
    UnrecognizedImage,

    #[error("invalid image: {0}")]
    InvalidImage(#[from] imagesize::ImageError),

    #[error("invalid base64 picture: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
