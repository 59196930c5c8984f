//! oggtag - OGG page/packet codec with Vorbis comment editing
//!
//! The [`ogg`] module frames pages and packets: checksums, page decoding and
//! encoding, packet reassembly across pages and packet segmentation into
//! pages. The [`vorbis`] module builds on it to read and rewrite the comment
//! header of an OGG Vorbis stream and to create picture comments.
//!
//! ```no_run
//! use oggtag::vorbis::OggVorbis;
//!
//! let mut file = OggVorbis::read_from_path("song.ogg")?;
//! file.comment.set("TITLE", "New title");
//! file.write_to_path("song.ogg")?;
//! # Ok::<(), oggtag::vorbis::CommentError>(())
//! ```

pub mod ogg;
pub mod vorbis;

mod utils;

pub use ogg::{OggError, Page, PageDecoder, PageEncoder, PageType, PacketReader};
pub use vorbis::{CommentError, OggVorbis, Picture, PictureType, VorbisComment};
