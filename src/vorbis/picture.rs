// METADATA_BLOCK_PICTURE comments
//
// The comment value is the base64 of a FLAC PICTURE block (big-endian fields):
//   picture type (4), MIME length (4) + MIME, description length (4) +
//   description, width (4), height (4), depth (4), colors (4),
//   data length (4) + data

use std::io::{Cursor, Read};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use imagesize::{ImageError, ImageType};

use crate::utils::io::read_be_u32;
use crate::vorbis::{CommentError, VorbisFields};

/// Bit depth and color type bytes of the IHDR chunk, which always comes first.
const PNG_IHDR_DEPTH: usize = 24;
const PNG_IHDR_COLOR_TYPE: usize = 25;

/// Bits per pixel recorded for JPEG covers (8-bit YCbCr).
const JPEG_DEPTH: u32 = 24;

/// Picture types according to FLAC specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureType {
    Other = 0,
    FileIcon = 1,
    OtherFileIcon = 2,
    CoverFront = 3,
    CoverBack = 4,
    LeafletPage = 5,
    Media = 6,
    LeadArtist = 7,
    Artist = 8,
    Conductor = 9,
    Band = 10,
    Composer = 11,
    Lyricist = 12,
    RecordingLocation = 13,
    DuringRecording = 14,
    DuringPerformance = 15,
    VideoScreenCapture = 16,
    BrightColouredFish = 17,
    Illustration = 18,
    BandLogo = 19,
    PublisherLogo = 20,
}

impl PictureType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => PictureType::FileIcon,
            2 => PictureType::OtherFileIcon,
            3 => PictureType::CoverFront,
            4 => PictureType::CoverBack,
            5 => PictureType::LeafletPage,
            6 => PictureType::Media,
            7 => PictureType::LeadArtist,
            8 => PictureType::Artist,
            9 => PictureType::Conductor,
            10 => PictureType::Band,
            11 => PictureType::Composer,
            12 => PictureType::Lyricist,
            13 => PictureType::RecordingLocation,
            14 => PictureType::DuringRecording,
            15 => PictureType::DuringPerformance,
            16 => PictureType::VideoScreenCapture,
            17 => PictureType::BrightColouredFish,
            18 => PictureType::Illustration,
            19 => PictureType::BandLogo,
            20 => PictureType::PublisherLogo,
            _ => PictureType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PictureType::Other => "Other",
            PictureType::FileIcon => "File Icon",
            PictureType::OtherFileIcon => "Other File Icon",
            PictureType::CoverFront => "Cover (front)",
            PictureType::CoverBack => "Cover (back)",
            PictureType::LeafletPage => "Leaflet page",
            PictureType::Media => "Media",
            PictureType::LeadArtist => "Lead artist",
            PictureType::Artist => "Artist",
            PictureType::Conductor => "Conductor",
            PictureType::Band => "Band",
            PictureType::Composer => "Composer",
            PictureType::Lyricist => "Lyricist",
            PictureType::RecordingLocation => "Recording Location",
            PictureType::DuringRecording => "During recording",
            PictureType::DuringPerformance => "During performance",
            PictureType::VideoScreenCapture => "Video screen capture",
            PictureType::BrightColouredFish => "Bright coloured fish",
            PictureType::Illustration => "Illustration",
            PictureType::BandLogo => "Band logo",
            PictureType::PublisherLogo => "Publisher logo",
        }
    }
}

/// Embedded picture carried in a METADATA_BLOCK_PICTURE comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    pub picture_type: PictureType,
    pub mime_type: String,
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Palette size for indexed images, otherwise 0.
    pub colors: u32,
    pub data: Vec<u8>,
}

/// Header facts read from a JPEG or PNG file.
struct ImageInfo {
    mime_type: &'static str,
    width: u32,
    height: u32,
    depth: u32,
    colors: u32,
}

impl Picture {
    /// Build a picture from JPEG or PNG bytes, reading its dimensions.
    pub fn from_image(
        data: Vec<u8>,
        description: &str,
        picture_type: PictureType,
    ) -> Result<Self, CommentError> {
        let info = sniff_image(&data)?;
        Ok(Picture {
            picture_type,
            mime_type: info.mime_type.to_string(),
            description: description.to_string(),
            width: info.width,
            height: info.height,
            depth: info.depth,
            colors: info.colors,
            data,
        })
    }

    /// Decode a FLAC PICTURE block.
    pub fn read_from_data(data: &[u8]) -> Result<Self, CommentError> {
        let mut cursor = Cursor::new(data);
        let short = |_: std::io::Error| CommentError::Malformed("picture block");

        let picture_type = PictureType::from_u32(read_be_u32(&mut cursor).map_err(short)?);
        let mime_type = read_sized_bytes(&mut cursor)?;
        let description = read_sized_bytes(&mut cursor)?;
        let width = read_be_u32(&mut cursor).map_err(short)?;
        let height = read_be_u32(&mut cursor).map_err(short)?;
        let depth = read_be_u32(&mut cursor).map_err(short)?;
        let colors = read_be_u32(&mut cursor).map_err(short)?;
        let data = read_sized_bytes(&mut cursor)?;

        Ok(Picture {
            picture_type,
            mime_type: String::from_utf8_lossy(&mime_type).into_owned(),
            description: String::from_utf8_lossy(&description).into_owned(),
            width,
            height,
            depth,
            colors,
            data,
        })
    }

    /// Encode as a FLAC PICTURE block.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(32 + self.mime_type.len() + self.description.len() + self.data.len());

        result.extend_from_slice(&(self.picture_type as u32).to_be_bytes());
        result.extend_from_slice(&(self.mime_type.len() as u32).to_be_bytes());
        result.extend_from_slice(self.mime_type.as_bytes());
        result.extend_from_slice(&(self.description.len() as u32).to_be_bytes());
        result.extend_from_slice(self.description.as_bytes());
        result.extend_from_slice(&self.width.to_be_bytes());
        result.extend_from_slice(&self.height.to_be_bytes());
        result.extend_from_slice(&self.depth.to_be_bytes());
        result.extend_from_slice(&self.colors.to_be_bytes());
        result.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        result.extend_from_slice(&self.data);

        result
    }

    /// Full `METADATA_BLOCK_PICTURE=...` comment.
    pub fn to_comment(&self) -> String {
        format!(
            "{}={}",
            VorbisFields::METADATA_BLOCK_PICTURE,
            STANDARD.encode(self.to_bytes())
        )
    }

    /// Decode the value part of a METADATA_BLOCK_PICTURE comment.
    pub fn from_comment_value(value: &str) -> Result<Self, CommentError> {
        let block = STANDARD.decode(value.trim())?;
        Self::read_from_data(&block)
    }

    /// Get file extension based on MIME type
    pub fn get_extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/bmp" => "bmp",
            _ => "bin",
        }
    }
}

/// Build a `METADATA_BLOCK_PICTURE=` comment from JPEG or PNG bytes.
pub fn generate_image_comment(
    image: &[u8],
    description: &str,
    picture_type: PictureType,
) -> Result<String, CommentError> {
    Ok(Picture::from_image(image.to_vec(), description, picture_type)?.to_comment())
}

fn read_sized_bytes(cursor: &mut Cursor<&[u8]>) -> Result<Vec<u8>, CommentError> {
    let len = read_be_u32(cursor).map_err(|_| CommentError::Malformed("picture block"))? as usize;
    let remaining = cursor.get_ref().len() - cursor.position() as usize;
    if len > remaining {
        return Err(CommentError::Malformed("picture block"));
    }
    let mut bytes = vec![0u8; len];
    cursor.read_exact(&mut bytes)?;
    Ok(bytes)
}

fn sniff_image(data: &[u8]) -> Result<ImageInfo, CommentError> {
    let kind = imagesize::image_type(data).map_err(|_| CommentError::UnrecognizedImage)?;
    let size = match kind {
        ImageType::Png | ImageType::Jpeg => imagesize::blob_size(data)?,
        _ => return Err(CommentError::UnrecognizedImage),
    };
    let width = size.width as u32;
    let height = size.height as u32;

    if matches!(kind, ImageType::Jpeg) {
        return Ok(ImageInfo {
            mime_type: "image/jpeg",
            width,
            height,
            depth: JPEG_DEPTH,
            colors: 0,
        });
    }

    if data.len() <= PNG_IHDR_COLOR_TYPE {
        return Err(ImageError::CorruptedImage.into());
    }
    let bit_depth = data[PNG_IHDR_DEPTH] as u32;
    let color_type = data[PNG_IHDR_COLOR_TYPE];
    let channels = match color_type {
        0 | 3 => 1,
        2 => 3,
        4 => 2,
        6 => 4,
        _ => return Err(ImageError::CorruptedImage.into()),
    };
    // indexed images record the largest palette their bit depth allows
    let colors = if color_type == 3 {
        1u32.checked_shl(bit_depth).unwrap_or(0)
    } else {
        0
    };

    Ok(ImageInfo {
        mime_type: "image/png",
        width,
        height,
        depth: bit_depth * channels,
        colors,
    })
}
