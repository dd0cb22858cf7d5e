//! Cover art loading.
//!
//! A `COVER` is either an image file or a FLAC file whose embedded picture
//! is reused. Image types are sniffed from the bytes with `infer`.

use std::io::Read;

use metaflac::block::PictureType;
use tracing::debug;

use super::{WriteError, WriteResult};
use crate::plan::CoverSource;

/// Picture data ready to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl CoverImage {
    /// Wrap raw image bytes read from `location`, detecting their type.
    pub fn from_bytes(location: &str, data: Vec<u8>) -> WriteResult<Self> {
        match infer::get(&data) {
            Some(kind) if kind.matcher_type() == infer::MatcherType::Image => Ok(Self {
                mime_type: kind.mime_type().to_string(),
                data,
            }),
            Some(kind) => Err(WriteError::CoverUnavailable {
                location: location.to_string(),
                reason: format!("{} is not an image type", kind.mime_type()),
            }),
            None => Err(WriteError::CoverUnavailable {
                location: location.to_string(),
                reason: "unrecognised image format".to_string(),
            }),
        }
    }
}

/// Read the embedded picture of a FLAC stream.
///
/// A front cover is preferred; otherwise the first picture is used.
/// Returns `Ok(None)` when the stream has no pictures.
pub fn read_embedded_picture(reader: &mut dyn Read) -> Result<Option<CoverImage>, metaflac::Error> {
    let tag = metaflac::Tag::read_from(reader)?;
    let picture = tag
        .pictures()
        .find(|p| p.picture_type == PictureType::CoverFront)
        .or_else(|| tag.pictures().next());
    Ok(picture.map(|p| CoverImage {
        mime_type: p.mime_type.clone(),
        data: p.data.clone(),
    }))
}

/// Load the image described by a plan's cover source.
pub fn load_cover(source: &CoverSource) -> WriteResult<CoverImage> {
    let location = source.entry.location();
    if !source.embedded {
        let data = source.entry.read_all()?;
        return CoverImage::from_bytes(&location, data);
    }

    debug!(cover = %location, "Reading embedded picture");
    let mut reader = source.entry.open()?;
    match read_embedded_picture(&mut reader) {
        Ok(Some(image)) => Ok(image),
        Ok(None) => Err(WriteError::CoverUnavailable {
            location,
            reason: "no embedded picture".to_string(),
        }),
        Err(e) => Err(WriteError::CoverUnavailable {
            location,
            reason: e.to_string(),
        }),
    }
}
