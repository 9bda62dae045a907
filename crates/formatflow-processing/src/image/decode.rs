//! Image decoder - turns encoded bytes into a pixel surface
//!
//! Two paths are tried in order. The native path sniffs the magic bytes and
//! runs the matching codec directly. The fallback path reads through the
//! generic `ImageReader`, with the format hinted by the source kind when the
//! content cannot be sniffed. Both yield the same `DynamicImage`, upright:
//! the EXIF orientation of the source is applied and the tag itself does not
//! survive re-encoding.

use formatflow_core::ConversionError;
use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder as _, ImageFormat, ImageReader};
use std::io::{BufRead, Cursor, Seek};

/// Which decode path produced the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePath {
    Native,
    Fallback,
}

pub struct DecodedImage {
    pub image: DynamicImage,
    pub path: DecodePath,
}

impl DecodedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

pub struct ImageDecoder;

impl ImageDecoder {
    /// Decode `data`, trying the native path first and the fallback path second.
    pub fn decode(data: &[u8], hint: Option<ImageFormat>) -> Result<DecodedImage, ConversionError> {
        if data.is_empty() {
            return Err(ConversionError::DecodeFailed("empty input".to_string()));
        }

        let native_error = match Self::decode_native(data) {
            Ok(image) => {
                return Ok(DecodedImage {
                    image,
                    path: DecodePath::Native,
                })
            }
            Err(e) => e,
        };

        tracing::debug!(error = %native_error, hint = ?hint, "Native decode failed, using fallback reader");

        match Self::decode_fallback(data, hint) {
            Ok(image) => Ok(DecodedImage {
                image,
                path: DecodePath::Fallback,
            }),
            Err(fallback_error) => Err(ConversionError::DecodeFailed(format!(
                "{}; fallback: {}",
                native_error, fallback_error
            ))),
        }
    }

    /// Native path: format from magic bytes, then the codec for that format.
    pub fn decode_native(data: &[u8]) -> Result<DynamicImage, image::ImageError> {
        let format = image::guess_format(data)?;
        Self::decode_upright(ImageReader::with_format(Cursor::new(data), format))
    }

    /// Fallback path: generic reader, using `hint` when the content gives no format away.
    pub fn decode_fallback(
        data: &[u8],
        hint: Option<ImageFormat>,
    ) -> Result<DynamicImage, image::ImageError> {
        let mut reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
        if reader.format().is_none() {
            if let Some(format) = hint {
                reader.set_format(format);
            }
        }
        Self::decode_upright(reader)
    }

    fn decode_upright<R: BufRead + Seek>(reader: ImageReader<R>) -> Result<DynamicImage, image::ImageError> {
        let mut decoder = reader.into_decoder()?;
        let orientation = decoder.orientation()?;
        let mut image = DynamicImage::from_decoder(decoder)?;

        if orientation != Orientation::NoTransforms {
            tracing::debug!(orientation = ?orientation, "Applying EXIF orientation");
            image.apply_orientation(orientation);
        }

        Ok(image)
    }
}
