//! Format normalizer
//!
//! Ensures the decoder only ever sees formats it can read natively. HEIC/HEIF
//! sources are decoded and re-encoded as a JPEG intermediate; every other
//! source passes through untouched.

use bytes::Bytes;
use formatflow_core::constants::HEIF_INTERMEDIATE_QUALITY;
use formatflow_core::{ConversionError, InputFile};
use image::ImageFormat;

/// ISO-BMFF brands that identify a HEIC/HEIF container on their own.
const HEIF_BRANDS: &[&[u8; 4]] = &[b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis"];

/// Generic still/sequence brands, shared with AVIF.
const GENERIC_IMAGE_BRANDS: &[&[u8; 4]] = &[b"mif1", b"msf1"];

const AVIF_BRANDS: &[&[u8; 4]] = &[b"avif", b"avis"];

/// Container family of an input, as far as the normalizer cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Jpeg,
    Png,
    WebP,
    Heif,
    Unknown,
}

impl SourceKind {
    /// Decoder hint for kinds the `image` crate reads directly.
    pub fn image_format(self) -> Option<ImageFormat> {
        match self {
            SourceKind::Jpeg => Some(ImageFormat::Jpeg),
            SourceKind::Png => Some(ImageFormat::Png),
            SourceKind::WebP => Some(ImageFormat::WebP),
            SourceKind::Heif | SourceKind::Unknown => None,
        }
    }

    fn from_content_type(content_type: &str) -> SourceKind {
        match content_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => SourceKind::Jpeg,
            "image/png" => SourceKind::Png,
            "image/webp" => SourceKind::WebP,
            "image/heic" | "image/heif" => SourceKind::Heif,
            _ => SourceKind::Unknown,
        }
    }

    fn from_extension(name: &str) -> SourceKind {
        let ext = match name.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => return SourceKind::Unknown,
        };
        match ext.as_str() {
            "jpg" | "jpeg" => SourceKind::Jpeg,
            "png" => SourceKind::Png,
            "webp" => SourceKind::WebP,
            "heic" | "heif" => SourceKind::Heif,
            _ => SourceKind::Unknown,
        }
    }
}

/// Whether the input belongs to the HEIC/HEIF family.
///
/// Declared types are frequently missing for HEIC files, so the name suffix
/// and the container brand are checked as well.
pub fn is_heif(name: &str, content_type: Option<&str>, data: &[u8]) -> bool {
    content_type.map(SourceKind::from_content_type) == Some(SourceKind::Heif)
        || SourceKind::from_extension(name) == SourceKind::Heif
        || has_heif_brand(data)
}

/// Classify the input: HEIF family first, then magic bytes, then the declared
/// type, then the name suffix.
pub fn detect_source_kind(name: &str, content_type: Option<&str>, data: &[u8]) -> SourceKind {
    if is_heif(name, content_type, data) {
        return SourceKind::Heif;
    }

    let sniffed = sniff_magic(data);
    if sniffed != SourceKind::Unknown {
        return sniffed;
    }

    let declared = content_type
        .map(SourceKind::from_content_type)
        .unwrap_or(SourceKind::Unknown);
    if declared != SourceKind::Unknown {
        return declared;
    }

    SourceKind::from_extension(name)
}

fn sniff_magic(data: &[u8]) -> SourceKind {
    match image::guess_format(data) {
        Ok(ImageFormat::Jpeg) => SourceKind::Jpeg,
        Ok(ImageFormat::Png) => SourceKind::Png,
        Ok(ImageFormat::WebP) => SourceKind::WebP,
        _ => SourceKind::Unknown,
    }
}

/// `ftyp` box at offset 4: major brand at 8..12, compatible brands from 16 on.
/// `mif1`/`msf1` count only when no AVIF brand is present.
fn has_heif_brand(data: &[u8]) -> bool {
    if data.len() < 12 || &data[4..8] != b"ftyp" {
        return false;
    }

    let box_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let box_end = box_len.clamp(12, data.len());

    let mut brands = vec![&data[8..12]];
    if let Some(compatible) = data.get(16..box_end) {
        brands.extend(compatible.chunks_exact(4));
    }

    let any_of = |set: &[&[u8; 4]]| {
        brands
            .iter()
            .any(|brand| set.iter().any(|b| b.as_slice() == *brand))
    };

    any_of(HEIF_BRANDS) || (any_of(GENERIC_IMAGE_BRANDS) && !any_of(AVIF_BRANDS))
}

/// Normalizer output: bytes the decoder can read and where they came from.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub data: Bytes,
    /// Kind of the original input.
    pub kind: SourceKind,
    /// True when the bytes are a JPEG intermediate rather than the input.
    pub converted: bool,
}

impl Normalized {
    /// Decoder hint for the normalized bytes.
    pub fn decode_hint(&self) -> Option<ImageFormat> {
        if self.converted {
            Some(ImageFormat::Jpeg)
        } else {
            self.kind.image_format()
        }
    }
}

/// Normalize `input` into a natively decodable byte sequence.
#[tracing::instrument(skip(input), fields(name = %input.name, size = input.data.len()))]
pub fn normalize(input: &InputFile) -> Result<Normalized, ConversionError> {
    let kind = detect_source_kind(&input.name, input.content_type.as_deref(), &input.data);

    if kind != SourceKind::Heif {
        return Ok(Normalized {
            data: input.data.clone(),
            kind,
            converted: false,
        });
    }

    let data = heif_to_jpeg(&input.data)?;
    tracing::debug!(
        intermediate_size = data.len(),
        "HEIF source re-encoded as JPEG intermediate"
    );

    Ok(Normalized {
        data,
        kind,
        converted: true,
    })
}

#[cfg(feature = "heif")]
fn heif_to_jpeg(data: &[u8]) -> Result<Bytes, ConversionError> {
    use crate::compression::ImageEncoder;
    use image::{DynamicImage, RgbImage};
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let failed = |e: &dyn std::fmt::Display| ConversionError::NormalizationFailed(e.to_string());

    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(data).map_err(|e| failed(&e))?;
    let handle = ctx.primary_image_handle().map_err(|e| failed(&e))?;

    let width = handle.width();
    let height = handle.height();

    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(|e| failed(&e))?;

    let planes = decoded.planes();
    let interleaved = planes.interleaved.ok_or_else(|| {
        ConversionError::NormalizationFailed("no interleaved RGB plane".to_string())
    })?;

    let row_len = width as usize * 3;
    let stride = interleaved.stride;
    let mut rgb = Vec::with_capacity(row_len * height as usize);
    for y in 0..height as usize {
        let row_start = y * stride;
        let row = interleaved
            .data
            .get(row_start..row_start + row_len)
            .ok_or_else(|| failed(&"truncated RGB plane"))?;
        rgb.extend_from_slice(row);
    }

    let buffer = RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| failed(&"RGB plane does not match image size"))?;

    ImageEncoder::encode_jpeg(&DynamicImage::ImageRgb8(buffer), HEIF_INTERMEDIATE_QUALITY)
        .map_err(|e| failed(&e))
}

#[cfg(not(feature = "heif"))]
fn heif_to_jpeg(_data: &[u8]) -> Result<Bytes, ConversionError> {
    tracing::warn!(
        intermediate_quality = HEIF_INTERMEDIATE_QUALITY,
        "HEIF input received but HEIF support is not compiled in"
    );
    Err(ConversionError::NormalizationFailed(
        "HEIF support not enabled (build with the `heif` feature)".to_string(),
    ))
}
