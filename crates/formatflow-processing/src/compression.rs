use bytes::Bytes;
use formatflow_core::{ConversionError, ConversionOptions, OutputFormat};
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

/// Encodes a rendered pixel buffer into the requested output format.
pub struct ImageEncoder;

impl ImageEncoder {
    /// Encode `img` per `options`. PNG ignores the quality setting.
    pub fn encode(img: &DynamicImage, options: &ConversionOptions) -> Result<Bytes, ConversionError> {
        match options.format {
            OutputFormat::Jpg => Self::encode_jpeg(img, options.quality),
            OutputFormat::Png => Self::encode_png(img),
            OutputFormat::WebP => Self::encode_webp(img, options.quality),
        }
    }

    /// JPEG quality on the 1-100 scale used by the codecs.
    pub fn jpeg_quality(quality: f32) -> u8 {
        (quality * 100.0).round().clamp(1.0, 100.0) as u8
    }

    /// Encode to JPEG. JPEG has no alpha channel, so the buffer is reduced to RGB.
    #[cfg(not(feature = "mozjpeg"))]
    pub fn encode_jpeg(img: &DynamicImage, quality: f32) -> Result<Bytes, ConversionError> {
        use image::codecs::jpeg::JpegEncoder;
        use image::{ExtendedColorType, ImageEncoder as _};

        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let mut buffer = Vec::with_capacity((width * height) as usize / 2);
        JpegEncoder::new_with_quality(&mut buffer, Self::jpeg_quality(quality))
            .write_image(rgb_img.as_raw(), width, height, ExtendedColorType::Rgb8)
            .map_err(|e| ConversionError::EncodeFailed(format!("jpeg: {}", e)))?;

        Ok(Bytes::from(buffer))
    }

    /// Encode to JPEG using mozjpeg
    #[cfg(feature = "mozjpeg")]
    pub fn encode_jpeg(img: &DynamicImage, quality: f32) -> Result<Bytes, ConversionError> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(Self::jpeg_quality(quality) as f32);
        comp.set_optimize_coding(true);

        let encode = || -> std::io::Result<Vec<u8>> {
            let mut comp = comp.start_compress(Vec::new())?;
            comp.write_scanlines(&rgb_img)?;
            comp.finish()
        };
        let jpeg_data =
            encode().map_err(|e| ConversionError::EncodeFailed(format!("mozjpeg: {}", e)))?;

        Ok(Bytes::from(jpeg_data))
    }

    /// Encode to PNG (lossless, deterministic for a given buffer)
    pub fn encode_png(img: &DynamicImage) -> Result<Bytes, ConversionError> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        img.write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| ConversionError::EncodeFailed(format!("png: {}", e)))?;

        Ok(Bytes::from(buffer))
    }

    /// Encode to lossy WebP through libwebp
    pub fn encode_webp(img: &DynamicImage, quality: f32) -> Result<Bytes, ConversionError> {
        let (width, height) = img.dimensions();
        let webp_quality = (quality * 100.0).clamp(0.0, 100.0);

        let rgba_img = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder
            .encode_simple(false, webp_quality)
            .map_err(|e| ConversionError::EncodeFailed(format!("webp: {:?}", e)))?;

        Ok(Bytes::copy_from_slice(&webp_data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::photo_like;

    #[test]
    fn test_jpeg_quality_scale() {
        assert_eq!(ImageEncoder::jpeg_quality(0.85), 85);
        assert_eq!(ImageEncoder::jpeg_quality(1.0), 100);
        assert_eq!(ImageEncoder::jpeg_quality(0.0), 1);
        assert_eq!(ImageEncoder::jpeg_quality(0.424), 42);
    }

    #[test]
    fn test_encode_declares_requested_format() {
        let img = photo_like(48, 32);

        let jpg = ImageEncoder::encode(&img, &ConversionOptions::new(OutputFormat::Jpg, 0.8)).unwrap();
        assert_eq!(image::guess_format(&jpg).unwrap(), ImageFormat::Jpeg);

        let png = ImageEncoder::encode(&img, &ConversionOptions::new(OutputFormat::Png, 0.8)).unwrap();
        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);

        let webp =
            ImageEncoder::encode(&img, &ConversionOptions::new(OutputFormat::WebP, 0.8)).unwrap();
        assert_eq!(image::guess_format(&webp).unwrap(), ImageFormat::WebP);
    }

    #[test]
    fn test_png_ignores_quality() {
        let img = photo_like(40, 40);
        let low = ImageEncoder::encode(&img, &ConversionOptions::new(OutputFormat::Png, 0.1)).unwrap();
        let high = ImageEncoder::encode(&img, &ConversionOptions::new(OutputFormat::Png, 1.0)).unwrap();
        assert_eq!(low, high);
    }

    #[test]
    fn test_jpeg_quality_monotonic() {
        let img = photo_like(128, 96);
        let low = ImageEncoder::encode_jpeg(&img, 0.4).unwrap();
        let high = ImageEncoder::encode_jpeg(&img, 0.95).unwrap();
        assert!(high.len() >= low.len(), "q=0.95 {} < q=0.4 {}", high.len(), low.len());
    }

    #[test]
    fn test_webp_quality_monotonic() {
        let img = photo_like(128, 96);
        let low = ImageEncoder::encode_webp(&img, 0.4).unwrap();
        let high = ImageEncoder::encode_webp(&img, 0.95).unwrap();
        assert!(high.len() >= low.len(), "q=0.95 {} < q=0.4 {}", high.len(), low.len());
    }

    #[test]
    fn test_jpeg_drops_alpha() {
        use image::{Rgba, RgbaImage};
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([200, 10, 10, 128])));
        let jpg = ImageEncoder::encode_jpeg(&img, 0.9).unwrap();
        let decoded = image::load_from_memory(&jpg).unwrap();
        assert!(!decoded.color().has_alpha());
    }
}
