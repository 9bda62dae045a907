//! Test fixtures: small synthetic images and their encoded forms.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// A gradient with pseudo-random noise, so lossy encoders have detail to spend
/// bits on. Deterministic for a given size.
pub fn photo_like(width: u32, height: u32) -> DynamicImage {
    let mut seed: u32 = 0x2545_f491;
    let img = RgbImage::from_fn(width, height, |x, y| {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let noise = (seed >> 24) as u8 / 4;
        let r = ((x * 255) / width.max(1)) as u8;
        let g = ((y * 255) / height.max(1)) as u8;
        let b = (((x + y) * 127) / (width + height).max(1)) as u8;
        Rgb([
            r.saturating_add(noise),
            g.saturating_add(noise),
            b.saturating_add(noise),
        ])
    });
    DynamicImage::ImageRgb8(img)
}

/// Encode `img` with the stock `image` codecs.
pub fn encode_fixture(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Vec::new();
    let img = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => img.clone(),
    };
    img.write_to(&mut Cursor::new(&mut buffer), format)
        .expect("fixture encodes");
    buffer
}

/// A JPEG fixture of the given size.
pub fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
    encode_fixture(&photo_like(width, height), ImageFormat::Jpeg)
}

/// A PNG fixture of the given size.
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    encode_fixture(&photo_like(width, height), ImageFormat::Png)
}

/// Bytes that start like a HEIC file but carry no decodable image.
pub fn corrupt_heic() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&24u32.to_be_bytes());
    data.extend_from_slice(b"ftyp");
    data.extend_from_slice(b"heic");
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(b"mif1");
    data.extend_from_slice(b"heic");
    data.extend_from_slice(b"this is not an hevc bitstream");
    data
}

/// A JPEG fixture whose EXIF block carries `orientation` (1-8).
pub fn jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
    let jpeg = jpeg_fixture(width, height);

    // Big-endian TIFF header, one IFD entry: tag 0x0112, SHORT, count 1
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\0\x2a");
    tiff.extend_from_slice(&8u32.to_be_bytes());
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x0112u16.to_be_bytes());
    tiff.extend_from_slice(&3u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_be_bytes());

    let mut app1 = vec![0xff, 0xe1];
    app1.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    app1.extend_from_slice(b"Exif\0\0");
    app1.extend_from_slice(&tiff);

    // After SOI, and after the JFIF APP0 segment when there is one
    let mut insert_at = 2;
    if jpeg.get(2..4) == Some(&[0xff, 0xe0][..]) {
        let len = u16::from_be_bytes([jpeg[4], jpeg[5]]) as usize;
        insert_at = 4 + len;
    }

    let mut out = Vec::with_capacity(jpeg.len() + app1.len());
    out.extend_from_slice(&jpeg[..insert_at]);
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[insert_at..]);
    out
}

/// A real HEIC file encoded through libheif, or `None` when the linked
/// libheif has no HEVC encoder.
#[cfg(feature = "heif")]
pub fn heic_fixture(width: u32, height: u32) -> Option<Vec<u8>> {
    use libheif_rs::{
        Channel, ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, LibHeif,
        RgbChroma,
    };

    let source = photo_like(width, height).to_rgb8();

    let mut image = Image::new(width, height, ColorSpace::Rgb(RgbChroma::Rgb)).ok()?;
    image
        .create_plane(Channel::Interleaved, width, height, 8)
        .ok()?;
    {
        let planes = image.planes_mut();
        let plane = planes.interleaved?;
        let stride = plane.stride;
        let data = plane.data;
        let row_len = width as usize * 3;
        for (y, row) in source.as_raw().chunks_exact(row_len).enumerate() {
            let start = y * stride;
            data[start..start + row_len].copy_from_slice(row);
        }
    }

    let lib_heif = LibHeif::new();
    let mut encoder = lib_heif.encoder_for_format(CompressionFormat::Hevc).ok()?;
    encoder.set_quality(EncoderQuality::Lossy(90)).ok()?;

    let mut context = HeifContext::new().ok()?;
    context.encode_image(&image, &mut encoder, None).ok()?;
    context.write_to_bytes().ok()
}
