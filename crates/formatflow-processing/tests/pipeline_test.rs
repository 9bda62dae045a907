use bytes::Bytes;
use formatflow_core::{ConversionError, ConversionOptions, ConversionStage, InputFile, OutputFormat};
use formatflow_processing::{ConversionEngine, ImageDecoder};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

fn checkerboard(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        if (x / 4 + y / 4) % 2 == 0 {
            Rgba([240, 240, 240, 255])
        } else {
            Rgba([20, 60, 180, 255])
        }
    }))
}

fn encoded(img: &DynamicImage, format: ImageFormat) -> Bytes {
    let mut buffer = Vec::new();
    let img = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        img.clone()
    };
    img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
    Bytes::from(buffer)
}

#[test]
fn test_every_input_to_every_output() {
    let source = checkerboard(24, 16);
    let inputs = [
        ("a.jpg", encoded(&source, ImageFormat::Jpeg)),
        ("b.png", encoded(&source, ImageFormat::Png)),
        ("c.webp", encoded(&source, ImageFormat::WebP)),
    ];
    let outputs = [
        (OutputFormat::Jpg, ImageFormat::Jpeg),
        (OutputFormat::Png, ImageFormat::Png),
        (OutputFormat::WebP, ImageFormat::WebP),
    ];

    for (name, data) in &inputs {
        for (format, expected) in &outputs {
            let input = InputFile::new(*name, data.clone());
            let result =
                ConversionEngine::convert(&input, &ConversionOptions::new(*format, 0.85)).unwrap();

            assert_eq!(image::guess_format(&result.data).unwrap(), *expected, "{} -> {}", name, format);
            assert_eq!((result.width, result.height), (24, 16));
            assert!(result.output_name.ends_with(&format!(".{}", format.extension())));

            let reopened = ImageDecoder::decode(&result.data, None).unwrap();
            assert_eq!(reopened.dimensions(), (24, 16));
        }
    }
}

#[test]
fn test_png_output_is_lossless_for_png_input() {
    let source = checkerboard(16, 16);
    let input = InputFile::new("board.png", encoded(&source, ImageFormat::Png));

    let result = ConversionEngine::convert(&input, &ConversionOptions::new(OutputFormat::Png, 0.4)).unwrap();
    let reopened = image::load_from_memory(&result.data).unwrap();

    assert_eq!(reopened.to_rgba8().as_raw(), source.to_rgba8().as_raw());
}

#[test]
fn test_downscale_preserves_aspect_ratio() {
    let input = InputFile::new("tall.png", encoded(&checkerboard(30, 90), ImageFormat::Png));
    let options = ConversionOptions::new(OutputFormat::Jpg, 0.85).with_max_height(45);

    let result = ConversionEngine::convert(&input, &options).unwrap();
    let reopened = image::load_from_memory(&result.data).unwrap();

    assert_eq!((result.width, result.height), (15, 45));
    assert_eq!(reopened.dimensions(), (15, 45));
}

#[test]
fn test_stages_are_monotonic_and_end_at_100() {
    let input = InputFile::new("a.webp", encoded(&checkerboard(12, 12), ImageFormat::WebP));
    let mut percents = Vec::new();

    ConversionEngine::convert_with_observer(
        &input,
        &ConversionOptions::new(OutputFormat::Png, 1.0),
        &mut |stage: ConversionStage| -> Result<(), ConversionError> {
            percents.push(stage.percent());
            Ok(())
        },
    )
    .unwrap();

    assert!(percents.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(percents.last(), Some(&100));
}

#[test]
fn test_truncated_input_fails_without_panicking() {
    let full = encoded(&checkerboard(32, 32), ImageFormat::Png);
    let input = InputFile::new("cut.png", full.slice(..full.len() / 3));

    let result = ConversionEngine::convert(&input, &ConversionOptions::default());
    assert!(matches!(result, Err(ConversionError::DecodeFailed(_))));
}
