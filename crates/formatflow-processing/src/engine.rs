//! Conversion engine
//!
//! Runs one file through normalize → decode → resize → encode and reports the
//! stage reached along the way. Stateless; every buffer it allocates is
//! dropped before `convert` returns, on success and on failure.

use formatflow_core::{
    output_file_name, ConversionError, ConversionOptions, ConversionResult, ConversionStage,
    InputFile,
};

use crate::compression::ImageEncoder;
use crate::image::{target_dimensions, ImageDecoder, ImageResize};
use crate::normalize::normalize;

/// Receives stage milestones from a running conversion.
///
/// Returning `Err(ConversionError::Cancelled)` aborts the conversion before
/// the next stage starts.
pub trait StageObserver {
    fn on_stage(&mut self, stage: ConversionStage) -> Result<(), ConversionError>;
}

impl<F> StageObserver for F
where
    F: FnMut(ConversionStage) -> Result<(), ConversionError>,
{
    fn on_stage(&mut self, stage: ConversionStage) -> Result<(), ConversionError> {
        self(stage)
    }
}

/// Observer that ignores every stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {
    fn on_stage(&mut self, _stage: ConversionStage) -> Result<(), ConversionError> {
        Ok(())
    }
}

pub struct ConversionEngine;

impl ConversionEngine {
    pub fn convert(
        input: &InputFile,
        options: &ConversionOptions,
    ) -> Result<ConversionResult, ConversionError> {
        Self::convert_with_observer(input, options, &mut NoopObserver)
    }

    #[tracing::instrument(
        skip(input, options, observer),
        fields(name = %input.name, format = %options.format, quality = options.quality)
    )]
    pub fn convert_with_observer<O: StageObserver + ?Sized>(
        input: &InputFile,
        options: &ConversionOptions,
        observer: &mut O,
    ) -> Result<ConversionResult, ConversionError> {
        options.validate()?;
        observer.on_stage(ConversionStage::Started)?;

        let normalized = normalize(input)?;
        if normalized.converted {
            observer.on_stage(ConversionStage::Normalizing)?;
        }

        let decoded = ImageDecoder::decode(&normalized.data, normalized.decode_hint())?;
        drop(normalized);
        observer.on_stage(ConversionStage::Decoding)?;

        let (source_width, source_height) = decoded.dimensions();
        let (width, height) = target_dimensions(
            source_width,
            source_height,
            options.max_width,
            options.max_height,
        );

        let rendered = ImageResize::render(decoded.image, width, height);
        observer.on_stage(ConversionStage::Rendering)?;

        let data = ImageEncoder::encode(&rendered, options)?;
        drop(rendered);
        observer.on_stage(ConversionStage::Encoded)?;

        tracing::debug!(
            source_width,
            source_height,
            width,
            height,
            output_size = data.len(),
            decode_path = ?decoded.path,
            "Conversion finished"
        );

        Ok(ConversionResult::new(
            data,
            output_file_name(&input.name, options.format),
            options.format,
            width,
            height,
        ))
    }
}
