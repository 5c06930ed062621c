use std::io::Cursor;

use anyhow::Context;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;

use super::ExportFormat;

/// Maps a [0,1] quality to the JPEG encoder's 1..=100 scale.
fn jpeg_quality(quality: f32) -> u8 {
    let q = if quality.is_finite() { quality } else { 1.0 };
    (q.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Encode `image` into an in-memory buffer.
///
/// PNG is always lossless. The image crate only ships a lossless WebP
/// encoder, so WebP output ignores `quality` as well.
pub fn encode(image: &DynamicImage, format: ExportFormat, quality: f32) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let writer = Cursor::new(&mut bytes);
    match format {
        ExportFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(writer, jpeg_quality(quality));
            rgb.write_with_encoder(encoder).context("JPEG encoding failed")?;
        }
        ExportFormat::Png => {
            let encoder = PngEncoder::new_with_quality(
                writer,
                CompressionType::Default,
                PngFilterType::Adaptive,
            );
            image.write_with_encoder(encoder).context("PNG encoding failed")?;
        }
        ExportFormat::WebP => {
            let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
            let encoder = WebPEncoder::new_lossless(writer);
            rgba.write_with_encoder(encoder).context("WebP encoding failed")?;
        }
    }
    tracing::debug!(
        format = format.label(),
        width = image.width(),
        height = image.height(),
        bytes = bytes.len(),
        "Encoded image"
    );
    Ok(bytes)
}
