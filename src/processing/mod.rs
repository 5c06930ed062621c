//! Image processing collaborator.
//!
//! The session only talks to [`ImageProcessor`]. [`CpuProcessor`] is the
//! reference implementation used by the probe binary and as a default.

pub mod color;
pub mod export;
pub mod exposure;
pub mod filters;
pub mod transform;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::adjustments::Adjustments;
use crate::crop::CropRotateState;
use crate::filter::AppliedFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Lossy, quality-parameterized.
    Jpeg,
    /// Lossless; quality is ignored.
    Png,
    /// Modern format. `CpuProcessor` encodes it losslessly.
    WebP,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Jpeg, ExportFormat::Png, ExportFormat::WebP];

    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Jpeg => "JPG",
            ExportFormat::Png => "PNG",
            ExportFormat::WebP => "WebP",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Png => "png",
            ExportFormat::WebP => "webp",
        }
    }

    pub fn is_lossless(self) -> bool {
        self == ExportFormat::Png
    }
}

/// Renders edits. Implementations run on the preview worker thread as well
/// as on the caller's thread for final renders, hence `Send + Sync`.
pub trait ImageProcessor: Send + Sync {
    /// Downscale so the longest edge is at most `max_dimension`. Images
    /// already within bounds come back unchanged.
    fn generate_preview(
        &self,
        image: &DynamicImage,
        max_dimension: u32,
    ) -> anyhow::Result<DynamicImage>;

    /// Apply adjustments, then the filter, then geometry.
    fn process_image(
        &self,
        image: &DynamicImage,
        adjustments: &Adjustments,
        filter: Option<&AppliedFilter>,
        crop_rotate: Option<&CropRotateState>,
    ) -> anyhow::Result<DynamicImage>;

    /// Encode `image`. `quality` is in [0,1] and ignored for lossless formats.
    fn export_image(
        &self,
        image: &DynamicImage,
        format: ExportFormat,
        quality: f32,
    ) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CpuProcessor;

impl ImageProcessor for CpuProcessor {
    fn generate_preview(
        &self,
        image: &DynamicImage,
        max_dimension: u32,
    ) -> anyhow::Result<DynamicImage> {
        if max_dimension == 0 {
            anyhow::bail!("preview dimension must be greater than 0");
        }
        if image.width() > max_dimension || image.height() > max_dimension {
            Ok(image.thumbnail(max_dimension, max_dimension))
        } else {
            Ok(image.clone())
        }
    }

    fn process_image(
        &self,
        image: &DynamicImage,
        adjustments: &Adjustments,
        filter: Option<&AppliedFilter>,
        crop_rotate: Option<&CropRotateState>,
    ) -> anyhow::Result<DynamicImage> {
        if image.width() == 0 || image.height() == 0 {
            anyhow::bail!("cannot process an empty image");
        }
        let mut out = exposure::apply(image.clone(), adjustments);
        out = color::apply(out, adjustments);
        out = filters::apply(out, filter);
        if let Some(crop_rotate) = crop_rotate {
            out = transform::apply(out, crop_rotate);
        }
        Ok(out)
    }

    fn export_image(
        &self,
        image: &DynamicImage,
        format: ExportFormat,
        quality: f32,
    ) -> anyhow::Result<Vec<u8>> {
        export::encode(image, format, quality)
    }
}
