//! Screenshot cropping: keep the centre of the image, where profile text sits.
//!
//! ## Geometry
//!
//! For a source of `W × H` pixels and the default [`CropSettings`]:
//!
//! ```text
//! crop_width  = min(600, floor(W * 0.5))
//! crop_height = min(400, floor(H * 0.5))
//! left        = floor((W - crop_width) / 2)
//! top         = floor((H - crop_height) / 2)
//! ```
//!
//! The source is then shrunk to fit an 800×800 box (never enlarged) and the
//! rectangle is extracted from the shrunk image. The geometry is computed on
//! the source dimensions, so for large screenshots the rectangle can fall
//! outside the shrunk image; that, like any decode or encode failure, makes
//! the cropper copy the original upload instead. OCR always gets an input.
//!
//! Decoding and resizing are CPU-bound and run inside `spawn_blocking`.

use crate::config::{CropHeightMode, CropSettings};
use crate::error::{CropError, RizzError};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Centred crop rectangle in source-image pixels.
///
/// Invariant: `left + width <= W` and `top + height <= H` for the `W × H`
/// source it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropGeometry {
    pub width: u32,
    pub height: u32,
    pub left: u32,
    pub top: u32,
}

impl CropGeometry {
    /// Derive the crop rectangle for a `source_width × source_height` image.
    pub fn compute(source_width: u32, source_height: u32, settings: &CropSettings) -> Self {
        let width = settings
            .max_width
            .min(scaled(source_width, settings.ratio));
        let height = settings
            .max_height
            .min(scaled(source_height, settings.ratio));
        Self {
            width,
            height,
            left: source_width.saturating_sub(width) / 2,
            top: source_height.saturating_sub(height) / 2,
        }
    }

    /// The `(width, height)` actually extracted for the given mode.
    pub fn extraction_size(&self, mode: CropHeightMode) -> (u32, u32) {
        match mode {
            CropHeightMode::Independent => (self.width, self.height),
            CropHeightMode::MirrorWidth => (self.width, self.width),
        }
    }
}

/// `floor(dimension * ratio)`, clamped to the dimension itself.
fn scaled(dimension: u32, ratio: f64) -> u32 {
    let v = (f64::from(dimension) * ratio).floor();
    (v as u32).min(dimension)
}

/// What the cropper wrote to the destination path.
#[derive(Debug)]
pub enum CropOutcome {
    /// A true crop of the given size.
    Cropped { width: u32, height: u32 },
    /// A byte-identical copy of the source, because cropping failed.
    Fallback(CropError),
}

/// Crop `source` into `dest`, falling back to a plain copy on any crop failure.
///
/// Only a failure to produce *any* file at `dest` is an error; crop failures
/// are logged and absorbed.
pub async fn crop_image(
    source: &Path,
    dest: &Path,
    settings: &CropSettings,
) -> Result<CropOutcome, RizzError> {
    match try_crop(source.to_path_buf(), dest.to_path_buf(), *settings).await {
        Ok((width, height)) => {
            info!("Cropped screenshot to {}x{}", width, height);
            Ok(CropOutcome::Cropped { width, height })
        }
        Err(reason) => {
            warn!("Cropping failed, using original image: {}", reason);
            tokio::fs::copy(source, dest)
                .await
                .map_err(|source| RizzError::Workspace {
                    path: dest.to_path_buf(),
                    source,
                })?;
            Ok(CropOutcome::Fallback(reason))
        }
    }
}

async fn try_crop(
    source: PathBuf,
    dest: PathBuf,
    settings: CropSettings,
) -> Result<(u32, u32), CropError> {
    tokio::task::spawn_blocking(move || crop_blocking(&source, &dest, &settings))
        .await
        .map_err(|e| CropError::Join(e.to_string()))?
}

fn crop_blocking(
    source: &Path,
    dest: &Path,
    settings: &CropSettings,
) -> Result<(u32, u32), CropError> {
    let img = ImageReader::open(source)?.with_guessed_format()?.decode()?;
    let (src_w, src_h) = img.dimensions();

    let geometry = CropGeometry::compute(src_w, src_h, settings);
    let (width, height) = geometry.extraction_size(settings.height_mode);
    debug!(
        "Source {}x{} → crop {:?}, extracting {}x{}",
        src_w, src_h, geometry, width, height
    );

    let shrunk = fit_within(img, settings.bounding_box);
    let region = extract(&shrunk, geometry.left, geometry.top, width, height)?;

    region.save_with_format(dest, ImageFormat::Png)?;
    Ok((width, height))
}

/// Shrink to fit a `bound × bound` box, keeping the aspect ratio. Never enlarges.
fn fit_within(img: DynamicImage, bound: u32) -> DynamicImage {
    if img.width() <= bound && img.height() <= bound {
        img
    } else {
        img.resize(bound, bound, FilterType::Lanczos3)
    }
}

/// Extract a rectangle, refusing regions that do not fit rather than clamping.
fn extract(
    img: &DynamicImage,
    left: u32,
    top: u32,
    width: u32,
    height: u32,
) -> Result<DynamicImage, CropError> {
    if width == 0 || height == 0 {
        return Err(CropError::EmptyRegion { width, height });
    }
    let (iw, ih) = img.dimensions();
    let fits = left
        .checked_add(width)
        .is_some_and(|right| right <= iw)
        && top.checked_add(height).is_some_and(|bottom| bottom <= ih);
    if !fits {
        return Err(CropError::OutOfBounds {
            left,
            top,
            width,
            height,
            image_width: iw,
            image_height: ih,
        });
    }
    Ok(img.crop_imm(left, top, width, height))
}
