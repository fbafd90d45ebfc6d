//! Alpha compositing and crop rendering
//!
//! Every operation returns a new RGBA buffer. Inputs are never modified, so a
//! failed call leaves nothing half-applied.

use crate::codec::resample_mask;
use crate::config::PipelineConfig;
use crate::error::{PortraitError, Result};
use crate::types::{CategoryMask, CropRegion, CropShape, Mask};
use image::{imageops, imageops::FilterType, Rgba, RgbaImage};

const RING_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Integer pixel rectangle `(x, y, width, height)` covering a crop region,
/// clamped to the image
///
/// # Errors
/// - Region that does not cover at least one pixel of the image
pub fn pixel_rect(region: &CropRegion, width: u32, height: u32) -> Result<(u32, u32, u32, u32)> {
    let x = region.x.round().clamp(0.0, width as f32) as u32;
    let y = region.y.round().clamp(0.0, height as f32) as u32;
    let w = (region.width.round() as u32).min(width.saturating_sub(x));
    let h = (region.height.round() as u32).min(height.saturating_sub(y));

    if w == 0 || h == 0 {
        return Err(PortraitError::invalid_geometry(format!(
            "Crop region {region:?} covers no pixels of a {width}x{height} image"
        )));
    }
    Ok((x, y, w, h))
}

/// Applies masks and crops to source bitmaps
#[derive(Debug, Clone, Copy)]
pub struct Compositor {
    threshold: f32,
    person_category: u8,
    ring_width: u32,
    badge_size: u32,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl Compositor {
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            threshold: config.mask_threshold,
            person_category: config.person_category,
            ring_width: config.ring_width,
            badge_size: config.badge_size,
        }
    }

    #[must_use]
    pub fn badge_size(&self) -> u32 {
        self.badge_size
    }

    /// Cut the background using a pixel-space mask.
    ///
    /// Below the threshold a pixel becomes fully transparent; otherwise its
    /// alpha is scaled by the mask value for a soft edge.
    ///
    /// # Errors
    /// - Mask grid not matching the image dimensions
    pub fn apply_mask(&self, image: &RgbaImage, mask: &Mask) -> Result<RgbaImage> {
        if mask.dimensions() != image.dimensions() {
            return Err(PortraitError::processing(format!(
                "Mask is {}x{} but the image is {}x{}",
                mask.width(),
                mask.height(),
                image.width(),
                image.height()
            )));
        }

        let mut output = image.clone();
        for (pixel, &value) in output.pixels_mut().zip(mask.values()) {
            let alpha = if value < self.threshold {
                0
            } else {
                (f32::from(pixel[3]) * value.min(1.0)).round().clamp(0.0, 255.0) as u8
            };
            pixel[3] = alpha;
        }
        Ok(output)
    }

    /// Keep only pixels labelled with the person category
    pub fn apply_category_mask(
        &self,
        image: &RgbaImage,
        categories: &CategoryMask,
    ) -> Result<RgbaImage> {
        let mask = categories.to_mask(self.person_category);
        let mask = resample_mask(&mask, image.width(), image.height())?;
        self.apply_mask(image, &mask)
    }

    /// Copy a crop region into a canvas sized to it.
    ///
    /// Circular regions are clipped to the inscribed circle and finished with
    /// the cosmetic ring.
    pub fn crop(&self, image: &RgbaImage, region: &CropRegion) -> Result<RgbaImage> {
        let (x, y, w, h) = pixel_rect(region, image.width(), image.height())?;
        let mut output = imageops::crop_imm(image, x, y, w, h).to_image();

        if region.shape == CropShape::Circle {
            clip_circle(&mut output, self.ring_width);
        }
        log::debug!("Cropped {:?} region {w}x{h} at ({x}, {y})", region.shape);
        Ok(output)
    }

    /// Crop a region, scale it to fill a `size x size` canvas and clip it to a
    /// circle
    pub fn crop_scaled_circle(
        &self,
        image: &RgbaImage,
        region: &CropRegion,
        size: u32,
    ) -> Result<RgbaImage> {
        if size == 0 {
            return Err(PortraitError::invalid_config("Output canvas size must be positive"));
        }
        let (x, y, w, h) = pixel_rect(region, image.width(), image.height())?;
        let cropped = imageops::crop_imm(image, x, y, w, h).to_image();

        let mut output = imageops::resize(&cropped, size, size, FilterType::Triangle);
        clip_circle(&mut output, 0);
        Ok(output)
    }

    /// Remove the background in source coordinates, then crop, scale and clip
    /// the result into the round badge canvas
    pub fn combined(
        &self,
        image: &RgbaImage,
        mask: &Mask,
        region: &CropRegion,
    ) -> Result<RgbaImage> {
        let matted = self.apply_mask(image, mask)?;
        self.crop_scaled_circle(&matted, region, self.badge_size)
    }
}

/// Make everything outside the inscribed circle transparent and paint a ring
/// of `ring_width` pixels just inside its edge
fn clip_circle(image: &mut RgbaImage, ring_width: u32) {
    let (width, height) = image.dimensions();
    let radius = width.min(height) as f32 / 2.0;
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let ring_inner = radius - ring_width as f32;

    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - cx;
        let dy = y as f32 + 0.5 - cy;
        let distance = (dx * dx + dy * dy).sqrt();

        if distance > radius {
            pixel[3] = 0;
        } else if ring_width > 0 && distance >= ring_inner {
            *pixel = RING_COLOR;
        }
    }
}
