//! Face-anchored crop geometry
//!
//! Pure functions from a face bounding box and the source image size to a
//! crop region. Every region returned here lies inside the source bitmap.

use crate::error::{PortraitError, Result};
use crate::types::{BoundingBox, CoordinateSpace, CropRegion, CropShape};

/// Padding added around the face for the rectangular crop, relative to face size
pub const RECT_PADDING_RATIO: f32 = 0.8;

/// Height / width of the rectangular crop (4:3)
pub const RECT_ASPECT_RATIO: f32 = 0.75;

/// Padding added to the face for the circular crop diameter
pub const CIRCLE_PADDING_RATIO: f32 = 1.2;

/// Square side of the combined background-removal badge, relative to face size
pub const BADGE_CROP_RATIO: f32 = 2.5;

/// Margin on each side of the background-preserving round crop
pub const ROUND_MARGIN_RATIO: f32 = 0.3;

fn check_image(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(PortraitError::invalid_geometry(format!(
            "Image has no pixels ({width}x{height})"
        )));
    }
    Ok(())
}

fn check_box(bbox: &BoundingBox) -> Result<()> {
    if !bbox.is_valid() {
        return Err(PortraitError::invalid_geometry(format!(
            "Bounding box must have finite coordinates and positive size, got {bbox:?}"
        )));
    }
    Ok(())
}

fn looks_normalized(bbox: &BoundingBox) -> bool {
    [bbox.origin_x, bbox.origin_y, bbox.width, bbox.height]
        .iter()
        .all(|v| (0.0..=1.0).contains(v))
}

/// Convert a bounding box into natural-image pixel space and clip it to the
/// image.
///
/// # Errors
/// - Normalized coordinates outside `[0, 1]`
/// - A zero-sized display frame
/// - A box smaller than one pixel after conversion and clipping, which is what
///   normalized coordinates passed as pixels turn into
pub fn normalize_box(
    bbox: &BoundingBox,
    space: CoordinateSpace,
    image_width: u32,
    image_height: u32,
) -> Result<BoundingBox> {
    check_image(image_width, image_height)?;
    check_box(bbox)?;

    let (iw, ih) = (image_width as f32, image_height as f32);
    let converted = match space {
        CoordinateSpace::Pixels => *bbox,
        CoordinateSpace::Normalized => {
            const TOLERANCE: f32 = 1e-3;
            let right = bbox.origin_x + bbox.width;
            let bottom = bbox.origin_y + bbox.height;
            if bbox.origin_x < -TOLERANCE
                || bbox.origin_y < -TOLERANCE
                || right > 1.0 + TOLERANCE
                || bottom > 1.0 + TOLERANCE
            {
                return Err(PortraitError::invalid_geometry(format!(
                    "Normalized box {bbox:?} extends outside [0, 1]; pixel coordinates need CoordinateSpace::Pixels"
                )));
            }
            BoundingBox::new(
                bbox.origin_x * iw,
                bbox.origin_y * ih,
                bbox.width * iw,
                bbox.height * ih,
            )
        },
        CoordinateSpace::Display { width, height } => {
            if width == 0 || height == 0 {
                return Err(PortraitError::invalid_geometry(
                    "Display frame has no pixels",
                ));
            }
            let sx = iw / width as f32;
            let sy = ih / height as f32;
            BoundingBox::new(
                bbox.origin_x * sx,
                bbox.origin_y * sy,
                bbox.width * sx,
                bbox.height * sy,
            )
        },
    };

    let left = converted.origin_x.max(0.0);
    let top = converted.origin_y.max(0.0);
    let right = (converted.origin_x + converted.width).min(iw);
    let bottom = (converted.origin_y + converted.height).min(ih);

    if right - left < 1.0 || bottom - top < 1.0 {
        let hint = if space == CoordinateSpace::Pixels && looks_normalized(bbox) {
            " (coordinates look normalized; use CoordinateSpace::Normalized)"
        } else {
            ""
        };
        return Err(PortraitError::invalid_geometry(format!(
            "Bounding box {bbox:?} is degenerate on a {image_width}x{image_height} image{hint}"
        )));
    }

    Ok(BoundingBox::new(left, top, right - left, bottom - top))
}

/// Rectangular 4:3 crop: `1.8 x faceSize` wide, centered on the face and
/// shifted to stay inside the image
pub fn rect_crop(bbox: &BoundingBox, image_width: u32, image_height: u32) -> Result<CropRegion> {
    check_image(image_width, image_height)?;
    check_box(bbox)?;

    let (iw, ih) = (image_width as f32, image_height as f32);
    let face_size = bbox.face_size();

    let mut width = face_size + face_size * RECT_PADDING_RATIO;
    let mut height = width * RECT_ASPECT_RATIO;
    if width > iw {
        width = iw;
        height = width * RECT_ASPECT_RATIO;
    }
    if height > ih {
        height = ih;
        width = height / RECT_ASPECT_RATIO;
    }

    let (cx, cy) = bbox.center();
    let x = (cx - width / 2.0).min(iw - width).max(0.0);
    let y = (cy - height / 2.0).min(ih - height).max(0.0);

    Ok(CropRegion {
        shape: CropShape::Rect,
        x,
        y,
        width,
        height,
    })
}

/// Circular crop of radius `1.1 x faceSize`, shrunk so the whole circle stays
/// inside the image
///
/// # Errors
/// - Face centroid on or beyond an image edge
pub fn circle_crop(bbox: &BoundingBox, image_width: u32, image_height: u32) -> Result<CropRegion> {
    check_image(image_width, image_height)?;
    check_box(bbox)?;

    let (iw, ih) = (image_width as f32, image_height as f32);
    let face_size = bbox.face_size();
    let radius = (face_size + face_size * CIRCLE_PADDING_RATIO) / 2.0;

    let (cx, cy) = bbox.center();
    let max_radius = cx.min(iw - cx).min(cy).min(ih - cy);
    if max_radius <= 0.0 {
        return Err(PortraitError::invalid_geometry(format!(
            "Face centroid ({cx}, {cy}) is not inside the {image_width}x{image_height} image"
        )));
    }

    let radius = radius.min(max_radius);
    Ok(CropRegion {
        shape: CropShape::Circle,
        x: cx - radius,
        y: cy - radius,
        width: radius * 2.0,
        height: radius * 2.0,
    })
}

/// Square of side `2.5 x faceSize` around the face for the combined
/// background-removal badge. The corner is clamped at zero and the extent
/// trimmed at the far edges.
pub fn badge_crop(bbox: &BoundingBox, image_width: u32, image_height: u32) -> Result<CropRegion> {
    check_image(image_width, image_height)?;
    check_box(bbox)?;

    let (iw, ih) = (image_width as f32, image_height as f32);
    let side = bbox.face_size() * BADGE_CROP_RATIO;
    let (cx, cy) = bbox.center();

    let x = (cx - side / 2.0).max(0.0);
    let y = (cy - side / 2.0).max(0.0);
    let width = side.min(iw - x);
    let height = side.min(ih - y);

    if width <= 0.0 || height <= 0.0 {
        return Err(PortraitError::invalid_geometry(format!(
            "Badge crop around ({cx}, {cy}) falls outside the {image_width}x{image_height} image"
        )));
    }

    Ok(CropRegion {
        shape: CropShape::Circle,
        x,
        y,
        width,
        height,
    })
}

/// Background-preserving round crop: square of side `1.6 x faceSize` centered
/// on the face, shrunk to the image and shifted inside it
pub fn round_with_background_crop(
    bbox: &BoundingBox,
    image_width: u32,
    image_height: u32,
) -> Result<CropRegion> {
    check_image(image_width, image_height)?;
    check_box(bbox)?;

    let (iw, ih) = (image_width as f32, image_height as f32);
    let face_size = bbox.face_size();
    let margin = face_size * ROUND_MARGIN_RATIO;
    let side = (face_size + margin * 2.0).min(iw).min(ih);

    let (cx, cy) = bbox.center();
    let x = (cx - side / 2.0).min(iw - side).max(0.0);
    let y = (cy - side / 2.0).min(ih - side).max(0.0);

    Ok(CropRegion {
        shape: CropShape::Circle,
        x,
        y,
        width: side,
        height: side,
    })
}
