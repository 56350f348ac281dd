use crate::error::{UnderlayError, UnderlayResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Largest on-screen preview box, in display pixels.
pub const PREVIEW_MAX_WIDTH: u32 = 800;
pub const PREVIEW_MAX_HEIGHT: u32 = 600;

/// Output-space and preview-space dimensions for one editing session.
///
/// Output space is the pixel grid of the full-resolution export canvas, which
/// always matches the uploaded image's natural dimensions. Preview space is
/// the possibly-downscaled on-screen surface; the two are related by a
/// per-axis scale factor. All layer positions live in output space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CanvasGeometry {
    pub output_width: u32,
    pub output_height: u32,
    pub preview_width: u32,
    pub preview_height: u32,
}

impl CanvasGeometry {
    /// Geometry for an output canvas of the given natural size.
    ///
    /// The preview fits the output aspect ratio into the fixed
    /// [`PREVIEW_MAX_WIDTH`] x [`PREVIEW_MAX_HEIGHT`] box (width-first), and
    /// is capped at the natural size so small uploads are never upscaled.
    pub fn for_output(output_width: u32, output_height: u32) -> UnderlayResult<Self> {
        if output_width == 0 || output_height == 0 {
            return Err(UnderlayError::validation(
                "canvas width/height must be > 0",
            ));
        }

        let aspect = f64::from(output_width) / f64::from(output_height);
        let mut preview_w = f64::from(PREVIEW_MAX_WIDTH);
        let mut preview_h = preview_w / aspect;
        if preview_h > f64::from(PREVIEW_MAX_HEIGHT) {
            preview_h = f64::from(PREVIEW_MAX_HEIGHT);
            preview_w = preview_h * aspect;
        }
        if preview_w > f64::from(output_width) {
            preview_w = f64::from(output_width);
            preview_h = f64::from(output_height);
        }

        Ok(Self {
            output_width,
            output_height,
            preview_width: (preview_w.round() as u32).max(1),
            preview_height: (preview_h.round() as u32).max(1),
        })
    }

    pub fn scale_x(&self) -> f64 {
        f64::from(self.output_width) / f64::from(self.preview_width)
    }

    pub fn scale_y(&self) -> f64 {
        f64::from(self.output_height) / f64::from(self.preview_height)
    }

    /// Map a preview-surface point into output space.
    pub fn surface_to_output(&self, p: Point) -> Point {
        Point::new(p.x * self.scale_x(), p.y * self.scale_y())
    }

    /// Map an output-space point onto the preview surface.
    pub fn output_to_surface(&self, p: Point) -> Point {
        Point::new(p.x / self.scale_x(), p.y / self.scale_y())
    }

    /// Clamp a point to `[0, output_width] x [0, output_height]`, inclusive.
    pub fn clamp_to_output(&self, p: Point) -> Point {
        Point::new(
            p.x.clamp(0.0, f64::from(self.output_width)),
            p.y.clamp(0.0, f64::from(self.output_height)),
        )
    }
}
