use std::sync::Arc;

use anyhow::Context;

use crate::{composite, error::UnderlayResult};

/// Decoded raster image in premultiplied RGBA8 form.
///
/// Owned by the image pipeline for its lifetime; consumers borrow it
/// read-only for compositing. Immutable once built.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Arc<Vec<u8>>,
}

/// One flattened output frame in premultiplied RGBA8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

pub fn decode_image(bytes: &[u8]) -> UnderlayResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes)
        .context("decode image from memory")
        .map_err(|e| crate::UnderlayError::decode(format!("{e:#}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    composite::premultiply_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

impl PreparedImage {
    /// Resample to exactly `width x height`, stretching both axes
    /// independently. Non-aspect-preserving on purpose: fill, never fit.
    pub fn stretch_to(&self, width: u32, height: u32) -> UnderlayResult<Vec<u8>> {
        if self.width == width && self.height == height {
            return Ok(self.rgba8_premul.as_ref().clone());
        }

        let src = image::RgbaImage::from_raw(
            self.width,
            self.height,
            self.rgba8_premul.as_ref().clone(),
        )
        .ok_or_else(|| crate::UnderlayError::decode("prepared image byte length mismatch"))?;

        // Premultiplied input keeps transparent pixels from bleeding color
        // into their neighbors during resampling.
        let resized = image::imageops::resize(&src, width, height, image::imageops::FilterType::Triangle);
        Ok(resized.into_raw())
    }
}

/// Encode a premultiplied frame as a straight-alpha PNG.
pub fn encode_png(frame: &Raster) -> UnderlayResult<Vec<u8>> {
    let mut data = frame.data.clone();
    if frame.premultiplied {
        composite::unpremultiply_in_place(&mut data);
    }
    let img = image::RgbaImage::from_raw(frame.width, frame.height, data)
        .ok_or_else(|| crate::UnderlayError::export("frame byte length mismatch"))?;

    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .context("encode png")
        .map_err(|e| crate::UnderlayError::export(format!("{e:#}")))?;
    Ok(out)
}
