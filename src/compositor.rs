use crate::{
    blur,
    composite::over_in_place,
    core::{Affine, Vec2},
    error::{UnderlayError, UnderlayResult},
    model::TextLayer,
    raster::{PreparedImage, Raster},
    text::{FontCatalog, ShapedLayer},
};

/// Fixed drop-shadow parameters: ~50% black, 4px gaussian, offset (2, 2) in
/// output pixels. Not configurable.
const SHADOW_OFFSET: Vec2 = Vec2::new(2.0, 2.0);
const SHADOW_BLUR_RADIUS: u32 = 4;
const SHADOW_BLUR_SIGMA: f32 = 2.0;

fn shadow_color() -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(0, 0, 0, 128)
}

/// Everything one composite pass reads. All coordinates are output-space
/// pixels; scaling for display is the caller's concern.
#[derive(Clone, Copy)]
pub struct CompositeInputs<'a> {
    pub width: u32,
    pub height: u32,
    pub background: Option<&'a PreparedImage>,
    pub layers: &'a [TextLayer],
    pub cutout: Option<&'a PreparedImage>,
}

/// Flatten background, text layers, and foreground cutout into one raster.
///
/// Stage order is the product: opaque white base, background stretched to
/// fill, every text layer in paint order, and the cutout stretched to fill
/// on top of everything. The cutout's opaque subject pixels occlude the text
/// while its transparent regions let the text show through, which is what
/// puts the text "behind" the subject.
///
/// Deterministic: identical inputs produce identical bytes. A stage that
/// cannot draw (unshapeable layer, bad image buffer) is skipped with a
/// warning; the pass itself never aborts for a single bad resource.
pub fn compose_frame(
    inputs: &CompositeInputs<'_>,
    fonts: &mut FontCatalog,
) -> UnderlayResult<Raster> {
    if inputs.width == 0 || inputs.height == 0 {
        return Err(UnderlayError::validation(
            "composite surface width/height must be > 0",
        ));
    }
    let width_u16: u16 = inputs
        .width
        .try_into()
        .map_err(|_| UnderlayError::validation("composite surface width exceeds u16"))?;
    let height_u16: u16 = inputs
        .height
        .try_into()
        .map_err(|_| UnderlayError::validation("composite surface height exceeds u16"))?;

    let mut target = vec![255u8; inputs.width as usize * inputs.height as usize * 4];

    if let Some(background) = inputs.background {
        draw_image_stage(&mut target, background, inputs.width, inputs.height, "background");
    }

    for layer in inputs.layers {
        let shaped = match fonts.shape_layer(layer) {
            Ok(shaped) => shaped,
            Err(err) => {
                tracing::warn!(layer = %layer.id, %err, "skipping unshapeable text layer");
                continue;
            }
        };
        if let Err(err) = draw_text_layer(&mut target, layer, &shaped, width_u16, height_u16) {
            tracing::warn!(layer = %layer.id, %err, "skipping text layer");
        }
    }

    if let Some(cutout) = inputs.cutout {
        draw_image_stage(&mut target, cutout, inputs.width, inputs.height, "foreground cutout");
    }

    Ok(Raster {
        width: inputs.width,
        height: inputs.height,
        data: target,
        premultiplied: true,
    })
}

/// Stretch `image` to exactly fill the target and composite it over.
/// Stretching is the defined behavior: both image resources share the
/// upload's aspect ratio, so filling never distorts in practice.
fn draw_image_stage(target: &mut [u8], image: &PreparedImage, width: u32, height: u32, stage: &str) {
    let result = image
        .stretch_to(width, height)
        .and_then(|buf| over_in_place(target, &buf, 1.0));
    if let Err(err) = result {
        tracing::warn!(stage, %err, "skipping image stage");
    }
}

fn draw_text_layer(
    target: &mut [u8],
    layer: &TextLayer,
    shaped: &ShapedLayer,
    width: u16,
    height: u16,
) -> UnderlayResult<()> {
    let base = Affine::translate(layer.position.to_vec2()) * Affine::rotate(layer.rotation.to_radians());

    let text_px = rasterize_glyphs(shaped, base, width, height, None);

    let combined = if layer.text_shadow {
        let shadow_base = Affine::translate(SHADOW_OFFSET) * base;
        let shadow_px = rasterize_glyphs(shaped, shadow_base, width, height, Some(shadow_color()));
        let mut shadow = blur::blur_rgba8_premul(
            &shadow_px,
            u32::from(width),
            u32::from(height),
            SHADOW_BLUR_RADIUS,
            SHADOW_BLUR_SIGMA,
        )?;
        over_in_place(&mut shadow, &text_px, 1.0)?;
        shadow
    } else {
        text_px
    };

    over_in_place(target, &combined, layer.opacity as f32)
}

/// Draw every shaped line into a fresh transparent scratch surface.
///
/// Line offsets compose after the layer transform, so lines rotate together
/// with the layer; the shadow pass overrides the per-run brush color.
fn rasterize_glyphs(
    shaped: &ShapedLayer,
    base: Affine,
    width: u16,
    height: u16,
    paint_override: Option<vello_cpu::peniko::Color>,
) -> Vec<u8> {
    let mut ctx = vello_cpu::RenderContext::new(width, height);

    for line in &shaped.lines {
        let transform = base * Affine::translate(Vec2::new(line.offset_x, line.offset_y));
        ctx.set_transform(to_vello_affine(transform));

        for parley_line in line.layout.lines() {
            for item in parley_line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };

                let paint = paint_override.unwrap_or_else(|| {
                    let brush = run.style().brush;
                    vello_cpu::peniko::Color::from_rgba8(brush.r, brush.g, brush.b, brush.a)
                });
                ctx.set_paint(paint);

                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&shaped.font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
    }

    ctx.flush();
    let mut pixmap = vello_cpu::Pixmap::new(width, height);
    ctx.render_to_pixmap(&mut pixmap);
    pixmap.data_as_u8_slice().to_vec()
}

fn to_vello_affine(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}
