use std::{path::Path, sync::Arc};

use crate::{
    error::{UnderlayError, UnderlayResult},
    model::{TextAlign, TextLayer},
};

/// RGBA8 brush color carried through Parley layout styles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrush {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// One shaped source line, positioned relative to the layer origin.
pub struct ShapedLine {
    pub layout: parley::Layout<TextBrush>,
    /// Alignment offset from the layer origin, in output pixels.
    pub offset_x: f64,
    /// `line_index * font_size * line_height`.
    pub offset_y: f64,
}

/// A fully shaped layer: per-line layouts plus the font used to draw them.
pub struct ShapedLayer {
    pub lines: Vec<ShapedLine>,
    /// Widest line advance, in output pixels.
    pub width: f64,
    /// `line_count * font_size * line_height`.
    pub height: f64,
    pub font: vello_cpu::peniko::FontData,
}

struct RegisteredFamily {
    name: String,
    bytes: Arc<Vec<u8>>,
}

/// Font registration plus text shaping for layer rendering and hit-testing.
///
/// Families are registered from explicit font bytes; the bytes are retained
/// so glyph drawing can rebuild the exact font the layout was shaped with.
/// Requested families that were never registered fall back to the first
/// registered family, mirroring how a browser falls back once its font
/// loading settles.
pub struct FontCatalog {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
    families: Vec<RegisteredFamily>,
}

impl Default for FontCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl FontCatalog {
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            families: Vec::new(),
        }
    }

    /// Register a font from raw bytes; returns the detected family name.
    pub fn register_family(&mut self, font_bytes: Vec<u8>) -> UnderlayResult<String> {
        let bytes = Arc::new(font_bytes);
        let registered = self.font_ctx.collection.register_fonts(
            parley::fontique::Blob::from(bytes.as_ref().clone()),
            None,
        );
        let family_id = registered.first().map(|(id, _)| *id).ok_or_else(|| {
            UnderlayError::validation("no font families registered from font bytes")
        })?;
        let name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| UnderlayError::validation("registered font family has no name"))?
            .to_string();

        match self
            .families
            .iter_mut()
            .find(|f| f.name.eq_ignore_ascii_case(&name))
        {
            Some(existing) => existing.bytes = bytes,
            None => self.families.push(RegisteredFamily {
                name: name.clone(),
                bytes,
            }),
        }
        Ok(name)
    }

    /// Register every `.ttf`/`.otf`/`.ttc` file in `dir`; unreadable or
    /// unparsable files are skipped. Returns the number registered.
    pub fn load_fonts_from_dir(&mut self, dir: &Path) -> usize {
        let Ok(rd) = std::fs::read_dir(dir) else {
            return 0;
        };

        let mut count = 0;
        for entry in rd.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
                continue;
            };
            let ext = ext.to_ascii_lowercase();
            if ext != "ttf" && ext != "otf" && ext != "ttc" {
                continue;
            }
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            if self.register_family(bytes).is_ok() {
                count += 1;
            }
        }
        count
    }

    pub fn family_names(&self) -> impl Iterator<Item = &str> {
        self.families.iter().map(|f| f.name.as_str())
    }

    fn resolve(&self, requested: &str) -> Option<&RegisteredFamily> {
        if let Some(exact) = self
            .families
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(requested))
        {
            return Some(exact);
        }
        let fallback = self.families.first()?;
        tracing::debug!(
            requested,
            fallback = %fallback.name,
            "font family not registered; using fallback"
        );
        Some(fallback)
    }

    /// Readiness gate for export: every layer must be shapeable with the
    /// registered families (fallback counts). The preview path skips this
    /// and renders best-effort instead.
    pub fn ensure_ready<'a>(&self, layers: impl IntoIterator<Item = &'a TextLayer>) -> UnderlayResult<()> {
        for layer in layers {
            if self.resolve(&layer.font_family).is_none() {
                return Err(UnderlayError::validation(format!(
                    "no registered font can render layer '{}' (family '{}')",
                    layer.id, layer.font_family
                )));
            }
        }
        Ok(())
    }

    /// Shape every line of `layer` and place it relative to the layer
    /// origin: line `i` sits at `y = i * font_size * line_height`, with the
    /// x offset determined by `text_align` against the widest line.
    pub fn shape_layer(&mut self, layer: &TextLayer) -> UnderlayResult<ShapedLayer> {
        layer.validate()?;

        let (family_name, font_bytes) = {
            let family = self.resolve(&layer.font_family).ok_or_else(|| {
                UnderlayError::validation(format!(
                    "no registered font for family '{}'",
                    layer.font_family
                ))
            })?;
            (family.name.clone(), family.bytes.clone())
        };

        let brush = TextBrush {
            r: layer.text_color.r,
            g: layer.text_color.g,
            b: layer.text_color.b,
            a: 255,
        };

        let mut layouts = Vec::new();
        for line in layer.lines() {
            let mut builder = self
                .layout_ctx
                .ranged_builder(&mut self.font_ctx, line, 1.0, true);
            builder.push_default(parley::style::StyleProperty::FontStack(
                parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name.clone())),
            ));
            builder.push_default(parley::style::StyleProperty::FontSize(
                layer.font_size as f32,
            ));
            builder.push_default(parley::style::StyleProperty::FontWeight(
                parley::style::FontWeight::new(f32::from(layer.font_weight)),
            ));
            builder.push_default(parley::style::StyleProperty::FontStyle(
                match layer.font_style {
                    crate::model::FontStyle::Normal => parley::style::FontStyle::Normal,
                    crate::model::FontStyle::Italic => parley::style::FontStyle::Italic,
                },
            ));
            builder.push_default(parley::style::StyleProperty::LetterSpacing(
                layer.letter_spacing as f32,
            ));
            builder.push_default(parley::style::StyleProperty::Brush(brush));

            let mut layout: parley::Layout<TextBrush> = builder.build(line);
            layout.break_all_lines(None);
            layouts.push(layout);
        }

        let width = layouts
            .iter()
            .map(|l| f64::from(l.width()))
            .fold(0.0f64, f64::max);
        let advance = layer.line_advance();

        let lines = layouts
            .into_iter()
            .enumerate()
            .map(|(i, layout)| {
                let line_width = f64::from(layout.width());
                let offset_x = match layer.text_align {
                    TextAlign::Left => 0.0,
                    TextAlign::Center => (width - line_width) / 2.0,
                    TextAlign::Right => width - line_width,
                };
                ShapedLine {
                    layout,
                    offset_x,
                    offset_y: i as f64 * advance,
                }
            })
            .collect::<Vec<_>>();

        let height = lines.len() as f64 * advance;
        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(font_bytes.as_ref().clone()),
            0,
        );

        Ok(ShapedLayer {
            lines,
            width,
            height,
            font,
        })
    }

    /// Measured bounding-box size for hit-testing: widest line advance by
    /// `line_count * font_size * line_height`. `None` when the layer cannot
    /// be shaped with the registered fonts.
    pub fn measure(&mut self, layer: &TextLayer) -> Option<(f64, f64)> {
        self.shape_layer(layer)
            .ok()
            .map(|shaped| (shaped.width, shaped.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextLayer;

    /// Well-known font locations for test environments; shaping tests return
    /// early when none exists, since font fixtures cannot be vendored here.
    fn load_any_system_font(catalog: &mut FontCatalog) -> bool {
        let candidates = [
            "/usr/share/fonts/truetype/dejavu",
            "/usr/share/fonts/TTF",
            "/usr/share/fonts/truetype/liberation",
            "/Library/Fonts",
            "C:\\Windows\\Fonts",
        ];
        candidates
            .iter()
            .any(|dir| catalog.load_fonts_from_dir(Path::new(dir)) > 0)
    }

    #[test]
    fn ensure_ready_fails_with_empty_catalog() {
        let catalog = FontCatalog::new();
        let layer = TextLayer::with_defaults("text-1".to_string());
        assert!(catalog.ensure_ready([&layer]).is_err());
        assert!(catalog.ensure_ready(std::iter::empty()).is_ok());
    }

    #[test]
    fn register_family_rejects_garbage_bytes() {
        let mut catalog = FontCatalog::new();
        assert!(catalog.register_family(b"not a font".to_vec()).is_err());
    }

    #[test]
    fn shape_layer_measures_multi_line_blocks() {
        let mut catalog = FontCatalog::new();
        if !load_any_system_font(&mut catalog) {
            return;
        }

        let mut layer = TextLayer::with_defaults("text-1".to_string());
        layer.font_size = 40.0;
        layer.text = "wide line here\nx".to_string();

        let shaped = catalog.shape_layer(&layer).unwrap();
        assert_eq!(shaped.lines.len(), 2);
        assert_eq!(shaped.height, 2.0 * 40.0 * 1.25);
        assert!(shaped.width > 0.0);
        // Short second line never widens the block.
        assert!(f64::from(shaped.lines[1].layout.width()) < shaped.width);
    }

    #[test]
    fn alignment_offsets_follow_the_widest_line() {
        let mut catalog = FontCatalog::new();
        if !load_any_system_font(&mut catalog) {
            return;
        }

        let mut layer = TextLayer::with_defaults("text-1".to_string());
        layer.font_size = 40.0;
        layer.text = "wide line here\nx".to_string();

        layer.text_align = crate::model::TextAlign::Left;
        let left = catalog.shape_layer(&layer).unwrap();
        assert_eq!(left.lines[1].offset_x, 0.0);

        layer.text_align = crate::model::TextAlign::Right;
        let right = catalog.shape_layer(&layer).unwrap();
        let second_width = f64::from(right.lines[1].layout.width());
        assert!((right.lines[1].offset_x - (right.width - second_width)).abs() < 1e-6);

        layer.text_align = crate::model::TextAlign::Center;
        let center = catalog.shape_layer(&layer).unwrap();
        assert!((center.lines[1].offset_x - (center.width - second_width) / 2.0).abs() < 1e-6);
    }

    #[test]
    fn unknown_family_falls_back_to_first_registered() {
        let mut catalog = FontCatalog::new();
        if !load_any_system_font(&mut catalog) {
            return;
        }

        let mut layer = TextLayer::with_defaults("text-1".to_string());
        layer.font_family = "No Such Family".to_string();
        assert!(catalog.ensure_ready([&layer]).is_ok());
        assert!(catalog.measure(&layer).is_some());
    }
}
