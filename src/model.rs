use crate::{
    core::{Point, Vec2},
    error::{UnderlayError, UnderlayResult},
};

/// Offset applied when duplicating a layer, so copies never overlap exactly.
pub const DUPLICATE_OFFSET: Vec2 = Vec2::new(20.0, 20.0);

/// One styled text layer, positioned in output space.
///
/// `position` is the top-left anchor of the first line, in output pixels.
/// The model never clamps positions; only drag operations do.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextLayer {
    pub id: String,
    pub text: String,
    pub position: Point,
    pub font_family: String,
    pub font_size: f64,
    pub font_weight: u16,
    pub font_style: FontStyle,
    pub text_color: Rgb8,
    pub opacity: f64,
    pub rotation: f64,
    pub text_shadow: bool,
    #[serde(default)]
    pub text_align: TextAlign,
    #[serde(default = "default_line_height")]
    pub line_height: f64,
    #[serde(default)]
    pub letter_spacing: f64,
}

fn default_line_height() -> f64 {
    1.25
}

impl TextLayer {
    /// New layer with the editor defaults, owned-id assigned by the store.
    pub fn with_defaults(id: String) -> Self {
        Self {
            id,
            text: "edit".to_string(),
            position: Point::new(100.0, 100.0),
            font_family: "Inter".to_string(),
            font_size: 300.0,
            font_weight: 700,
            font_style: FontStyle::Normal,
            text_color: Rgb8::WHITE,
            opacity: 1.0,
            rotation: 0.0,
            text_shadow: false,
            text_align: TextAlign::Left,
            line_height: default_line_height(),
            letter_spacing: 0.0,
        }
    }

    /// Shallow-merge `patch` into this layer. The id is never patched.
    pub fn apply(&mut self, patch: &TextLayerPatch) {
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(font_family) = &patch.font_family {
            self.font_family = font_family.clone();
        }
        if let Some(font_size) = patch.font_size {
            self.font_size = font_size;
        }
        if let Some(font_weight) = patch.font_weight {
            self.font_weight = font_weight;
        }
        if let Some(font_style) = patch.font_style {
            self.font_style = font_style;
        }
        if let Some(text_color) = patch.text_color {
            self.text_color = text_color;
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity;
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation;
        }
        if let Some(text_shadow) = patch.text_shadow {
            self.text_shadow = text_shadow;
        }
        if let Some(text_align) = patch.text_align {
            self.text_align = text_align;
        }
        if let Some(line_height) = patch.line_height {
            self.line_height = line_height;
        }
        if let Some(letter_spacing) = patch.letter_spacing {
            self.letter_spacing = letter_spacing;
        }
    }

    pub fn validate(&self) -> UnderlayResult<()> {
        if self.id.trim().is_empty() {
            return Err(UnderlayError::validation("layer id must be non-empty"));
        }
        if !self.position.x.is_finite() || !self.position.y.is_finite() {
            return Err(UnderlayError::validation("layer position must be finite"));
        }
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(UnderlayError::validation(
                "font_size must be finite and > 0",
            ));
        }
        if !(100..=900).contains(&self.font_weight) {
            return Err(UnderlayError::validation(
                "font_weight must be within 100..=900",
            ));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(UnderlayError::validation("opacity must be within [0, 1]"));
        }
        if !self.rotation.is_finite() {
            return Err(UnderlayError::validation("rotation must be finite"));
        }
        if !self.line_height.is_finite() || self.line_height <= 0.0 {
            return Err(UnderlayError::validation(
                "line_height must be finite and > 0",
            ));
        }
        if !self.letter_spacing.is_finite() {
            return Err(UnderlayError::validation("letter_spacing must be finite"));
        }
        Ok(())
    }

    /// Newline-separated lines, in draw order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }

    /// Vertical advance between successive line tops, in output pixels.
    pub fn line_advance(&self) -> f64 {
        self.font_size * self.line_height
    }
}

/// Partial update for [`TextLayer`]; `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextLayerPatch {
    pub text: Option<String>,
    pub position: Option<Point>,
    pub font_family: Option<String>,
    pub font_size: Option<f64>,
    pub font_weight: Option<u16>,
    pub font_style: Option<FontStyle>,
    pub text_color: Option<Rgb8>,
    pub opacity: Option<f64>,
    pub rotation: Option<f64>,
    pub text_shadow: Option<bool>,
    pub text_align: Option<TextAlign>,
    pub line_height: Option<f64>,
    pub letter_spacing: Option<f64>,
}

impl TextLayerPatch {
    pub fn position(position: Point) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Opaque RGB color, serialized as a `#RRGGBB` hex string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
    };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn from_hex(s: &str) -> UnderlayResult<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(UnderlayError::validation(format!(
                "color must be a #RRGGBB hex string, got '{s}'"
            )));
        }
        match (
            u8::from_str_radix(&hex[0..2], 16),
            u8::from_str_radix(&hex[2..4], 16),
            u8::from_str_radix(&hex[4..6], 16),
        ) {
            (Ok(r), Ok(g), Ok(b)) => Ok(Self { r, g, b }),
            _ => Err(UnderlayError::validation(format!(
                "color must be a #RRGGBB hex string, got '{s}'"
            ))),
        }
    }
}

impl serde::Serialize for Rgb8 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Rgb8 {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
