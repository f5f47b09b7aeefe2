// ============================================================================
// TEMPLATE DATA MODEL
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::coords::{PercentPoint, PercentRect};
use crate::data_uri::DataUri;

/// Offered after the template's own font suggestions.
pub const FALLBACK_FONTS: &[&str] = &[
    "Arial, sans-serif",
    "Verdana, sans-serif",
    "Georgia, serif",
    "'Times New Roman', serif",
    "'Courier New', monospace",
];

/// Used when analysis returns no palette.
pub const FALLBACK_PALETTE: &[&str] = &["#FFFFFF", "#000000", "#3B82F6", "#10B981", "#F59E0B"];

/// Used when analysis returns no font suggestions.
pub const FALLBACK_RECOMMENDED_FONTS: &[&str] = &["Arial", "Helvetica", "sans-serif"];

/// Horizontal text alignment inside an element's box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl TextAlign {
    pub fn label(&self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        }
    }
}

/// One positioned, styled text block. Position is the centre of the block,
/// in percent of the container; `font_size` is in viewport-width units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    pub id: String,
    pub content: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    pub font_size: f32,
    pub color: String,
    pub font_family: String,
    pub font_weight: u16,
    pub text_align: TextAlign,
}

impl TextElement {
    pub fn position(&self) -> PercentPoint {
        PercentPoint::new(self.x, self.y)
    }

    /// Box used for hit testing. Without an explicit height the block is
    /// assumed to be one line tall, taking the font size as percent of the
    /// container width.
    pub fn bounds(&self, aspect: f32) -> PercentRect {
        let height = self
            .height
            .unwrap_or_else(|| self.font_size * 1.2 * aspect.max(0.0));
        PercentRect {
            x: self.x,
            y: self.y,
            width: self.width,
            height,
        }
    }

    /// Merge the fields present in `patch`.
    pub fn apply(&mut self, patch: &TextElementPatch) {
        if let Some(ref content) = patch.content {
            self.content = content.clone();
        }
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(width) = patch.width {
            self.width = width;
        }
        if let Some(height) = patch.height {
            self.height = Some(height);
        }
        if let Some(font_size) = patch.font_size {
            self.font_size = font_size;
        }
        if let Some(ref color) = patch.color {
            self.color = color.clone();
        }
        if let Some(ref family) = patch.font_family {
            self.font_family = family.clone();
        }
        if let Some(weight) = patch.font_weight {
            self.font_weight = weight;
        }
        if let Some(align) = patch.text_align {
            self.text_align = align;
        }
    }
}

/// Partial update for a [`TextElement`]. The id is not patchable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextElementPatch {
    pub content: Option<String>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub font_size: Option<f32>,
    pub color: Option<String>,
    pub font_family: Option<String>,
    pub font_weight: Option<u16>,
    pub text_align: Option<TextAlign>,
}

impl TextElementPatch {
    pub fn position(p: PercentPoint) -> Self {
        Self {
            x: Some(p.x),
            y: Some(p.y),
            ..Default::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn color(color: impl Into<String>) -> Self {
        Self {
            color: Some(color.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Ordered text element collection. Order is z-order: later elements paint
/// over earlier ones. Elements are never removed individually.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextElements {
    items: Vec<TextElement>,
}

impl TextElements {
    pub fn new(items: Vec<TextElement>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TextElement> {
        self.items.iter()
    }

    pub fn first(&self) -> Option<&TextElement> {
        self.items.first()
    }

    pub fn get(&self, id: &str) -> Option<&TextElement> {
        self.items.iter().find(|el| el.id == id)
    }

    /// Merge `patch` into the element with `id`. Returns false (and changes
    /// nothing) for an unknown id.
    pub fn update(&mut self, id: &str, patch: &TextElementPatch) -> bool {
        match self.items.iter_mut().find(|el| el.id == id) {
            Some(el) => {
                el.apply(patch);
                true
            }
            None => false,
        }
    }

    /// All non-blank contents joined with a space.
    pub fn text_context(&self) -> String {
        self.items
            .iter()
            .map(|el| el.content.trim())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Bounding box of the detected main subject. Advisory only.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Subject {
    pub fn rect(&self) -> PercentRect {
        PercentRect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// Result of analyzing a reference image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    /// Always a fully decoded image: the original or its latest remix.
    pub generated_image_url: DataUri,
    pub text_elements: TextElements,
    pub recommended_fonts: Vec<String>,
    pub color_palette: Vec<String>,
    pub style_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
}

impl Template {
    pub fn new_id() -> String {
        format!("template-{}", uuid::Uuid::new_v4())
    }

    /// The only mutation a template sees after creation.
    pub fn replace_image(&mut self, image: DataUri) {
        self.generated_image_url = image;
    }

    /// Recommended fonts followed by the fallback list, without duplicates.
    pub fn font_choices(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let fallbacks = FALLBACK_FONTS.iter().map(|s| s.to_string());
        for font in self.recommended_fonts.iter().cloned().chain(fallbacks) {
            if !out.contains(&font) {
                out.push(font);
            }
        }
        out
    }

    pub fn palette(&self) -> Vec<String> {
        if self.color_palette.is_empty() {
            FALLBACK_PALETTE.iter().map(|s| s.to_string()).collect()
        } else {
            self.color_palette.clone()
        }
    }
}

/// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA` into RGBA.
pub fn parse_hex_color(s: &str) -> Option<[u8; 4]> {
    let hex = s.trim().strip_prefix('#')?;
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        3 => {
            let mut out = [255u8; 4];
            for (i, ch) in hex.chars().enumerate() {
                let v = ch.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(out)
        }
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
        8 => Some([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn element(id: &str, x: f32, y: f32) -> TextElement {
        TextElement {
            id: id.to_string(),
            content: format!("content of {id}"),
            x,
            y,
            width: 40.0,
            height: Some(10.0),
            font_size: 4.0,
            color: "#FFFFFF".to_string(),
            font_family: "sans-serif".to_string(),
            font_weight: 400,
            text_align: TextAlign::Center,
        }
    }

    #[test]
    fn update_merges_only_given_fields() {
        let mut els = TextElements::new(vec![element("a", 10.0, 20.0)]);
        let patch = TextElementPatch {
            content: Some("Hello".into()),
            font_size: Some(6.5),
            ..Default::default()
        };
        assert!(els.update("a", &patch));
        let a = els.get("a").unwrap();
        assert_eq!(a.content, "Hello");
        assert_eq!(a.font_size, 6.5);
        assert_eq!((a.x, a.y), (10.0, 20.0));
        assert_eq!(a.color, "#FFFFFF");
    }

    #[test]
    fn update_with_unknown_id_changes_nothing() {
        let mut els = TextElements::new(vec![element("a", 10.0, 20.0), element("b", 1.0, 2.0)]);
        let before = els.clone();
        assert!(!els.update("zzz", &TextElementPatch::content("x")));
        assert_eq!(els, before);
    }

    #[test]
    fn text_context_skips_blank_contents() {
        let mut a = element("a", 0.0, 0.0);
        a.content = "Summer".into();
        let mut b = element("b", 0.0, 0.0);
        b.content = "   ".into();
        let mut c = element("c", 0.0, 0.0);
        c.content = " Sale ".into();
        assert_eq!(TextElements::new(vec![a, b, c]).text_context(), "Summer Sale");
    }

    #[test]
    fn template_serializes_with_camel_case_keys() {
        let t = Template {
            id: "template-1".into(),
            generated_image_url: DataUri::new("image/png", vec![1, 2, 3]),
            text_elements: TextElements::new(vec![element("text-1", 50.0, 50.0)]),
            recommended_fonts: vec![],
            color_palette: vec![],
            style_description: "flat".into(),
            subject: None,
        };
        let json = serde_json::to_value(&t).unwrap();
        assert!(json.get("generatedImageUrl").unwrap().as_str().unwrap().starts_with("data:image/png;base64,"));
        let el = &json["textElements"][0];
        assert_eq!(el["fontSize"], 4.0);
        assert_eq!(el["textAlign"], "center");
        assert!(json.get("subject").is_none());
        let back: Template = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn font_choices_dedupe_and_palette_fallback() {
        let t = Template {
            id: "t".into(),
            generated_image_url: DataUri::new("image/png", vec![]),
            text_elements: TextElements::default(),
            recommended_fonts: vec!["Georgia, serif".into(), "Lobster".into()],
            color_palette: vec![],
            style_description: String::new(),
            subject: None,
        };
        let fonts = t.font_choices();
        assert_eq!(fonts[0], "Georgia, serif");
        assert_eq!(fonts[1], "Lobster");
        assert_eq!(fonts.iter().filter(|f| f.as_str() == "Georgia, serif").count(), 1);
        assert_eq!(t.palette().len(), FALLBACK_PALETTE.len());
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#FF8000"), Some([255, 128, 0, 255]));
        assert_eq!(parse_hex_color("#fff"), Some([255, 255, 255, 255]));
        assert_eq!(parse_hex_color("#00000080"), Some([0, 0, 0, 128]));
        assert_eq!(parse_hex_color("red"), None);
        assert_eq!(parse_hex_color("#12345"), None);
    }
}
