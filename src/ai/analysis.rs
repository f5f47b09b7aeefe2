// ============================================================================
// Template analysis — reference image → structured Template
// ============================================================================
//
// Three steps:
//   1. structured analysis (style, text regions, subject, palette, fonts)
//   2. if text was found, inpaint it away using a mask built from the
//      detected boxes, so the background can host editable overlays
//   3. map the loosely-typed answer into a Template, filling defaults

use image::{Rgba, RgbaImage};
use serde::Deserialize;
use serde_json::json;

use super::{GatewayError, GenerativeBackend, Part};
use crate::data_uri::DataUri;
use crate::model::{
    FALLBACK_PALETTE, FALLBACK_RECOMMENDED_FONTS, Subject, Template, TextAlign, TextElement,
    TextElements,
};
use crate::{log_info, log_warn};

const ANALYSIS_PROMPT: &str = "Analyze the provided image. Describe its style, identify all text \
elements with their properties including bounding boxes (x, y, width, height), extract the main \
color palette, suitable fonts, and identify the bounding box of the main subject. If no text is \
found, return an empty array for text_elements. If no single main subject is clear, omit the \
subject field.";

const DEFAULT_STYLE_DESCRIPTION: &str = "a modern, clean style";
const DEFAULT_ELEMENT_CONTENT: &str = "Edit text";
const PLACEHOLDER_CONTENT: &str = "Enter a title";

// -- Wire shape of the analysis answer --------------------------------------
//
// Every field is optional: the model is asked for a schema but is not
// trusted to honour it.

#[derive(Debug, Default, Deserialize)]
pub struct RawAnalysis {
    pub style_description: Option<String>,
    pub text_elements: Option<Vec<RawTextElement>>,
    pub subject: Option<RawSubject>,
    pub color_palette: Option<Vec<String>>,
    pub recommended_fonts: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawTextElement {
    pub content: Option<String>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub font_suggestion: Option<String>,
    pub font_weight: Option<f32>,
    pub font_size_vw: Option<f32>,
    pub color_hex: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct RawSubject {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
}

/// JSON schema sent with the analysis request.
pub fn analysis_schema() -> serde_json::Value {
    let box_props = |what: &str| {
        json!({
            "x": { "type": "NUMBER", "description": format!("The horizontal position of the {what}'s center as a percentage from the left (0-100).") },
            "y": { "type": "NUMBER", "description": format!("The vertical position of the {what}'s center as a percentage from the top (0-100).") },
            "width": { "type": "NUMBER", "description": format!("The width of the {what} as a percentage of the image width (0-100).") },
            "height": { "type": "NUMBER", "description": format!("The height of the {what} as a percentage of the image height (0-100).") }
        })
    };
    let mut text_props = box_props("text block");
    if let Some(obj) = text_props.as_object_mut() {
        obj.insert("content".into(), json!({ "type": "STRING", "description": "The detected text content." }));
        obj.insert("font_suggestion".into(), json!({ "type": "STRING", "description": "A suggestion for a font family." }));
        obj.insert("font_weight".into(), json!({ "type": "NUMBER", "description": "A suggestion for font weight." }));
        obj.insert("font_size_vw".into(), json!({ "type": "NUMBER", "description": "A suggested font size relative to viewport width (vw)." }));
        obj.insert("color_hex".into(), json!({ "type": "STRING", "description": "The hex code of the text color." }));
    }
    json!({
        "type": "OBJECT",
        "properties": {
            "style_description": { "type": "STRING", "description": "A detailed description of the background style, mood, textures, and overall aesthetic." },
            "text_elements": { "type": "ARRAY", "items": { "type": "OBJECT", "properties": text_props } },
            "subject": { "type": "OBJECT", "description": "Bounding box for the main subject.", "properties": box_props("box") },
            "color_palette": { "type": "ARRAY", "items": { "type": "STRING" }, "description": "An array of 5 prominent hex color codes." },
            "recommended_fonts": { "type": "ARRAY", "items": { "type": "STRING" }, "description": "An array of 3-4 font family names." }
        }
    })
}

pub fn parse_analysis(raw: &str) -> Result<RawAnalysis, GatewayError> {
    serde_json::from_str(raw.trim()).map_err(|e| {
        log_warn!("Failed to parse analysis JSON: {} (raw: {})", e, raw);
        GatewayError::InvalidAnalysis(e.to_string())
    })
}

fn inpainting_prompt(style: &str) -> String {
    format!(
        "This is an image with text elements masked out. Your task is to perform inpainting. \
         Fill in the masked areas to seamlessly match the surrounding background and textures. \
         The overall style of the image is described as: '{style}'. Do not generate any new text \
         or objects; simply reconstruct the background where the text used to be."
    )
}

/// Black image with the detected text boxes filled white, at the image's
/// pixel size. Elements without a usable box contribute nothing.
pub fn text_region_mask(elements: &[RawTextElement], width: u32, height: u32) -> RgbaImage {
    let mut mask = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
    let (wf, hf) = (width as f32, height as f32);
    for el in elements {
        let (Some(x), Some(y), Some(w), Some(h)) = (el.x, el.y, el.width, el.height) else {
            continue;
        };
        let bw = w / 100.0 * wf;
        let bh = h / 100.0 * hf;
        let left = x / 100.0 * wf - bw / 2.0;
        let top = y / 100.0 * hf - bh / 2.0;
        let x0 = left.max(0.0).round() as u32;
        let y0 = top.max(0.0).round() as u32;
        let x1 = ((left + bw).round().max(0.0) as u32).min(width);
        let y1 = ((top + bh).round().max(0.0) as u32).min(height);
        for py in y0..y1 {
            for px in x0..x1 {
                mask.put_pixel(px, py, Rgba([255, 255, 255, 255]));
            }
        }
    }
    mask
}

// Missing and zero values both fall back to the default.
fn num_or(v: Option<f32>, default: f32) -> f32 {
    v.filter(|n| *n != 0.0 && n.is_finite()).unwrap_or(default)
}

fn str_or(v: Option<&str>, default: &str) -> String {
    match v {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => default.to_string(),
    }
}

fn non_empty(v: Option<Vec<String>>) -> Option<Vec<String>> {
    v.filter(|list| !list.is_empty())
}

fn to_subject(raw: RawSubject) -> Option<Subject> {
    Some(Subject {
        x: raw.x?,
        y: raw.y?,
        width: raw.width?,
        height: raw.height?,
    })
}

/// Map a parsed analysis onto a Template whose background is `image`.
pub fn build_template(analysis: RawAnalysis, image: DataUri) -> Template {
    let raw_elements = analysis.text_elements.unwrap_or_default();
    let palette = non_empty(analysis.color_palette);
    let fonts = non_empty(analysis.recommended_fonts);

    let mut elements: Vec<TextElement> = raw_elements
        .iter()
        .enumerate()
        .map(|(i, el)| TextElement {
            id: format!("text-{}", i + 1),
            content: str_or(el.content.as_deref(), DEFAULT_ELEMENT_CONTENT),
            x: num_or(el.x, 10.0),
            y: num_or(el.y, 10.0 + i as f32 * 20.0),
            width: num_or(el.width, 80.0),
            height: Some(num_or(el.height, 10.0)),
            font_size: num_or(el.font_size_vw, 4.0),
            color: str_or(el.color_hex.as_deref(), "#FFFFFF"),
            font_family: str_or(el.font_suggestion.as_deref(), "sans-serif"),
            font_weight: num_or(el.font_weight, 400.0).round().clamp(1.0, 1000.0) as u16,
            text_align: TextAlign::Center,
        })
        .collect();

    if elements.is_empty() {
        let first_color = palette.as_ref().and_then(|p| p.first()).map(String::as_str);
        let first_font = fonts.as_ref().and_then(|f| f.first()).map(String::as_str);
        elements.push(TextElement {
            id: "text-1".to_string(),
            content: PLACEHOLDER_CONTENT.to_string(),
            x: 50.0,
            y: 50.0,
            width: 80.0,
            height: Some(15.0),
            font_size: 5.0,
            color: str_or(first_color, "#FFFFFF"),
            font_family: str_or(first_font, "sans-serif"),
            font_weight: 700,
            text_align: TextAlign::Center,
        });
    }

    Template {
        id: Template::new_id(),
        generated_image_url: image,
        text_elements: TextElements::new(elements),
        recommended_fonts: fonts
            .unwrap_or_else(|| FALLBACK_RECOMMENDED_FONTS.iter().map(|s| s.to_string()).collect()),
        color_palette: palette.unwrap_or_else(|| FALLBACK_PALETTE.iter().map(|s| s.to_string()).collect()),
        style_description: str_or(analysis.style_description.as_deref(), DEFAULT_STYLE_DESCRIPTION),
        subject: analysis.subject.and_then(to_subject),
    }
}

/// Derive a template from a reference image.
pub fn analyze_image(backend: &dyn GenerativeBackend, image: &DataUri) -> Result<Template, GatewayError> {
    log_info!("Analyzing reference image ({}, {} bytes)", image.mime(), image.bytes().len());
    let raw = backend.generate_json(
        &[Part::Image(image.clone()), Part::text(ANALYSIS_PROMPT)],
        &analysis_schema(),
    )?;
    let analysis = parse_analysis(&raw)?;

    let mut background = image.clone();
    let regions = analysis.text_elements.as_deref().unwrap_or_default();
    if !regions.is_empty() {
        log_info!("{} text region(s) detected, inpainting them out", regions.len());
        let decoded = image.decode_image()?;
        let mask = text_region_mask(regions, decoded.width(), decoded.height());
        let mask_uri = DataUri::from_png(&mask)?;
        let style = str_or(analysis.style_description.as_deref(), DEFAULT_STYLE_DESCRIPTION);
        let parts = [
            Part::Image(image.clone()),
            Part::Image(mask_uri),
            Part::Text(inpainting_prompt(&style)),
        ];
        match backend.generate_image(&parts)? {
            Some(inpainted) => background = inpainted,
            None => log_warn!("Inpainting returned no image, keeping the original background"),
        }
    }

    Ok(build_template(analysis, background))
}
