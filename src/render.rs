// ============================================================================
// COMPOSITION EXPORT — flatten background + text overlays into one raster
// ============================================================================

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ab_glyph::{Font, FontArc, GlyphId, ScaleFont, point};
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageError, Rgba, RgbaImage};

use crate::coords::{ContainerBounds, PercentRect, PixelRect};
use crate::model::{Subject, TextAlign, TextElement, TextElements, parse_hex_color};
use crate::log_warn;

/// Outline colour of the subject guide (green-400).
const SUBJECT_GUIDE_COLOR: Rgba<u8> = Rgba([74, 222, 128, 255]);
const GUIDE_DASH: u32 = 6;
const GUIDE_THICKNESS: u32 = 2;
/// Weights at or above this get a synthetic one-pixel embolden.
const BOLD_WEIGHT: u16 = 600;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("cannot read font {path}: {source}")]
    FontRead {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid font file {0}")]
    InvalidFont(String),
}

#[derive(Clone, Debug, Default)]
pub struct RenderOptions {
    /// Width that `vw` font sizes resolve against. Defaults to the image width.
    pub viewport_width: Option<f32>,
    /// Draw the dashed subject box.
    pub show_subject: bool,
}

pub fn load_font(path: &Path) -> Result<FontArc, RenderError> {
    let bytes = std::fs::read(path).map_err(|source| RenderError::FontRead {
        path: path.display().to_string(),
        source,
    })?;
    FontArc::try_from_vec(bytes).map_err(|_| RenderError::InvalidFont(path.display().to_string()))
}

/// Draw every text element over `background`, in collection order.
/// Without a font only the background (and subject guide) are produced.
pub fn flatten(
    background: &RgbaImage,
    elements: &TextElements,
    subject: Option<&Subject>,
    font: Option<&FontArc>,
    options: &RenderOptions,
) -> RgbaImage {
    let mut canvas = background.clone();
    let (w, h) = canvas.dimensions();
    let bounds = ContainerBounds::sized(w as f32, h as f32);

    if options.show_subject {
        if let Some(subject) = subject {
            draw_dashed_rect(&mut canvas, subject.rect().to_pixels(&bounds), SUBJECT_GUIDE_COLOR);
        }
    }

    match font {
        Some(font) => {
            let viewport = options.viewport_width.unwrap_or(w as f32);
            for el in elements.iter() {
                draw_text_element(&mut canvas, font, el, &bounds, viewport);
            }
        }
        None if !elements.is_empty() => {
            log_warn!("No font available, exporting background without text overlays");
        }
        None => {}
    }
    canvas
}

// -- Text layout ----------------------------------------------------------------

/// Glyphs of one line with kerning applied, positioned from x = 0.
fn layout_line(font: &FontArc, text: &str, font_size: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(font_size);
    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, id);
        }
        glyphs.push((id, cursor_x));
        cursor_x += scaled.h_advance(id);
        last_glyph = Some(id);
    }
    (glyphs, cursor_x)
}

/// Greedy word wrap. Explicit newlines always break; a single word wider
/// than `max_width` gets a line of its own.
pub fn wrap_lines(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{current} {word}");
            if measure(&candidate) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
            }
        }
        lines.push(current);
    }
    lines
}

/// Left edge of a line of width `line_w` inside `rect`.
pub fn line_start_x(align: TextAlign, rect: &PixelRect, line_w: f32) -> f32 {
    match align {
        TextAlign::Left => rect.min_x,
        TextAlign::Center => (rect.min_x + rect.max_x) * 0.5 - line_w * 0.5,
        TextAlign::Right => rect.max_x - line_w,
    }
}

fn draw_text_element(
    canvas: &mut RgbaImage,
    font: &FontArc,
    el: &TextElement,
    bounds: &ContainerBounds,
    viewport_width: f32,
) {
    let font_size = el.font_size / 100.0 * viewport_width;
    if font_size <= 0.0 || el.content.trim().is_empty() {
        return;
    }
    let Some(color) = parse_hex_color(&el.color) else {
        log_warn!("Text element {} has unparseable colour {:?}, skipped", el.id, el.color);
        return;
    };

    let scaled = font.as_scaled(font_size);
    let ascent = scaled.ascent();
    let line_height = scaled.height() + scaled.line_gap();

    // Width-only box: the block is vertically centred on the element's y.
    let rect = PercentRect {
        x: el.x,
        y: el.y,
        width: el.width,
        height: 0.0,
    }
    .to_pixels(bounds);
    let centre_y = rect.min_y;

    let lines = wrap_lines(&el.content, rect.width(), |s| layout_line(font, s, font_size).1);
    let block_h = line_height * lines.len() as f32;
    let top = centre_y - block_h * 0.5;
    let bold = el.font_weight >= BOLD_WEIGHT;

    for (i, line) in lines.iter().enumerate() {
        let (glyphs, line_w) = layout_line(font, line, font_size);
        let origin_x = line_start_x(el.text_align, &rect, line_w);
        let baseline = top + ascent + i as f32 * line_height;
        for (id, gx) in glyphs {
            let glyph = id.with_scale_and_position(font_size, point(origin_x + gx, baseline));
            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let b = outlined.px_bounds();
            outlined.draw(|px, py, cov| {
                let x = b.min.x as i32 + px as i32;
                let y = b.min.y as i32 + py as i32;
                blend_pixel(canvas, x, y, color, cov);
                if bold {
                    blend_pixel(canvas, x + 1, y, color, cov);
                }
            });
        }
    }
}

/// Source-over blend of `color` at `coverage` (0–1).
fn blend_pixel(canvas: &mut RgbaImage, x: i32, y: i32, color: [u8; 4], coverage: f32) {
    if x < 0 || y < 0 || x as u32 >= canvas.width() || y as u32 >= canvas.height() {
        return;
    }
    let a = (color[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if a <= 0.0 {
        return;
    }
    let dst = canvas.get_pixel_mut(x as u32, y as u32);
    let da = dst.0[3] as f32 / 255.0;
    let out_a = a + da * (1.0 - a);
    for c in 0..3 {
        let src = color[c] as f32;
        let d = dst.0[c] as f32;
        let v = (src * a + d * da * (1.0 - a)) / out_a.max(1e-6);
        dst.0[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

fn draw_dashed_rect(canvas: &mut RgbaImage, rect: PixelRect, color: Rgba<u8>) {
    let (w, h) = canvas.dimensions();
    if w == 0 || h == 0 || rect.width() <= 0.0 || rect.height() <= 0.0 {
        return;
    }
    let clamp_x = |v: f32| (v.round().max(0.0) as u32).min(w - 1);
    let clamp_y = |v: f32| (v.round().max(0.0) as u32).min(h - 1);
    let (x0, x1) = (clamp_x(rect.min_x), clamp_x(rect.max_x));
    let (y0, y1) = (clamp_y(rect.min_y), clamp_y(rect.max_y));
    let on = |i: u32| (i / GUIDE_DASH) % 2 == 0;

    for t in 0..GUIDE_THICKNESS {
        for x in x0..=x1 {
            if on(x - x0) {
                canvas.put_pixel(x, (y0 + t).min(h - 1), color);
                canvas.put_pixel(x, y1.saturating_sub(t), color);
            }
        }
        for y in y0..=y1 {
            if on(y - y0) {
                canvas.put_pixel((x0 + t).min(w - 1), y, color);
                canvas.put_pixel(x1.saturating_sub(t), y, color);
            }
        }
    }
}

/// Encode `image` as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(buf)
}

/// Write `image` as PNG.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), ImageError> {
    let bytes = encode_png(image)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 10 px per character, no font needed.
    fn mono(s: &str) -> f32 {
        s.chars().count() as f32 * 10.0
    }

    #[test]
    fn wraps_on_width_and_newlines() {
        let lines = wrap_lines("big summer sale\nnow on", 100.0, mono);
        assert_eq!(lines, vec!["big summer", "sale", "now on"]);
    }

    #[test]
    fn overlong_word_gets_own_line() {
        let lines = wrap_lines("a supercalifragilistic b", 50.0, mono);
        assert_eq!(lines, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn alignment_within_box() {
        let rect = PixelRect { min_x: 100.0, min_y: 0.0, max_x: 300.0, max_y: 0.0 };
        assert_eq!(line_start_x(TextAlign::Left, &rect, 50.0), 100.0);
        assert_eq!(line_start_x(TextAlign::Center, &rect, 50.0), 175.0);
        assert_eq!(line_start_x(TextAlign::Right, &rect, 50.0), 250.0);
    }

    #[test]
    fn blend_respects_coverage() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
        blend_pixel(&mut img, 0, 0, [255, 255, 255, 255], 1.0);
        blend_pixel(&mut img, 1, 0, [255, 255, 255, 255], 0.5);
        blend_pixel(&mut img, 5, 5, [255, 255, 255, 255], 1.0);
        assert_eq!(*img.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        let mid = img.get_pixel(1, 0).0;
        assert!((126..=129).contains(&mid[0]) && mid[3] == 255);
    }

    #[test]
    fn flatten_without_font_keeps_background_and_draws_guide() {
        let bg = RgbaImage::from_pixel(100, 100, Rgba([10, 10, 10, 255]));
        let subject = Subject { x: 50.0, y: 50.0, width: 40.0, height: 40.0 };
        let out = flatten(
            &bg,
            &TextElements::default(),
            Some(&subject),
            None,
            &RenderOptions { viewport_width: None, show_subject: true },
        );
        assert_eq!(*out.get_pixel(30, 30), SUBJECT_GUIDE_COLOR);
        assert_eq!(*out.get_pixel(50, 50), Rgba([10, 10, 10, 255]));

        let plain = flatten(&bg, &TextElements::default(), Some(&subject), None, &RenderOptions::default());
        assert_eq!(plain, bg);
    }

    #[test]
    fn collapsed_subject_box_draws_no_guide() {
        let bg = RgbaImage::from_pixel(100, 100, Rgba([10, 10, 10, 255]));
        let flat = Subject { x: 50.0, y: 50.0, width: 40.0, height: 0.0 };
        let out = flatten(
            &bg,
            &TextElements::default(),
            Some(&flat),
            None,
            &RenderOptions { viewport_width: None, show_subject: true },
        );
        assert_eq!(out, bg);
    }

    #[test]
    fn png_bytes_decode_back() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        let bytes = encode_png(&img).unwrap();
        let back = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(back, img);
    }
}
