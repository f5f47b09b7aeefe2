// ============================================================================
// MASKING SURFACE — free-hand painted region exported for AI edits
// ============================================================================
//
// The surface is a binary coverage raster (0 = unpainted, 255 = painted) the
// pixel size of the container. Strokes are driven through an explicit
// `Idle → Active → Idle` state machine so any event source (GUI, CLI, tests)
// can drive it.
//
// A surface without a raster stands in for an environment with no drawing
// context: every operation is then a no-op and exports yield `None`.

use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::coords::PixelPoint;
use crate::data_uri::DataUri;

/// Colour of painted pixels in the exported mask (purple-500).
pub const MASK_COLOR: Rgba<u8> = Rgba([168, 85, 247, 255]);

pub const DEFAULT_BRUSH_SIZE: f32 = 40.0;

const PAINTED: u8 = 255;
const UNPAINTED: u8 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MaskTool {
    /// Adds coverage.
    #[default]
    Paint,
    /// Removes coverage. Only affects the mask, never the image beneath it.
    Erase,
}

impl MaskTool {
    pub fn label(&self) -> &'static str {
        match self {
            MaskTool::Paint => "Brush",
            MaskTool::Erase => "Eraser",
        }
    }

    fn value(self) -> u8 {
        match self {
            MaskTool::Paint => PAINTED,
            MaskTool::Erase => UNPAINTED,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum StrokeState {
    Idle,
    /// The tool is captured when the stroke begins.
    Active { last: PixelPoint, tool: MaskTool },
}

pub struct MaskSurface {
    raster: Option<GrayImage>,
    tool: MaskTool,
    brush_size: f32,
    stroke: StrokeState,
}

impl MaskSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            raster: Some(GrayImage::new(width, height)),
            tool: MaskTool::default(),
            brush_size: DEFAULT_BRUSH_SIZE,
            stroke: StrokeState::Idle,
        }
    }

    /// A surface with no drawing context.
    pub fn unavailable() -> Self {
        Self {
            raster: None,
            tool: MaskTool::default(),
            brush_size: DEFAULT_BRUSH_SIZE,
            stroke: StrokeState::Idle,
        }
    }

    pub fn is_available(&self) -> bool {
        self.raster.is_some()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.raster.as_ref().map(|r| r.dimensions())
    }

    pub fn coverage(&self) -> Option<&GrayImage> {
        self.raster.as_ref()
    }

    pub fn tool(&self) -> MaskTool {
        self.tool
    }

    /// Takes effect on the next stroke.
    pub fn set_tool(&mut self, tool: MaskTool) {
        self.tool = tool;
    }

    pub fn brush_size(&self) -> f32 {
        self.brush_size
    }

    pub fn set_brush_size(&mut self, size: f32) {
        self.brush_size = size.max(0.0);
    }

    pub fn is_stroking(&self) -> bool {
        matches!(self.stroke, StrokeState::Active { .. })
    }

    // -- Stroke state machine ------------------------------------------------

    /// Pointer down. Paints a dot so a tap leaves a visible mark.
    pub fn begin_stroke(&mut self, point: PixelPoint) {
        if self.raster.is_none() {
            return;
        }
        let tool = self.tool;
        self.stroke = StrokeState::Active { last: point, tool };
        self.stamp_segment(point, point, tool);
    }

    /// Pointer move. Ignored unless a stroke is active.
    pub fn continue_stroke(&mut self, point: PixelPoint) {
        if let StrokeState::Active { last, tool } = self.stroke {
            self.stamp_segment(last, point, tool);
            self.stroke = StrokeState::Active { last: point, tool };
        }
    }

    /// Pointer up / leave.
    pub fn end_stroke(&mut self) {
        self.stroke = StrokeState::Idle;
    }

    // -- Whole-surface operations --------------------------------------------

    pub fn clear(&mut self) {
        if let Some(raster) = self.raster.as_mut() {
            let data: &mut [u8] = raster;
            data.par_iter_mut().for_each(|v| *v = UNPAINTED);
        }
    }

    /// XOR the entire surface: painted ↔ unpainted, including pixels no
    /// stroke ever touched.
    pub fn invert(&mut self) {
        if let Some(raster) = self.raster.as_mut() {
            let data: &mut [u8] = raster;
            data.par_iter_mut().for_each(|v| *v = PAINTED - *v);
        }
    }

    /// Replace the surface with a blank one of the new size. Content and any
    /// in-progress stroke are dropped.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.raster.is_none() {
            return;
        }
        self.raster = Some(GrayImage::new(width, height));
        self.stroke = StrokeState::Idle;
    }

    /// Full scan for any painted pixel.
    pub fn has_coverage(&self) -> bool {
        self.raster
            .as_ref()
            .map(|r| r.as_raw().par_iter().any(|&v| v > UNPAINTED))
            .unwrap_or(false)
    }

    pub fn painted_pixel_count(&self) -> usize {
        self.raster
            .as_ref()
            .map(|r| r.as_raw().par_iter().filter(|&&v| v > UNPAINTED).count())
            .unwrap_or(0)
    }

    /// The mask as an RGBA raster, or `None` when nothing is painted.
    pub fn export_mask_image(&self) -> Option<RgbaImage> {
        if !self.has_coverage() {
            return None;
        }
        let raster = self.raster.as_ref()?;
        let (w, h) = raster.dimensions();
        Some(RgbaImage::from_fn(w, h, |x, y| {
            if raster.get_pixel(x, y).0[0] > UNPAINTED {
                MASK_COLOR
            } else {
                Rgba([0, 0, 0, 0])
            }
        }))
    }

    /// PNG data URI of the mask. `None` means "no mask drawn", which callers
    /// must keep distinct from an all-transparent image.
    pub fn export_mask(&self) -> Option<DataUri> {
        let image = self.export_mask_image()?;
        match DataUri::from_png(&image) {
            Ok(uri) => Some(uri),
            Err(e) => {
                crate::log_warn!("Mask export failed: {}", e);
                None
            }
        }
    }

    /// Paint coverage from an external mask image, scaled to the surface.
    /// A pixel counts as painted when it is neither transparent nor black.
    pub fn load_coverage(&mut self, mask: &DynamicImage) {
        let Some(raster) = self.raster.as_mut() else {
            return;
        };
        let (w, h) = raster.dimensions();
        if w == 0 || h == 0 {
            return;
        }
        let rgba = mask.to_rgba8();
        let scaled = if rgba.dimensions() == (w, h) {
            rgba
        } else {
            image::imageops::resize(&rgba, w, h, image::imageops::FilterType::Nearest)
        };
        for (x, y, p) in scaled.enumerate_pixels() {
            let [r, g, b, a] = p.0;
            if a > 0 && r.max(g).max(b) > 0 {
                raster.put_pixel(x, y, Luma([PAINTED]));
            }
        }
    }

    // -- Rasterization -------------------------------------------------------

    /// Round-capped band of width `brush_size` from `a` to `b`. A zero-length
    /// segment is a round dot.
    fn stamp_segment(&mut self, a: PixelPoint, b: PixelPoint, tool: MaskTool) {
        let radius = self.brush_size * 0.5;
        let Some(raster) = self.raster.as_mut() else {
            return;
        };
        if radius <= 0.0 {
            return;
        }
        let (w, h) = raster.dimensions();
        if w == 0 || h == 0 {
            return;
        }
        let value = tool.value();

        let min_x = (a.x.min(b.x) - radius).floor().max(0.0) as u32;
        let min_y = (a.y.min(b.y) - radius).floor().max(0.0) as u32;
        let max_x = (a.x.max(b.x) + radius).ceil();
        let max_y = (a.y.max(b.y) + radius).ceil();
        if max_x < 0.0 || max_y < 0.0 {
            return;
        }
        let max_x = (max_x as u32).min(w - 1);
        let max_y = (max_y as u32).min(h - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let centre = PixelPoint::new(x as f32 + 0.5, y as f32 + 0.5);
                if distance_to_segment(centre, a, b) <= radius {
                    raster.put_pixel(x, y, Luma([value]));
                }
            }
        }

        // The pixel under the pointer is always touched, even for brushes
        // thinner than a pixel.
        for p in [a, b] {
            if p.x >= 0.0 && p.y >= 0.0 && (p.x as u32) < w && (p.y as u32) < h {
                raster.put_pixel(p.x as u32, p.y as u32, Luma([value]));
            }
        }
    }
}

fn distance_to_segment(p: PixelPoint, a: PixelPoint, b: PixelPoint) -> f32 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq < 1e-6 {
        0.0
    } else {
        (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0)
    };
    let cx = a.x + abx * t;
    let cy = a.y + aby * t;
    ((p.x - cx) * (p.x - cx) + (p.y - cy) * (p.y - cy)).sqrt()
}
