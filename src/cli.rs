// ============================================================================
// StyleGen CLI — headless template session driven by command-line arguments
// ============================================================================
//
// Usage examples:
//   stylegen --input poster.jpg --template-out poster.json
//   stylegen -i poster.jpg --set-text text-1="Summer Sale" -o out.png --font Inter.ttf
//   stylegen -i poster.jpg --prompt "a neon city at night" --creativity 85 -o out.png
//   stylegen -i poster.jpg --stroke "100,100 300,120" --creativity 10 --prompt "snow"
//
// One session per run: analyze → edit text → paint mask → remix → export.
// Requests run synchronously on the current thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::ai::{GeminiBackend, RenderingStyle};
use crate::coords::{ContainerBounds, PixelPoint};
use crate::data_uri::DataUri;
use crate::editor::Editor;
use crate::mask::MaskTool;
use crate::model::{Template, TextElementPatch};
use crate::render::{self, RenderOptions};
use crate::settings::AppSettings;
use crate::{log_info, logger};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// StyleGen headless template editor.
///
/// Turns a reference image into an editable text template and optionally
/// remixes its background with a generative model.
#[derive(Parser, Debug)]
#[command(
    name = "stylegen",
    about = "StyleGen headless template editor",
    long_about = "Analyze a reference image into a text template, edit its text,\n\
                  paint an inpainting mask and remix the background.\n\n\
                  Example:\n  \
                  stylegen --input poster.jpg --prompt \"autumn forest\" --output out.png\n  \
                  stylegen -i poster.jpg --stroke \"10,10 200,10\" --creativity 10 --prompt snow"
)]
pub struct CliArgs {
    /// Reference image (PNG, JPEG, WEBP, BMP, GIF).
    #[arg(short, long, value_name = "IMAGE")]
    pub input: PathBuf,

    /// Background prompt. When omitted no remix is performed.
    #[arg(short, long, value_name = "TEXT")]
    pub prompt: Option<String>,

    /// Creativity 0–100 (defaults to the settings file, 50).
    #[arg(short, long, value_name = "0-100", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub creativity: Option<u8>,

    /// Rendering style: Photorealistic, Illustration, Cartoon/Comic,
    /// Watercolor/Oil Painting, Infographic Style, 3D Render (aliases: photo, cartoon, 3d …).
    #[arg(short, long, value_name = "LABEL")]
    pub style: Option<String>,

    /// Mask image; any non-transparent, non-black pixel counts as painted.
    /// Scaled to the input image.
    #[arg(short, long, value_name = "MASK.png")]
    pub mask: Option<PathBuf>,

    /// Brush stroke in image pixels: "x,y x,y …". Repeatable.
    #[arg(long, value_name = "POINTS")]
    pub stroke: Vec<String>,

    /// Eraser stroke, applied after all brush strokes. Repeatable.
    #[arg(long, value_name = "POINTS")]
    pub erase_stroke: Vec<String>,

    /// Brush diameter in pixels.
    #[arg(long, value_name = "PX")]
    pub brush_size: Option<f32>,

    /// Invert the mask after all strokes.
    #[arg(long)]
    pub invert_mask: bool,

    /// Replace an element's text: ID=TEXT. Repeatable.
    #[arg(long, value_name = "ID=TEXT")]
    pub set_text: Vec<String>,

    /// TrueType/OpenType font used to draw text into --output.
    #[arg(long, value_name = "FONT.ttf")]
    pub font: Option<PathBuf>,

    /// Composited image (background + text) as PNG.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Background image only (after any remix), as PNG.
    #[arg(long, value_name = "FILE")]
    pub background_out: Option<PathBuf>,

    /// Template JSON with the edited text elements. Printed to stdout when
    /// no output option is given.
    #[arg(long, value_name = "FILE")]
    pub template_out: Option<PathBuf>,

    /// Settings file to use instead of the default location.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the effective settings (file plus command-line overrides) to
    /// FILE, so later runs can pass it to --config.
    #[arg(long, value_name = "FILE")]
    pub save_config: Option<PathBuf>,

    /// Draw the detected subject box into --output.
    #[arg(long)]
    pub show_subject: bool,

    /// Mirror the session log to stderr and print timings.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run one session and return an OS exit code.
/// `0` = every requested step succeeded, `1` = something failed.
pub fn run(args: CliArgs) -> ExitCode {
    logger::set_echo(args.verbose);
    let start = Instant::now();
    match run_session(&args) {
        Ok(()) => {
            if args.verbose {
                println!("done ({:.0}ms)", start.elapsed().as_secs_f64() * 1000.0);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            crate::log_err!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Session pipeline
// ============================================================================

fn run_session(args: &CliArgs) -> Result<(), String> {
    // -- Step 1: Settings -------------------------------------------------
    let settings = effective_settings(args)?;
    if let Some(path) = &args.save_config {
        settings.save_to(path).map_err(|e| e.to_string())?;
        println!("settings → {}", path.display());
    }
    let strokes = parse_strokes(&args.stroke)?;
    let erase_strokes = parse_strokes(&args.erase_stroke)?;
    let text_edits = parse_text_edits(&args.set_text)?;

    // -- Step 2: Load ------------------------------------------------------
    let bytes = std::fs::read(&args.input)
        .map_err(|e| format!("could not read '{}': {}", args.input.display(), e))?;
    let upload = DataUri::from_image_bytes(bytes).map_err(|e| format!("load failed: {}", e))?;
    let (width, height) = {
        let img = upload.decode_image().map_err(|e| format!("load failed: {}", e))?;
        (img.width(), img.height())
    };
    log_info!("Loaded {} ({}x{})", args.input.display(), width, height);

    // -- Step 3: Analyze ---------------------------------------------------
    let backend = GeminiBackend::from_settings(&settings).map_err(|e| e.to_string())?;
    let mut editor = Editor::new(&settings);
    editor.resize(ContainerBounds::sized(width as f32, height as f32));
    editor.upload_with(&backend, upload);
    if let Some(err) = editor.error() {
        return Err(err.to_string());
    }
    if args.verbose {
        for el in editor.elements().iter() {
            println!("{} [{}, {}vw]: {:?}", el.id, el.text_align.label(), el.font_size, el.content);
        }
    }

    // -- Step 4: Text edits ------------------------------------------------
    for (id, text) in &text_edits {
        if !editor.update_element(id, &TextElementPatch::content(text.clone())) {
            return Err(format!("no text element with id '{}'", id));
        }
    }

    // -- Step 5: Mask ------------------------------------------------------
    if let Some(path) = &args.mask {
        let img = image::open(path).map_err(|e| format!("could not load mask '{}': {}", path.display(), e))?;
        editor.load_mask(&img);
    }
    for (tool, list) in [(MaskTool::Paint, &strokes), (MaskTool::Erase, &erase_strokes)] {
        for stroke in list {
            log_info!("{} stroke through {} point(s)", tool.label(), stroke.len());
            editor.stroke_mask(stroke, tool);
        }
    }
    if args.invert_mask {
        editor.invert_mask();
    }
    if args.verbose {
        println!("mask: {} px painted", editor.mask().painted_pixel_count());
    }

    // -- Step 6: Remix (optional) -----------------------------------------
    if let Some(prompt) = &args.prompt {
        editor.panel_mut().prompt = prompt.clone();
        if args.verbose {
            let mode = editor.creativity_mode();
            println!("remix: {} ({})", mode.title(), mode.description());
        }
        editor.remix_with(&backend).map_err(|e| e.to_string())?;
        if let Some(err) = editor.error() {
            return Err(err.to_string());
        }
    }

    // -- Step 7: Outputs ---------------------------------------------------
    let template = editor
        .template()
        .ok_or_else(|| "no template was produced".to_string())?;
    let edited = Template {
        text_elements: editor.elements().clone(),
        ..template.clone()
    };
    write_outputs(args, &edited)
}

/// Settings file (or defaults) with the command-line overrides applied.
fn effective_settings(args: &CliArgs) -> Result<AppSettings, String> {
    let mut settings = match &args.config {
        Some(path) => AppSettings::load_from(path).map_err(|e| e.to_string())?,
        None => AppSettings::load(),
    };
    if let Some(c) = args.creativity {
        settings.default_creativity = c;
    }
    if let Some(label) = &args.style {
        settings.default_rendering_style =
            RenderingStyle::parse(label).ok_or_else(|| format!("unknown rendering style '{}'", label))?;
    }
    if let Some(size) = args.brush_size {
        settings.default_brush_size = size;
    }
    Ok(settings)
}

fn write_outputs(args: &CliArgs, template: &Template) -> Result<(), String> {
    let json = serde_json::to_string_pretty(template).map_err(|e| format!("template encode failed: {}", e))?;
    let wants_image = args.output.is_some() || args.background_out.is_some();

    match &args.template_out {
        Some(path) => {
            std::fs::write(path, &json).map_err(|e| format!("could not write '{}': {}", path.display(), e))?;
            println!("template → {}", path.display());
        }
        None if !wants_image => println!("{}", json),
        None => {}
    }

    if !wants_image {
        return Ok(());
    }
    let background = template
        .generated_image_url
        .decode_image()
        .map_err(|e| format!("background decode failed: {}", e))?
        .to_rgba8();

    if let Some(path) = &args.background_out {
        save(&background, path)?;
        println!("background → {}", path.display());
    }

    if let Some(path) = &args.output {
        let font = match &args.font {
            Some(p) => Some(render::load_font(p).map_err(|e| e.to_string())?),
            None => None,
        };
        let composed = render::flatten(
            &background,
            &template.text_elements,
            template.subject.as_ref(),
            font.as_ref(),
            &RenderOptions {
                viewport_width: None,
                show_subject: args.show_subject,
            },
        );
        save(&composed, path)?;
        println!("output → {}", path.display());
    }
    Ok(())
}

fn save(image: &image::RgbaImage, path: &Path) -> Result<(), String> {
    render::save_png(image, path).map_err(|e| format!("save failed for '{}': {}", path.display(), e))
}

// ============================================================================
// Helpers
// ============================================================================

/// Parse `"x,y x,y …"` into points. Empty strings are rejected.
pub fn parse_stroke(s: &str) -> Result<Vec<PixelPoint>, String> {
    let points = s
        .split_whitespace()
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| format!("bad stroke point '{}', expected x,y", pair))?;
            let x: f32 = x.trim().parse().map_err(|_| format!("bad x in '{}'", pair))?;
            let y: f32 = y.trim().parse().map_err(|_| format!("bad y in '{}'", pair))?;
            Ok(PixelPoint::new(x, y))
        })
        .collect::<Result<Vec<_>, String>>()?;
    if points.is_empty() {
        return Err("empty stroke".to_string());
    }
    Ok(points)
}

fn parse_strokes(raw: &[String]) -> Result<Vec<Vec<PixelPoint>>, String> {
    raw.iter().map(|s| parse_stroke(s)).collect()
}

/// Parse `ID=TEXT`. The text may contain further `=` signs and may be empty.
pub fn parse_text_edit(s: &str) -> Result<(String, String), String> {
    let (id, text) = s
        .split_once('=')
        .ok_or_else(|| format!("bad --set-text '{}', expected ID=TEXT", s))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("bad --set-text '{}', missing element id", s));
    }
    Ok((id.to_string(), text.to_string()))
}

fn parse_text_edits(raw: &[String]) -> Result<Vec<(String, String)>, String> {
    raw.iter().map(|s| parse_text_edit(s)).collect()
}
