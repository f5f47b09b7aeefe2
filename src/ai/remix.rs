// ============================================================================
// Creative remix — regenerate the background from prompt + creativity level
// ============================================================================

use super::{GatewayError, GenerativeBackend, Part};
use crate::data_uri::DataUri;
use crate::log_info;

pub const DEFAULT_CREATIVITY: u8 = 50;

/// Upper bound (inclusive) of the precision-edit band.
const PRECISION_MAX: u8 = 20;
/// Upper bound (inclusive) of the style-recreation band.
const RECREATION_MAX: u8 = 70;

/// Rendering style offered in the control panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RenderingStyle {
    #[default]
    Photorealistic,
    Illustration,
    CartoonComic,
    WatercolorOilPainting,
    Infographic,
    Render3d,
}

impl RenderingStyle {
    /// The phrase used inside generation prompts.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            RenderingStyle::Photorealistic => "Photorealistic",
            RenderingStyle::Illustration => "Illustration",
            RenderingStyle::CartoonComic => "Cartoon/Comic",
            RenderingStyle::WatercolorOilPainting => "Watercolor/Oil Painting",
            RenderingStyle::Infographic => "Infographic Style",
            RenderingStyle::Render3d => "3D Render",
        }
    }

    pub fn all() -> &'static [RenderingStyle] {
        &[
            RenderingStyle::Photorealistic,
            RenderingStyle::Illustration,
            RenderingStyle::CartoonComic,
            RenderingStyle::WatercolorOilPainting,
            RenderingStyle::Infographic,
            RenderingStyle::Render3d,
        ]
    }

    /// Accepts the prompt label or a short alias, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        let needle = s.trim().to_lowercase();
        let alias = match needle.as_str() {
            "photo" | "photorealistic" => Some(RenderingStyle::Photorealistic),
            "illustration" => Some(RenderingStyle::Illustration),
            "cartoon" | "comic" => Some(RenderingStyle::CartoonComic),
            "watercolor" | "oil" | "painting" => Some(RenderingStyle::WatercolorOilPainting),
            "infographic" => Some(RenderingStyle::Infographic),
            "3d" => Some(RenderingStyle::Render3d),
            _ => None,
        };
        alias.or_else(|| {
            Self::all()
                .iter()
                .copied()
                .find(|style| style.prompt_label().to_lowercase() == needle)
        })
    }
}

/// Generation mode selected by the creativity level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemixMode {
    /// Inpaint only the masked region; layout is preserved.
    PrecisionEdit,
    /// New image that strictly follows the reference style.
    StyleRecreation,
    /// Reference used only for mood and colour.
    CreativeGeneration,
}

impl RemixMode {
    /// Mode shown for a creativity level (0–100).
    pub fn for_creativity(creativity: u8) -> Self {
        if creativity <= PRECISION_MAX {
            RemixMode::PrecisionEdit
        } else if creativity <= RECREATION_MAX {
            RemixMode::StyleRecreation
        } else {
            RemixMode::CreativeGeneration
        }
    }

    /// Mode actually used. Precision editing needs a mask; without one the
    /// low band falls through to style recreation.
    pub fn select(creativity: u8, has_mask: bool) -> Self {
        match Self::for_creativity(creativity) {
            RemixMode::PrecisionEdit if !has_mask => RemixMode::StyleRecreation,
            mode => mode,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            RemixMode::PrecisionEdit => "Precision edit",
            RemixMode::StyleRecreation => "Style recreation",
            RemixMode::CreativeGeneration => "Creative generation",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RemixMode::PrecisionEdit => "Only the masked area is changed. The original layout is kept.",
            RemixMode::StyleRecreation => "Keeps the original style and recomposes the scene around the text.",
            RemixMode::CreativeGeneration => "Uses the original only as inspiration for a new, text-led image.",
        }
    }
}

/// Everything one remix needs, captured at submission time.
#[derive(Clone, Debug, PartialEq)]
pub struct RemixRequest {
    pub prompt: String,
    pub style_description: String,
    pub image: DataUri,
    pub mask: Option<DataUri>,
    /// 0–100.
    pub creativity: u8,
    pub rendering_style: RenderingStyle,
    pub text_context: Option<String>,
}

impl RemixRequest {
    pub fn mode(&self) -> RemixMode {
        RemixMode::select(self.creativity, self.mask.is_some())
    }

    fn text_context(&self) -> Option<&str> {
        self.text_context
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Instruction text for the request's mode.
    pub fn instruction(&self) -> String {
        const NO_TEXT: &str = " Crucially, do not render any text into the image itself.";
        let style = self.rendering_style.prompt_label();
        let prompt = &self.prompt;

        match self.mode() {
            RemixMode::PrecisionEdit => {
                let context = self
                    .text_context()
                    .map(|t| format!(" The generation should be thematically appropriate for the text: '{t}'."))
                    .unwrap_or_default();
                format!(
                    "In the masked area, generate: a {style} of '{prompt}'. It should blend seamlessly \
                     with the surrounding image.{context}{NO_TEXT}"
                )
            }
            mode => {
                let context = self
                    .text_context()
                    .map(|t| {
                        format!(
                            " The generated image will serve as a background for the text: '{t}'. \
                             It should be thematically appropriate for this text content."
                        )
                    })
                    .unwrap_or_default();
                if mode == RemixMode::StyleRecreation {
                    format!(
                        "Use the provided image as a style reference. Generate a new image that depicts: \
                         '{prompt}' in a {style} style. The new image must strictly follow the style of the \
                         reference image, which is described as: \"{}\".{context}{NO_TEXT}",
                        self.style_description
                    )
                } else {
                    format!(
                        "Use the provided image as a high-level style reference for mood and color. Generate \
                         a completely new and creative image that depicts: '{prompt}' in a {style} style. \
                         Prioritize the prompt over the original image's layout and subject.{context}{NO_TEXT}"
                    )
                }
            }
        }
    }

    fn parts(&self) -> Vec<Part> {
        let mut parts = vec![Part::Image(self.image.clone())];
        if let (RemixMode::PrecisionEdit, Some(mask)) = (self.mode(), self.mask.as_ref()) {
            parts.push(Part::Image(mask.clone()));
        }
        parts.push(Part::Text(self.instruction()));
        parts
    }
}

/// Produce a new background image for `request`.
pub fn creative_remix(backend: &dyn GenerativeBackend, request: &RemixRequest) -> Result<DataUri, GatewayError> {
    let mode = request.mode();
    log_info!(
        "Remix: mode={:?} creativity={} style={} mask={}",
        mode,
        request.creativity,
        request.rendering_style.prompt_label(),
        request.mask.is_some()
    );
    let image = backend
        .generate_image(&request.parts())?
        .ok_or(GatewayError::NoImageReturned)?;
    log_info!("Remix succeeded ({} bytes)", image.bytes().len());
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedBackend;
    use assert_matches::assert_matches;

    fn request(creativity: u8, mask: bool) -> RemixRequest {
        RemixRequest {
            prompt: "a spaceship landing in a desert".into(),
            style_description: "warm retro poster".into(),
            image: DataUri::new("image/png", vec![1]),
            mask: mask.then(|| DataUri::new("image/png", vec![2])),
            creativity,
            rendering_style: RenderingStyle::Illustration,
            text_context: Some("  Mars Expo  ".into()),
        }
    }

    #[test]
    fn creativity_bands() {
        assert_eq!(RemixMode::for_creativity(0), RemixMode::PrecisionEdit);
        assert_eq!(RemixMode::for_creativity(20), RemixMode::PrecisionEdit);
        assert_eq!(RemixMode::for_creativity(21), RemixMode::StyleRecreation);
        assert_eq!(RemixMode::for_creativity(70), RemixMode::StyleRecreation);
        assert_eq!(RemixMode::for_creativity(71), RemixMode::CreativeGeneration);
        assert_eq!(RemixMode::for_creativity(100), RemixMode::CreativeGeneration);
    }

    #[test]
    fn precision_edit_requires_a_mask() {
        assert_eq!(RemixMode::select(10, true), RemixMode::PrecisionEdit);
        assert_eq!(RemixMode::select(10, false), RemixMode::StyleRecreation);
        assert_eq!(RemixMode::select(90, true), RemixMode::CreativeGeneration);
    }

    #[test]
    fn precision_edit_sends_image_mask_and_instruction() {
        let backend = ScriptedBackend::default().with_image(Some(DataUri::new("image/png", vec![9])));
        let out = creative_remix(&backend, &request(5, true)).unwrap();
        assert_eq!(out.bytes(), &[9]);
        let calls = backend.image_calls.borrow();
        assert_eq!(calls[0].len(), 3);
        let Part::Text(text) = &calls[0][2] else { panic!("expected text part") };
        assert!(text.starts_with("In the masked area, generate: a Illustration of 'a spaceship"));
        assert!(text.contains("'Mars Expo'"));
        assert!(text.ends_with("do not render any text into the image itself."));
    }

    #[test]
    fn recreation_and_creative_modes_send_no_mask() {
        for (creativity, needle) in [(50, "strictly follow the style"), (90, "Prioritize the prompt")] {
            let backend = ScriptedBackend::default().with_image(Some(DataUri::new("image/png", vec![1])));
            creative_remix(&backend, &request(creativity, true)).unwrap();
            let calls = backend.image_calls.borrow();
            assert_eq!(calls[0].len(), 2);
            let prompt = backend.last_image_prompt().unwrap();
            assert!(prompt.contains(needle), "{prompt}");
            assert!(prompt.contains("background for the text: 'Mars Expo'"));
        }
    }

    #[test]
    fn recreation_quotes_style_description() {
        let text = request(40, false).instruction();
        assert!(text.contains("described as: \"warm retro poster\""));
        assert!(text.contains("in a Illustration style"));
    }

    #[test]
    fn blank_text_context_is_omitted() {
        let mut req = request(90, false);
        req.text_context = Some("   ".into());
        assert!(!req.instruction().contains("background for the text"));
    }

    #[test]
    fn missing_image_is_an_error() {
        let backend = ScriptedBackend::default().with_image(None);
        assert_matches!(creative_remix(&backend, &request(50, false)), Err(GatewayError::NoImageReturned));
    }

    #[test]
    fn rendering_style_parsing() {
        assert_eq!(RenderingStyle::parse("3D Render"), Some(RenderingStyle::Render3d));
        assert_eq!(RenderingStyle::parse("cartoon"), Some(RenderingStyle::CartoonComic));
        assert_eq!(RenderingStyle::parse("watercolor/oil painting"), Some(RenderingStyle::WatercolorOilPainting));
        assert_eq!(RenderingStyle::parse("cubism"), None);
    }
}
