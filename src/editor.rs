// ============================================================================
// EDITOR CONTROLLER — session state for one template editing session
// ============================================================================
//
// Upload → analysis → editing → remix. Network calls are split into
// `begin_*` / `finish_*` pairs so a front-end can run the request wherever
// it likes; `*_with` helpers run both halves inline against a backend.

use crate::ai::{self, GatewayError, GenerativeBackend, RemixMode, RemixRequest, RenderingStyle};
use crate::coords::{self, ContainerBounds, PixelPoint};
use crate::data_uri::DataUri;
use crate::mask::{MaskSurface, MaskTool};
use crate::model::{Template, TextElement, TextElementPatch, TextElements};
use crate::overlay::{PointerHub, TextOverlay};
use crate::settings::AppSettings;
use crate::{log_err, log_info};

/// Why a remix was not started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemixRejected {
    #[error("a remix is already in progress")]
    Busy,
    #[error("no template has been generated yet")]
    NoTemplate,
    #[error("enter a prompt describing the new background")]
    EmptyPrompt,
}

/// Remix controls shown beside the canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlPanel {
    pub prompt: String,
    creativity: u8,
    pub rendering_style: RenderingStyle,
}

impl ControlPanel {
    pub fn creativity(&self) -> u8 {
        self.creativity
    }

    /// Clamped to 0–100.
    pub fn set_creativity(&mut self, value: u8) {
        self.creativity = value.min(100);
    }
}

/// Identifies the analysis started by one [`Editor::begin_upload`]. A result
/// is only installed while its ticket is still the pending one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct AnalysisTicket(u64);

/// Which component owns the pointer between down and up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Interaction {
    Idle,
    Dragging,
    Masking,
}

pub struct Editor {
    upload: Option<DataUri>,
    template: Option<Template>,
    elements: TextElements,
    overlay: TextOverlay,
    hub: PointerHub,
    mask: MaskSurface,
    bounds: Option<ContainerBounds>,
    panel: ControlPanel,
    interaction: Interaction,
    /// Bumped every time the session is discarded.
    generation: u64,
    pending_analysis: Option<u64>,
    /// Generation the outstanding remix was issued in. Survives reset.
    pending_remix: Option<u64>,
    error: Option<String>,
}

impl Editor {
    pub fn new(settings: &AppSettings) -> Self {
        let hub = PointerHub::new();
        let mut mask = MaskSurface::unavailable();
        mask.set_brush_size(settings.default_brush_size);
        Self {
            upload: None,
            template: None,
            elements: TextElements::default(),
            overlay: TextOverlay::new(hub.clone()),
            hub,
            mask,
            bounds: None,
            panel: ControlPanel {
                prompt: String::new(),
                creativity: settings.default_creativity.min(100),
                rendering_style: settings.default_rendering_style,
            },
            interaction: Interaction::Idle,
            generation: 0,
            pending_analysis: None,
            pending_remix: None,
            error: None,
        }
    }

    // -- Accessors -------------------------------------------------------------

    pub fn upload(&self) -> Option<&DataUri> {
        self.upload.as_ref()
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    /// The working copy of the text elements (the template keeps the
    /// analysed originals).
    pub fn elements(&self) -> &TextElements {
        &self.elements
    }

    pub fn overlay(&self) -> &TextOverlay {
        &self.overlay
    }

    pub fn pointer_hub(&self) -> &PointerHub {
        &self.hub
    }

    pub fn mask(&self) -> &MaskSurface {
        &self.mask
    }

    pub fn bounds(&self) -> Option<&ContainerBounds> {
        self.bounds.as_ref()
    }

    pub fn panel(&self) -> &ControlPanel {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut ControlPanel {
        &mut self.panel
    }

    pub fn is_analyzing(&self) -> bool {
        self.pending_analysis.is_some()
    }

    /// True while a remix request is outstanding, including one issued
    /// before the last reset.
    pub fn is_remixing(&self) -> bool {
        self.pending_remix.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn selected_element(&self) -> Option<&TextElement> {
        self.overlay.selected().and_then(|id| self.elements.get(id))
    }

    // ========================================================================
    // UPLOAD + ANALYSIS
    // ========================================================================

    /// A new image replaces the whole session. Hand the ticket back to
    /// [`Editor::finish_upload`] with the analysis result.
    pub fn begin_upload(&mut self, image: DataUri) -> AnalysisTicket {
        self.discard_session();
        log_info!("Upload: {} ({} bytes), analyzing", image.mime(), image.bytes().len());
        self.upload = Some(image);
        self.pending_analysis = Some(self.generation);
        AnalysisTicket(self.generation)
    }

    /// Install an analysis result. Results for an upload that was reset or
    /// superseded are dropped.
    pub fn finish_upload(&mut self, ticket: AnalysisTicket, result: Result<Template, GatewayError>) {
        if self.pending_analysis != Some(ticket.0) {
            log_info!("Analysis result discarded, its upload is no longer current");
            return;
        }
        self.pending_analysis = None;
        match result {
            Ok(template) => {
                log_info!(
                    "Template {} ready: {} text element(s)",
                    template.id,
                    template.text_elements.len()
                );
                self.elements = template.text_elements.clone();
                match self.elements.first().map(|el| el.id.clone()) {
                    Some(id) => self.overlay.select(&id),
                    None => self.overlay.deselect(),
                }
                self.template = Some(template);
            }
            Err(e) => {
                log_err!("Analysis failed: {}", e);
                self.error = Some(format!("Failed to analyze the image: {e}"));
                self.upload = None;
                self.template = None;
            }
        }
    }

    /// Upload and analyze in one go.
    pub fn upload_with(&mut self, backend: &dyn GenerativeBackend, image: DataUri) {
        let ticket = self.begin_upload(image.clone());
        let result = ai::analyze_image(backend, &image);
        self.finish_upload(ticket, result);
    }

    // ========================================================================
    // LAYOUT + POINTER ROUTING
    // ========================================================================

    /// The container was laid out (again). The mask is recreated blank at
    /// the new size; tool and brush carry over.
    pub fn resize(&mut self, bounds: ContainerBounds) {
        let tool = self.mask.tool();
        let brush = self.mask.brush_size();
        self.mask = if bounds.is_usable() {
            let (w, h) = bounds.pixel_size();
            MaskSurface::new(w, h)
        } else {
            MaskSurface::unavailable()
        };
        self.mask.set_tool(tool);
        self.mask.set_brush_size(brush);
        if self.interaction == Interaction::Masking {
            self.interaction = Interaction::Idle;
        }
        self.bounds = Some(bounds);
    }

    /// Text elements sit above the mask, so they get first refusal.
    pub fn pointer_down(&mut self, client: PixelPoint) {
        let Some(bounds) = self.bounds else { return };
        if self.template.is_none() {
            return;
        }
        let local = coords::client_to_local(client, &bounds);
        let hit = self
            .overlay
            .hit_test(local, &bounds, &self.elements)
            .map(str::to_string);
        match hit {
            Some(id) => {
                self.overlay.pointer_down_on(&id, client, &self.elements);
                self.interaction = Interaction::Dragging;
            }
            None => {
                self.mask.begin_stroke(local);
                self.interaction = if self.mask.is_stroking() {
                    Interaction::Masking
                } else {
                    Interaction::Idle
                };
            }
        }
    }

    pub fn pointer_move(&mut self, client: PixelPoint) {
        let Some(bounds) = self.bounds else { return };
        match self.interaction {
            Interaction::Dragging => {
                self.overlay
                    .pointer_move(client, Some(&bounds), &mut self.elements);
            }
            Interaction::Masking => {
                let local = coords::client_to_local(client, &bounds);
                if bounds.local_rect().contains(local) {
                    self.mask.continue_stroke(local);
                } else {
                    // Leaving the container ends the stroke
                    self.mask.end_stroke();
                    self.interaction = Interaction::Idle;
                }
            }
            Interaction::Idle => {}
        }
    }

    pub fn pointer_up(&mut self) {
        self.overlay.pointer_up();
        self.mask.end_stroke();
        self.interaction = Interaction::Idle;
    }

    // -- Mask toolbar ----------------------------------------------------------

    pub fn set_mask_tool(&mut self, tool: MaskTool) {
        self.mask.set_tool(tool);
    }

    pub fn set_brush_size(&mut self, size: f32) {
        self.mask.set_brush_size(size);
    }

    pub fn clear_mask(&mut self) {
        self.mask.clear();
    }

    pub fn invert_mask(&mut self) {
        self.mask.invert();
    }

    /// Run one complete stroke through container-local points with `tool`,
    /// bypassing text hit-testing. The current tool is restored afterwards.
    pub fn stroke_mask(&mut self, points: &[PixelPoint], tool: MaskTool) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        let previous = self.mask.tool();
        self.mask.set_tool(tool);
        self.mask.begin_stroke(*first);
        for p in rest {
            self.mask.continue_stroke(*p);
        }
        self.mask.end_stroke();
        self.mask.set_tool(previous);
    }

    /// Paint the mask from an external image (CLI `--mask`).
    pub fn load_mask(&mut self, image: &image::DynamicImage) {
        self.mask.load_coverage(image);
    }

    // ========================================================================
    // PROPERTY PANEL
    // ========================================================================

    pub fn select(&mut self, id: &str) {
        if self.elements.get(id).is_some() {
            self.overlay.select(id);
        }
    }

    /// False when no element has `id`. An empty patch changes nothing.
    pub fn update_element(&mut self, id: &str, patch: &TextElementPatch) -> bool {
        if patch.is_empty() {
            return self.elements.get(id).is_some();
        }
        self.overlay.update_element(id, patch, &mut self.elements)
    }

    /// Patch the selected element. False when nothing is selected.
    pub fn update_selected(&mut self, patch: &TextElementPatch) -> bool {
        let Some(id) = self.overlay.selected().map(str::to_string) else {
            return false;
        };
        self.update_element(&id, patch)
    }

    /// Colour the selected element with palette entry `index`.
    pub fn apply_palette_color(&mut self, index: usize) -> bool {
        let Some(color) = self
            .template
            .as_ref()
            .and_then(|t| t.palette().get(index).cloned())
        else {
            return false;
        };
        self.update_selected(&TextElementPatch::color(color))
    }

    pub fn font_choices(&self) -> Vec<String> {
        match &self.template {
            Some(t) => t.font_choices(),
            None => crate::model::FALLBACK_FONTS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Mode the creativity slider currently points at.
    pub fn creativity_mode(&self) -> RemixMode {
        RemixMode::for_creativity(self.panel.creativity)
    }

    // ========================================================================
    // REMIX
    // ========================================================================

    /// Capture a remix request and mark one in flight. Editing stays
    /// available until `finish_remix`.
    ///
    /// The request carries the current working image (the inpainted
    /// background or the latest remix), not the raw upload, so successive
    /// remixes build on each other.
    pub fn begin_remix(&mut self) -> Result<RemixRequest, RemixRejected> {
        if self.pending_remix.is_some() {
            return Err(RemixRejected::Busy);
        }
        let template = self.template.as_ref().ok_or(RemixRejected::NoTemplate)?;
        let prompt = self.panel.prompt.trim();
        if prompt.is_empty() {
            return Err(RemixRejected::EmptyPrompt);
        }
        let context = self.elements.text_context();
        let request = RemixRequest {
            prompt: prompt.to_string(),
            style_description: template.style_description.clone(),
            image: template.generated_image_url.clone(),
            mask: self.mask.export_mask(),
            creativity: self.panel.creativity,
            rendering_style: self.panel.rendering_style,
            text_context: (!context.is_empty()).then_some(context),
        };
        self.pending_remix = Some(self.generation);
        self.error = None;
        Ok(request)
    }

    /// Apply the outcome of the outstanding remix. A result issued before the
    /// last reset or upload only frees the slot.
    pub fn finish_remix(&mut self, result: Result<DataUri, GatewayError>) {
        let issued = self.pending_remix.take();
        if issued != Some(self.generation) {
            log_info!("Remix result discarded, session was reset");
            return;
        }
        match result {
            Ok(image) => match self.template.as_mut() {
                Some(template) => template.replace_image(image),
                None => log_info!("Remix result discarded, no template"),
            },
            Err(e) => {
                log_err!("Remix failed: {}", e);
                self.error = Some(format!("Failed to remix the image: {e}"));
            }
        }
    }

    /// Remix in one go. Rejections are returned; gateway failures land in
    /// [`Editor::error`].
    pub fn remix_with(&mut self, backend: &dyn GenerativeBackend) -> Result<(), RemixRejected> {
        let request = self.begin_remix()?;
        let result = ai::creative_remix(backend, &request);
        self.finish_remix(result);
        Ok(())
    }

    // ========================================================================
    // RESET
    // ========================================================================

    /// "New template": drop everything except layout and control settings.
    pub fn reset(&mut self) {
        log_info!("Session reset");
        self.discard_session();
    }

    fn discard_session(&mut self) {
        self.upload = None;
        self.template = None;
        self.elements = TextElements::default();
        self.overlay.pointer_up();
        self.overlay.deselect();
        self.mask.end_stroke();
        self.mask.clear();
        self.interaction = Interaction::Idle;
        self.generation = self.generation.wrapping_add(1);
        self.pending_analysis = None;
        self.error = None;
    }
}
