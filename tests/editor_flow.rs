use std::cell::RefCell;

use assert_matches::assert_matches;
use image::{Rgba, RgbaImage};

use stylegen::ai::{GatewayError, GenerativeBackend, Part, RemixMode};
use stylegen::coords::{ContainerBounds, PixelPoint};
use stylegen::data_uri::DataUri;
use stylegen::model::Template;
use stylegen::render::{self, RenderOptions};
use stylegen::settings::AppSettings;
use stylegen::{Editor, RemixRejected};

/// Answers analysis with a fixed document and every image request with a
/// solid-colour PNG, recording how many image parts each request carried.
struct FakeModel {
    analysis: String,
    fill: Rgba<u8>,
    image_requests: RefCell<Vec<usize>>,
}

impl FakeModel {
    fn new(analysis: &str) -> Self {
        Self {
            analysis: analysis.to_string(),
            fill: Rgba([0, 128, 255, 255]),
            image_requests: RefCell::new(Vec::new()),
        }
    }
}

impl GenerativeBackend for FakeModel {
    fn generate_json(&self, _parts: &[Part], _schema: &serde_json::Value) -> Result<String, GatewayError> {
        Ok(self.analysis.clone())
    }

    fn generate_image(&self, parts: &[Part]) -> Result<Option<DataUri>, GatewayError> {
        let images = parts.iter().filter(|p| matches!(p, Part::Image(_))).count();
        self.image_requests.borrow_mut().push(images);
        Ok(Some(DataUri::from_png(&RgbaImage::from_pixel(80, 60, self.fill))?))
    }
}

const ANALYSIS: &str = r##"{
    "style_description": "bold retro poster",
    "text_elements": [
        {"content": "SUMMER", "x": 50, "y": 50, "width": 40, "height": 10,
         "font_suggestion": "Impact", "font_weight": 800, "font_size_vw": 6, "color_hex": "#FFCC00"}
    ],
    "color_palette": ["#FFCC00", "#222222"],
    "recommended_fonts": ["Impact"],
    "subject": {"x": 30, "y": 60, "width": 20, "height": 30}
}"##;

fn reference_image() -> DataUri {
    DataUri::from_png(&RgbaImage::from_pixel(80, 60, Rgba([200, 10, 10, 255]))).unwrap()
}

#[test]
fn upload_edit_mask_and_remix() {
    let model = FakeModel::new(ANALYSIS);
    let mut editor = Editor::new(&AppSettings::default());
    editor.resize(ContainerBounds::new(20.0, 10.0, 800.0, 600.0));
    editor.upload_with(&model, reference_image());

    // Detected text was inpainted: one request with image + region mask.
    assert_eq!(*model.image_requests.borrow(), vec![2]);
    assert_eq!(editor.overlay().selected(), Some("text-1"));

    // Drag the headline by (80, 60) px in an 800×600 container.
    editor.pointer_down(PixelPoint::new(420.0, 310.0));
    editor.pointer_move(PixelPoint::new(500.0, 370.0));
    editor.pointer_up();
    let headline = editor.elements().get("text-1").unwrap();
    assert!((headline.x - 60.0).abs() < 1e-3 && (headline.y - 60.0).abs() < 1e-3);
    assert_eq!(editor.pointer_hub().active_subscriptions(), 0);

    // Paint somewhere without text, then remix in precision mode.
    editor.pointer_down(PixelPoint::new(120.0, 110.0));
    editor.pointer_move(PixelPoint::new(220.0, 110.0));
    editor.pointer_up();
    assert!(editor.mask().export_mask().is_some());

    editor.panel_mut().prompt = "a beach at sunset".into();
    editor.panel_mut().set_creativity(15);
    assert_eq!(editor.creativity_mode(), RemixMode::PrecisionEdit);
    editor.remix_with(&model).unwrap();

    assert_eq!(*model.image_requests.borrow(), vec![2, 2]);
    assert!(editor.error().is_none());
    let background = editor
        .template()
        .unwrap()
        .generated_image_url
        .decode_image()
        .unwrap()
        .to_rgba8();
    assert_eq!(*background.get_pixel(0, 0), Rgba([0, 128, 255, 255]));
}

#[test]
fn cleared_mask_falls_back_to_style_recreation() {
    let model = FakeModel::new(ANALYSIS);
    let mut editor = Editor::new(&AppSettings::default());
    editor.resize(ContainerBounds::sized(800.0, 600.0));
    editor.upload_with(&model, reference_image());

    editor.pointer_down(PixelPoint::new(100.0, 100.0));
    editor.pointer_up();
    editor.clear_mask();
    assert!(editor.mask().export_mask().is_none());

    editor.panel_mut().prompt = "snowy mountains".into();
    editor.panel_mut().set_creativity(5);
    let request = editor.begin_remix().unwrap();
    assert!(request.mask.is_none());
    assert_eq!(request.mode(), RemixMode::StyleRecreation);
    assert_matches!(editor.begin_remix(), Err(RemixRejected::Busy));
    editor.finish_remix(Err(GatewayError::NoImageReturned));
    assert!(!editor.is_remixing());
    assert!(editor.error().is_some());
}

#[test]
fn template_json_and_export() {
    let model = FakeModel::new(ANALYSIS);
    let mut editor = Editor::new(&AppSettings::default());
    editor.resize(ContainerBounds::sized(800.0, 600.0));
    editor.upload_with(&model, reference_image());
    let template = editor.template().unwrap().clone();

    let json = serde_json::to_value(&template).unwrap();
    assert_eq!(json["textElements"][0]["fontFamily"], "Impact");
    assert_eq!(json["textElements"][0]["textAlign"], "center");
    assert!(json["generatedImageUrl"].as_str().unwrap().starts_with("data:image/png;base64,"));
    let back: Template = serde_json::from_value(json).unwrap();
    assert_eq!(back, template);

    let bg = template.generated_image_url.decode_image().unwrap().to_rgba8();
    let out = render::flatten(
        &bg,
        &template.text_elements,
        template.subject.as_ref(),
        None,
        &RenderOptions { viewport_width: None, show_subject: true },
    );
    assert_eq!(out.dimensions(), bg.dimensions());
    assert_ne!(out, bg);
    let png = render::encode_png(&out).unwrap();
    assert_eq!(&png[1..4], b"PNG");
}

#[test]
fn reset_returns_to_empty_session() {
    let model = FakeModel::new(ANALYSIS);
    let mut editor = Editor::new(&AppSettings::default());
    editor.resize(ContainerBounds::sized(800.0, 600.0));
    editor.upload_with(&model, reference_image());
    editor.reset();
    assert!(editor.template().is_none());
    assert!(editor.elements().is_empty());
    editor.panel_mut().prompt = "anything".into();
    assert_matches!(editor.begin_remix(), Err(RemixRejected::NoTemplate));
}
