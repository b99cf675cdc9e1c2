//! End-to-end pipeline runs with an in-memory renderer and scripted OCR.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use medocr::hardening::{apply_hardening, should_trigger};
use medocr::pdf::{DirectTextParser, PageRenderer, RenderContext, RenderError};
use medocr::pipeline::DecisionReason;
use medocr::{
    ExtractionMode, LexicalLine, OcrClient, OcrError, OcrPipeline, PipelineError,
    PipelineOptions, ReviewFlag, ScriptedOcrClient,
};

const CLINICAL_NOTE: &str = "Orthopedic follow-up: the claimant reports persistent \
    lumbar pain after the workplace injury. Range of motion is reduced and \
    imaging shows mild disc protrusion at L4-L5. Physiotherapy twice weekly \
    is recommended, with re-evaluation in six weeks.";

/// A full page of embedded text, dense enough to skip OCR.
fn dense_page() -> String {
    format!("{} {}", CLINICAL_NOTE, CLINICAL_NOTE)
}

/// Build a PDF whose pages each show one line of text (empty = blank page).
fn build_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let operations = if text.is_empty() {
            Vec::new()
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
                Operation::new("Td", vec![50.into(), 760.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Renders every page as a slightly tilted block of dark text lines.
struct SyntheticScans {
    rendered: AtomicU32,
}

impl SyntheticScans {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            rendered: AtomicU32::new(0),
        })
    }

    fn rendered(&self) -> u32 {
        self.rendered.load(Ordering::SeqCst)
    }
}

impl RenderContext for SyntheticScans {
    fn page_count(&self, pdf: &[u8]) -> Result<u32, RenderError> {
        DirectTextParser::new()
            .page_count(pdf)
            .map_err(|e| RenderError::Parse(e.to_string()))
    }

    fn rasterize(&self, _pdf: &[u8], page: u32, scale: f32) -> Result<DynamicImage, RenderError> {
        self.rendered.fetch_add(1, Ordering::SeqCst);
        // Quarter-size letter page
        let width = (612.0 * scale / 4.0) as u32;
        let height = (792.0 * scale / 4.0) as u32;
        let image = RgbImage::from_fn(width, height, |x, y| {
            let line = (y + x / 30 + page) % 12;
            if line < 3 {
                Rgb([30, 30, 30])
            } else {
                Rgb([235, 235, 230])
            }
        });
        Ok(DynamicImage::ImageRgb8(image))
    }
}

/// Renders page N as a (100 + 10N)-pixel-wide scan so pages can be told apart.
struct WideningScans;

impl RenderContext for WideningScans {
    fn page_count(&self, pdf: &[u8]) -> Result<u32, RenderError> {
        DirectTextParser::new()
            .page_count(pdf)
            .map_err(|e| RenderError::Parse(e.to_string()))
    }

    fn rasterize(&self, _pdf: &[u8], page: u32, _scale: f32) -> Result<DynamicImage, RenderError> {
        let image = RgbImage::from_fn(100 + 10 * page, 120, |_, y| {
            if (y / 8) % 3 == 0 {
                Rgb([20, 20, 20])
            } else {
                Rgb([240, 240, 240])
            }
        });
        Ok(DynamicImage::ImageRgb8(image))
    }
}

/// OCR client that keeps every document it was given.
struct RecordingOcr {
    responses: Mutex<Vec<String>>,
    documents: Mutex<Vec<Vec<u8>>>,
}

impl RecordingOcr {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().rev().map(|s| s.to_string()).collect()),
            documents: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl OcrClient for RecordingOcr {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        "Records documents".to_string()
    }

    async fn analyze(&self, document: &[u8]) -> Result<String, OcrError> {
        self.documents.lock().unwrap().push(document.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| OcrError::Failed("no response left".to_string()))
    }
}

fn pipeline(ocr: Arc<dyn OcrClient>, context: Arc<SyntheticScans>) -> OcrPipeline {
    OcrPipeline::new(ocr).with_renderer(PageRenderer::new(context))
}

#[tokio::test]
async fn test_image_only_pdf_selects_enhanced() {
    let pdf = build_pdf(&[""]);
    let ocr = Arc::new(
        ScriptedOcrClient::new()
            .then_text("0rth0ped1c f0ll0w-up ~~~~ |||| ::::")
            .then_text(CLINICAL_NOTE),
    );
    let context = SyntheticScans::new();

    let result = pipeline(ocr.clone(), context.clone())
        .run(&pdf, PipelineOptions::default())
        .await
        .unwrap();

    assert_eq!(ocr.calls(), 2);
    assert_eq!(context.rendered(), 1);
    assert_eq!(result.mode, ExtractionMode::Enhanced);
    assert_eq!(result.text, CLINICAL_NOTE);
    assert_eq!(result.page_count, 1);
    assert!(result.metrics.score > result.comparison.base_score);
}

#[tokio::test]
async fn test_rebuilt_document_is_capped_at_ten_pages() {
    let pages = vec![""; 12];
    let pdf = build_pdf(&pages);
    let ocr = RecordingOcr::new(&[CLINICAL_NOTE, CLINICAL_NOTE]);
    let context = SyntheticScans::new();

    let result = pipeline(ocr.clone(), context.clone())
        .run(&pdf, PipelineOptions::default())
        .await
        .unwrap();

    assert_eq!(result.page_count, 12);
    assert_eq!(context.rendered(), 10);

    let documents = ocr.documents.lock().unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0], pdf);
    let parser = DirectTextParser::new();
    assert_eq!(parser.page_count(&documents[1]).unwrap(), 10);
}

#[tokio::test]
async fn test_rebuilt_pages_keep_document_order() {
    let pages = vec![""; 6];
    let pdf = build_pdf(&pages);
    let ocr = RecordingOcr::new(&[CLINICAL_NOTE, CLINICAL_NOTE]);

    // 72 dpi keeps one pixel per point, so MediaBox width equals bitmap width
    OcrPipeline::new(ocr.clone())
        .with_renderer(PageRenderer::new(Arc::new(WideningScans)))
        .with_dpi(72)
        .run(&pdf, PipelineOptions::default())
        .await
        .unwrap();

    let documents = ocr.documents.lock().unwrap();
    let rebuilt = Document::load_mem(&documents[1]).unwrap();
    let widths: Vec<i64> = rebuilt
        .get_pages()
        .values()
        .map(|id| {
            let page = rebuilt.get_dictionary(*id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            media_box[2].as_i64().unwrap()
        })
        .collect();

    assert_eq!(widths, vec![110, 120, 130, 140, 150, 160]);
}

#[tokio::test]
async fn test_textual_pdf_never_calls_ocr() {
    let page = dense_page();
    let pdf = build_pdf(&[page.as_str()]);
    let ocr = Arc::new(ScriptedOcrClient::fixed("unused"));
    let context = SyntheticScans::new();

    let result = pipeline(ocr.clone(), context.clone())
        .run(&pdf, PipelineOptions::default())
        .await
        .unwrap();

    assert_eq!(result.mode, ExtractionMode::Base);
    assert!(result.text.contains("lumbar pain"));
    assert_eq!(ocr.calls(), 0);
    assert_eq!(context.rendered(), 0);
}

#[tokio::test]
async fn test_forced_enhanced_on_textual_pdf() {
    let page = dense_page();
    let pdf = build_pdf(&[page.as_str()]);
    let ocr = Arc::new(ScriptedOcrClient::fixed(CLINICAL_NOTE));

    let result = pipeline(ocr.clone(), SyntheticScans::new())
        .run(&pdf, PipelineOptions::force_enhanced())
        .await
        .unwrap();

    assert_eq!(ocr.calls(), 2);
    assert_eq!(result.mode, ExtractionMode::Enhanced);
    assert!(result.comparison.enhanced_score.is_some());
}

#[tokio::test]
async fn test_unconfigured_ocr_aborts() {
    let pdf = build_pdf(&[""]);
    let missing = OcrError::ConfigMissing("OCR_API_KEY not set".to_string());
    let ocr = Arc::new(ScriptedOcrClient::new().then_error(missing));

    let err = pipeline(ocr, SyntheticScans::new())
        .run(&pdf, PipelineOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_config_missing());
    assert!(err.to_string().contains("OCR_API_KEY"));
}

#[tokio::test]
async fn test_render_failure_aborts() {
    struct NoRenderer;

    impl RenderContext for NoRenderer {
        fn page_count(&self, _pdf: &[u8]) -> Result<u32, RenderError> {
            Ok(1)
        }

        fn rasterize(
            &self,
            _pdf: &[u8],
            _page: u32,
            _scale: f32,
        ) -> Result<DynamicImage, RenderError> {
            Err(RenderError::ToolNotFound("pdftoppm".to_string()))
        }
    }

    let pdf = build_pdf(&[""]);
    let ocr = Arc::new(ScriptedOcrClient::fixed(CLINICAL_NOTE));
    let err = OcrPipeline::new(ocr)
        .with_renderer(PageRenderer::new(Arc::new(NoRenderer)))
        .run(&pdf, PipelineOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Render(RenderError::ToolNotFound(_))));
}

#[tokio::test]
async fn test_result_serializes_for_callers() {
    let pdf = build_pdf(&[""]);
    let ocr = Arc::new(ScriptedOcrClient::fixed(CLINICAL_NOTE));

    let result = pipeline(ocr, SyntheticScans::new())
        .run(&pdf, PipelineOptions::default())
        .await
        .unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["mode"], "enhanced");
    assert_eq!(json["page_count"], 1);
    assert!(json["comparison"]["enhanced_score"].is_number());
    assert!(json["metrics"]["reasons"].is_array());
}

#[test]
fn test_selector_reason_for_blank_scan() {
    let pdf = build_pdf(&[""]);
    let parsed = DirectTextParser::new().parse(&pdf).unwrap();
    let decision = medocr::pipeline::StrategySelector::new().select(
        &parsed.text,
        parsed.page_count,
        pdf.len() as u64,
        false,
    );
    assert_eq!(decision.mode, ExtractionMode::Enhanced);
    assert_eq!(decision.reason, DecisionReason::LowDensityOrNoisy);
}

#[test]
fn test_noisy_stored_extraction_is_hardened() {
    let flags = vec![
        ReviewFlag::EventWithoutDate,
        ReviewFlag::EventWithoutDate,
        ReviewFlag::TimelineTooGeneric,
    ];
    assert!(should_trigger(Some(0.4), &flags));

    let map: Vec<LexicalLine> = ["Physiotherapy  twice", "weekly", "  at the\tclinic"]
        .into_iter()
        .map(LexicalLine::from)
        .collect();
    let result = apply_hardening(&map);

    let lines: Vec<&str> = result.improved_map.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(lines, vec!["Physiotherapy twice", "weekly", "at the clinic"]);
    assert_eq!(result.chosen_pass, ExtractionMode::Enhanced);
}

#[test]
fn test_hardening_keeps_original_when_cleanup_drops_characters() {
    let map: Vec<LexicalLine> = ["Physio\u{200b}therapy  twice", "week-", "ly  at the\tclinic"]
        .into_iter()
        .map(LexicalLine::from)
        .collect();
    let result = apply_hardening(&map);

    assert_eq!(result.chosen_pass, ExtractionMode::Base);
    assert_eq!(result.improved_map, map);
    assert!(result.passes[0].text_length > result.passes[1].text_length);
}
