//! Page rasterization for the enhanced OCR path.
//!
//! The actual rasterizer is injected as a [`RenderContext`]; the renderer
//! only owns the page ceiling and the DPI-to-scale conversion.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use image::DynamicImage;
use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

use super::parser::DirectTextParser;
use crate::config::{clamp_max_pages, DEFAULT_MAX_PAGES};

/// PDF user space is 72 points per inch.
const POINTS_PER_INCH: f32 = 72.0;

const PDFTOPPM_NOT_FOUND: &str = "pdftoppm not found (install poppler-utils)";

/// Errors from rendering pages.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Cannot parse PDF for rendering: {0}")]
    Parse(String),

    #[error("Rendering tool not found: {0}")]
    ToolNotFound(String),

    #[error("Failed to rasterize page {page}: {reason}")]
    Rasterize { page: u32, reason: String },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A rasterized page. Owned by whichever stage consumes it next.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 1-based page number.
    pub page_number: u32,
    pub image: DynamicImage,
}

impl RenderedPage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Backend that turns PDF pages into bitmaps.
pub trait RenderContext: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self, pdf: &[u8]) -> Result<u32, RenderError>;

    /// Rasterize one 1-based page at `scale` device pixels per PDF point.
    fn rasterize(&self, pdf: &[u8], page: u32, scale: f32) -> Result<DynamicImage, RenderError>;
}

/// Renders the first pages of a document through a [`RenderContext`].
#[derive(Clone)]
pub struct PageRenderer {
    context: Arc<dyn RenderContext>,
    max_pages: u32,
}

impl PageRenderer {
    pub fn new(context: Arc<dyn RenderContext>) -> Self {
        Self {
            context,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Lower the page ceiling. Values above `DEFAULT_MAX_PAGES` are clamped.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = clamp_max_pages(max_pages);
        self
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// Scale factor for a target resolution.
    pub fn scale_for_dpi(dpi: u32) -> f32 {
        dpi as f32 / POINTS_PER_INCH
    }

    /// Lazily render pages, stopping at the page ceiling.
    pub fn pages<'a>(&'a self, pdf: &'a [u8], dpi: u32) -> Result<RenderedPages<'a>, RenderError> {
        let total = self.context.page_count(pdf)?;
        if total == 0 {
            return Err(RenderError::Parse("document has no pages".to_string()));
        }
        let last = total.min(self.max_pages);
        if total > last {
            debug!("Rendering first {} of {} pages", last, total);
        }
        Ok(RenderedPages {
            context: self.context.as_ref(),
            pdf,
            scale: Self::scale_for_dpi(dpi),
            next: 1,
            last,
        })
    }

    /// Render all pages up to the ceiling. Any page failure fails the whole render.
    pub fn render(&self, pdf: &[u8], dpi: u32) -> Result<Vec<RenderedPage>, RenderError> {
        self.pages(pdf, dpi)?.collect()
    }
}

/// Iterator over rendered pages; each page is rasterized on demand.
pub struct RenderedPages<'a> {
    context: &'a dyn RenderContext,
    pdf: &'a [u8],
    scale: f32,
    next: u32,
    last: u32,
}

impl Iterator for RenderedPages<'_> {
    type Item = Result<RenderedPage, RenderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.last {
            return None;
        }
        let page_number = self.next;
        self.next += 1;
        Some(
            self.context
                .rasterize(self.pdf, page_number, self.scale)
                .map(|image| RenderedPage { page_number, image }),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.last + 1).saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

/// Render context backed by Poppler's `pdftoppm`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PopplerContext;

impl PopplerContext {
    pub fn new() -> Self {
        Self
    }

    /// Check if pdftoppm is on PATH.
    pub fn is_available() -> bool {
        which::which("pdftoppm").is_ok()
    }

    fn run_pdftoppm(
        pdf_path: &Path,
        page: u32,
        dpi: u32,
        output_dir: &Path,
    ) -> Result<PathBuf, RenderError> {
        let page_str = page.to_string();
        let dpi_str = dpi.to_string();
        let output_prefix = output_dir.join("page");

        let output = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi_str, "-f", &page_str, "-l", &page_str])
            .arg(pdf_path)
            .arg(&output_prefix)
            .output();

        match output {
            Ok(o) if o.status.success() => find_page_image(output_dir, page).ok_or_else(|| {
                RenderError::Rasterize {
                    page,
                    reason: "no image generated".to_string(),
                }
            }),
            Ok(o) => Err(RenderError::Rasterize {
                page,
                reason: String::from_utf8_lossy(&o.stderr).trim().to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RenderError::ToolNotFound(PDFTOPPM_NOT_FOUND.to_string()))
            }
            Err(e) => Err(RenderError::Io(e)),
        }
    }
}

impl RenderContext for PopplerContext {
    fn page_count(&self, pdf: &[u8]) -> Result<u32, RenderError> {
        DirectTextParser::new()
            .page_count(pdf)
            .map_err(|e| RenderError::Parse(e.to_string()))
    }

    fn rasterize(&self, pdf: &[u8], page: u32, scale: f32) -> Result<DynamicImage, RenderError> {
        let dpi = (scale * POINTS_PER_INCH).round().max(1.0) as u32;
        let temp_dir = TempDir::new()?;
        let pdf_path = temp_dir.path().join("document.pdf");
        std::fs::write(&pdf_path, pdf)?;

        let image_path = Self::run_pdftoppm(&pdf_path, page, dpi, temp_dir.path())?;
        Ok(image::open(&image_path)?)
    }
}

/// Find the image file for a specific page number.
///
/// pdftoppm names files like page-01.png, page-02.png, etc.
/// The padding width varies based on total page count.
fn find_page_image(temp_path: &Path, page_num: u32) -> Option<PathBuf> {
    for digits in [1, 2, 3, 4] {
        let filename = format!("page-{:0width$}.png", page_num, width = digits);
        let path = temp_path.join(&filename);
        if path.exists() {
            return Some(path);
        }
    }
    None
}

impl Default for PageRenderer {
    fn default() -> Self {
        Self::new(Arc::new(PopplerContext::new()))
    }
}
