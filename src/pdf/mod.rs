//! PDF handling: direct text parsing, page rasterization and rebuilding
//! image-only documents for the enhanced OCR pass.

mod assemble;
mod parser;
mod render;

pub use assemble::{AssembleError, DocumentAssembler};
pub use parser::{DirectTextParser, ParseError, ParsedText};
pub use render::{
    PageRenderer, PopplerContext, RenderContext, RenderError, RenderedPage, RenderedPages,
};

#[cfg(test)]
pub(crate) use parser::tests::{blank_pdf, pdf_with_pages, text_operations};
