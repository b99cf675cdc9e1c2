//! Rebuild a PDF with one full-page image per page.
//!
//! The enhanced OCR pass sends the cleaned bitmaps back to the recognizer as
//! a regular PDF, so page order and page geometry must survive the trip.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use thiserror::Error;

use super::render::RenderedPage;

/// Errors from rebuilding a document.
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("No pages to assemble")]
    NoPages,

    #[error("Failed to encode page {page}: {reason}")]
    Encode { page: u32, reason: String },

    #[error("Failed to write PDF: {0}")]
    Write(String),
}

/// Writes page bitmaps into a new image-only PDF.
#[derive(Debug, Clone, Copy)]
pub struct DocumentAssembler {
    /// Resolution the bitmaps were rendered at, used to size the pages.
    dpi: u32,
}

impl DocumentAssembler {
    pub fn new(dpi: u32) -> Self {
        Self { dpi: dpi.max(1) }
    }

    /// Page size in points for a bitmap dimension in pixels.
    fn points(&self, pixels: u32) -> i64 {
        ((pixels as f64 * 72.0 / self.dpi as f64).round() as i64).max(1)
    }

    /// Assemble pages in the order given.
    pub fn assemble(&self, pages: &[RenderedPage]) -> Result<Vec<u8>, AssembleError> {
        if pages.is_empty() {
            return Err(AssembleError::NoPages);
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

        for (index, page) in pages.iter().enumerate() {
            let (color_space, jpeg) = encode_jpeg(&page.image).map_err(|reason| {
                AssembleError::Encode {
                    page: page.page_number,
                    reason,
                }
            })?;

            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => page.width() as i64,
                    "Height" => page.height() as i64,
                    "ColorSpace" => color_space,
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                jpeg,
            ));

            let width_pt = self.points(page.width());
            let height_pt = self.points(page.height());
            let name = format!("Im{}", index + 1);

            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![
                            Object::Integer(width_pt),
                            Object::Integer(0),
                            Object::Integer(0),
                            Object::Integer(height_pt),
                            Object::Integer(0),
                            Object::Integer(0),
                        ],
                    ),
                    Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
                    Operation::new("Q", vec![]),
                ],
            };
            let encoded = content
                .encode()
                .map_err(|e| AssembleError::Write(e.to_string()))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(width_pt),
                    Object::Integer(height_pt),
                ],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "XObject" => dictionary! { name.as_str() => image_id },
                },
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
        doc.save_to(&mut out)
            .map_err(|e| AssembleError::Write(e.to_string()))?;
        Ok(out)
    }
}

/// Encode a bitmap as baseline JPEG, keeping greyscale pages single-channel.
fn encode_jpeg(image: &DynamicImage) -> Result<(&'static str, Vec<u8>), String> {
    let (color_space, normalized) = match image {
        DynamicImage::ImageLuma8(_) => ("DeviceGray", image.clone()),
        other if !other.color().has_color() => {
            ("DeviceGray", DynamicImage::ImageLuma8(other.to_luma8()))
        }
        other => ("DeviceRGB", DynamicImage::ImageRgb8(other.to_rgb8())),
    };

    let mut bytes = Vec::new();
    normalized
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .map_err(|e| e.to_string())?;
    Ok((color_space, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::DirectTextParser;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn grey_page(page_number: u32, width: u32, height: u32) -> RenderedPage {
        RenderedPage {
            page_number,
            image: DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([255]))),
        }
    }

    #[test]
    fn test_assembled_pdf_keeps_page_count() {
        let pages = vec![grey_page(1, 50, 70), grey_page(2, 50, 70), grey_page(3, 40, 40)];
        let pdf = DocumentAssembler::new(300).assemble(&pages).unwrap();

        assert!(pdf.starts_with(b"%PDF-1.5"));
        assert_eq!(DirectTextParser::new().page_count(&pdf).unwrap(), 3);
    }

    #[test]
    fn test_page_size_follows_dpi() {
        let assembler = DocumentAssembler::new(300);
        assert_eq!(assembler.points(2550), 612);
        assert_eq!(assembler.points(1), 1);
        assert_eq!(DocumentAssembler::new(72).points(100), 100);
    }

    #[test]
    fn test_rgb_pages_are_accepted() {
        let page = RenderedPage {
            page_number: 1,
            image: DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([200, 10, 10]))),
        };
        let pdf = DocumentAssembler::new(150).assemble(&[page]).unwrap();
        assert_eq!(DirectTextParser::new().page_count(&pdf).unwrap(), 1);
    }

    #[test]
    fn test_no_pages_is_an_error() {
        assert!(matches!(
            DocumentAssembler::new(300).assemble(&[]),
            Err(AssembleError::NoPages)
        ));
    }
}
