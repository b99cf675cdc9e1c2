//! Raster cleanup applied to rendered pages before enhanced OCR.

mod preprocess;

pub use preprocess::{row_variance_score, ImagePreprocessor, DESKEW_ANGLES};
