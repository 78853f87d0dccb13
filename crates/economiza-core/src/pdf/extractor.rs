//! PDF text extraction using lopdf and pdf-extract.

#[cfg(feature = "ocr")]
use image::{DynamicImage, GrayImage, RgbImage};
#[cfg(feature = "ocr")]
use lopdf::{Dictionary, Object, Stream};
use lopdf::Document;
#[cfg(feature = "ocr")]
use tracing::trace;
use tracing::{debug, warn};

use super::{PdfProcessor, PdfType, Result};
use crate::error::PdfError;

/// PDF text-layer extractor.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
    min_text_length: usize,
    max_pages: usize,
}

/// Text content of a PDF.
#[derive(Debug, Clone)]
pub struct PdfContent {
    /// Type of PDF content.
    pub pdf_type: PdfType,
    /// Extracted text (may be empty for scans).
    pub text: String,
    /// Number of pages in the document.
    pub page_count: u32,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
            min_text_length: 50,
            max_pages: 10,
        }
    }

    /// Minimum text length for the text layer to count as usable.
    pub fn with_min_text_length(mut self, min: usize) -> Self {
        self.min_text_length = min;
        self
    }

    /// Read at most this many pages (0 = unlimited).
    pub fn with_max_pages(mut self, max: usize) -> Self {
        self.max_pages = max;
        self
    }

    /// Extract text and classify the loaded document.
    pub fn extract_all(&self) -> Result<PdfContent> {
        let page_count = self.page_count();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        let text = self.extract_text()?;
        let pdf_type = self.classify(&text);

        debug!(
            "PDF analysis: {} pages, {} chars text -> {:?}",
            page_count,
            text.len(),
            pdf_type
        );

        Ok(PdfContent {
            pdf_type,
            text,
            page_count,
        })
    }

    fn classify(&self, text: &str) -> PdfType {
        if text.trim().len() >= self.min_text_length {
            PdfType::Text
        } else {
            PdfType::Scanned
        }
    }

    fn limited_pages(&self, doc: &Document) -> Option<Vec<u32>> {
        let total = doc.get_pages().len();
        if self.max_pages == 0 || total <= self.max_pages {
            return None;
        }
        Some((1..=self.max_pages as u32).collect())
    }
}

#[cfg(feature = "ocr")]
impl PdfExtractor {
    /// Raster images embedded in the loaded document, in object order.
    ///
    /// A scanned bill is a page-sized image per page, so at most `max_pages`
    /// images are decoded. JPEG and 8-bit gray or RGB samples are supported.
    pub fn scanned_images(&self) -> Vec<DynamicImage> {
        let Some(doc) = self.document.as_ref() else {
            return Vec::new();
        };
        let limit = if self.max_pages == 0 {
            usize::MAX
        } else {
            self.max_pages
        };

        let images: Vec<DynamicImage> = doc
            .objects
            .values()
            .filter_map(|object| match object {
                Object::Stream(stream) => decode_image(doc, stream),
                _ => None,
            })
            .take(limit)
            .collect();

        debug!("Decoded {} embedded images", images.len());
        images
    }
}

#[cfg(feature = "ocr")]
fn decode_image(doc: &Document, stream: &Stream) -> Option<DynamicImage> {
    let dict = &stream.dict;
    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }
    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;

    let filter = match dict.get(b"Filter") {
        Ok(Object::Name(name)) => Some(name.as_slice()),
        Ok(Object::Array(filters)) => filters.first().and_then(|f| f.as_name().ok()),
        _ => None,
    };
    match filter {
        Some(b"DCTDecode") => {
            return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
                .ok();
        }
        None | Some(b"FlateDecode") => {}
        Some(other) => {
            trace!("Skipping {} image", String::from_utf8_lossy(other));
            return None;
        }
    }

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|b| b.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        return None;
    }

    let samples = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    let pixels = (width as usize).checked_mul(height as usize)?;

    match color_space(doc, dict) {
        b"DeviceGray" | b"G" => GrayImage::from_raw(width, height, samples.get(..pixels)?.to_vec())
            .map(DynamicImage::ImageLuma8),
        b"DeviceRGB" | b"RGB" => {
            RgbImage::from_raw(width, height, samples.get(..pixels.checked_mul(3)?)?.to_vec())
                .map(DynamicImage::ImageRgb8)
        }
        other => {
            trace!("Skipping image in {} color space", String::from_utf8_lossy(other));
            None
        }
    }
}

#[cfg(feature = "ocr")]
fn color_space<'a>(doc: &'a Document, dict: &'a Dictionary) -> &'a [u8] {
    let name = match dict.get(b"ColorSpace") {
        Ok(Object::Name(name)) => Some(name.as_slice()),
        Ok(Object::Array(parts)) => parts.first().and_then(|p| p.as_name().ok()),
        Ok(Object::Reference(id)) => doc.get_object(*id).ok().and_then(|o| o.as_name().ok()),
        _ => None,
    };
    name.unwrap_or(b"DeviceRGB".as_slice())
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf_extract needs the decrypted bytes
            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn analyze(&self) -> PdfType {
        let text = self.extract_text().unwrap_or_default();
        self.classify(&text)
    }

    fn extract_text(&self) -> Result<String> {
        let doc = self
            .document
            .as_ref()
            .ok_or_else(|| PdfError::Parse("No document loaded".to_string()))?;

        if let Some(pages) = self.limited_pages(doc) {
            warn!("PDF has more than {} pages, reading only the first ones", self.max_pages);
            return doc
                .extract_text(&pages)
                .map_err(|e| PdfError::TextExtraction(e.to_string()));
        }

        pdf_extract::extract_text_from_mem(&self.raw_data)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use lopdf::{Object, Stream};
    use pretty_assertions::assert_eq;

    fn blank_pdf(pages: usize) -> Vec<u8> {
        pdf_with_objects(pages, Vec::new())
    }

    fn pdf_with_objects(pages: usize, extra: Vec<Object>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        for object in extra {
            doc.add_object(object);
        }
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for _ in 0..pages {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(Object::Reference(page_id));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_rejects_garbage() {
        let mut extractor = PdfExtractor::new();
        assert!(matches!(extractor.load(b"not a pdf"), Err(PdfError::Parse(_))));
        assert_eq!(extractor.page_count(), 0);
    }

    #[test]
    fn test_page_count() {
        let mut extractor = PdfExtractor::new();
        extractor.load(&blank_pdf(3)).unwrap();
        assert_eq!(extractor.page_count(), 3);
    }

    #[test]
    fn test_extract_without_document() {
        let extractor = PdfExtractor::new();
        assert!(matches!(extractor.extract_all(), Err(PdfError::NoPages)));
        assert!(extractor.extract_text().is_err());
    }

    #[cfg(feature = "ocr")]
    fn gray_image(width: i64, height: i64) -> Object {
        let samples = vec![200u8; (width * height) as usize];
        Object::Stream(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            samples,
        ))
    }

    #[cfg(feature = "ocr")]
    #[test]
    fn test_scanned_images() {
        let mut extractor = PdfExtractor::new();
        extractor
            .load(&pdf_with_objects(1, vec![gray_image(4, 2)]))
            .unwrap();

        let images = extractor.scanned_images();
        assert_eq!(images.len(), 1);
        assert_eq!((images[0].width(), images[0].height()), (4, 2));
    }

    #[cfg(feature = "ocr")]
    #[test]
    fn test_scanned_images_respects_page_limit() {
        let mut extractor = PdfExtractor::new().with_max_pages(2);
        let objects = vec![gray_image(2, 2), gray_image(2, 2), gray_image(2, 2)];
        extractor.load(&pdf_with_objects(3, objects)).unwrap();

        assert_eq!(extractor.scanned_images().len(), 2);
    }

    #[cfg(feature = "ocr")]
    #[test]
    fn test_truncated_samples_are_skipped() {
        let mut stream = match gray_image(4, 4) {
            Object::Stream(stream) => stream,
            _ => unreachable!(),
        };
        stream.set_content(vec![0u8; 3]);
        let mut extractor = PdfExtractor::new();
        extractor
            .load(&pdf_with_objects(1, vec![Object::Stream(stream)]))
            .unwrap();

        assert!(extractor.scanned_images().is_empty());
    }

    #[test]
    fn test_classify_by_text_length() {
        let extractor = PdfExtractor::new().with_min_text_length(5);
        assert_eq!(extractor.classify("  abc  "), PdfType::Scanned);
        assert_eq!(extractor.classify("boleto"), PdfType::Text);
    }
}
