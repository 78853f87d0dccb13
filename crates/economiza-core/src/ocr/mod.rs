//! Document text providers.

#[cfg(feature = "ocr")]
mod engine;

#[cfg(feature = "ocr")]
pub use engine::{assemble, ImageOcrEngine, RecognizedLine};

#[cfg(feature = "ocr")]
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::models::EconomizaConfig;
#[cfg(feature = "pdf")]
use crate::models::PdfConfig;
#[cfg(feature = "pdf")]
use crate::pdf::{PdfContent, PdfExtractor, PdfProcessor, PdfType};

/// Text read from a document, with the provider's confidence in it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrOutput {
    pub text: String,
    pub confidence: f32,
}

impl OcrOutput {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }

    /// Nothing could be read.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Turns document bytes into text.
///
/// Implementations never fail: unreadable input yields [`OcrOutput::empty`].
#[async_trait]
pub trait OcrProvider: Send + Sync {
    async fn extract_text(&self, bytes: &[u8], content_type: &str) -> OcrOutput;
}

/// Reads plain text, PDF text layers and, with an [`ImageOcrEngine`]
/// attached, images and scanned PDFs.
///
/// Without an engine, images yield empty text and scanned PDFs yield
/// whatever text layer they have at confidence 0.
#[derive(Debug, Clone)]
pub struct DocumentTextExtractor {
    pdf_min_text_length: usize,
    pdf_max_pages: usize,
    #[cfg(feature = "ocr")]
    engine: Option<Arc<ImageOcrEngine>>,
}

impl DocumentTextExtractor {
    pub fn new() -> Self {
        Self {
            pdf_min_text_length: 50,
            pdf_max_pages: 10,
            #[cfg(feature = "ocr")]
            engine: None,
        }
    }

    /// Build from configuration, loading OCR models when a model
    /// directory is configured. A model directory that fails to load is
    /// logged and image OCR stays off.
    pub fn from_config(config: &EconomizaConfig) -> Self {
        #[allow(unused_mut)]
        let mut extractor = Self::new();
        #[cfg(feature = "pdf")]
        {
            extractor = extractor.with_pdf_config(&config.pdf);
        }

        #[cfg(feature = "ocr")]
        if let Some(dir) = &config.ocr.model_dir {
            match ImageOcrEngine::from_dir(dir, &config.ocr) {
                Ok(engine) => extractor = extractor.with_engine(Arc::new(engine)),
                Err(e) => warn!("Image OCR disabled: {}", e),
            }
        }

        #[cfg(not(feature = "ocr"))]
        if config.ocr.model_dir.is_some() {
            warn!("OCR model directory configured but OCR support is disabled");
        }

        extractor
    }

    #[cfg(feature = "pdf")]
    pub fn with_pdf_config(mut self, config: &PdfConfig) -> Self {
        self.pdf_min_text_length = config.min_text_length;
        self.pdf_max_pages = config.max_pages;
        self
    }

    #[cfg(feature = "ocr")]
    pub fn with_engine(mut self, engine: Arc<ImageOcrEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Synchronous variant of [`OcrProvider::extract_text`].
    ///
    /// PDF parsing and OCR are CPU bound; async callers go through the
    /// trait, which runs this on the blocking pool.
    pub fn read(&self, bytes: &[u8], content_type: &str) -> OcrOutput {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "text/plain" => OcrOutput::new(String::from_utf8_lossy(bytes), 1.0),
            "application/pdf" => self.read_pdf(bytes),
            m if m.starts_with("image/") => self.read_image(bytes, m),
            other => {
                warn!("Unsupported content type for text extraction: {}", other);
                OcrOutput::empty()
            }
        }
    }

    #[cfg(feature = "ocr")]
    fn read_image(&self, bytes: &[u8], mime: &str) -> OcrOutput {
        let Some(engine) = &self.engine else {
            warn!("No image OCR engine available for {}", mime);
            return OcrOutput::empty();
        };

        let image = match image::load_from_memory(bytes) {
            Ok(image) => image,
            Err(e) => {
                warn!("Could not decode {}: {}", mime, e);
                return OcrOutput::empty();
            }
        };

        match engine.recognize(&image) {
            Ok(output) => output,
            Err(e) => {
                warn!("Image OCR failed: {}", e);
                OcrOutput::empty()
            }
        }
    }

    #[cfg(not(feature = "ocr"))]
    fn read_image(&self, _bytes: &[u8], mime: &str) -> OcrOutput {
        warn!("No image OCR engine available for {}", mime);
        OcrOutput::empty()
    }

    #[cfg(feature = "pdf")]
    fn read_pdf(&self, bytes: &[u8]) -> OcrOutput {
        let mut extractor = PdfExtractor::new()
            .with_min_text_length(self.pdf_min_text_length)
            .with_max_pages(self.pdf_max_pages);

        if let Err(e) = extractor.load(bytes) {
            warn!("Could not open PDF: {}", e);
            return OcrOutput::empty();
        }

        match extractor.extract_all() {
            Ok(content) if content.pdf_type == PdfType::Text => {
                debug!("Read {} chars from PDF text layer", content.text.len());
                OcrOutput::new(content.text, 1.0)
            }
            Ok(content) => self.read_scanned(&extractor, content),
            Err(e) => {
                warn!("PDF text extraction failed: {}", e);
                OcrOutput::empty()
            }
        }
    }

    #[cfg(feature = "ocr")]
    fn read_scanned(&self, extractor: &PdfExtractor, content: PdfContent) -> OcrOutput {
        let Some(engine) = &self.engine else {
            warn!("PDF has no usable text layer ({} pages)", content.page_count);
            return OcrOutput::new(content.text, 0.0);
        };

        let pages: Vec<OcrOutput> = extractor
            .scanned_images()
            .iter()
            .filter_map(|image| match engine.recognize(image) {
                Ok(output) if !output.text.trim().is_empty() => Some(output),
                Ok(_) => None,
                Err(e) => {
                    warn!("OCR of scanned page failed: {}", e);
                    None
                }
            })
            .collect();

        if pages.is_empty() {
            warn!("No readable images in scanned PDF ({} pages)", content.page_count);
            return OcrOutput::empty();
        }

        let confidence = pages.iter().map(|p| p.confidence).sum::<f32>() / pages.len() as f32;
        let text = pages
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("\n\n");
        debug!("OCR read {} chars from scanned PDF", text.len());
        OcrOutput::new(text, confidence)
    }

    #[cfg(all(feature = "pdf", not(feature = "ocr")))]
    fn read_scanned(&self, _extractor: &PdfExtractor, content: PdfContent) -> OcrOutput {
        warn!("PDF has no usable text layer ({} pages)", content.page_count);
        OcrOutput::new(content.text, 0.0)
    }

    #[cfg(not(feature = "pdf"))]
    fn read_pdf(&self, _bytes: &[u8]) -> OcrOutput {
        warn!("PDF support is disabled");
        OcrOutput::empty()
    }
}

impl Default for DocumentTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrProvider for DocumentTextExtractor {
    async fn extract_text(&self, bytes: &[u8], content_type: &str) -> OcrOutput {
        let extractor = self.clone();
        let bytes = bytes.to_vec();
        let content_type = content_type.to_string();

        match tokio::task::spawn_blocking(move || extractor.read(&bytes, &content_type)).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Text extraction task failed: {}", e);
                OcrOutput::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text() {
        let out = DocumentTextExtractor::new().read("Vencimento: 10/01/2025".as_bytes(), "text/plain; charset=utf-8");
        assert_eq!(out, OcrOutput::new("Vencimento: 10/01/2025", 1.0));
    }

    #[test]
    fn test_images_without_engine_and_unknown_types_are_empty() {
        let extractor = DocumentTextExtractor::new();
        assert_eq!(extractor.read(&[0x89, 0x50], "image/png"), OcrOutput::empty());
        assert_eq!(extractor.read(b"x", "application/zip"), OcrOutput::empty());
    }

    #[test]
    fn test_broken_pdf_is_empty() {
        let out = DocumentTextExtractor::new().read(b"%PDF-garbage", "application/pdf");
        assert_eq!(out, OcrOutput::empty());
    }

    #[tokio::test]
    async fn test_async_extraction_matches_read() {
        let extractor = DocumentTextExtractor::new();
        let text = "Beneficiário: AGUA SA\nValor: R$ 45,90";

        let out = extractor.extract_text(text.as_bytes(), "text/plain").await;
        assert_eq!(out, extractor.read(text.as_bytes(), "text/plain"));
        assert_eq!(out.confidence, 1.0);

        let out = extractor.extract_text(b"%PDF-garbage", "application/pdf").await;
        assert_eq!(out, OcrOutput::empty());
    }

    #[test]
    fn test_from_config_without_models() {
        let config = EconomizaConfig::default();
        let extractor = DocumentTextExtractor::from_config(&config);
        assert_eq!(extractor.pdf_max_pages, config.pdf.max_pages);
        #[cfg(feature = "ocr")]
        assert!(extractor.engine.is_none());
    }

    #[cfg(feature = "ocr")]
    #[test]
    fn test_from_config_with_missing_models() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EconomizaConfig::default();
        config.ocr.model_dir = Some(dir.path().to_path_buf());

        let extractor = DocumentTextExtractor::from_config(&config);
        assert!(extractor.engine.is_none());
    }
}
