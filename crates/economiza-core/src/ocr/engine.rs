//! Image OCR backed by `pure-onnx-ocr`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use image::DynamicImage;
use pure_onnx_ocr::engine::{OcrEngine, OcrEngineBuilder};
use tracing::{debug, info};

use super::OcrOutput;
use crate::error::OcrError;
use crate::models::OcrConfig;

/// Detection model file name inside the model directory.
pub const DETECTION_MODEL: &str = "det.onnx";
/// Recognition model file name inside the model directory.
pub const RECOGNITION_MODEL: &str = "latin_rec.onnx";
/// Character dictionary file name inside the model directory.
pub const DICTIONARY: &str = "latin_dict.txt";

/// A box joins the current row when its top edge is less than this many
/// pixels below the top edge of the row's first box.
const ROW_HEIGHT: f32 = 20.0;

/// A recognized text box, positioned by its top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedLine {
    pub text: String,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
}

/// Detection + recognition engine loaded from a model directory.
pub struct ImageOcrEngine {
    // one image at a time
    engine: Mutex<OcrEngine>,
    model_dir: PathBuf,
    recognition_threshold: f32,
    keep_unk: bool,
}

impl ImageOcrEngine {
    /// Load the models from `model_dir`.
    pub fn from_dir(model_dir: &Path, config: &OcrConfig) -> Result<Self, OcrError> {
        let det_path = model_dir.join(DETECTION_MODEL);
        let rec_path = model_dir.join(RECOGNITION_MODEL);
        let dict_path = model_dir.join(DICTIONARY);

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.is_file() {
                return Err(OcrError::ModelLoad(format!("missing {}", path.display())));
            }
        }

        let engine = OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded OCR models from {}", model_dir.display());

        Ok(Self {
            engine: Mutex::new(engine),
            model_dir: model_dir.to_path_buf(),
            recognition_threshold: config.recognition_threshold,
            keep_unk: config.keep_unk,
        })
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Read the text of one image in reading order.
    pub fn recognize(&self, image: &DynamicImage) -> Result<OcrOutput, OcrError> {
        let start = Instant::now();

        let results = {
            let engine = self
                .engine
                .lock()
                .map_err(|_| OcrError::Recognition("engine lock poisoned".to_string()))?;
            engine
                .run_from_image(image)
                .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?
        };

        let lines: Vec<RecognizedLine> = results
            .iter()
            .map(|r| {
                let (x, y) = top_left(&r.bounding_box);
                let text = if self.keep_unk {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ")
                };
                RecognizedLine {
                    text,
                    confidence: r.confidence,
                    x,
                    y,
                }
            })
            .collect();

        let output = assemble(lines, self.recognition_threshold);
        debug!(
            "OCR read {} boxes into {} chars in {}ms",
            results.len(),
            output.text.len(),
            start.elapsed().as_millis()
        );
        Ok(output)
    }
}

impl fmt::Debug for ImageOcrEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageOcrEngine")
            .field("model_dir", &self.model_dir)
            .field("recognition_threshold", &self.recognition_threshold)
            .finish_non_exhaustive()
    }
}

/// Join recognized boxes into page text.
///
/// Boxes whose top edges lie within one row height of the row's first box
/// share a row and are joined with a space, left to right. Rows are separated
/// by newlines, top to bottom. Confidence is the mean over the boxes kept.
pub fn assemble(lines: Vec<RecognizedLine>, min_confidence: f32) -> OcrOutput {
    let mut kept: Vec<RecognizedLine> = lines
        .into_iter()
        .filter(|l| l.confidence >= min_confidence && !l.text.trim().is_empty())
        .collect();
    if kept.is_empty() {
        return OcrOutput::empty();
    }

    let confidence = kept.iter().map(|l| l.confidence).sum::<f32>() / kept.len() as f32;
    kept.sort_by(|a, b| a.y.total_cmp(&b.y));

    let mut rows: Vec<Vec<RecognizedLine>> = Vec::new();
    for line in kept {
        let starts_row = rows
            .last()
            .is_none_or(|row| line.y - row[0].y >= ROW_HEIGHT);
        if starts_row {
            rows.push(vec![line]);
        } else if let Some(row) = rows.last_mut() {
            row.push(line);
        }
    }

    let text = rows
        .into_iter()
        .map(|mut row| {
            row.sort_by(|a, b| a.x.total_cmp(&b.x));
            row.iter()
                .map(|l| l.text.trim())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n");

    OcrOutput::new(text, confidence)
}

fn top_left(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f32, f32) {
    polygon
        .exterior()
        .coords()
        .fold((f32::MAX, f32::MAX), |(x, y), c| {
            (x.min(c.x as f32), y.min(c.y as f32))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line(text: &str, confidence: f32, x: f32, y: f32) -> RecognizedLine {
        RecognizedLine {
            text: text.to_string(),
            confidence,
            x,
            y,
        }
    }

    #[test]
    fn test_assemble_reading_order() {
        let output = assemble(
            vec![
                line("15/12/2024", 0.9, 300.0, 104.0),
                line("Beneficiário: AGUA SA", 0.8, 10.0, 40.0),
                line("Vencimento:", 0.7, 10.0, 98.0),
            ],
            0.0,
        );

        assert_eq!(output.text, "Beneficiário: AGUA SA\nVencimento: 15/12/2024");
        assert!((output.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_assemble_drops_weak_and_blank_boxes() {
        let output = assemble(
            vec![
                line("R$ 45,90", 0.9, 0.0, 0.0),
                line("##", 0.2, 50.0, 0.0),
                line("  ", 0.99, 90.0, 0.0),
            ],
            0.5,
        );
        assert_eq!(output, OcrOutput::new("R$ 45,90", 0.9));
    }

    #[test]
    fn test_assemble_nothing() {
        assert_eq!(assemble(Vec::new(), 0.0), OcrOutput::empty());
    }

    #[test]
    fn test_missing_models() {
        let dir = tempfile::tempdir().unwrap();
        let result = ImageOcrEngine::from_dir(dir.path(), &OcrConfig::default());
        assert!(matches!(result, Err(OcrError::ModelLoad(_))));
    }

    /// Runs against real models when `ECONOMIZA_OCR_MODELS` points at them.
    #[test]
    fn test_blank_page_with_models() {
        let Some(dir) = std::env::var_os("ECONOMIZA_OCR_MODELS") else {
            return;
        };
        let engine = ImageOcrEngine::from_dir(Path::new(&dir), &OcrConfig::default()).unwrap();
        let blank = DynamicImage::new_rgb8(320, 240);

        let output = engine.recognize(&blank).unwrap();
        assert!(output.text.trim().is_empty());
    }
}
