//! Configuration structures for the bill pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::bill::PaymentMethod;
use super::ids::UserId;

/// Environment variable consulted when a Gemini provider has no key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Main configuration for economiza.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomizaConfig {
    /// Field extraction thresholds.
    pub extraction: ExtractionConfig,

    /// AI fallback configuration.
    pub ai: AiConfig,

    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// Image OCR engine configuration.
    pub ocr: OcrConfig,

    /// Document storage and bill ledger locations.
    pub storage: StorageConfig,

    /// Payment scheduling defaults.
    pub schedule: ScheduleConfig,

    /// The user the CLI acts as.
    pub user_id: UserId,
}

impl Default for EconomizaConfig {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig::default(),
            ai: AiConfig::default(),
            pdf: PdfConfig::default(),
            ocr: OcrConfig::default(),
            storage: StorageConfig::default(),
            schedule: ScheduleConfig::default(),
            user_id: UserId(Uuid::nil()),
        }
    }
}

/// Field extraction thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// OCR text shorter than this (after trimming) yields an empty result.
    pub min_text_length: usize,

    /// Regex confidence at or above which the AI extractor is skipped.
    pub ai_fallback_threshold: f32,

    /// Final confidence at or above which a bill is confirmed automatically.
    pub auto_confirm_threshold: f32,

    /// OCR characters sent to the AI extractor.
    pub max_prompt_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_text_length: 10,
            ai_fallback_threshold: 0.80,
            auto_confirm_threshold: 0.90,
            max_prompt_chars: 2000,
        }
    }
}

/// AI extractor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Use the AI fallback at all.
    pub enabled: bool,

    /// Per-provider timeout in seconds.
    pub timeout_secs: u64,

    /// Providers in the order they are tried.
    pub providers: Vec<ProviderConfig>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 25,
            providers: vec![ProviderConfig::default_ollama()],
        }
    }
}

/// One ranked AI provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderConfig {
    /// Local Ollama server.
    Ollama { base_url: String, model: String },
    /// Google Gemini. An empty key is read from `GEMINI_API_KEY`.
    Gemini {
        #[serde(default)]
        api_key: String,
        model: String,
    },
}

impl ProviderConfig {
    pub fn default_ollama() -> Self {
        ProviderConfig::Ollama {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:7b".to_string(),
        }
    }

    pub fn default_gemini() -> Self {
        ProviderConfig::Gemini {
            api_key: String::new(),
            model: "gemini-2.0-flash".to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProviderConfig::Ollama { .. } => "ollama",
            ProviderConfig::Gemini { .. } => "gemini",
        }
    }
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Minimum embedded text length to consider the text layer usable.
    pub min_text_length: usize,

    /// Maximum pages to read (0 = unlimited).
    pub max_pages: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            min_text_length: 50,
            max_pages: 10,
        }
    }
}

/// Image OCR engine configuration.
///
/// The engine is only available with the `ocr` cargo feature; without a
/// model directory images and scanned PDFs yield no text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Directory holding `det.onnx`, `latin_rec.onnx` and `latin_dict.txt`.
    pub model_dir: Option<PathBuf>,

    /// Recognized lines below this confidence (0.0 - 1.0) are dropped.
    pub recognition_threshold: f32,

    /// Keep `[UNK]` markers for unrecognized glyphs.
    pub keep_unk: bool,
}

/// Where documents and the bill ledger live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for stored documents and receipts.
    pub data_dir: PathBuf,

    /// JSON file holding bills, documents and payments.
    pub store_file: PathBuf,

    /// Lifetime of presigned URLs, in seconds.
    pub presigned_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = PathBuf::from("economiza-data");
        Self {
            store_file: base.join("bills.json"),
            data_dir: base.join("documents"),
            presigned_ttl_secs: 3600,
        }
    }
}

/// Payment scheduling defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Days before the due date to send reminders.
    pub notify_before_days: Vec<u32>,

    /// Method recorded when a bill is paid without a prior schedule.
    pub default_method: PaymentMethod,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            notify_before_days: vec![7, 3, 1],
            default_method: PaymentMethod::Pix,
        }
    }
}

impl EconomizaConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = EconomizaConfig::default();
        assert_eq!(config.extraction.ai_fallback_threshold, 0.80);
        assert_eq!(config.extraction.auto_confirm_threshold, 0.90);
        assert_eq!(config.ai.timeout_secs, 25);
        assert_eq!(config.schedule.notify_before_days, vec![7, 3, 1]);
        assert_eq!(config.ai.providers, vec![ProviderConfig::default_ollama()]);
        assert_eq!(config.ocr.model_dir, None);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: EconomizaConfig = serde_json::from_str(
            r#"{"ai": {"enabled": false, "providers": [{"kind": "gemini", "model": "gemini-2.0-flash"}]}}"#,
        )
        .unwrap();

        assert!(!config.ai.enabled);
        assert_eq!(config.ai.timeout_secs, 25);
        assert_eq!(config.ai.providers, vec![ProviderConfig::default_gemini()]);
        assert_eq!(config.extraction.min_text_length, 10);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = EconomizaConfig::default();
        config.pdf.max_pages = 3;
        config.save(&path).unwrap();

        let loaded = EconomizaConfig::from_file(&path).unwrap();
        assert_eq!(loaded.pdf.max_pages, 3);
        assert_eq!(loaded.user_id, config.user_id);
    }
}
