//! Request and response types shared by all backends.

/// A single JSON-producing generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    /// System instruction describing the output contract.
    pub system: String,
    /// User prompt.
    pub prompt: String,
    /// Ask the backend to constrain output to JSON when it supports it.
    pub json_mode: bool,
}

impl GenerateRequest {
    /// Create a JSON-mode request.
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            json_mode: true,
        }
    }

    /// Set JSON mode.
    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }
}

/// Raw answer from a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateResponse {
    /// Generated text, possibly wrapped in markdown.
    pub text: String,
    /// Model that produced the text.
    pub model: String,
    /// Wall-clock time spent waiting for the backend.
    pub elapsed_ms: u64,
}

impl GenerateResponse {
    /// The JSON document inside the generated text.
    pub fn json_payload(&self) -> &str {
        extract_json_block(&self.text)
    }
}

/// Strip markdown code fences that models like to wrap JSON in.
///
/// Handles ```` ```json ... ``` ```` and bare ```` ``` ... ``` ```` blocks; text
/// without fences is returned trimmed.
pub fn extract_json_block(text: &str) -> &str {
    let text = text.trim();

    let body = if let Some(start) = text.find("```json") {
        &text[start + "```json".len()..]
    } else if let Some(start) = text.find("```") {
        &text[start + "```".len()..]
    } else {
        return text;
    };

    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_json_is_trimmed() {
        assert_eq!(extract_json_block("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn test_json_fence() {
        let text = "Here you go:\n```json\n{\"amount\": 10.5}\n```\nanything else";
        assert_eq!(extract_json_block(text), "{\"amount\": 10.5}");
    }

    #[test]
    fn test_bare_fence() {
        let text = "```\n{\"issuer\": null}\n```";
        assert_eq!(extract_json_block(text), "{\"issuer\": null}");
    }

    #[test]
    fn test_unterminated_fence() {
        assert_eq!(extract_json_block("```json\n{}"), "{}");
    }

    #[test]
    fn test_request_defaults_to_json_mode() {
        let request = GenerateRequest::new("sys", "user");
        assert!(request.json_mode);
        assert!(!request.with_json_mode(false).json_mode);
    }
}
