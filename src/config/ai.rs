// src/config/ai.rs
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 800;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Summarizer settings. An empty `api_key` means "no credentials": the
/// summarizer then answers with a mock placeholder instead of calling out.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: OPENAI_CHAT_URL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl AiConfig {
    /// `OPEN_API_KEY` wins over `OPENAI_API_KEY`; `OPENAI_MODEL` overrides the model.
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = get("OPEN_API_KEY")
            .or_else(|| get("OPENAI_API_KEY"))
            .map(|k| k.trim().to_string())
            .unwrap_or_default();
        let mut cfg = Self {
            api_key,
            ..Self::default()
        };
        if let Some(m) = get("OPENAI_MODEL").filter(|m| !m.trim().is_empty()) {
            cfg.model = m.trim().to_string();
        }
        cfg
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Diagnostics-safe view: never log the key itself.
    pub fn key_len(&self) -> usize {
        self.api_key.len()
    }
}
