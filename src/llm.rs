use std::{collections::HashMap, path::PathBuf, str::FromStr, sync::LazyLock};

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Receiver;

use crate::{
    APP_DATA_DIR, LLM_CHAT_TEMPERATURE_DEFAULT,
    error::{FinvalError, FinvalResult},
    llm::provider::{ChatProvider, open_ai::OpenAiProvider},
};

static OPENAI_BASE_URL_DEFAULT: &str = "https://api.openai.com/v1";
static OPENAI_MODEL_DEFAULT: &str = "gpt-4o-mini";
static OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Default, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Protocol {
    #[default]
    OpenAI,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    protocol: Protocol,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug)]
pub enum ChatCompletionEvent {
    Content(String),
    ReasoningContent(String),
    Error(FinvalError),
}

pub struct ChatCompletionOptions {
    pub enable_think: bool, // Some multi-mode-models can switch between think/nothink mode, such as qwen3
    pub temperature: f64,
}

pub struct ChatCompletionStream {
    receiver: Receiver<ChatCompletionEvent>,
}

#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub reasoning: Option<String>,
}

#[allow(dead_code)]
#[derive(strum::Display, strum::EnumString, Copy, Clone, Debug, PartialEq)]
#[strum(ascii_case_insensitive)]
pub enum Role {
    Bot,
    User,
    System,
}

pub async fn chat_completion(
    messages: &[ChatMessage],
    options: &ChatCompletionOptions,
) -> FinvalResult<ChatMessage> {
    let cfg = Config::load()?;
    debug!("[LLM] {} {} ({} messages)", cfg.protocol, cfg.model, messages.len());

    let provider = match cfg.protocol {
        Protocol::OpenAI => OpenAiProvider::new(&cfg.base_url, &cfg.api_key, &cfg.model),
    };

    provider.chat_completion(messages, options).await
}

pub async fn chat_completion_stream(
    messages: &[ChatMessage],
    options: &ChatCompletionOptions,
) -> FinvalResult<ChatCompletionStream> {
    let cfg = Config::load()?;

    let provider = match cfg.protocol {
        Protocol::OpenAI => OpenAiProvider::new(&cfg.base_url, &cfg.api_key, &cfg.model),
    };

    provider.chat_completion_stream(messages, options).await
}

pub async fn config_chat(protocol: &str, options: &HashMap<String, String>) -> FinvalResult<()> {
    let mut cfg: Config = confy::load_path(&*CHAT_CONFIG_PATH).unwrap_or_default();

    cfg.protocol = Protocol::from_str(protocol)?;
    cfg.apply_options(options);
    cfg.validate()?;

    confy::store_path(&*CHAT_CONFIG_PATH, &cfg)?;

    Ok(())
}

/// Model name of the configured provider, for reports.
pub fn configured_model() -> Option<String> {
    Config::load().ok().map(|cfg| cfg.model)
}

mod provider;

static CHAT_CONFIG_PATH: LazyLock<PathBuf> = LazyLock::new(|| APP_DATA_DIR.join("llm-chat.toml"));

impl Default for Config {
    fn default() -> Self {
        Self {
            protocol: Protocol::default(),
            base_url: OPENAI_BASE_URL_DEFAULT.to_string(),
            api_key: String::new(),
            model: OPENAI_MODEL_DEFAULT.to_string(),
        }
    }
}

impl Config {
    /// Stored config, or defaults when nothing was stored. An empty key is
    /// taken from `OPENAI_API_KEY`.
    fn load() -> FinvalResult<Self> {
        let mut cfg: Config = if CHAT_CONFIG_PATH.exists() {
            confy::load_path(&*CHAT_CONFIG_PATH)?
        } else {
            Config::default()
        };

        if cfg.api_key.is_empty() {
            cfg.api_key = std::env::var(OPENAI_API_KEY_ENV).unwrap_or_default();
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_options(&mut self, options: &HashMap<String, String>) {
        if let Some(base_url) = options.get("base_url") {
            self.base_url = base_url.trim().to_string();
        }

        if let Some(api_key) = options.get("api_key") {
            self.api_key = api_key.trim().to_string();
        }

        if let Some(model) = options.get("model") {
            self.model = model.trim().to_string();
        }
    }

    fn validate(&self) -> FinvalResult<()> {
        if self.base_url.is_empty() {
            return Err(FinvalError::Required(
                "OPTION_REQUIRED",
                "Required option 'base_url' is missing".to_string(),
            ));
        }

        if self.api_key.is_empty() {
            return Err(FinvalError::Required(
                "OPTION_REQUIRED",
                format!("Required option 'api_key' is missing (or set {OPENAI_API_KEY_ENV})"),
            ));
        }

        if self.model.is_empty() {
            return Err(FinvalError::Required(
                "OPTION_REQUIRED",
                "Required option 'model' is missing".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ChatCompletionOptions {
    fn default() -> Self {
        Self {
            enable_think: false,
            temperature: LLM_CHAT_TEMPERATURE_DEFAULT,
        }
    }
}

impl ChatCompletionOptions {
    pub fn with_enable_think(mut self, enable_think: bool) -> Self {
        self.enable_think = enable_think;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

impl ChatCompletionStream {
    pub fn new(receiver: Receiver<ChatCompletionEvent>) -> Self {
        Self { receiver }
    }

    pub fn close(&mut self) {
        self.receiver.close()
    }

    pub async fn next(&mut self) -> Option<ChatCompletionEvent> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_options() {
        let mut cfg = Config::default();
        assert_eq!(cfg.base_url, OPENAI_BASE_URL_DEFAULT);
        assert!(cfg.validate().is_err());

        let mut options = HashMap::new();
        options.insert("api_key".to_string(), " sk-test ".to_string());
        options.insert("model".to_string(), "qwen3-32b".to_string());
        cfg.apply_options(&options);

        assert_eq!(cfg.api_key, "sk-test");
        assert_eq!(cfg.model, "qwen3-32b");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"api_key": "k"}"#).unwrap();
        assert_eq!(cfg.model, OPENAI_MODEL_DEFAULT);
        assert_eq!(cfg.protocol.to_string(), "OpenAI");
    }
}
