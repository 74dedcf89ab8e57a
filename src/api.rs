use std::{collections::HashMap, path::PathBuf};

use crate::{
    analyze,
    error::{FinvalError, FinvalResult},
    llm,
};

pub use crate::{
    analyze::{Analysis, AnalyzeOptions},
    commentary::Commentary,
    config::{CashFlowBasis, SectorGrowth, ValuationConfig},
    data::{FmpProvider, LoadOptions, StatementSource, load_statements, load_statements_from},
    financial::{FinancialStatements, Year},
    llm::{ChatCompletionEvent, ChatCompletionOptions, ChatCompletionStream},
    ratio::{Ratio, RatioRecord, RatioTable, RatioValue},
    valuation::{GrowthRow, ValuationOptions, ValuationResult},
};

pub mod info;
pub mod sectors;

pub static LLM_SUPPORTED_PROTOCOLS: [&str; 1] = ["openai"];
pub static LLM_SUPPORTED_TYPES: [&str; 1] = ["chat"];

pub async fn analyze(symbol: &str, options: &AnalyzeOptions) -> FinvalResult<Analysis> {
    analyze::run(symbol, options).await
}

pub fn compute_ratios(statements: &FinancialStatements, config: &ValuationConfig) -> RatioTable {
    crate::ratio::compute_ratios(statements, config)
}

pub fn compute_valuation(
    table: &RatioTable,
    sector: &str,
    options: &ValuationOptions,
    config: &ValuationConfig,
) -> FinvalResult<ValuationResult> {
    crate::valuation::compute_valuation(table, sector, options, config)
}

pub fn valuation_config() -> FinvalResult<ValuationConfig> {
    ValuationConfig::load()
}

/// Applies `options` to the stored valuation config and persists it.
pub fn config_valuation(options: &HashMap<String, String>) -> FinvalResult<ValuationConfig> {
    let mut config = ValuationConfig::load()?;
    config.apply_options(options)?;
    config.store()?;

    Ok(config)
}

pub fn valuation_config_path() -> PathBuf {
    ValuationConfig::path()
}

pub async fn llm_config(
    r#type: &str,
    protocol: &str,
    options: &HashMap<String, String>,
) -> FinvalResult<()> {
    match r#type {
        "chat" => llm::config_chat(protocol, options).await,
        _ => Err(FinvalError::Invalid(
            "INVALID_LLM_TYPE",
            format!("Invalid LLM type '{type}'"),
        )),
    }
}

pub fn llm_configured_model() -> Option<String> {
    llm::configured_model()
}

pub async fn llm_chat_completion_stream(
    prompt: &str,
    system: Option<&str>,
    options: &ChatCompletionOptions,
) -> FinvalResult<ChatCompletionStream> {
    let mut messages = vec![];

    if let Some(system) = system {
        messages.push(llm::ChatMessage {
            role: llm::Role::System,
            content: system.to_string(),
            reasoning: None,
        });
    }

    messages.push(llm::ChatMessage {
        role: llm::Role::User,
        content: prompt.to_string(),
        reasoning: None,
    });

    llm::chat_completion_stream(&messages, options).await
}
