use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    LLM_COMMENTARY_TEMPERATURE,
    error::FinvalResult,
    llm,
    llm::{ChatCompletionOptions, ChatMessage, Role},
    ratio::RatioRecord,
    utils,
    valuation::ValuationResult,
};

static COMMENTARY_PLACEHOLDER: &str = "-";

/// Narrated view of one company, one field per section of the prompt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Commentary {
    pub quality: String,
    pub profitability_efficiency: String,
    pub valuation: String,
    pub risks: String,
    pub view: String,
    pub suitable_for: String,

    /// Set when the reply was not JSON and was kept as raw text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Commentary {
    /// Parses the model reply. A reply that is not a JSON object is kept
    /// whole in `quality` with the other sections set to "-".
    pub fn from_reply(reply: &str) -> Self {
        let json_str = utils::markdown::extract_json_block(reply);

        match serde_json::from_str::<Value>(&json_str) {
            Ok(json) if json.is_object() => Self {
                quality: section(&json, "quality"),
                profitability_efficiency: section(&json, "profitability_efficiency"),
                valuation: section(&json, "valuation"),
                risks: section(&json, "risks"),
                view: section(&json, "view"),
                suitable_for: section(&json, "suitable_for"),
                note: None,
            },
            _ => Self {
                quality: reply.trim().to_string(),
                profitability_efficiency: COMMENTARY_PLACEHOLDER.to_string(),
                valuation: COMMENTARY_PLACEHOLDER.to_string(),
                risks: COMMENTARY_PLACEHOLDER.to_string(),
                view: COMMENTARY_PLACEHOLDER.to_string(),
                suitable_for: COMMENTARY_PLACEHOLDER.to_string(),
                note: Some("Reply was not valid JSON, kept as raw text".to_string()),
            },
        }
    }
}

pub async fn narrate(
    latest: Option<&RatioRecord>,
    valuation: Option<&ValuationResult>,
) -> FinvalResult<Commentary> {
    let data_json = json!({
        "ratios": latest,
        "valuation": valuation,
    });
    debug!("[Commentary Data] {data_json}");

    let prompt = format!(
        r#"
Analyse the company using the latest-year financial ratios and the DCF valuation below:
```
{data_json}
```

{COMMENTARY_JSON_PROMPT}
"#
    );

    let messages: Vec<ChatMessage> = vec![
        ChatMessage {
            role: Role::System,
            content: LLM_SYSTEM.to_string(),
            reasoning: None,
        },
        ChatMessage {
            role: Role::User,
            content: prompt,
            reasoning: None,
        },
    ];

    let options = ChatCompletionOptions::default().with_temperature(LLM_COMMENTARY_TEMPERATURE);
    let bot_message = llm::chat_completion(&messages, &options).await?;
    debug!("[Commentary LLM] {bot_message:?}");

    Ok(Commentary::from_reply(&bot_message.content))
}

fn section(json: &Value, key: &str) -> String {
    match &json[key] {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Null => COMMENTARY_PLACEHOLDER.to_string(),
        Value::String(_) => COMMENTARY_PLACEHOLDER.to_string(),
        other => other.to_string(),
    }
}

static LLM_SYSTEM: &str = r#"
You are a conservative fundamental equity analyst. You judge business quality
from profitability, efficiency and balance-sheet strength, treat DCF output as
a range rather than a point estimate, and call out data gaps plainly. You never
give personalised financial advice.
"#;

static COMMENTARY_JSON_PROMPT: &str = r#"
Return a single JSON object shaped like:
```
{
    "quality": "business quality in 2-3 sentences",
    "profitability_efficiency": "margins, returns and turnover",
    "valuation": "intrinsic value versus price and the key assumptions",
    "risks": "main risks, including missing or unreliable data",
    "view": "overall view",
    "suitable_for": "which kind of investor this may suit"
}
```

Notes:
- Return the JSON only, without any extra explanation or text.
- Make sure the result is valid JSON.
"#;
