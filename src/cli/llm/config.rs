use colored::Colorize;
use finval::{VecOptions, api};

use crate::cli;

#[derive(clap::Args)]
pub struct LlmConfigCommand {
    #[arg(
        short = 'O',
        long = "option",
        help = "LLM provider's option, e.g. -O base_url:https://api.openai.com/v1 -O api_key:sk-xxx -O model:gpt-4o-mini"
    )]
    options: Vec<String>,

    #[arg(
        short = 'p',
        long = "protocol",
        help = "LLM provider's protocol, the default value is openai"
    )]
    protocol: Option<String>,

    #[arg(
        short = 't',
        long = "type",
        help = "LLM provider's type, the default value is chat"
    )]
    r#type: Option<String>,
}

impl LlmConfigCommand {
    pub async fn exec(&self) {
        let protocol = self
            .protocol
            .as_deref()
            .unwrap_or(api::LLM_SUPPORTED_PROTOCOLS[0]);
        let r#type = self
            .r#type
            .as_deref()
            .unwrap_or(api::LLM_SUPPORTED_TYPES[0]);
        if !cli::llm::is_supported("protocol", protocol, &api::LLM_SUPPORTED_PROTOCOLS)
            || !cli::llm::is_supported("type", r#type, &api::LLM_SUPPORTED_TYPES)
        {
            return;
        }

        let options_map = VecOptions(&self.options).into_map();
        match api::llm_config(r#type, protocol, &options_map).await {
            Ok(()) => {
                let model = api::llm_configured_model().unwrap_or_default();
                println!("LLM for '{type}' now uses {}", model.green());
            }
            Err(err) => println!("{}", err.to_string().red()),
        }
    }
}
