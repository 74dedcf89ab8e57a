use clap::Subcommand;

mod config;

#[derive(Subcommand)]
pub enum LlmCommand {
    #[command(about = "Configure the LLM provider used for commentary")]
    Config(Box<config::LlmConfigCommand>),

    #[command(about = "Send a prompt to the configured LLM provider")]
    Test(Box<test::LlmTestCommand>),
}

impl LlmCommand {
    pub async fn exec(&self) {
        match self {
            LlmCommand::Config(cmd) => {
                cmd.exec().await;
            }
            LlmCommand::Test(cmd) => {
                cmd.exec().await;
            }
        }
    }
}

fn is_supported(name: &str, value: &str, supported: &[&str]) -> bool {
    if supported.contains(&value) {
        return true;
    }

    println!(
        "Invalid {name} '{}', available values: {}",
        value,
        supported.join("/")
    );

    false
}
