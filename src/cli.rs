use clap::Subcommand;

mod analyze;
mod config;
mod info;
mod llm;
mod sectors;

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Compute ratios and a DCF valuation of a stock")]
    #[clap(visible_aliases = &["a"])]
    Analyze(Box<analyze::AnalyzeCommand>),

    #[command(about = "Show or store valuation options")]
    Config(Box<config::ConfigCommand>),

    #[command(about = "Display terminal growth rates per sector")]
    Sectors(Box<sectors::SectorsCommand>),

    #[command(subcommand, about = "Configure and test the LLM provider")]
    Llm(Box<llm::LlmCommand>),

    #[command(about = "Display version")]
    Info(Box<info::InfoCommand>),
}
