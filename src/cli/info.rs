use colored::Colorize;
use finval::api;

#[derive(clap::Args)]
pub struct InfoCommand;

impl InfoCommand {
    pub async fn exec(&self) {
        let version = api::info::get_version().await;
        println!("Version: {}", version.cyan().bold());
        println!(
            "Data: {}",
            api::info::data_dir().display().to_string().green()
        );
        println!(
            "Valuation config: {}",
            api::valuation_config_path().display().to_string().green()
        );
    }
}
