use colored::Colorize;
use finval::{VecOptions, api};

#[derive(clap::Args)]
pub struct ConfigCommand {
    #[arg(
        short = 'O',
        long = "option",
        help = "Valuation option to store, e.g. -O tax_rate:0.25 -O market_returns:0.07,0.09 -O horizon:5"
    )]
    options: Vec<String>,
}

impl ConfigCommand {
    pub async fn exec(&self) {
        let result = if self.options.is_empty() {
            api::valuation_config()
        } else {
            api::config_valuation(&VecOptions(&self.options).into_map())
        };

        match result {
            Ok(config) => {
                println!("[{}]", api::valuation_config_path().display().to_string().cyan());
                match serde_json::to_string_pretty(&config) {
                    Ok(text) => println!("{text}"),
                    Err(err) => println!("{}", err.to_string().red()),
                }
            }
            Err(err) => println!("{}", err.to_string().red()),
        }
    }
}
