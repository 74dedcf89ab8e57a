use std::path::PathBuf;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use finval::{
    VecOptions,
    api::{self, Analysis, AnalyzeOptions, Ratio},
    error::FinvalError,
};
use strum::IntoEnumIterator;
use tabled::settings::{Color, Width, measurement::Percent, object::Columns, peaker::Priority};
use tokio::time::Duration;

static RATIO_YEARS_SHOWN: usize = 5;

#[derive(clap::Args)]
pub struct AnalyzeCommand {
    #[arg(
        short = 'y',
        long = "years",
        help = "Fiscal years to keep, e.g. -y 2015-2024 or -y 2019,2021, all years by default"
    )]
    years: Option<String>,

    #[arg(
        short = 'r',
        long = "refresh",
        help = "Fetch statements again even when they are cached"
    )]
    refresh: bool,

    #[arg(
        short = 'H',
        long = "horizon",
        help = "Forecast horizon in years, the default value is 10"
    )]
    horizon: Option<u32>,

    #[arg(long = "no-fade", help = "Keep the starting growth for the whole horizon")]
    no_fade: bool,

    #[arg(
        short = 'O',
        long = "option",
        help = "Valuation option for this run, e.g. -O tax_rate:0.25 -O cash_flow_basis:ufcf"
    )]
    options: Vec<String>,

    #[arg(short = 'o', long = "out", help = "Directory the result files are written to")]
    out_dir: Option<PathBuf>,

    #[arg(long = "no-ai", help = "Skip the LLM commentary")]
    no_ai: bool,

    #[arg(help = "Stock symbol to analyze, e.g. AAPL")]
    symbol: String,
}

impl AnalyzeCommand {
    pub async fn exec(&self) {
        let mut options = AnalyzeOptions {
            years: self.years.clone(),
            refresh: self.refresh,
            horizon: self.horizon,
            fade_growth: self.no_fade.then_some(false),
            config_options: VecOptions(&self.options).into_map(),
            narrate: !self.no_ai,
            ..Default::default()
        };
        if let Some(out_dir) = &self.out_dir {
            options.out_dir = out_dir.clone();
        }

        let spinner = ProgressBar::new_spinner();
        spinner
            .set_style(ProgressStyle::with_template("{msg} {spinner:.cyan} [{elapsed}]").unwrap());
        spinner.set_message(format!("[{}]", self.symbol.to_uppercase()));
        spinner.enable_steady_tick(Duration::from_millis(100));

        match api::analyze(&self.symbol, &options).await {
            Ok(analysis) => {
                spinner.finish_with_message(format!(
                    "[{}] {} ({})",
                    analysis.symbol.cyan(),
                    analysis.company_name,
                    analysis.sector
                ));

                print_ratios(&analysis);
                print_valuation(&analysis);
                print_commentary(&analysis);

                for path in &analysis.exported {
                    println!("[I] Saved {}", path.display().to_string().green());
                }
            }
            Err(err) => {
                spinner.finish_with_message(format!(
                    "[{}] {}",
                    self.symbol.to_uppercase(),
                    err.to_string().red()
                ));

                if let FinvalError::Invalid(code, _) = err {
                    if code == "UNKNOWN_CONFIG_OPTION" {
                        println!(
                            "[I] Run `{}` to see the stored valuation options",
                            "finval config".green()
                        );
                    }
                }
            }
        }
    }
}

fn print_ratios(analysis: &Analysis) {
    let records: Vec<_> = analysis
        .ratios
        .records
        .values()
        .rev()
        .take(RATIO_YEARS_SHOWN)
        .rev()
        .collect();
    if records.is_empty() {
        println!("{}", "No complete fiscal year to compute ratios".yellow());
        return;
    }

    let mut header = vec!["".to_string()];
    header.extend(records.iter().map(|record| record.year.to_string()));

    let mut table_data: Vec<Vec<String>> = vec![header];
    for ratio in Ratio::iter() {
        let decimals = ratio.precision().decimals() as usize;
        let mut row = vec![ratio.to_string()];
        row.extend(records.iter().map(|record| match record.get(ratio) {
            Some(value) => format!("{value:.decimals$}"),
            None => "-".to_string(),
        }));
        table_data.push(row);
    }

    let mut table = tabled::builder::Builder::from_iter(&table_data).build();
    table.modify(Columns::first(), Color::FG_CYAN);
    println!("{table}");

    for skipped in &analysis.ratios.skipped {
        println!("[W] {} skipped: {}", skipped.year, skipped.reason.yellow());
    }
}

fn print_valuation(analysis: &Analysis) {
    let valuation = match &analysis.valuation {
        Ok(valuation) => valuation,
        Err(err) => {
            println!("[Valuation] {}", err.to_string().red());
            return;
        }
    };

    let mut table_data: Vec<Vec<String>> = vec![
        vec![
            "Cash Flow Basis".to_string(),
            format!("{} ({})", valuation.cash_flow_basis.ratio(), valuation.base_year),
        ],
        vec![
            "Base Cash Flow".to_string(),
            format!("{:.2}", valuation.base_cash_flow),
        ],
        vec![
            "WACC".to_string(),
            format!("{:.2}% ({})", valuation.wacc_used * 100.0, valuation.wacc_year),
        ],
        vec![
            "Starting Growth".to_string(),
            format!(
                "{:.2}%{}",
                valuation.g_start * 100.0,
                if valuation.g_start_is_default { " (default)" } else { "" }
            ),
        ],
        vec![
            "Terminal Growth".to_string(),
            format!(
                "{:.2}%{}",
                valuation.g_terminal * 100.0,
                if valuation.terminal_growth_clamped {
                    format!(" (clamped from {:.2}%)", valuation.g_terminal_input * 100.0)
                } else {
                    "".to_string()
                }
            ),
        ],
        vec![
            "Intrinsic Equity Value".to_string(),
            format!("{:.2}", valuation.intrinsic_equity_value),
        ],
        vec![
            "Intrinsic Value / Share".to_string(),
            if valuation.per_share_reliable {
                format!("{:.2}", valuation.intrinsic_value_per_share)
            } else {
                format!("{:.2} (shares unknown)", valuation.intrinsic_value_per_share)
            },
        ],
    ];

    if let Some(price) = valuation.price {
        table_data.push(vec!["Price".to_string(), format!("{price:.2}")]);
    }
    if let Some(price_to_intrinsic) = valuation.price_to_intrinsic {
        table_data.push(vec![
            "Price / Intrinsic".to_string(),
            format!("{price_to_intrinsic:.2}"),
        ]);
    }

    let mut table = tabled::builder::Builder::from_iter(&table_data).build();
    table.modify(Columns::first(), Color::FG_GREEN);
    println!("{table}");
}

fn print_commentary(analysis: &Analysis) {
    let Some(commentary) = &analysis.commentary else {
        return;
    };

    let table_data: Vec<Vec<String>> = [
        ("Quality", &commentary.quality),
        ("Profitability", &commentary.profitability_efficiency),
        ("Valuation", &commentary.valuation),
        ("Risks", &commentary.risks),
        ("View", &commentary.view),
        ("Suitable For", &commentary.suitable_for),
    ]
    .iter()
    .map(|(title, text)| vec![title.to_string(), text.to_string()])
    .collect();

    let mut table = tabled::builder::Builder::from_iter(&table_data).build();
    table.modify(Columns::first(), Color::FG_CYAN);
    table.with((
        Width::wrap(Percent(80)).priority(Priority::max(true)),
        Width::increase(Percent(30)).priority(Priority::min(true)),
    ));
    println!("{table}");

    if let Some(note) = &commentary.note {
        println!("[W] {}", note.yellow());
    }
}
