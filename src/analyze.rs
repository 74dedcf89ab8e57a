use std::{collections::HashMap, path::PathBuf, sync::LazyLock};

use chrono::{Datelike, Local};
use log::{debug, info, warn};

use crate::{
    APP_DATA_DIR,
    commentary::{self, Commentary},
    config::ValuationConfig,
    data::{self, LoadOptions},
    error::{FinvalError, FinvalResult},
    export,
    llm,
    ratio::{RatioTable, compute_ratios},
    utils::years::parse_years,
    valuation::{ValuationOptions, ValuationResult, compute_valuation, infer_sector},
};

pub struct AnalyzeOptions {
    /// e.g. "2015-2024" or "2019,2021"; all years when `None`.
    pub years: Option<String>,
    pub refresh: bool,
    pub horizon: Option<u32>,
    pub fade_growth: Option<bool>,
    /// Used in place of the stored valuation config when set.
    pub config: Option<ValuationConfig>,
    /// `key:value` overrides of the valuation config.
    pub config_options: HashMap<String, String>,
    pub out_dir: PathBuf,
    pub data_dir: Option<PathBuf>,
    pub narrate: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            years: None,
            refresh: false,
            horizon: None,
            fade_growth: None,
            config: None,
            config_options: HashMap::new(),
            out_dir: EXPORT_DIR_DEFAULT.clone(),
            data_dir: None,
            narrate: true,
        }
    }
}

pub struct Analysis {
    pub symbol: String,
    pub company_name: String,
    pub price: Option<f64>,
    pub sector: String,
    pub ratios: RatioTable,
    pub valuation: FinvalResult<ValuationResult>,
    pub commentary: Option<Commentary>,
    pub exported: Vec<PathBuf>,
}

pub async fn run(symbol: &str, options: &AnalyzeOptions) -> FinvalResult<Analysis> {
    let mut config = match &options.config {
        Some(config) => config.clone(),
        None => ValuationConfig::load()?,
    };
    config.apply_options(&options.config_options)?;
    if let Some(fade_growth) = options.fade_growth {
        config.fade_growth = fade_growth;
    }
    debug!("{config:?}");

    let years = parse_years(options.years.as_deref())?;

    let mut load_options = LoadOptions {
        refresh: options.refresh,
        ..Default::default()
    };
    if let Some(data_dir) = &options.data_dir {
        load_options.data_dir = data_dir.clone();
    }
    let statements = data::load_statements(symbol, &load_options).await?;

    let symbol = data::normalize_symbol(symbol)?;
    let sector = infer_sector(&symbol, statements.basic_info.sector());
    info!("[Analyze {symbol}] Sector {sector}");

    let mut ratios = compute_ratios(&statements, &config);
    ratios.symbol = symbol.clone();
    ratios.retain_years(&years);
    if ratios.records.is_empty() {
        warn!("[Analyze {symbol}] No complete fiscal year in the selected range");
    }

    let mut exported = export::export_ratios(&options.out_dir, &ratios).await?;

    let valuation = compute_valuation(
        &ratios,
        &sector,
        &ValuationOptions {
            horizon: options.horizon,
            as_of_year: Some(Local::now().year()),
            price: statements.basic_info.price,
        },
        &config,
    );

    match &valuation {
        Ok(result) => {
            exported.extend(export::export_valuation(&options.out_dir, result).await?);
        }
        Err(err) => warn!("[Analyze {symbol}] Valuation failed: {err}"),
    }

    let commentary = if options.narrate {
        narrate(&symbol, &ratios, valuation.as_ref().ok(), options, &mut exported).await
    } else {
        None
    };

    Ok(Analysis {
        company_name: statements.basic_info.name.clone(),
        price: statements.basic_info.price,
        symbol,
        sector,
        ratios,
        valuation,
        commentary,
        exported,
    })
}

/// Narration never fails the analysis; errors only leave it empty.
async fn narrate(
    symbol: &str,
    ratios: &RatioTable,
    valuation: Option<&ValuationResult>,
    options: &AnalyzeOptions,
    exported: &mut Vec<PathBuf>,
) -> Option<Commentary> {
    let commentary = match commentary::narrate(ratios.latest(), valuation).await {
        Ok(commentary) => commentary,
        Err(err) => {
            warn!("[Analyze {symbol}] Narration skipped: {err}");
            return None;
        }
    };

    let model = llm::configured_model();
    match export::export_commentary(&options.out_dir, symbol, model.as_deref(), &commentary).await
    {
        Ok(path) => exported.push(path),
        Err(err) => warn!("[Analyze {symbol}] Narration not saved: {err}"),
    }

    Some(commentary)
}

impl Analysis {
    pub fn valuation_error(&self) -> Option<&FinvalError> {
        self.valuation.as_ref().err()
    }
}

static EXPORT_DIR_DEFAULT: LazyLock<PathBuf> = LazyLock::new(|| APP_DATA_DIR.join("exports"));
