use std::{collections::HashMap, path::PathBuf, str::FromStr, sync::LazyLock};

use serde::{Deserialize, Serialize};

use crate::{
    APP_DATA_DIR,
    error::{FinvalError, FinvalResult},
};

pub static TAX_RATE_DEFAULT: f64 = 0.21;
pub static RISK_FREE_RATE_DEFAULT: f64 = 0.03;
pub static BETA_DEFAULT: f64 = 1.0;
pub static MARKET_RETURNS_DEFAULT: [f64; 4] = [0.07, 0.08, 0.09, 0.10];
pub static GROWTH_DEFAULT: f64 = 0.08;
pub static GROWTH_FLOOR_DEFAULT: f64 = -0.30;
pub static GROWTH_CAP_DEFAULT: f64 = 0.25;
pub static GROWTH_LOOKBACK_DEFAULT: usize = 5;
pub static GROWTH_MIN_OBSERVATIONS_DEFAULT: usize = 2;
pub static TERMINAL_MARGIN_DEFAULT: f64 = 0.005;
pub static TERMINAL_GROWTH_FLOOR_DEFAULT: f64 = -0.50;
pub static WACC_MIN_DEFAULT: f64 = -0.99;
pub static HORIZON_DEFAULT: u32 = 10;
pub static HORIZON_MAX: u32 = 100;

pub static SECTOR_OTHER: &str = "Other";
pub static SECTOR_TERMINAL_GROWTH_DEFAULT: [(&str, f64); 7] = [
    ("Technology", 0.03),
    ("Information Technology", 0.03),
    ("Financials", 0.025),
    ("Finance", 0.025),
    ("Real Estate", 0.02),
    ("REIT", 0.02),
    (SECTOR_OTHER, 0.025),
];

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum CashFlowBasis {
    #[default]
    #[strum(serialize = "fcf")]
    FreeCashFlow,

    #[strum(serialize = "ufcf")]
    UnleveredFreeCashFlow,

    #[strum(serialize = "owner-earnings")]
    OwnerEarnings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectorGrowth {
    pub sector: String,
    pub rate: f64,
}

/// Every tunable used by ratio, cost-of-capital and DCF computation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationConfig {
    pub tax_rate: f64,
    pub risk_free_rate: f64,
    pub beta: f64,
    pub market_returns: Vec<f64>,

    pub default_growth: f64,
    pub growth_floor: f64,
    pub growth_cap: f64,
    pub growth_lookback: usize,
    pub min_growth_observations: usize,

    pub terminal_margin: f64,
    pub terminal_growth_floor: f64,
    pub min_wacc: f64,

    pub horizon: u32,
    pub fade_growth: bool,
    pub cash_flow_basis: CashFlowBasis,

    pub sector_terminal_growth: Vec<SectorGrowth>,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            tax_rate: TAX_RATE_DEFAULT,
            risk_free_rate: RISK_FREE_RATE_DEFAULT,
            beta: BETA_DEFAULT,
            market_returns: MARKET_RETURNS_DEFAULT.to_vec(),
            default_growth: GROWTH_DEFAULT,
            growth_floor: GROWTH_FLOOR_DEFAULT,
            growth_cap: GROWTH_CAP_DEFAULT,
            growth_lookback: GROWTH_LOOKBACK_DEFAULT,
            min_growth_observations: GROWTH_MIN_OBSERVATIONS_DEFAULT,
            terminal_margin: TERMINAL_MARGIN_DEFAULT,
            terminal_growth_floor: TERMINAL_GROWTH_FLOOR_DEFAULT,
            min_wacc: WACC_MIN_DEFAULT,
            horizon: HORIZON_DEFAULT,
            fade_growth: true,
            cash_flow_basis: CashFlowBasis::default(),
            sector_terminal_growth: SECTOR_TERMINAL_GROWTH_DEFAULT
                .iter()
                .map(|(sector, rate)| SectorGrowth {
                    sector: sector.to_string(),
                    rate: *rate,
                })
                .collect(),
        }
    }
}

impl ValuationConfig {
    pub fn load() -> FinvalResult<Self> {
        if VALUATION_CONFIG_PATH.exists() {
            Ok(confy::load_path(&*VALUATION_CONFIG_PATH)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn store(&self) -> FinvalResult<()> {
        self.validate()?;
        confy::store_path(&*VALUATION_CONFIG_PATH, self)?;
        Ok(())
    }

    pub fn path() -> PathBuf {
        VALUATION_CONFIG_PATH.clone()
    }

    /// Applies `key:value` overrides, e.g. `tax_rate:0.25` or
    /// `market_returns:0.06,0.08`.
    pub fn apply_options(&mut self, options: &HashMap<String, String>) -> FinvalResult<()> {
        let mut keys: Vec<&String> = options.keys().collect();
        keys.sort();

        for key in keys {
            let value = options[key].as_str();
            match key.to_lowercase().as_str() {
                "tax_rate" => self.tax_rate = parse_number(key, value)?,
                "risk_free_rate" => self.risk_free_rate = parse_number(key, value)?,
                "beta" => self.beta = parse_number(key, value)?,
                "market_returns" => {
                    self.market_returns = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| parse_number(key, s))
                        .collect::<FinvalResult<_>>()?;
                }
                "default_growth" => self.default_growth = parse_number(key, value)?,
                "growth_floor" => self.growth_floor = parse_number(key, value)?,
                "growth_cap" => self.growth_cap = parse_number(key, value)?,
                "growth_lookback" => self.growth_lookback = parse_number(key, value)?,
                "min_growth_observations" => {
                    self.min_growth_observations = parse_number(key, value)?
                }
                "terminal_margin" => self.terminal_margin = parse_number(key, value)?,
                "terminal_growth_floor" => self.terminal_growth_floor = parse_number(key, value)?,
                "min_wacc" => self.min_wacc = parse_number(key, value)?,
                "horizon" => self.horizon = parse_number(key, value)?,
                "fade_growth" => self.fade_growth = parse_number(key, value)?,
                "cash_flow_basis" => self.cash_flow_basis = CashFlowBasis::from_str(value)?,
                _ => {
                    return Err(FinvalError::Invalid(
                        "UNKNOWN_CONFIG_OPTION",
                        format!("Unknown valuation option '{key}'"),
                    ));
                }
            }
        }

        self.validate()
    }

    pub fn validate(&self) -> FinvalResult<()> {
        if !(0.0..1.0).contains(&self.tax_rate) {
            return Err(FinvalError::Invalid(
                "INVALID_TAX_RATE",
                format!("Tax rate must be in [0, 1), got {}", self.tax_rate),
            ));
        }

        if self.growth_floor > self.growth_cap {
            return Err(FinvalError::Invalid(
                "INVALID_GROWTH_BAND",
                format!(
                    "Growth floor {} is above growth cap {}",
                    self.growth_floor, self.growth_cap
                ),
            ));
        }

        if self.terminal_margin < 0.0 {
            return Err(FinvalError::Invalid(
                "INVALID_TERMINAL_MARGIN",
                format!("Terminal margin must not be negative, got {}", self.terminal_margin),
            ));
        }

        if self.horizon == 0 || self.horizon > HORIZON_MAX {
            return Err(FinvalError::Invalid(
                "INVALID_HORIZON",
                format!(
                    "Forecast horizon must be between 1 and {HORIZON_MAX} years, got {}",
                    self.horizon
                ),
            ));
        }

        if self.growth_lookback == 0 {
            return Err(FinvalError::Invalid(
                "INVALID_GROWTH_LOOKBACK",
                "Growth lookback must be at least 1 year".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> FinvalResult<T> {
    value.trim().parse().map_err(|_| {
        FinvalError::Invalid(
            "INVALID_CONFIG_VALUE",
            format!("Can not parse '{value}' for option '{key}'"),
        )
    })
}

static VALUATION_CONFIG_PATH: LazyLock<PathBuf> =
    LazyLock::new(|| APP_DATA_DIR.join("valuation.toml"));
