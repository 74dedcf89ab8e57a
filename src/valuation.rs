use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    config::{CashFlowBasis, ValuationConfig},
    error::{FinvalError, FinvalResult},
    financial::Year,
    ratio::{Ratio, RatioTable},
};

pub use dcf::{DcfInput, DcfOutput, discount_cash_flows};
pub use growth::{GrowthRow, average_growth, growth_table, yoy_growth};
pub use sector::{infer_sector, terminal_growth_for_sector};

#[derive(Clone, Debug, Default)]
pub struct ValuationOptions {
    /// Overrides the configured forecast horizon.
    pub horizon: Option<u32>,
    /// Growth averaging ignores values dated at or after this year.
    pub as_of_year: Option<Year>,
    /// Current market price per share, if known.
    pub price: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValuationResult {
    pub symbol: String,
    pub sector: String,
    pub cash_flow_basis: CashFlowBasis,
    pub base_year: Year,
    pub base_cash_flow: f64,

    pub wacc_used: f64,
    /// Year the WACC was read from; may precede `base_year`.
    pub wacc_year: Year,
    pub g_start: f64,
    pub g_start_is_default: bool,
    pub g_terminal_input: f64,
    pub g_terminal: f64,
    pub terminal_growth_clamped: bool,
    pub years: u32,

    pub growth_path: Vec<f64>,
    pub cashflows_forecast: Vec<f64>,
    pub pv_cashflows: Vec<f64>,
    pub terminal_value: f64,
    pub pv_terminal_value: f64,
    pub intrinsic_equity_value: f64,

    pub shares_outstanding: f64,
    pub per_share_reliable: bool,
    pub intrinsic_value_per_share: f64,
    pub price: Option<f64>,
    pub price_to_intrinsic: Option<f64>,

    pub growth_table: Vec<GrowthRow>,
}

impl CashFlowBasis {
    pub fn ratio(&self) -> Ratio {
        match self {
            CashFlowBasis::FreeCashFlow => Ratio::FreeCashFlow,
            CashFlowBasis::UnleveredFreeCashFlow => Ratio::UnleveredFreeCashFlow,
            CashFlowBasis::OwnerEarnings => Ratio::OwnerEarnings,
        }
    }
}

/// Values the company behind `table` with a growth-fade DCF discounted at the
/// latest WACC of the table.
pub fn compute_valuation(
    table: &RatioTable,
    sector: &str,
    options: &ValuationOptions,
    config: &ValuationConfig,
) -> FinvalResult<ValuationResult> {
    let basis = config.cash_flow_basis;
    let series = table.series(basis.ratio());

    let (base_year, base_cash_flow) = latest_value(&series).ok_or_else(|| {
        FinvalError::MissingSeries(format!(
            "{}: no '{}' values to value from",
            table.symbol,
            basis.ratio()
        ))
    })?;

    let (wacc_year, wacc) = latest_value(&table.series(Ratio::Wacc)).ok_or_else(|| {
        let reason = table
            .latest()
            .and_then(|record| record.unavailable_reason(Ratio::Wacc))
            .unwrap_or("no WACC in any year");
        FinvalError::InsufficientCapitalStructure(format!("{}: {reason}", table.symbol))
    })?;
    if wacc_year != base_year {
        warn!(
            "[Valuation {}] WACC taken from {wacc_year}, base cash flow from {base_year}",
            table.symbol
        );
    }

    let historical_growth = average_growth(
        &series,
        config.growth_lookback,
        config.min_growth_observations,
        options.as_of_year,
    );
    let g_start = historical_growth
        .unwrap_or(config.default_growth)
        .clamp(config.growth_floor, config.growth_cap);
    debug!("[Valuation {}] historical growth {historical_growth:?}, start {g_start}", table.symbol);

    let g_terminal_input = terminal_growth_for_sector(sector, &config.sector_terminal_growth);
    let years = options.horizon.unwrap_or(config.horizon);

    let dcf = discount_cash_flows(&DcfInput {
        base_cash_flow,
        wacc,
        start_growth: g_start,
        terminal_growth: g_terminal_input,
        horizon: years,
        fade_growth: config.fade_growth,
        terminal_margin: config.terminal_margin,
        terminal_growth_floor: config.terminal_growth_floor,
        min_wacc: config.min_wacc,
    })?;

    // Shares of the latest year only; an older count would be stale.
    let (shares_outstanding, per_share_reliable) = match table
        .latest()
        .and_then(|record| record.get(Ratio::SharesOutstanding))
    {
        Some(shares) if shares > 0.0 => (shares, true),
        _ => (1.0, false),
    };
    let intrinsic_value_per_share = dcf.intrinsic_equity_value / shares_outstanding;

    let price = options.price.filter(|p| p.is_finite() && *p > 0.0);
    let price_to_intrinsic = match price {
        Some(price) if per_share_reliable && intrinsic_value_per_share > 0.0 => {
            Some(price / intrinsic_value_per_share)
        }
        _ => None,
    };

    info!(
        "[Valuation {}] WACC {wacc}, g {g_start} -> {}, value/share {intrinsic_value_per_share}",
        table.symbol, dcf.terminal_growth
    );

    Ok(ValuationResult {
        symbol: table.symbol.clone(),
        sector: sector.to_string(),
        cash_flow_basis: basis,
        base_year,
        base_cash_flow,
        wacc_used: wacc,
        wacc_year,
        g_start,
        g_start_is_default: historical_growth.is_none(),
        g_terminal_input,
        g_terminal: dcf.terminal_growth,
        terminal_growth_clamped: dcf.terminal_growth_clamped,
        years,
        growth_path: dcf.growth_path,
        cashflows_forecast: dcf.cash_flows_forecast,
        pv_cashflows: dcf.pv_cash_flows,
        terminal_value: dcf.terminal_value,
        pv_terminal_value: dcf.pv_terminal_value,
        intrinsic_equity_value: dcf.intrinsic_equity_value,
        shares_outstanding,
        per_share_reliable,
        intrinsic_value_per_share,
        price,
        price_to_intrinsic,
        growth_table: growth_table(table),
    })
}

fn latest_value(series: &[(Year, Option<f64>)]) -> Option<(Year, f64)> {
    series
        .iter()
        .rev()
        .find_map(|(year, value)| value.map(|v| (*year, v)))
}

mod dcf;
mod growth;
mod sector;
