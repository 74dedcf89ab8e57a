use std::collections::BTreeMap;

use log::{debug, warn};
use serde::{Serialize, Serializer, ser::SerializeMap};
use strum::IntoEnumIterator;

use crate::{
    capital::CostOfCapitalModel,
    config::ValuationConfig,
    error::{FinvalError, FinvalResult},
    financial::{Field, FinancialStatements, FinancialYear, Year},
    utils::stats::round_to,
};

static DAYS_PER_YEAR: f64 = 365.0;

/// Decimal places a metric is rounded to when it is finalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precision {
    Rate,
    Percent,
    Currency,
    Count,
}

impl Precision {
    pub fn decimals(&self) -> u32 {
        match self {
            Precision::Rate => 4,
            Precision::Percent | Precision::Currency => 2,
            Precision::Count => 0,
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
)]
pub enum Ratio {
    // Profitability, in percent
    #[strum(serialize = "ROE")]
    ReturnOnEquity,
    #[strum(serialize = "ROA")]
    ReturnOnAssets,
    #[strum(serialize = "ROIC")]
    ReturnOnInvestedCapital,
    #[strum(serialize = "Gross Profit Margin")]
    GrossProfitMargin,
    #[strum(serialize = "Operating Profit Margin")]
    OperatingProfitMargin,
    #[strum(serialize = "Net Profit Margin")]
    NetProfitMargin,
    #[strum(serialize = "EBITDA Margin")]
    EbitdaMargin,

    // Efficiency
    #[strum(serialize = "Asset Turnover")]
    AssetTurnover,
    #[strum(serialize = "Inventory Turnover")]
    InventoryTurnover,
    #[strum(serialize = "Receivables Turnover")]
    ReceivablesTurnover,
    #[strum(serialize = "Days Inventory Outstanding (DIO)")]
    DaysInventoryOutstanding,
    #[strum(serialize = "Days Sales Outstanding (DSO)")]
    DaysSalesOutstanding,
    #[strum(serialize = "Working Capital Turnover")]
    WorkingCapitalTurnover,

    // Liquidity
    #[strum(serialize = "Current Ratio")]
    CurrentRatio,
    #[strum(serialize = "Quick Ratio")]
    QuickRatio,
    #[strum(serialize = "Cash Ratio")]
    CashRatio,

    // Valuation
    #[strum(serialize = "EPS")]
    Eps,
    #[strum(serialize = "PE Ratio")]
    PriceToEarnings,
    #[strum(serialize = "PBV Ratio")]
    PriceToBook,

    // Cost of capital and cash flow
    #[strum(serialize = "Cost of Equity")]
    CostOfEquity,
    #[strum(serialize = "WACC")]
    Wacc,
    #[strum(serialize = "Operating Cash Flow (OCF)")]
    OperatingCashFlow,
    #[strum(serialize = "Free Cash Flow (FCF)")]
    FreeCashFlow,
    #[strum(serialize = "Unlevered Free Cash Flow (UFCF)")]
    UnleveredFreeCashFlow,
    #[strum(serialize = "Owner Earnings")]
    OwnerEarnings,
    #[strum(serialize = "Shares Outstanding")]
    SharesOutstanding,
}

impl Ratio {
    pub fn precision(&self) -> Precision {
        match self {
            Ratio::ReturnOnEquity
            | Ratio::ReturnOnAssets
            | Ratio::ReturnOnInvestedCapital
            | Ratio::GrossProfitMargin
            | Ratio::OperatingProfitMargin
            | Ratio::NetProfitMargin
            | Ratio::EbitdaMargin => Precision::Percent,

            Ratio::DaysInventoryOutstanding
            | Ratio::DaysSalesOutstanding
            | Ratio::Eps
            | Ratio::OperatingCashFlow
            | Ratio::FreeCashFlow
            | Ratio::UnleveredFreeCashFlow
            | Ratio::OwnerEarnings => Precision::Currency,

            Ratio::SharesOutstanding => Precision::Count,

            _ => Precision::Rate,
        }
    }
}

/// A finalized metric: either a rounded number or the reason it could not be
/// computed. Serialized as the number or `null`, never as zero.
#[derive(Clone, Debug, PartialEq)]
pub enum RatioValue {
    Available(f64),
    Unavailable(String),
}

impl RatioValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            RatioValue::Available(v) => Some(*v),
            RatioValue::Unavailable(_) => None,
        }
    }
}

impl Serialize for RatioValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            RatioValue::Available(v) => serializer.serialize_f64(*v),
            RatioValue::Unavailable(_) => serializer.serialize_none(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RatioRecord {
    pub year: Year,
    pub values: BTreeMap<Ratio, RatioValue>,
}

impl RatioRecord {
    pub fn get(&self, ratio: Ratio) -> Option<f64> {
        self.values.get(&ratio).and_then(RatioValue::value)
    }

    pub fn unavailable_reason(&self, ratio: Ratio) -> Option<&str> {
        match self.values.get(&ratio) {
            Some(RatioValue::Unavailable(reason)) => Some(reason),
            _ => None,
        }
    }
}

impl Serialize for RatioRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        map.serialize_entry("Year", &self.year)?;
        for (ratio, value) in &self.values {
            map.serialize_entry(&ratio.to_string(), value)?;
        }
        map.end()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkippedYear {
    pub year: Year,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RatioTable {
    pub symbol: String,
    pub records: BTreeMap<Year, RatioRecord>,
    pub skipped: Vec<SkippedYear>,
}

impl RatioTable {
    pub fn years(&self) -> Vec<Year> {
        self.records.keys().copied().collect()
    }

    pub fn latest(&self) -> Option<&RatioRecord> {
        self.records.values().next_back()
    }

    /// The metric by year ascending, `None` where it was unavailable.
    pub fn series(&self, ratio: Ratio) -> Vec<(Year, Option<f64>)> {
        self.records
            .iter()
            .map(|(year, record)| (*year, record.get(ratio)))
            .collect()
    }

    pub fn retain_years(&mut self, years: &[Year]) {
        self.records.retain(|year, _| years.contains(year));
        self.skipped.retain(|skipped| years.contains(&skipped.year));
    }
}

/// Computes one ratio record per year present in all three statements.
/// Years with an empty statement are skipped and reported; a metric whose
/// inputs are missing or fail their precondition is recorded as unavailable.
pub fn compute_ratios(statements: &FinancialStatements, config: &ValuationConfig) -> RatioTable {
    let mut table = RatioTable {
        symbol: statements.basic_info.symbol.to_uppercase(),
        ..Default::default()
    };

    for year in statements.common_years() {
        let Some(fiscal) = statements.fiscal_year(year) else {
            continue;
        };

        if !fiscal.is_complete() {
            let err = FinvalError::DataIncomplete {
                year,
                field: incomplete_statements(&fiscal),
            };
            warn!("[Ratios] Skip {year}: {err}");
            table.skipped.push(SkippedYear {
                year,
                reason: err.to_string(),
            });
            continue;
        }

        table.records.insert(year, compute_record(&fiscal, config));
    }

    table
}

pub fn compute_record(fiscal: &FinancialYear, config: &ValuationConfig) -> RatioRecord {
    let capital = CostOfCapitalModel::new(fiscal, config);

    let values = Ratio::iter()
        .map(|ratio| {
            let value = match compute_ratio(ratio, fiscal, &capital, config) {
                Ok(v) if v.is_finite() => {
                    RatioValue::Available(round_to(v, ratio.precision().decimals()))
                }
                Ok(v) => RatioValue::Unavailable(
                    FinvalError::ratio_unavailable(ratio, format!("non-finite result {v}"))
                        .to_string(),
                ),
                Err(err) => {
                    debug!("[Ratios] {} {ratio}: {err}", fiscal.year);
                    RatioValue::Unavailable(err.to_string())
                }
            };
            (ratio, value)
        })
        .collect();

    RatioRecord {
        year: fiscal.year,
        values,
    }
}

fn compute_ratio(
    ratio: Ratio,
    fiscal: &FinancialYear,
    capital: &CostOfCapitalModel,
    config: &ValuationConfig,
) -> FinvalResult<f64> {
    let f = |field: Field| fiscal.require(field);

    match ratio {
        Ratio::ReturnOnEquity => {
            Ok(f(Field::NetIncome)? / positive(ratio, Field::TotalShareholderEquity, fiscal)? * 100.0)
        }
        Ratio::ReturnOnAssets => {
            Ok(f(Field::NetIncome)? / positive(ratio, Field::TotalAssets, fiscal)? * 100.0)
        }
        Ratio::ReturnOnInvestedCapital => {
            let nopat = f(Field::Ebitda)? * (1.0 - config.tax_rate);
            let invested_capital = f(Field::TotalDebt)? + f(Field::TotalShareholderEquity)?
                - f(Field::CashAndEquivalents)?;
            Ok(nopat / require_positive(ratio, "invested capital", invested_capital)? * 100.0)
        }
        Ratio::GrossProfitMargin => margin(ratio, Field::GrossProfit, fiscal),
        Ratio::OperatingProfitMargin => margin(ratio, Field::OperatingIncome, fiscal),
        Ratio::NetProfitMargin => margin(ratio, Field::NetIncome, fiscal),
        Ratio::EbitdaMargin => margin(ratio, Field::Ebitda, fiscal),

        Ratio::AssetTurnover => {
            Ok(f(Field::Revenue)? / positive(ratio, Field::TotalAssets, fiscal)?)
        }
        Ratio::InventoryTurnover => inventory_turnover(fiscal),
        Ratio::ReceivablesTurnover => receivables_turnover(fiscal),
        Ratio::DaysInventoryOutstanding => {
            let turnover = inventory_turnover(fiscal)?;
            Ok(DAYS_PER_YEAR / require_positive(ratio, "inventory turnover", turnover)?)
        }
        Ratio::DaysSalesOutstanding => {
            let turnover = receivables_turnover(fiscal)?;
            Ok(DAYS_PER_YEAR / require_positive(ratio, "receivables turnover", turnover)?)
        }
        Ratio::WorkingCapitalTurnover => {
            let working_capital =
                f(Field::TotalCurrentAssets)? - f(Field::TotalCurrentLiabilities)?;
            Ok(f(Field::Revenue)? / require_positive(ratio, "working capital", working_capital)?)
        }

        Ratio::CurrentRatio => Ok(f(Field::TotalCurrentAssets)?
            / positive(ratio, Field::TotalCurrentLiabilities, fiscal)?),
        Ratio::QuickRatio => Ok((f(Field::TotalCurrentAssets)? - f(Field::Inventory)?)
            / positive(ratio, Field::TotalCurrentLiabilities, fiscal)?),
        Ratio::CashRatio => Ok(
            (f(Field::CashAndEquivalents)? + f(Field::ShortTermInvestments)?)
                / positive(ratio, Field::TotalCurrentLiabilities, fiscal)?,
        ),

        Ratio::Eps => {
            Ok(f(Field::NetIncome)? / positive(ratio, Field::WeightedAverageShares, fiscal)?)
        }
        Ratio::PriceToEarnings => {
            Ok(positive(ratio, Field::Price, fiscal)? / positive(ratio, Field::Eps, fiscal)?)
        }
        Ratio::PriceToBook => {
            let book_value_per_share = positive(ratio, Field::TotalShareholderEquity, fiscal)?
                / positive(ratio, Field::WeightedAverageShares, fiscal)?;
            Ok(positive(ratio, Field::Price, fiscal)? / book_value_per_share)
        }

        Ratio::CostOfEquity => Ok(capital.cost_of_equity()),
        Ratio::Wacc => Ok(capital.wacc()?.wacc),
        Ratio::OperatingCashFlow => operating_cash_flow(fiscal),
        Ratio::FreeCashFlow => Ok(operating_cash_flow(fiscal)? - f(Field::CapitalExpenditure)?),
        Ratio::UnleveredFreeCashFlow => Ok(f(Field::OperatingIncome)? * (1.0 - config.tax_rate)
            + f(Field::DepreciationAndAmortization)?
            - f(Field::CapitalExpenditure)?
            - f(Field::ChangeInWorkingCapital)?),
        Ratio::OwnerEarnings => Ok(f(Field::NetIncome)? + f(Field::DepreciationAndAmortization)?
            - f(Field::CapitalExpenditure)?
            - f(Field::ChangeInWorkingCapital)?),
        Ratio::SharesOutstanding => {
            let shares = fiscal
                .first_of(&[Field::SharesOutstanding, Field::WeightedAverageShares])
                .ok_or_else(|| FinvalError::DataIncomplete {
                    year: fiscal.year,
                    field: Field::SharesOutstanding.to_string(),
                })?;
            require_positive(ratio, "shares outstanding", shares)
        }
    }
}

fn operating_cash_flow(fiscal: &FinancialYear) -> FinvalResult<f64> {
    Ok(fiscal.require(Field::NetIncome)?
        + fiscal.require(Field::DepreciationAndAmortization)?
        + fiscal.get_or_zero(Field::StockBasedCompensation)
        + fiscal.get_or_zero(Field::OtherNonCashItems)
        + fiscal.require(Field::ChangeInWorkingCapital)?)
}

fn inventory_turnover(fiscal: &FinancialYear) -> FinvalResult<f64> {
    Ok(fiscal.require(Field::CostOfGoodsSold)?
        / positive(Ratio::InventoryTurnover, Field::Inventory, fiscal)?)
}

fn receivables_turnover(fiscal: &FinancialYear) -> FinvalResult<f64> {
    Ok(fiscal.require(Field::Revenue)?
        / positive(Ratio::ReceivablesTurnover, Field::AccountsReceivable, fiscal)?)
}

fn margin(ratio: Ratio, numerator: Field, fiscal: &FinancialYear) -> FinvalResult<f64> {
    Ok(fiscal.require(numerator)? / positive(ratio, Field::Revenue, fiscal)? * 100.0)
}

fn positive(ratio: Ratio, field: Field, fiscal: &FinancialYear) -> FinvalResult<f64> {
    require_positive(ratio, &field.to_string(), fiscal.require(field)?)
}

fn require_positive(ratio: Ratio, what: &str, value: f64) -> FinvalResult<f64> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(FinvalError::ratio_unavailable(
            ratio,
            format!("{what} must be > 0, got {value}"),
        ))
    }
}

fn incomplete_statements(fiscal: &FinancialYear) -> String {
    [
        (fiscal.income.is_empty(), "Income Statement"),
        (fiscal.balance.is_empty(), "Balance Sheet"),
        (fiscal.cash_flow.is_empty(), "Cash Flow Statement"),
    ]
    .iter()
    .filter(|(empty, _)| *empty)
    .map(|(_, name)| *name)
    .collect::<Vec<_>>()
    .join(", ")
}

#[cfg(test)]
pub(crate) mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::financial::{Statement, tests::statement};

    pub(crate) fn sample_year(year: Year) -> FinancialYear {
        FinancialYear {
            year,
            income: statement(&[
                (Field::Revenue, 1000.0),
                (Field::NetIncome, 150.0),
                (Field::OperatingIncome, 200.0),
                (Field::Ebitda, 260.0),
                (Field::GrossProfit, 450.0),
                (Field::DepreciationAndAmortization, 60.0),
                (Field::WeightedAverageShares, 50.0),
                (Field::Price, 60.0),
                (Field::Eps, 3.0),
                (Field::CostOfGoodsSold, 550.0),
            ]),
            balance: statement(&[
                (Field::TotalAssets, 2000.0),
                (Field::TotalCurrentAssets, 600.0),
                (Field::TotalCurrentLiabilities, 300.0),
                (Field::Inventory, 110.0),
                (Field::AccountsReceivable, 125.0),
                (Field::TotalShareholderEquity, 1000.0),
                (Field::TotalDebt, 400.0),
                (Field::CashAndEquivalents, 150.0),
                (Field::ShortTermInvestments, 30.0),
                (Field::SharesOutstanding, 48.0),
            ]),
            cash_flow: statement(&[
                (Field::CapitalExpenditure, 80.0),
                (Field::ChangeInWorkingCapital, 10.0),
                (Field::StockBasedCompensation, 5.0),
                (Field::OtherNonCashItems, 2.0),
                (Field::InterestPaid, 20.0),
                (Field::InterestReceived, 4.0),
            ]),
        }
    }

    #[test]
    fn test_compute_record() {
        let config = ValuationConfig::default();
        let record = compute_record(&sample_year(2023), &config);

        assert_eq!(record.get(Ratio::ReturnOnEquity), Some(15.0));
        assert_eq!(record.get(Ratio::ReturnOnAssets), Some(7.5));
        assert_eq!(record.get(Ratio::GrossProfitMargin), Some(45.0));
        assert_eq!(record.get(Ratio::OperatingProfitMargin), Some(20.0));
        assert_eq!(record.get(Ratio::NetProfitMargin), Some(15.0));
        assert_eq!(record.get(Ratio::EbitdaMargin), Some(26.0));
        // 260 * 0.79 / (400 + 1000 - 150) * 100
        assert_eq!(record.get(Ratio::ReturnOnInvestedCapital), Some(16.43));

        assert_eq!(record.get(Ratio::AssetTurnover), Some(0.5));
        assert_eq!(record.get(Ratio::InventoryTurnover), Some(5.0));
        assert_eq!(record.get(Ratio::ReceivablesTurnover), Some(8.0));
        assert_eq!(record.get(Ratio::DaysInventoryOutstanding), Some(73.0));
        assert_eq!(record.get(Ratio::DaysSalesOutstanding), Some(45.63));
        assert_eq!(record.get(Ratio::WorkingCapitalTurnover), Some(3.3333));

        assert_eq!(record.get(Ratio::CurrentRatio), Some(2.0));
        assert_eq!(record.get(Ratio::QuickRatio), Some(1.6333));
        assert_eq!(record.get(Ratio::CashRatio), Some(0.6));

        assert_eq!(record.get(Ratio::Eps), Some(3.0));
        assert_eq!(record.get(Ratio::PriceToEarnings), Some(20.0));
        assert_eq!(record.get(Ratio::PriceToBook), Some(3.0));

        assert_eq!(record.get(Ratio::CostOfEquity), Some(0.085));
        // equity 1000/1400, debt 400/1400, kd = -16/400
        let wacc = 1000.0 / 1400.0 * 0.085 + 400.0 / 1400.0 * (-16.0 / 400.0) * 0.79;
        assert_relative_eq!(
            record.get(Ratio::Wacc).unwrap(),
            round_to(wacc, 4),
            epsilon = 1e-12
        );

        assert_eq!(record.get(Ratio::OperatingCashFlow), Some(227.0));
        assert_eq!(record.get(Ratio::FreeCashFlow), Some(147.0));
        assert_eq!(record.get(Ratio::UnleveredFreeCashFlow), Some(128.0));
        assert_eq!(record.get(Ratio::OwnerEarnings), Some(120.0));
        assert_eq!(record.get(Ratio::SharesOutstanding), Some(48.0));
    }

    #[test]
    fn test_missing_field_only_disables_dependent_metrics() {
        let mut fiscal = sample_year(2023);
        fiscal.balance = statement(&[
            (Field::TotalAssets, 2000.0),
            (Field::TotalCurrentAssets, 600.0),
            (Field::TotalShareholderEquity, 1000.0),
        ]);

        let record = compute_record(&fiscal, &ValuationConfig::default());

        assert_eq!(record.get(Ratio::CurrentRatio), None);
        assert!(
            record
                .unavailable_reason(Ratio::CurrentRatio)
                .unwrap()
                .contains("Total Current Liabilities")
        );
        assert_eq!(record.get(Ratio::ReturnOnEquity), Some(15.0));
        assert_eq!(record.get(Ratio::FreeCashFlow), Some(147.0));
        assert_eq!(record.get(Ratio::SharesOutstanding), Some(50.0));
    }

    #[test]
    fn test_failed_precondition_is_unavailable_not_zero() {
        let mut fiscal = sample_year(2023);
        fiscal.income.insert(Field::Revenue, 0.0);
        fiscal.balance.insert(Field::TotalCurrentLiabilities, 0.0);

        let record = compute_record(&fiscal, &ValuationConfig::default());
        assert_eq!(
            record.values.get(&Ratio::NetProfitMargin).map(RatioValue::value),
            Some(None)
        );
        assert!(
            record
                .unavailable_reason(Ratio::CurrentRatio)
                .unwrap()
                .contains("Ratio Unavailable")
        );
        assert_eq!(record.get(Ratio::ReturnOnEquity), Some(15.0));
    }

    #[test]
    fn test_compute_ratios_skips_years_with_empty_statement() {
        let mut statements = FinancialStatements::default();
        statements.basic_info.symbol = "msft".to_string();
        for year in [2021, 2022, 2023] {
            let fiscal = sample_year(year);
            statements.income.insert(year, fiscal.income);
            statements.balance.insert(year, fiscal.balance);
            statements.cash_flow.insert(year, fiscal.cash_flow);
        }
        statements.cash_flow.insert(2022, Statement::default());
        statements.income.insert(2024, sample_year(2024).income);

        let table = compute_ratios(&statements, &ValuationConfig::default());

        assert_eq!(table.symbol, "MSFT");
        assert_eq!(table.years(), vec![2021, 2023]);
        assert_eq!(table.skipped.len(), 1);
        assert_eq!(table.skipped[0].year, 2022);
        assert!(table.skipped[0].reason.contains("Cash Flow Statement"));
        assert_eq!(table.latest().map(|r| r.year), Some(2023));
    }

    #[test]
    fn test_record_serializes_unavailable_as_null() {
        let mut fiscal = sample_year(2023);
        fiscal.income.insert(Field::Revenue, 0.0);
        let record = compute_record(&fiscal, &ValuationConfig::default());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["Year"], 2023);
        assert!(json["Net Profit Margin"].is_null());
        assert_eq!(json["ROE"], 15.0);
    }
}
