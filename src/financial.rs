use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    error::{FinvalError, FinvalResult},
    utils::{lookup::first_match, years::year_from_str},
};

pub type Year = i32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum StatementKind {
    #[strum(serialize = "Income Statement")]
    Income,

    #[strum(serialize = "Balance Sheet")]
    Balance,

    #[strum(serialize = "Cash Flow Statement")]
    CashFlow,
}

/// Fixed statement labels. The first alias is the canonical label written by
/// the loader; the rest are spellings seen in other exports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum Field {
    #[strum(serialize = "Revenue")]
    Revenue,
    #[strum(serialize = "Net Income")]
    NetIncome,
    #[strum(serialize = "Operating Income")]
    OperatingIncome,
    #[strum(serialize = "EBITDA")]
    Ebitda,
    #[strum(serialize = "Gross Profit")]
    GrossProfit,
    #[strum(serialize = "Depreciation and Amortization")]
    DepreciationAndAmortization,
    #[strum(serialize = "Weighted Average Shares")]
    WeightedAverageShares,
    #[strum(serialize = "price")]
    Price,
    #[strum(serialize = "EPS")]
    Eps,
    #[strum(serialize = "Cost of Goods Sold")]
    CostOfGoodsSold,

    #[strum(serialize = "Total Assets")]
    TotalAssets,
    #[strum(serialize = "Total Current Assets")]
    TotalCurrentAssets,
    #[strum(serialize = "Total Current Liabilities")]
    TotalCurrentLiabilities,
    #[strum(serialize = "Inventory")]
    Inventory,
    #[strum(serialize = "Accounts Receivable")]
    AccountsReceivable,
    #[strum(serialize = "Total Shareholder Equity")]
    TotalShareholderEquity,
    #[strum(serialize = "Total Debt")]
    TotalDebt,
    #[strum(serialize = "Cash and Cash Equivalents")]
    CashAndEquivalents,
    #[strum(serialize = "Short Term Investments")]
    ShortTermInvestments,
    #[strum(serialize = "Shares Outstanding")]
    SharesOutstanding,

    #[strum(serialize = "Capital Expenditure")]
    CapitalExpenditure,
    #[strum(serialize = "Change in Working Capital")]
    ChangeInWorkingCapital,
    #[strum(serialize = "Stock Based Compensation")]
    StockBasedCompensation,
    #[strum(serialize = "Other Non Cash Items")]
    OtherNonCashItems,
    #[strum(serialize = "Interest Paid")]
    InterestPaid,
    #[strum(serialize = "Interest Received")]
    InterestReceived,
    #[strum(serialize = "Debt Issued")]
    DebtIssued,
    #[strum(serialize = "Debt Repaid")]
    DebtRepaid,
}

impl Field {
    pub fn statement(&self) -> StatementKind {
        match self {
            Field::Revenue
            | Field::NetIncome
            | Field::OperatingIncome
            | Field::Ebitda
            | Field::GrossProfit
            | Field::DepreciationAndAmortization
            | Field::WeightedAverageShares
            | Field::Price
            | Field::Eps
            | Field::CostOfGoodsSold => StatementKind::Income,

            Field::TotalAssets
            | Field::TotalCurrentAssets
            | Field::TotalCurrentLiabilities
            | Field::Inventory
            | Field::AccountsReceivable
            | Field::TotalShareholderEquity
            | Field::TotalDebt
            | Field::CashAndEquivalents
            | Field::ShortTermInvestments
            | Field::SharesOutstanding => StatementKind::Balance,

            Field::CapitalExpenditure
            | Field::ChangeInWorkingCapital
            | Field::StockBasedCompensation
            | Field::OtherNonCashItems
            | Field::InterestPaid
            | Field::InterestReceived
            | Field::DebtIssued
            | Field::DebtRepaid => StatementKind::CashFlow,
        }
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Field::Revenue => &["Revenue", "Total Revenue"],
            Field::NetIncome => &["Net Income"],
            Field::OperatingIncome => &["Operating Income"],
            Field::Ebitda => &["EBITDA"],
            Field::GrossProfit => &["Gross Profit"],
            Field::DepreciationAndAmortization => &[
                "Depreciation and Amortization",
                "Depreciation & Amortization",
            ],
            Field::WeightedAverageShares => &[
                "Weighted Average Shares",
                "Weighted Average Shares Outstanding",
                "WeightedAverageSharesOutstanding",
            ],
            Field::Price => &["price", "Price"],
            Field::Eps => &["EPS", "EPS Basic"],
            Field::CostOfGoodsSold => &["Cost of Goods Sold", "Cost of Revenue"],
            Field::TotalAssets => &["Total Assets"],
            Field::TotalCurrentAssets => &["Total Current Assets"],
            Field::TotalCurrentLiabilities => &["Total Current Liabilities"],
            Field::Inventory => &["Inventory"],
            Field::AccountsReceivable => &["Accounts Receivable", "Accounts Receivables"],
            Field::TotalShareholderEquity => &[
                "Total Shareholder Equity",
                "Total Shareholders Equity",
                "Total Equity",
            ],
            Field::TotalDebt => &["Total Debt"],
            Field::CashAndEquivalents => &["Cash and Cash Equivalents", "Cash and Equivalents"],
            Field::ShortTermInvestments => &["Short Term Investments"],
            Field::SharesOutstanding => &["Shares Outstanding", "Shares Outstanding (Diluted)"],
            Field::CapitalExpenditure => &["Capital Expenditure", "Capital Expenditures"],
            Field::ChangeInWorkingCapital => &["Change in Working Capital"],
            Field::StockBasedCompensation => &["Stock Based Compensation"],
            Field::OtherNonCashItems => &["Other Non Cash Items", "Other Non-Cash Items"],
            Field::InterestPaid => &["Interest Paid"],
            Field::InterestReceived => &["Interest Received"],
            Field::DebtIssued => &["Debt Issued"],
            Field::DebtRepaid => &["Debt Repaid", "Debt Repayment"],
        }
    }
}

/// One statement of one fiscal year: a flat label -> value mapping.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Value>")]
pub struct Statement(BTreeMap<String, f64>);

impl From<BTreeMap<String, Value>> for Statement {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(
            map.into_iter()
                .filter_map(|(k, v)| v.as_f64().filter(|v| v.is_finite()).map(|v| (k, v)))
                .collect(),
        )
    }
}

impl FromIterator<(String, f64)> for Statement {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Statement {
    pub fn get(&self, field: Field) -> Option<f64> {
        first_match(&self.0, field.aliases(), |v| Some(*v))
    }

    pub fn insert(&mut self, field: Field, value: f64) {
        self.0.insert(field.to_string(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    #[serde(default)]
    pub symbol: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub price: Option<f64>,

    #[serde(default, rename = "marketCap")]
    pub market_cap: Option<f64>,

    #[serde(default, deserialize_with = "deserialize_year_keyed")]
    pub prices: BTreeMap<Year, f64>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

static SECTOR_FIELD_ALIASES: [&str; 4] = ["sector", "Sector", "industry", "Industry"];

impl BasicInfo {
    pub fn sector(&self) -> Option<&str> {
        first_match(&self.extra, &SECTOR_FIELD_ALIASES, |v| {
            v.as_str().map(str::trim).filter(|s| !s.is_empty())
        })
    }
}

/// Raw statements of one company keyed by fiscal year, as produced by the loader.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatements {
    #[serde(
        default,
        rename = "Basic Info",
        alias = "Profile",
        alias = "Company Profile"
    )]
    pub basic_info: BasicInfo,

    #[serde(
        default,
        rename = "Income Statement",
        alias = "Income statement",
        alias = "Statement of Income",
        alias = "Profit & Loss",
        alias = "P/L",
        deserialize_with = "deserialize_year_keyed_statements"
    )]
    pub income: BTreeMap<Year, Statement>,

    #[serde(
        default,
        rename = "Balance Sheet",
        alias = "Balance sheet",
        alias = "Balance Sheet Statement",
        deserialize_with = "deserialize_year_keyed_statements"
    )]
    pub balance: BTreeMap<Year, Statement>,

    #[serde(
        default,
        rename = "Cash Flow Statement",
        alias = "Cashflow Statement",
        alias = "Cash Flow",
        alias = "Statement of Cash Flows",
        deserialize_with = "deserialize_year_keyed_statements"
    )]
    pub cash_flow: BTreeMap<Year, Statement>,
}

impl FinancialStatements {
    pub fn from_json(json_str: &str) -> FinvalResult<Self> {
        Ok(serde_json::from_str(json_str)?)
    }

    /// Years present in all three statements, ascending.
    pub fn common_years(&self) -> Vec<Year> {
        let income: BTreeSet<Year> = self.income.keys().copied().collect();
        let balance: BTreeSet<Year> = self.balance.keys().copied().collect();

        self.cash_flow
            .keys()
            .copied()
            .filter(|year| income.contains(year) && balance.contains(year))
            .collect()
    }

    pub fn fiscal_year(&self, year: Year) -> Option<FinancialYear> {
        Some(FinancialYear {
            year,
            income: self.income.get(&year)?.clone(),
            balance: self.balance.get(&year)?.clone(),
            cash_flow: self.cash_flow.get(&year)?.clone(),
        })
    }
}

/// The three statements of a single fiscal year.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FinancialYear {
    pub year: Year,
    pub income: Statement,
    pub balance: Statement,
    pub cash_flow: Statement,
}

impl FinancialYear {
    pub fn statement(&self, kind: StatementKind) -> &Statement {
        match kind {
            StatementKind::Income => &self.income,
            StatementKind::Balance => &self.balance,
            StatementKind::CashFlow => &self.cash_flow,
        }
    }

    pub fn is_complete(&self) -> bool {
        !(self.income.is_empty() || self.balance.is_empty() || self.cash_flow.is_empty())
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        self.statement(field.statement()).get(field)
    }

    pub fn get_or_zero(&self, field: Field) -> f64 {
        self.get(field).unwrap_or(0.0)
    }

    pub fn require(&self, field: Field) -> FinvalResult<f64> {
        self.get(field).ok_or_else(|| FinvalError::DataIncomplete {
            year: self.year,
            field: field.to_string(),
        })
    }

    /// First present value among `fields`, in order.
    pub fn first_of(&self, fields: &[Field]) -> Option<f64> {
        fields.iter().find_map(|field| self.get(*field))
    }
}

fn deserialize_year_keyed<'de, D>(deserializer: D) -> Result<BTreeMap<Year, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<f64>>> = Option::deserialize(deserializer)?;

    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| Some((year_from_str(&k)?, v?)))
        .collect())
}

fn deserialize_year_keyed_statements<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<Year, Statement>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<Statement>>> = Option::deserialize(deserializer)?;

    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| Some((year_from_str(&k)?, v.unwrap_or_default())))
        .collect())
}
