use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use serde_json::{Map, Value, json};

use crate::{
    data::StatementSource,
    error::{FinvalError, FinvalResult},
    financial::{Field, StatementKind, Year},
    utils::{net::join_url, stats::round_to, years::year_from_str},
};

static FMP_BASE_URL: &str = "https://financialmodelingprep.com/api/v3";
static FMP_API_KEY_ENVS: [&str; 2] = ["FMP_API_KEY", "API_KEY"];
static FMP_STATEMENT_LIMIT_DEFAULT: u32 = 30;
static FMP_PRICE_SERIES_LENGTH: u32 = 2000;

/// Upstream statement, upstream key, and the field it fills. The field's own
/// statement decides where the value is stored.
static FMP_FIELDS: [(StatementKind, &str, Field); 26] = [
    (StatementKind::Income, "revenue", Field::Revenue),
    (StatementKind::Income, "netIncome", Field::NetIncome),
    (StatementKind::Income, "operatingIncome", Field::OperatingIncome),
    (StatementKind::Income, "ebitda", Field::Ebitda),
    (StatementKind::Income, "grossProfit", Field::GrossProfit),
    (StatementKind::Income, "depreciationAndAmortization", Field::DepreciationAndAmortization),
    (StatementKind::Income, "weightedAverageShsOut", Field::WeightedAverageShares),
    (StatementKind::Income, "eps", Field::Eps),
    (StatementKind::Income, "costOfRevenue", Field::CostOfGoodsSold),
    (StatementKind::Income, "interestExpense", Field::InterestPaid),
    (StatementKind::Income, "interestIncome", Field::InterestReceived),
    (StatementKind::Income, "weightedAverageShsOutDil", Field::SharesOutstanding),
    (StatementKind::Balance, "totalAssets", Field::TotalAssets),
    (StatementKind::Balance, "totalCurrentAssets", Field::TotalCurrentAssets),
    (StatementKind::Balance, "totalCurrentLiabilities", Field::TotalCurrentLiabilities),
    (StatementKind::Balance, "inventory", Field::Inventory),
    (StatementKind::Balance, "netReceivables", Field::AccountsReceivable),
    (StatementKind::Balance, "totalStockholdersEquity", Field::TotalShareholderEquity),
    (StatementKind::Balance, "totalDebt", Field::TotalDebt),
    (StatementKind::Balance, "cashAndCashEquivalents", Field::CashAndEquivalents),
    (StatementKind::Balance, "shortTermInvestments", Field::ShortTermInvestments),
    (StatementKind::CashFlow, "capitalExpenditure", Field::CapitalExpenditure),
    (StatementKind::CashFlow, "changeInWorkingCapital", Field::ChangeInWorkingCapital),
    (StatementKind::CashFlow, "stockBasedCompensation", Field::StockBasedCompensation),
    (StatementKind::CashFlow, "otherNonCashItems", Field::OtherNonCashItems),
    (StatementKind::CashFlow, "debtRepayment", Field::DebtRepaid),
];

/// Reported negative upstream, stored as magnitudes.
static FMP_OUTFLOW_FIELDS: [Field; 3] = [
    Field::CapitalExpenditure,
    Field::DebtRepaid,
    Field::InterestPaid,
];

type YearlyFields = BTreeMap<Year, Map<String, Value>>;

pub struct FmpProvider {
    base_url: String,
    api_key: String,
    limit: u32,
}

impl FmpProvider {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            limit: FMP_STATEMENT_LIMIT_DEFAULT,
        }
    }

    pub fn from_env() -> FinvalResult<Self> {
        let api_key = FMP_API_KEY_ENVS
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
            .ok_or(FinvalError::Required(
                "FMP_API_KEY_REQUIRED",
                format!("Set {} to fetch statements", FMP_API_KEY_ENVS.join(" or ")),
            ))?;

        Ok(Self::new(FMP_BASE_URL, api_key.trim()))
    }

    async fn get_json(
        &self,
        client: &reqwest::Client,
        path: &str,
        query: &[(&str, String)],
    ) -> FinvalResult<Value> {
        let request_url = join_url(&self.base_url, path)?;
        debug!("[FMP] GET {request_url}");

        let response = client
            .get(request_url)
            .query(query)
            .query(&[("apikey", &self.api_key)])
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(FinvalError::HttpStatusError(format!(
                "{} {}",
                response.status(),
                response.text().await.ok().unwrap_or_default()
            )))
        }
    }
}

impl StatementSource for FmpProvider {
    async fn fetch(&self, symbol: &str) -> FinvalResult<Value> {
        let client = reqwest::Client::builder().build()?;
        let statement_query = [
            ("period", "annual".to_string()),
            ("limit", self.limit.to_string()),
        ];

        let income = self
            .get_json(&client, &format!("/income-statement/{symbol}"), &statement_query)
            .await?;
        let balance = self
            .get_json(&client, &format!("/balance-sheet-statement/{symbol}"), &statement_query)
            .await?;
        let cash_flow = self
            .get_json(&client, &format!("/cash-flow-statement/{symbol}"), &statement_query)
            .await?;

        let quote = self
            .get_json(&client, &format!("/quote/{symbol}"), &[])
            .await?;
        let history = self
            .get_json(
                &client,
                &format!("/historical-price-full/{symbol}"),
                &[
                    ("serietype", "line".to_string()),
                    ("timeseries", FMP_PRICE_SERIES_LENGTH.to_string()),
                ],
            )
            .await?;

        let profile = match self
            .get_json(&client, &format!("/profile/{symbol}"), &[])
            .await
        {
            Ok(profile) => profile,
            Err(err) => {
                warn!("[FMP] Profile of {symbol} unavailable: {err}");
                Value::Null
            }
        };

        Ok(assemble_statements(
            symbol, &income, &balance, &cash_flow, &quote, &profile, &history,
        ))
    }
}

/// Builds the cache-file document from raw upstream responses.
pub fn assemble_statements(
    symbol: &str,
    income: &Value,
    balance: &Value,
    cash_flow: &Value,
    quote: &Value,
    profile: &Value,
    history: &Value,
) -> Value {
    let mut statements: BTreeMap<String, YearlyFields> = BTreeMap::new();
    for (kind, rows) in [
        (StatementKind::Income, income),
        (StatementKind::Balance, balance),
        (StatementKind::CashFlow, cash_flow),
    ] {
        for (year, field, value) in map_rows(kind, rows) {
            statements
                .entry(field.statement().to_string())
                .or_default()
                .entry(year)
                .or_default()
                .insert(field.to_string(), json!(value));
        }
    }

    let income_years: Vec<Year> = statements
        .get(&StatementKind::Income.to_string())
        .map(|years| years.keys().copied().collect())
        .unwrap_or_default();
    let prices: BTreeMap<Year, f64> = year_end_prices(history)
        .into_iter()
        .filter(|(year, _)| income_years.contains(year))
        .collect();

    if let Some(income) = statements.get_mut(&StatementKind::Income.to_string()) {
        for (year, price) in &prices {
            if let Some(fields) = income.get_mut(year) {
                fields.insert(Field::Price.to_string(), json!(price));
            }
        }
    }

    let quote = first_item(quote);
    let profile = first_item(profile);
    let mut basic_info = json!({
        "symbol": symbol.to_uppercase(),
        "name": quote["name"].as_str().or(profile["companyName"].as_str()).unwrap_or_default(),
        "price": quote["price"].as_f64(),
        "marketCap": quote["marketCap"].as_f64().or(profile["mktCap"].as_f64()),
        "prices": prices
            .iter()
            .map(|(year, price)| (year.to_string(), json!(price)))
            .collect::<Map<String, Value>>(),
    });
    for key in ["sector", "industry"] {
        if let Some(value) = profile[key].as_str().filter(|s| !s.is_empty()) {
            basic_info[key] = json!(value);
        }
    }

    let mut document = Map::new();
    document.insert("Basic Info".to_string(), basic_info);
    for kind in [
        StatementKind::Income,
        StatementKind::Balance,
        StatementKind::CashFlow,
    ] {
        let years = statements
            .remove(&kind.to_string())
            .unwrap_or_default()
            .into_iter()
            .map(|(year, fields)| (year.to_string(), Value::Object(fields)))
            .collect::<Map<String, Value>>();
        document.insert(kind.to_string(), Value::Object(years));
    }

    Value::Object(document)
}

fn map_rows(kind: StatementKind, rows: &Value) -> Vec<(Year, Field, f64)> {
    let Some(rows) = rows.as_array() else {
        return vec![];
    };

    let mut result = vec![];
    for row in rows {
        let Some(year) = row_year(row) else {
            continue;
        };

        for (_, key, field) in FMP_FIELDS.iter().filter(|(k, _, _)| *k == kind) {
            if let Some(value) = row[*key].as_f64() {
                let value = if FMP_OUTFLOW_FIELDS.contains(field) {
                    value.abs()
                } else {
                    value
                };
                result.push((year, *field, value));
            }
        }
    }

    result
}

fn row_year(row: &Value) -> Option<Year> {
    ["calendarYear", "fiscalYear", "date"]
        .iter()
        .find_map(|key| row[*key].as_str().and_then(year_from_str))
}

/// Close nearest to Dec 31 of each year, rounded to cents.
pub fn year_end_prices(history: &Value) -> BTreeMap<Year, f64> {
    let mut closest: BTreeMap<Year, (i64, f64)> = BTreeMap::new();

    let items = history["historical"].as_array().map(Vec::as_slice).unwrap_or_default();
    for item in items {
        let date = item["date"]
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
        let (Some(date), Some(close)) = (date, item["close"].as_f64()) else {
            continue;
        };

        let Some(year_end) = NaiveDate::from_ymd_opt(date.year(), 12, 31) else {
            continue;
        };
        let distance = (year_end - date).num_days().abs();

        closest
            .entry(date.year())
            .and_modify(|best| {
                if distance < best.0 {
                    *best = (distance, close);
                }
            })
            .or_insert((distance, close));
    }

    closest
        .into_iter()
        .map(|(year, (_, close))| (year, round_to(close, 2)))
        .collect()
}

fn first_item(value: &Value) -> &Value {
    match value {
        Value::Array(items) => items.first().unwrap_or(&Value::Null),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::financial::FinancialStatements;

    #[test]
    fn test_year_end_prices() {
        let history = json!({
            "symbol": "AAPL",
            "historical": [
                {"date": "2023-12-29", "close": 192.534},
                {"date": "2023-12-28", "close": 193.58},
                {"date": "2023-06-30", "close": 193.97},
                {"date": "2022-12-30", "close": 129.93},
                {"date": "2022-01-03", "close": 182.01},
                {"date": "bad", "close": 1.0}
            ]
        });

        let prices = year_end_prices(&history);
        assert_eq!(prices.len(), 2);
        assert_eq!(prices.get(&2023), Some(&192.53));
        assert_eq!(prices.get(&2022), Some(&129.93));
        assert!(year_end_prices(&Value::Null).is_empty());
    }

    #[test]
    fn test_assemble_statements() {
        let income = json!([
            {
                "date": "2023-09-30", "calendarYear": "2023",
                "revenue": 383285.0, "netIncome": 96995.0, "eps": 6.16,
                "interestExpense": -3933.0, "weightedAverageShsOutDil": 15812.5
            },
            {"date": "2022-09-24", "calendarYear": "2022", "revenue": 394328.0}
        ]);
        let balance = json!([{"calendarYear": "2023", "totalAssets": 352583.0, "netReceivables": 60985.0}]);
        let cash_flow = json!([{"date": "2023-09-30", "capitalExpenditure": -10959.0, "debtRepayment": -11151.0}]);
        let quote = json!([{"symbol": "AAPL", "name": "Apple Inc.", "price": 189.3, "marketCap": 2.9e12}]);
        let profile = json!([{"companyName": "Apple Inc.", "sector": "Technology"}]);
        let history = json!({"historical": [
            {"date": "2023-12-29", "close": 192.53},
            {"date": "2021-12-31", "close": 177.57}
        ]});

        let document = assemble_statements(
            "aapl", &income, &balance, &cash_flow, &quote, &profile, &history,
        );
        assert_eq!(document["Basic Info"]["symbol"], "AAPL");
        assert_eq!(document["Basic Info"]["prices"]["2023"], 192.53);
        assert!(document["Basic Info"]["prices"]["2021"].is_null());
        assert_eq!(document["Income Statement"]["2023"]["price"], 192.53);
        assert_eq!(document["Cash Flow Statement"]["2023"]["Interest Paid"], 3933.0);
        assert_eq!(document["Cash Flow Statement"]["2023"]["Capital Expenditure"], 10959.0);
        assert_eq!(document["Balance Sheet"]["2023"]["Shares Outstanding"], 15812.5);

        let statements = FinancialStatements::from_json(&document.to_string()).unwrap();
        assert_eq!(statements.common_years(), vec![2023]);
        assert_eq!(statements.basic_info.sector(), Some("Technology"));
        assert_eq!(statements.basic_info.price, Some(189.3));

        let fiscal = statements.fiscal_year(2023).unwrap();
        assert_eq!(fiscal.get(Field::Revenue), Some(383285.0));
        assert_eq!(fiscal.get(Field::AccountsReceivable), Some(60985.0));
        assert_eq!(fiscal.get(Field::DebtRepaid), Some(11151.0));
        assert_eq!(fiscal.get(Field::Price), Some(192.53));
    }
}
