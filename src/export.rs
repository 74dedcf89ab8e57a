use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use strum::IntoEnumIterator;

use crate::{
    commentary::Commentary,
    error::FinvalResult,
    ratio::{Ratio, RatioTable},
    utils::fs::write_atomic,
    valuation::ValuationResult,
};

pub static RESULT_JSON: &str = "result.json";
pub static RESULT_CSV: &str = "result.csv";
pub static VALUATION_JSON: &str = "valuation.json";
pub static VALUATION_CSV: &str = "valuation.csv";
pub static AI_RESULT_JSON: &str = "ai_result.json";

static COLUMN_SYMBOL: &str = "Stock Symbol";
static COLUMN_YEAR: &str = "Year";

/// One JSON row per year: symbol, year, then every ratio (`null` when
/// unavailable).
pub fn ratio_rows(table: &RatioTable) -> FinvalResult<Vec<Value>> {
    table
        .records
        .values()
        .map(|record| {
            let mut row = serde_json::to_value(record)?;
            row[COLUMN_SYMBOL] = json!(table.symbol);
            Ok(row)
        })
        .collect()
}

pub async fn export_ratios(dir: &Path, table: &RatioTable) -> FinvalResult<Vec<PathBuf>> {
    let rows = ratio_rows(table)?;

    let json_path = dir.join(RESULT_JSON);
    write_atomic(&json_path, &serde_json::to_vec_pretty(&rows)?).await?;

    let mut headers = vec![COLUMN_SYMBOL.to_string(), COLUMN_YEAR.to_string()];
    headers.extend(Ratio::iter().map(|ratio| ratio.to_string()));

    let csv_path = dir.join(RESULT_CSV);
    write_atomic(&csv_path, &to_csv(&headers, &rows)?).await?;

    Ok(vec![json_path, csv_path])
}

pub async fn export_valuation(dir: &Path, result: &ValuationResult) -> FinvalResult<Vec<PathBuf>> {
    let json_path = dir.join(VALUATION_JSON);
    write_atomic(&json_path, &serde_json::to_vec_pretty(result)?).await?;

    let slim = json!({
        "Stock Symbol": result.symbol,
        "Sector": result.sector,
        "WACC Used": result.wacc_used,
        "Terminal Growth Used": result.g_terminal,
        "Intrinsic Equity Value": result.intrinsic_equity_value,
        "Intrinsic Value / Share": result.intrinsic_value_per_share,
        "Shares Outstanding": result.shares_outstanding,
        "Per Share Reliable": result.per_share_reliable,
    });
    let headers: Vec<String> = [
        "Stock Symbol",
        "Sector",
        "WACC Used",
        "Terminal Growth Used",
        "Intrinsic Equity Value",
        "Intrinsic Value / Share",
        "Shares Outstanding",
        "Per Share Reliable",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let csv_path = dir.join(VALUATION_CSV);
    write_atomic(&csv_path, &to_csv(&headers, &[slim])?).await?;

    Ok(vec![json_path, csv_path])
}

pub async fn export_commentary(
    dir: &Path,
    symbol: &str,
    model: Option<&str>,
    commentary: &Commentary,
) -> FinvalResult<PathBuf> {
    let payload = json!({
        "source": {
            "symbol": symbol,
            "model": model,
            "ratios_path": RESULT_JSON,
            "valuation_path": VALUATION_JSON,
        },
        "analysis": commentary,
    });

    let path = dir.join(AI_RESULT_JSON);
    write_atomic(&path, &serde_json::to_vec_pretty(&payload)?).await?;

    Ok(path)
}

fn to_csv(headers: &[String], rows: &[Value]) -> FinvalResult<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(headers)?;

    for row in rows {
        let record: Vec<String> = headers.iter().map(|h| csv_value(&row[h])).collect();
        wtr.write_record(&record)?;
    }

    wtr.into_inner().map_err(|err| err.into_error().into())
}

fn csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}
