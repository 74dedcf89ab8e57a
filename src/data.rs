use std::{path::PathBuf, sync::LazyLock};

use log::{info, warn};
use regex::Regex;
use serde_json::Value;

use crate::{
    APP_DATA_DIR,
    error::{FinvalError, FinvalResult},
    financial::FinancialStatements,
};

pub use fmp::FmpProvider;

/// Upstream that returns the raw statement document of one symbol.
pub trait StatementSource {
    fn fetch(&self, symbol: &str) -> impl std::future::Future<Output = FinvalResult<Value>> + Send;
}

#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Fetch from upstream even when a cached document exists.
    pub refresh: bool,
    pub data_dir: PathBuf,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            refresh: false,
            data_dir: STATEMENTS_DIR.clone(),
        }
    }
}

/// Cached statements of `symbol`, fetched from FinancialModelingPrep when
/// missing or when a refresh is requested.
pub async fn load_statements(
    symbol: &str,
    options: &LoadOptions,
) -> FinvalResult<FinancialStatements> {
    load_with(symbol, options, FmpProvider::from_env).await
}

pub async fn load_statements_from<S: StatementSource>(
    source: S,
    symbol: &str,
    options: &LoadOptions,
) -> FinvalResult<FinancialStatements> {
    load_with(symbol, options, || Ok(source)).await
}

pub fn normalize_symbol(symbol: &str) -> FinvalResult<String> {
    let symbol = symbol.trim().to_uppercase();

    if REGEX_SYMBOL.is_match(&symbol) {
        Ok(symbol)
    } else {
        Err(FinvalError::Invalid(
            "INVALID_SYMBOL",
            format!("Invalid stock symbol '{symbol}'"),
        ))
    }
}

async fn load_with<S, F>(
    symbol: &str,
    options: &LoadOptions,
    source: F,
) -> FinvalResult<FinancialStatements>
where
    S: StatementSource,
    F: FnOnce() -> FinvalResult<S>,
{
    let symbol = normalize_symbol(symbol)?;
    let path = cache::cache_path(&options.data_dir, &symbol);

    if !options.refresh {
        if let Some(content) = cache::read(&path).await? {
            match FinancialStatements::from_json(&content) {
                Ok(statements) => return Ok(statements),
                Err(err) => warn!("[Data] Cached {} is unreadable, refetching: {err}", path.display()),
            }
        }
    }

    info!("[Data] Fetching statements of {symbol}");
    let document = source()?.fetch(&symbol).await?;

    // Parse before writing so a bad payload never replaces a good cache
    let statements: FinancialStatements = serde_json::from_value(document.clone())?;
    if statements.income.is_empty() && statements.balance.is_empty() && statements.cash_flow.is_empty()
    {
        return Err(FinvalError::NotExists(
            "STATEMENTS_NOT_EXISTS",
            format!("No financial statements found for '{symbol}'"),
        ));
    }

    cache::write(&path, &document).await?;

    Ok(statements)
}

mod cache;
mod fmp;

static STATEMENTS_DIR: LazyLock<PathBuf> = LazyLock::new(|| APP_DATA_DIR.join("statements"));

static REGEX_SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9.\-^]{0,14}$").expect("SYMBOL regex is invalid"));

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use serde_json::json;

    use super::*;
    use crate::financial::Field;

    struct FakeSource {
        calls: Arc<AtomicUsize>,
        revenue: f64,
    }

    impl StatementSource for FakeSource {
        async fn fetch(&self, symbol: &str) -> FinvalResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({
                "Basic Info": {"symbol": symbol, "name": "Fake Corp"},
                "Income Statement": {"2023": {"Revenue": self.revenue}},
                "Balance Sheet": {"2023": {"Total Assets": 10.0}},
                "Cash Flow Statement": {"2023": {"Capital Expenditure": 1.0}}
            }))
        }
    }

    struct EmptySource;

    impl StatementSource for EmptySource {
        async fn fetch(&self, _symbol: &str) -> FinvalResult<Value> {
            Ok(json!({"Basic Info": {}}))
        }
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_symbol("kbank.bk").unwrap(), "KBANK.BK");
        assert!(normalize_symbol("").is_err());
        assert!(normalize_symbol("../etc").is_err());
    }

    #[tokio::test]
    async fn test_load_statements_uses_cache_until_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut options = LoadOptions {
            refresh: false,
            data_dir: dir.path().to_path_buf(),
        };

        let source = |revenue| FakeSource {
            calls: calls.clone(),
            revenue,
        };

        let statements = load_statements_from(source(100.0), "fake", &options)
            .await
            .unwrap();
        assert_eq!(statements.basic_info.name, "Fake Corp");
        assert!(dir.path().join("FAKE_financials.json").exists());

        let statements = load_statements_from(source(200.0), "FAKE", &options)
            .await
            .unwrap();
        let revenue = statements.fiscal_year(2023).unwrap().get(Field::Revenue);
        assert_eq!(revenue, Some(100.0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        options.refresh = true;
        let statements = load_statements_from(source(200.0), "FAKE", &options)
            .await
            .unwrap();
        let revenue = statements.fiscal_year(2023).unwrap().get(Field::Revenue);
        assert_eq!(revenue, Some(200.0));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_fetch_keeps_existing_cache() {
        let dir = tempfile::tempdir().unwrap();
        let options = LoadOptions {
            refresh: true,
            data_dir: dir.path().to_path_buf(),
        };
        let calls = Arc::new(AtomicUsize::new(0));

        load_statements_from(
            FakeSource {
                calls,
                revenue: 1.0,
            },
            "FAKE",
            &options,
        )
        .await
        .unwrap();

        let result = load_statements_from(EmptySource, "FAKE", &options).await;
        assert!(matches!(result, Err(FinvalError::NotExists(..))));

        let content = std::fs::read_to_string(dir.path().join("FAKE_financials.json")).unwrap();
        assert!(content.contains("Fake Corp"));
    }
}
