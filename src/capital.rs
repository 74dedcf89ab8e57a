use std::cell::OnceCell;

use log::debug;
use serde::Serialize;

use crate::{
    config::{MARKET_RETURNS_DEFAULT, ValuationConfig},
    error::{FinvalError, FinvalResult},
    financial::{Field, FinancialYear},
    utils::stats::mean,
};

/// Signed contributions to net interest paid; only present fields count.
static NET_INTEREST_TERMS: [(Field, f64); 4] = [
    (Field::InterestPaid, -1.0),
    (Field::InterestReceived, 1.0),
    (Field::DebtIssued, 1.0),
    (Field::DebtRepaid, -1.0),
];

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Wacc {
    pub wacc: f64,
    pub cost_of_equity: f64,
    pub cost_of_debt: f64,
    pub after_tax_cost_of_debt: f64,
    pub equity_weight: f64,
    pub debt_weight: f64,
}

/// Cost of equity and WACC for one fiscal year.
pub struct CostOfCapitalModel<'a> {
    fiscal: &'a FinancialYear,
    config: &'a ValuationConfig,
    wacc: OnceCell<Wacc>,
}

impl<'a> CostOfCapitalModel<'a> {
    pub fn new(fiscal: &'a FinancialYear, config: &'a ValuationConfig) -> Self {
        Self {
            fiscal,
            config,
            wacc: OnceCell::new(),
        }
    }

    /// CAPM: `rf + beta * (mean(market_returns) - rf)`. Falls back to the
    /// default return scenarios when none are configured.
    pub fn cost_of_equity(&self) -> f64 {
        let market_return = mean(&self.config.market_returns)
            .or_else(|| mean(&MARKET_RETURNS_DEFAULT))
            .unwrap_or_default();

        self.config.risk_free_rate + self.config.beta * (market_return - self.config.risk_free_rate)
    }

    pub fn net_interest_paid(&self) -> f64 {
        NET_INTEREST_TERMS
            .iter()
            .filter_map(|(field, sign)| self.fiscal.get(*field).map(|v| sign * v))
            .sum()
    }

    pub fn wacc(&self) -> FinvalResult<Wacc> {
        if let Some(wacc) = self.wacc.get() {
            return Ok(*wacc);
        }

        let wacc = self.compute_wacc()?;
        debug!("[WACC {}] {wacc:?}", self.fiscal.year);

        Ok(*self.wacc.get_or_init(|| wacc))
    }

    fn compute_wacc(&self) -> FinvalResult<Wacc> {
        let equity = self.fiscal.get_or_zero(Field::TotalShareholderEquity);
        let debt = self.fiscal.get_or_zero(Field::TotalDebt);

        if equity <= 0.0 && debt <= 0.0 {
            return Err(FinvalError::InsufficientCapitalStructure(format!(
                "{}: equity ({equity}) or debt ({debt}) must be positive",
                self.fiscal.year
            )));
        }

        let total = equity + debt;
        if total <= 0.0 {
            return Err(FinvalError::InsufficientCapitalStructure(format!(
                "{}: total capital ({total}) must be positive",
                self.fiscal.year
            )));
        }

        let cost_of_equity = self.cost_of_equity();
        let cost_of_debt = if debt > 0.0 {
            self.net_interest_paid() / debt
        } else {
            0.0
        };
        let after_tax_cost_of_debt = cost_of_debt * (1.0 - self.config.tax_rate);

        let equity_weight = equity / total;
        let debt_weight = debt / total;

        Ok(Wacc {
            wacc: equity_weight * cost_of_equity + debt_weight * after_tax_cost_of_debt,
            cost_of_equity,
            cost_of_debt,
            after_tax_cost_of_debt,
            equity_weight,
            debt_weight,
        })
    }
}
