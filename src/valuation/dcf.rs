use log::debug;
use serde::Serialize;

use crate::{
    config::HORIZON_MAX,
    error::{FinvalError, FinvalResult},
};

#[derive(Clone, Debug, PartialEq)]
pub struct DcfInput {
    pub base_cash_flow: f64,
    pub wacc: f64,
    pub start_growth: f64,
    pub terminal_growth: f64,
    pub horizon: u32,
    pub fade_growth: bool,

    pub terminal_margin: f64,
    pub terminal_growth_floor: f64,
    pub min_wacc: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DcfOutput {
    /// Terminal growth actually used, after clamping.
    pub terminal_growth: f64,
    pub terminal_growth_clamped: bool,
    pub growth_path: Vec<f64>,
    pub cash_flows_forecast: Vec<f64>,
    pub pv_cash_flows: Vec<f64>,
    pub terminal_value: f64,
    pub pv_terminal_value: f64,
    pub intrinsic_equity_value: f64,
}

/// Keeps terminal growth below `wacc - margin`, but not below `floor`.
/// Returns the growth to use and whether it was changed.
pub fn clamp_terminal_growth(
    wacc: f64,
    terminal_growth: f64,
    margin: f64,
    floor: f64,
) -> FinvalResult<(f64, bool)> {
    let ceiling = wacc - margin;
    if terminal_growth < ceiling {
        return Ok((terminal_growth, false));
    }

    let clamped = ceiling.max(floor);
    if clamped > ceiling || wacc - clamped <= 0.0 {
        return Err(FinvalError::DegenerateDiscountRate(format!(
            "terminal growth floor {floor} is not below WACC {wacc} minus margin {margin}"
        )));
    }

    Ok((clamped, true))
}

/// Per-period growth: linear fade from `start` toward `terminal` with weight
/// `i / horizon`, or `start` every period.
pub fn growth_path(start: f64, terminal: f64, horizon: u32, fade: bool) -> Vec<f64> {
    (1..=horizon)
        .map(|i| {
            if fade {
                let w = i as f64 / horizon as f64;
                (1.0 - w) * start + w * terminal
            } else {
                start
            }
        })
        .collect()
}

pub fn discount_cash_flows(input: &DcfInput) -> FinvalResult<DcfOutput> {
    let wacc = input.wacc;
    if !wacc.is_finite() || wacc <= input.min_wacc {
        return Err(FinvalError::DegenerateDiscountRate(format!(
            "WACC {wacc} must be finite and > {}",
            input.min_wacc
        )));
    }

    let horizon = match i32::try_from(input.horizon) {
        Ok(horizon) if input.horizon > 0 && input.horizon <= HORIZON_MAX => horizon,
        _ => {
            return Err(FinvalError::Invalid(
                "INVALID_HORIZON",
                format!(
                    "Forecast horizon must be between 1 and {HORIZON_MAX} years, got {}",
                    input.horizon
                ),
            ));
        }
    };

    if !input.base_cash_flow.is_finite() {
        return Err(FinvalError::MissingSeries(format!(
            "base cash flow {} is not finite",
            input.base_cash_flow
        )));
    }

    let (terminal_growth, terminal_growth_clamped) = clamp_terminal_growth(
        wacc,
        input.terminal_growth,
        input.terminal_margin,
        input.terminal_growth_floor,
    )?;
    if terminal_growth_clamped {
        debug!(
            "[DCF] Terminal growth {} clamped to {terminal_growth} (WACC {wacc})",
            input.terminal_growth
        );
    }

    let growth_path = growth_path(
        input.start_growth,
        terminal_growth,
        input.horizon,
        input.fade_growth,
    );

    let mut cash_flows_forecast = Vec::with_capacity(growth_path.len());
    let mut pv_cash_flows = Vec::with_capacity(growth_path.len());
    let mut cash_flow = input.base_cash_flow;
    for (period, g) in (1..=horizon).zip(&growth_path) {
        cash_flow *= 1.0 + g;
        cash_flows_forecast.push(cash_flow);
        pv_cash_flows.push(cash_flow / (1.0 + wacc).powi(period));
    }

    let terminal_value = cash_flow * (1.0 + terminal_growth) / (wacc - terminal_growth);
    let pv_terminal_value = terminal_value / (1.0 + wacc).powi(horizon);
    let intrinsic_equity_value = pv_cash_flows.iter().sum::<f64>() + pv_terminal_value;

    Ok(DcfOutput {
        terminal_growth,
        terminal_growth_clamped,
        growth_path,
        cash_flows_forecast,
        pv_cash_flows,
        terminal_value,
        pv_terminal_value,
        intrinsic_equity_value,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn input(wacc: f64, start_growth: f64, terminal_growth: f64) -> DcfInput {
        DcfInput {
            base_cash_flow: 100.0,
            wacc,
            start_growth,
            terminal_growth,
            horizon: 10,
            fade_growth: true,
            terminal_margin: 0.005,
            terminal_growth_floor: -0.5,
            min_wacc: -0.99,
        }
    }

    #[test]
    fn test_fading_forecast() {
        let output = discount_cash_flows(&input(0.10, 0.08, 0.03)).unwrap();

        assert!(!output.terminal_growth_clamped);
        assert_eq!(output.growth_path.len(), 10);
        assert_relative_eq!(output.growth_path[0], 0.075, epsilon = 1e-12);
        assert_relative_eq!(output.growth_path[9], 0.03, epsilon = 1e-12);
        assert_relative_eq!(output.cash_flows_forecast[0], 107.5, epsilon = 1e-9);
        assert!(
            output
                .cash_flows_forecast
                .windows(2)
                .all(|pair| pair[1] > pair[0])
        );

        let mut cash_flow = 100.0;
        let mut total = 0.0;
        for (i, g) in output.growth_path.iter().enumerate() {
            cash_flow *= 1.0 + g;
            total += cash_flow / 1.1f64.powi(i as i32 + 1);
        }
        let terminal_value = cash_flow * 1.03 / 0.07;
        total += terminal_value / 1.1f64.powi(10);

        assert_relative_eq!(output.terminal_value, terminal_value, epsilon = 1e-9);
        assert_relative_eq!(output.intrinsic_equity_value, total, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_growth() {
        let output = discount_cash_flows(&DcfInput {
            fade_growth: false,
            ..input(0.10, 0.05, 0.02)
        })
        .unwrap();

        assert!(output.growth_path.iter().all(|g| *g == 0.05));
        assert_relative_eq!(
            output.cash_flows_forecast[9],
            100.0 * 1.05f64.powi(10),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_terminal_growth_is_clamped_below_wacc() {
        let output = discount_cash_flows(&input(0.05, 0.06, 0.06)).unwrap();

        assert!(output.terminal_growth_clamped);
        assert_relative_eq!(output.terminal_growth, 0.045, epsilon = 1e-12);
        assert!(output.terminal_growth < 0.05 - 0.005 + 1e-9);
        assert!(output.intrinsic_equity_value.is_finite());
        assert!(output.intrinsic_equity_value > 0.0);
    }

    #[test]
    fn test_clamp_property() {
        for wacc in [-0.4, -0.1, 0.0, 0.02, 0.05, 0.1, 0.3] {
            for g in [-0.2, 0.0, 0.02, 0.05, 0.1, 0.5] {
                let (used, _) = clamp_terminal_growth(wacc, g, 0.005, -0.5).unwrap();
                assert!(used < wacc - 0.005 + 1e-9, "wacc {wacc} g {g} used {used}");
            }
        }
    }

    #[test]
    fn test_finite_positive_for_positive_base() {
        for wacc in [0.04, 0.08, 0.12, 0.2] {
            for g_start in [-0.3, 0.0, 0.1, 0.25] {
                for g_terminal in [-0.02, 0.0, 0.02, 0.03] {
                    if wacc < g_terminal + 0.005 {
                        continue;
                    }
                    let output = discount_cash_flows(&input(wacc, g_start, g_terminal)).unwrap();
                    assert!(output.intrinsic_equity_value.is_finite());
                    assert!(output.intrinsic_equity_value > 0.0);
                }
            }
        }
    }

    #[test]
    fn test_degenerate_discount_rate() {
        assert!(matches!(
            discount_cash_flows(&input(-0.99, 0.05, 0.02)),
            Err(FinvalError::DegenerateDiscountRate(_))
        ));
        assert!(matches!(
            discount_cash_flows(&input(f64::NAN, 0.05, 0.02)),
            Err(FinvalError::DegenerateDiscountRate(_))
        ));
        // ceiling -0.605 is below the -0.5 floor
        assert!(matches!(
            discount_cash_flows(&input(-0.6, 0.05, 0.02)),
            Err(FinvalError::DegenerateDiscountRate(_))
        ));
    }

    #[test]
    fn test_horizon_bounds() {
        for horizon in [0, HORIZON_MAX + 1, u32::MAX] {
            let input = DcfInput {
                horizon,
                ..input(0.09, 0.05, 0.02)
            };
            assert!(matches!(
                discount_cash_flows(&input),
                Err(FinvalError::Invalid("INVALID_HORIZON", _))
            ));
        }

        let input = DcfInput {
            horizon: HORIZON_MAX,
            ..input(0.09, 0.05, 0.02)
        };
        let output = discount_cash_flows(&input).unwrap();
        assert_eq!(output.pv_cash_flows.len(), HORIZON_MAX as usize);
        assert!(output.pv_terminal_value < output.terminal_value);
    }

    #[test]
    fn test_idempotent() {
        let input = input(0.09, 0.12, 0.03);
        assert_eq!(
            discount_cash_flows(&input).unwrap(),
            discount_cash_flows(&input).unwrap()
        );
    }
}
