pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[0.07, 0.08, 0.09, 0.10]).map(|v| round_to(v, 4)), Some(0.085));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(12.345678, 2), 12.35);
        assert_eq!(round_to(0.081249, 4), 0.0812);
        assert_eq!(round_to(-1.005, 0), -1.0);
    }
}
