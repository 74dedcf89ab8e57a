use std::collections::BTreeMap;

/// Walks `keys` in order and returns the first entry that `pick` accepts.
///
/// Every place that tolerates several spellings of one field (statement
/// labels, shares outstanding, sector) goes through here so the fallback
/// order lives next to the field definition instead of at each call site.
pub fn first_match<'m, V, T>(
    map: &'m BTreeMap<String, V>,
    keys: &[&str],
    pick: impl Fn(&'m V) -> Option<T>,
) -> Option<T> {
    keys.iter().find_map(|key| map.get(*key).and_then(&pick))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn test_first_match_respects_order() {
        let mut map: BTreeMap<String, f64> = BTreeMap::new();
        map.insert("Shares Outstanding (Diluted)".to_string(), 120.0);
        map.insert("Weighted Average Shares".to_string(), 100.0);

        let shares = first_match(
            &map,
            &[
                "Shares Outstanding",
                "Shares Outstanding (Diluted)",
                "Weighted Average Shares",
            ],
            |v| Some(*v),
        );
        assert_eq!(shares, Some(120.0));
        assert_eq!(first_match(&map, &["Missing"], |v| Some(*v)), None);
    }

    #[test]
    fn test_first_match_skips_rejected_values() {
        let mut map: BTreeMap<String, Value> = BTreeMap::new();
        map.insert("Sector".to_string(), Value::Null);
        map.insert("sector".to_string(), json!("Technology"));

        let sector = first_match(&map, &["Sector", "sector"], |v| v.as_str());
        assert_eq!(sector, Some("Technology"));
    }
}
