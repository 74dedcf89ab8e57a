use std::collections::BTreeMap;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{
    financial::Year,
    ratio::{Ratio, RatioTable},
    utils::stats::{mean, round_to},
};

/// Series reported in the growth table, in column order.
pub static GROWTH_TABLE_SERIES: [Ratio; 3] =
    [Ratio::OwnerEarnings, Ratio::FreeCashFlow, Ratio::Eps];

/// Year-over-year change of a year-ascending series, as a fraction.
///
/// The first year has no change, and a year is `None` when either side is
/// missing or the previous value is zero. Returns `None` when the series has
/// fewer than two values.
pub fn yoy_growth(series: &[(Year, Option<f64>)]) -> Option<Vec<(Year, Option<f64>)>> {
    if series.iter().filter(|(_, v)| v.is_some()).count() < 2 {
        return None;
    }

    let mut changes = Vec::with_capacity(series.len());
    let mut prev: Option<f64> = None;
    for (year, value) in series {
        let change = match (prev, value) {
            (Some(p), Some(v)) if p != 0.0 => Some((v - p) / p),
            _ => None,
        };
        changes.push((*year, change));
        prev = *value;
    }

    Some(changes)
}

/// Mean year-over-year change over the most recent `lookback + 1` values.
///
/// Missing values are dropped before the window is taken, so a single gap
/// neither counts as zero growth nor shortens the window. Values dated at or
/// after `exclude_from` are ignored.
pub fn average_growth(
    series: &[(Year, Option<f64>)],
    lookback: usize,
    min_observations: usize,
    exclude_from: Option<Year>,
) -> Option<f64> {
    let values: Vec<f64> = series
        .iter()
        .filter(|(year, _)| exclude_from.is_none_or(|limit| *year < limit))
        .filter_map(|(_, v)| *v)
        .collect();

    if values.len() < min_observations.max(2) {
        return None;
    }

    let window = &values[values.len().saturating_sub(lookback + 1)..];
    let changes: Vec<f64> = window
        .windows(2)
        .filter(|pair| pair[0] != 0.0)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect();

    mean(&changes)
}

/// One row of the growth table: YoY change in percent per series.
#[derive(Clone, Debug, PartialEq)]
pub struct GrowthRow {
    pub year: Year,
    pub changes: BTreeMap<Ratio, Option<f64>>,
}

impl Serialize for GrowthRow {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.changes.len() + 1))?;
        map.serialize_entry("Year", &self.year)?;
        for (ratio, change) in &self.changes {
            map.serialize_entry(&format!("{ratio} YoY (%)"), change)?;
        }
        map.end()
    }
}

/// YoY table for the growth series present in the ratio table. Empty when
/// none of them has at least two values.
pub fn growth_table(table: &RatioTable) -> Vec<GrowthRow> {
    let columns: Vec<(Ratio, Vec<(Year, Option<f64>)>)> = GROWTH_TABLE_SERIES
        .iter()
        .filter_map(|ratio| Some((*ratio, yoy_growth(&table.series(*ratio))?)))
        .collect();

    if columns.is_empty() {
        return vec![];
    }

    table
        .years()
        .into_iter()
        .enumerate()
        .map(|(idx, year)| GrowthRow {
            year,
            changes: columns
                .iter()
                .map(|(ratio, changes)| {
                    let pct = changes[idx].1.map(|c| round_to(c * 100.0, 2));
                    (*ratio, pct)
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::ratio::{RatioRecord, RatioValue};

    #[test]
    fn test_yoy_growth() {
        assert_eq!(yoy_growth(&[(2022, Some(10.0)), (2023, None)]), None);

        let changes = yoy_growth(&[
            (2020, Some(100.0)),
            (2021, Some(110.0)),
            (2022, None),
            (2023, Some(99.0)),
        ])
        .unwrap();

        assert_eq!(changes[0], (2020, None));
        assert_relative_eq!(changes[1].1.unwrap(), 0.1, epsilon = 1e-12);
        assert_eq!(changes[2], (2022, None));
        assert_eq!(changes[3], (2023, None));
    }

    #[test]
    fn test_average_growth_uses_recent_window() {
        let series = vec![
            (2017, Some(10.0)),
            (2018, Some(100.0)),
            (2019, Some(110.0)),
            (2020, None),
            (2021, Some(121.0)),
        ];

        // window of 3 values: 100 -> 110 -> 121, the 900% jump is outside it
        let avg = average_growth(&series, 2, 2, None).unwrap();
        assert_relative_eq!(avg, 0.1, epsilon = 1e-12);

        // excluding 2021 leaves 10 -> 100 -> 110
        let avg = average_growth(&series, 2, 2, Some(2021)).unwrap();
        assert_relative_eq!(avg, (9.0 + 0.1) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_average_growth_needs_enough_points() {
        assert_eq!(average_growth(&[(2023, Some(5.0))], 5, 2, None), None);
        assert_eq!(
            average_growth(&[(2022, Some(5.0)), (2023, Some(6.0))], 5, 3, None),
            None
        );
        assert_eq!(
            average_growth(&[(2022, Some(0.0)), (2023, Some(6.0))], 5, 2, None),
            None
        );
    }

    #[test]
    fn test_growth_table() {
        let mut table = RatioTable::default();
        for (year, fcf) in [(2021, 50.0), (2022, 60.0), (2023, 45.0)] {
            let mut values = BTreeMap::new();
            values.insert(Ratio::FreeCashFlow, RatioValue::Available(fcf));
            values.insert(Ratio::Eps, RatioValue::Unavailable("n/a".to_string()));
            table.records.insert(year, RatioRecord { year, values });
        }

        let rows = growth_table(&table);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].changes.get(&Ratio::FreeCashFlow), Some(&None));
        assert_eq!(rows[1].changes.get(&Ratio::FreeCashFlow), Some(&Some(20.0)));
        assert_eq!(rows[2].changes.get(&Ratio::FreeCashFlow), Some(&Some(-25.0)));
        assert!(!rows[0].changes.contains_key(&Ratio::Eps));

        let json = serde_json::to_value(&rows[1]).unwrap();
        assert_eq!(json["Free Cash Flow (FCF) YoY (%)"], 20.0);

        assert!(growth_table(&RatioTable::default()).is_empty());
    }
}
