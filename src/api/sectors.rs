use crate::config::{SectorGrowth, ValuationConfig};

/// Terminal growth table in matching order, from the stored config.
pub async fn list() -> Vec<SectorGrowth> {
    ValuationConfig::load()
        .unwrap_or_default()
        .sector_terminal_growth
}
