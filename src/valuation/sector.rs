use crate::config::{SECTOR_OTHER, SECTOR_TERMINAL_GROWTH_DEFAULT, SectorGrowth};

/// Used only when the company profile carries no sector.
static SYMBOL_SECTOR_FALLBACK: [(&str, &str); 11] = [
    ("AAPL", "Technology"),
    ("MSFT", "Technology"),
    ("NVDA", "Technology"),
    ("AMD", "Technology"),
    ("GOOGL", "Technology"),
    ("KBANK", "Financials"),
    ("SCB", "Financials"),
    ("BBL", "Financials"),
    ("CPN", "Real Estate"),
    ("LH", "Real Estate"),
    ("QH", "Real Estate"),
];

/// Explicit sector first, then the symbol lookup, then "Other".
pub fn infer_sector(symbol: &str, explicit: Option<&str>) -> String {
    if let Some(sector) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
        return sector.to_string();
    }

    let symbol = symbol.trim().to_uppercase();
    SYMBOL_SECTOR_FALLBACK
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, sector)| sector.to_string())
        .unwrap_or_else(|| SECTOR_OTHER.to_string())
}

/// First table entry whose name occurs in `sector`, case-insensitively.
/// Unmatched sectors take the "Other" rate.
pub fn terminal_growth_for_sector(sector: &str, table: &[SectorGrowth]) -> f64 {
    let sector = sector.to_lowercase();

    table
        .iter()
        .find(|entry| sector.contains(&entry.sector.to_lowercase()))
        .or_else(|| {
            table
                .iter()
                .find(|entry| entry.sector.eq_ignore_ascii_case(SECTOR_OTHER))
        })
        .map(|entry| entry.rate)
        .unwrap_or_else(other_rate_default)
}

fn other_rate_default() -> f64 {
    SECTOR_TERMINAL_GROWTH_DEFAULT
        .iter()
        .find(|(sector, _)| *sector == SECTOR_OTHER)
        .map(|(_, rate)| *rate)
        .unwrap_or_default()
}
