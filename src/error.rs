pub type FinvalResult<T> = Result<T, FinvalError>;

#[derive(Debug, thiserror::Error)]
pub enum FinvalError {
    #[error("[Config Error] {0}")]
    ConfyError(#[from] confy::ConfyError),

    #[error("[CSV Error] {0}")]
    CsvError(#[from] csv::Error),

    #[error("[Enum Error] {0}")]
    EnumError(#[from] strum::ParseError),

    #[error("[HTTP Error] {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("[HTTP Status Error] {0}")]
    HttpStatusError(String),

    #[error("[IO Error] {0}")]
    IoError(#[from] std::io::Error),

    #[error("[JSON Error] {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("[URL Error] {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("[Invalid] {1}")]
    Invalid(&'static str, String),

    #[error("[Not Exists] {1}")]
    NotExists(&'static str, String),

    #[error("[Required] {1}")]
    Required(&'static str, String),

    #[error("[Data Incomplete] {year}: missing '{field}'")]
    DataIncomplete { year: i32, field: String },

    #[error("[Ratio Unavailable] {ratio}: {reason}")]
    RatioUnavailable { ratio: String, reason: String },

    #[error("[Insufficient Capital Structure] {0}")]
    InsufficientCapitalStructure(String),

    #[error("[Degenerate Discount Rate] {0}")]
    DegenerateDiscountRate(String),

    #[error("[Missing Series] {0}")]
    MissingSeries(String),
}

impl FinvalError {
    pub fn ratio_unavailable(ratio: impl ToString, reason: impl ToString) -> Self {
        Self::RatioUnavailable {
            ratio: ratio.to_string(),
            reason: reason.to_string(),
        }
    }
}
