use url::Url;

use crate::error::FinvalResult;

pub fn join_url(base_url: &str, path: &str) -> FinvalResult<String> {
    let base = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{base_url}/")
    };

    let url = Url::parse(&base)?.join(path.trim_start_matches('/'))?;
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://api.openai.com/v1", "/chat/completions").unwrap(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            join_url("https://financialmodelingprep.com/api/v3/", "quote/AAPL").unwrap(),
            "https://financialmodelingprep.com/api/v3/quote/AAPL"
        );
        assert!(join_url("not a url", "x").is_err());
    }
}
