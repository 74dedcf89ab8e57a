use std::sync::LazyLock;

use regex::Regex;

/// Strips reasoning tags and markdown fences from an LLM reply and narrows
/// it to the outermost JSON object when one is present.
pub fn extract_json_block(s: &str) -> String {
    let s = REGEX_XML_TAG.replace_all(s, "");
    let s = REGEX_CODE_BLOCK_START.replace(&s, "");
    let s = REGEX_CODE_BLOCK_END.replace(&s, "");
    let s = s.trim();

    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if start < end => s[start..=end].to_string(),
        _ => s.to_string(),
    }
}

static REGEX_CODE_BLOCK_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:([\s\S]*?))(\s*```.*\n)([\s\S]*?)").expect("CODE_BLOCK_START regex is invalid")
});
static REGEX_CODE_BLOCK_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*```[\s\S]*").expect("CODE_BLOCK_END regex is invalid"));
static REGEX_XML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>[\s\S]*?<\/[^>]+>").expect("XML_TAG regex is invalid"));

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    #[test]
    fn test_extract_json_block() {
        assert_eq!(extract_json_block("plain text"), "plain text");

        let fenced = r#"
```json
{"view": "hold"}
```

Let me know if you need more detail.
"#;
        let json: Value = serde_json::from_str(&extract_json_block(fenced)).unwrap();
        assert_eq!(json["view"], "hold");

        let reasoning = r#"
<think>
Margins look {stable}...
</think>

Here is the analysis: {"quality": "high", "risks": "valuation"} Thanks.
"#;
        let json: Value = serde_json::from_str(&extract_json_block(reasoning)).unwrap();
        assert_eq!(json["quality"], "high");
        assert_eq!(json["risks"], "valuation");
    }
}
