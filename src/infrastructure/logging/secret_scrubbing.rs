use regex::Regex;
use std::sync::LazyLock;

struct ScrubRule {
    pattern: Regex,
    replacement: &'static str,
}

static RULES: LazyLock<Vec<ScrubRule>> = LazyLock::new(|| {
    [
        // Bearer tokens in Authorization headers (Salesforce tokens contain '!')
        (r"(?i)bearer\s+[a-z0-9\-_.~+/!=]+", "Bearer [TOKEN_REDACTED]"),
        // Basic credentials in Authorization headers
        (r"(?i)basic\s+[a-z0-9+/]{8,}=*", "Basic [CREDENTIALS_REDACTED]"),
        // Password fields
        (
            r#"(?i)["']?password["']?\s*[:=]\s*["']?[^"'\s,}]+["']?"#,
            "password=[REDACTED]",
        ),
        // Token and secret fields
        (
            r#"(?i)["']?(access_token|token|secret)["']?\s*[:=]\s*["']?[^"'\s,}]+["']?"#,
            "$1=[REDACTED]",
        ),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| {
        Regex::new(pattern)
            .ok()
            .map(|pattern| ScrubRule {
                pattern,
                replacement,
            })
    })
    .collect()
});

/// Removes credentials from text before it reaches a log sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretScrubber;

impl SecretScrubber {
    pub const fn new() -> Self {
        Self
    }

    /// Scrub a message of sensitive data
    pub fn scrub_message(&self, message: &str) -> String {
        RULES.iter().fold(message.to_string(), |text, rule| {
            rule.pattern
                .replace_all(&text, rule.replacement)
                .into_owned()
        })
    }
}

/// Render a secret for diagnostics, keeping only a short prefix.
pub fn redact(secret: &str) -> String {
    if secret.chars().count() <= 8 {
        return "****".to_string();
    }
    let prefix: String = secret.chars().take(4).collect();
    format!("{prefix}****")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_rules_compile() {
        assert_eq!(RULES.len(), 4);
    }

    #[test]
    fn test_scrub_bearer_token() {
        let scrubber = SecretScrubber::new();
        let message = "Authorization: Bearer 00Dxx0000001gPL!AR8AQJXgYgq.fLy2B9";
        let scrubbed = scrubber.scrub_message(message);

        assert!(!scrubbed.contains("AR8AQJXg"));
        assert!(scrubbed.contains("Bearer [TOKEN_REDACTED]"));
    }

    #[test]
    fn test_scrub_basic_credentials() {
        let scrubber = SecretScrubber::new();
        let scrubbed = scrubber.scrub_message("Authorization: Basic aG9vazpodW50ZXIy");

        assert!(!scrubbed.contains("aG9vazpodW50ZXIy"));
        assert!(scrubbed.contains("[CREDENTIALS_REDACTED]"));
    }

    #[test]
    fn test_scrub_password_and_token_fields() {
        let scrubber = SecretScrubber::new();
        let message = r#"{"password": "super_secret", "access_token": "abc.def"}"#;
        let scrubbed = scrubber.scrub_message(message);

        assert!(!scrubbed.contains("super_secret"));
        assert!(!scrubbed.contains("abc.def"));
        assert!(scrubbed.contains("[REDACTED]"));
    }

    #[test]
    fn test_no_scrubbing_needed() {
        let scrubber = SecretScrubber::new();
        let message = "subscribed to /topic/InvoiceStatementUpdates";

        assert_eq!(scrubber.scrub_message(message), message);
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("short"), "****");
        assert_eq!(redact("00Dxx0000001gPL"), "00Dx****");
    }
}
