//! Bot-wall detection

use regex::Regex;
use std::sync::OnceLock;

fn captcha_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?i)captcha|recaptcha|prove you are human|verify you are human|are you human")
                .ok()
        })
        .as_ref()
}

/// Heuristic: does this page text look like a CAPTCHA or human-check wall?
pub fn detect_captcha(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    captcha_pattern().is_some_and(|re| re.is_match(text))
}
