// src/feed/sanitize.rs
use once_cell::sync::Lazy;
use regex::Regex;

/// Characters that are unsafe in a file or directory name on at least one
/// common filesystem, plus the comma.
static FORBIDDEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|,]"#).expect("forbidden-character class is valid"));

/// Replace every forbidden character with `_`. Idempotent.
pub fn sanitize(name: &str) -> String {
    FORBIDDEN.replace_all(name, "_").into_owned()
}
