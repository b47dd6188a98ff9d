//! Translation of legacy positional patterns into the native template syntax
//!
//! Legacy patterns use positional placeholders: `{0}` timestamp, `{1}`
//! marker, `{2}` thread, `{3}` logger, `{4}` level, `{5}` message, plus an
//! embedded date format `{0,date,FORMAT}`. Native templates use `%`
//! directives (`%d{FORMAT}`, `%thread`, `%logger`, ...).

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Template used when a rule does not carry its own pattern
pub const DEFAULT_PATTERN: &str = "%d{dd.MM.yyyy HH:mm:ss.SSS} *%level* [%thread] %logger %msg%n";

static LEGACY_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{0,date,(.+?)\}").expect("Invalid legacy date regex"));

static LEGACY_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([0-5])\}").expect("Invalid legacy marker regex"));

fn native_directive(position: &str) -> &'static str {
    match position {
        "0" => "%d",
        "1" => "%marker",
        "2" => "%thread",
        "3" => "%logger",
        "4" => "%level",
        _ => "%message",
    }
}

/// Whether the pattern still contains positional placeholders
pub fn is_legacy_pattern(pattern: &str) -> bool {
    LEGACY_DATE.is_match(pattern) || LEGACY_MARKER.is_match(pattern)
}

/// Rewrite a legacy pattern into a native template.
///
/// The embedded date format is always rewritten. When positional
/// placeholders remain afterwards they are substituted and a trailing
/// newline directive is appended; native patterns otherwise pass through.
///
/// # Example
///
/// ```
/// use log_config_manager::registry::pattern::translate_pattern;
///
/// assert_eq!(
///     translate_pattern("{0,date,dd.MM.yyyy} *{4}* [{2}] {3} {5}"),
///     "%d{dd.MM.yyyy} *%level* [%thread] %logger %message%n"
/// );
/// assert_eq!(translate_pattern("%level %msg%n"), "%level %msg%n");
/// ```
pub fn translate_pattern(pattern: &str) -> String {
    let dated = LEGACY_DATE.replace_all(pattern, "%d{$1}");
    if !LEGACY_MARKER.is_match(&dated) {
        return dated.into_owned();
    }

    let mut native = LEGACY_MARKER
        .replace_all(&dated, |caps: &Captures| native_directive(&caps[1]))
        .into_owned();
    native.push_str("%n");
    native
}
