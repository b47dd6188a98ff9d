//! Output destinations and rotation parameters shared by writers and appenders

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where a writer sends its output
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Destination {
    /// Standard output
    Console,
    /// Absolute file path
    File(PathBuf),
}

impl Destination {
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Destination::Console => None,
            Destination::File(path) => Some(path),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Console => write!(f, "console"),
            Destination::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// When a file destination rolls over
///
/// A threshold string made only of digits with an optional `k`, `kb`, `m`,
/// `mb`, `g` or `gb` suffix is a size limit; anything else is treated as a
/// date pattern whose formatted value becomes the rolled file's suffix.
///
/// # Examples
///
/// ```
/// use log_config_manager::core::RotationThreshold;
///
/// assert_eq!(RotationThreshold::parse("10mb"), RotationThreshold::Size { max_bytes: 10 * 1024 * 1024 });
/// assert_eq!(
///     RotationThreshold::parse("'.'yyyy-MM-dd"),
///     RotationThreshold::DatePattern("'.'yyyy-MM-dd".to_string())
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotationThreshold {
    Size { max_bytes: u64 },
    DatePattern(String),
}

impl RotationThreshold {
    pub fn parse(threshold: &str) -> Self {
        match parse_size(threshold) {
            Some(max_bytes) => RotationThreshold::Size { max_bytes },
            None => RotationThreshold::DatePattern(threshold.trim().to_string()),
        }
    }
}

impl fmt::Display for RotationThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationThreshold::Size { max_bytes } => write!(f, "{} bytes", max_bytes),
            RotationThreshold::DatePattern(pattern) => write!(f, "{}", pattern),
        }
    }
}

fn parse_size(threshold: &str) -> Option<u64> {
    let lower = threshold.trim().to_lowercase();
    let split = lower
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(lower.len());
    let (digits, suffix) = lower.split_at(split);
    if digits.is_empty() {
        return None;
    }

    let factor: u64 = match suffix {
        "" => 1,
        "k" | "kb" => 1024,
        "m" | "mb" => 1024 * 1024,
        "g" | "gb" => 1024 * 1024 * 1024,
        _ => return None,
    };
    digits.parse::<u64>().ok()?.checked_mul(factor)
}

/// Everything an appender factory needs to instantiate a physical sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterSpec {
    pub destination: Destination,
    /// Maximum number of rolled files to keep
    pub max_files: usize,
    pub rotation: RotationThreshold,
}
