//! Log levels and per-stream thresholds

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Severity of a single record, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
            Self::Panic => "panic",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Minimum level a stream accepts, or `Disabled` to drop everything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    Min(Level),
    Disabled,
}

impl Threshold {
    /// Parse a configured level string.
    ///
    /// Matching is case-insensitive. Unknown values fall back to `INFO`
    /// rather than failing startup.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Self::Min(Level::Debug),
            "INFO" => Self::Min(Level::Info),
            "WARN" | "WARNING" => Self::Min(Level::Warn),
            "ERROR" => Self::Min(Level::Error),
            "FATAL" => Self::Min(Level::Fatal),
            "PANIC" => Self::Min(Level::Panic),
            "NIL" | "NULL" | "DISCARD" | "NO" => Self::Disabled,
            _ => Self::Min(Level::Info),
        }
    }

    /// Whether a record at `level` passes this threshold
    #[inline]
    pub fn allows(&self, level: Level) -> bool {
        match self {
            Self::Min(min) => level >= *min,
            Self::Disabled => false,
        }
    }

    #[inline]
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::Min(Level::Info)
    }
}

impl FromStr for Threshold {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Min(level) => write!(f, "{}", level),
            Self::Disabled => f.write_str("disabled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_levels() {
        assert_eq!(Threshold::parse("debug"), Threshold::Min(Level::Debug));
        assert_eq!(Threshold::parse("INFO"), Threshold::Min(Level::Info));
        assert_eq!(Threshold::parse("Warn"), Threshold::Min(Level::Warn));
        assert_eq!(Threshold::parse("warning"), Threshold::Min(Level::Warn));
        assert_eq!(Threshold::parse("error"), Threshold::Min(Level::Error));
        assert_eq!(Threshold::parse("FATAL"), Threshold::Min(Level::Fatal));
        assert_eq!(Threshold::parse("panic"), Threshold::Min(Level::Panic));
    }

    #[test]
    fn test_parse_disabled_aliases() {
        for value in ["nil", "NULL", "Discard", "no"] {
            assert_eq!(Threshold::parse(value), Threshold::Disabled, "{}", value);
        }
    }

    #[test]
    fn test_parse_unknown_defaults_to_info() {
        assert_eq!(Threshold::parse("verbose"), Threshold::Min(Level::Info));
        assert_eq!(Threshold::parse(""), Threshold::Min(Level::Info));
    }

    #[test]
    fn test_threshold_allows() {
        let warn = Threshold::Min(Level::Warn);
        assert!(!warn.allows(Level::Debug));
        assert!(!warn.allows(Level::Info));
        assert!(warn.allows(Level::Warn));
        assert!(warn.allows(Level::Error));
        assert!(warn.allows(Level::Fatal));
        assert!(warn.allows(Level::Panic));

        assert!(!Threshold::Disabled.allows(Level::Panic));
    }

    #[test]
    fn test_level_serializes_lowercase() {
        let json = serde_json::to_string(&Level::Warn).unwrap();
        assert_eq!(json, "\"warn\"");
    }
}
