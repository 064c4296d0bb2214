//! Version ordering and join for WordPress style version strings
//!
//! WordPress versions are not semver: they have two to four numeric segments
//! ("6.8", "2.0.11", "5.5.3.1") and pre-releases are written as "6.8-beta1" or
//! "6.8-RC2". Ordering compares numeric segments first (missing segments count
//! as zero); a suffixed version sorts below the same numbers without a suffix.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error returned when a string is not a recognizable version
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid version: '{0}'")]
pub struct VersionParseError(pub String);

/// Pre-release stage, ordered from least to most mature
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Stage {
    Dev,
    Alpha,
    Beta,
    Rc,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Suffix {
    stage: Stage,
    number: u64,
    raw: String,
}

impl Suffix {
    fn parse(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        let label_end = lower
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(lower.len());
        let label = lower[..label_end].trim_matches(|c: char| c == '-' || c == '.');
        let stage = match label {
            "dev" => Stage::Dev,
            "alpha" | "a" => Stage::Alpha,
            "beta" | "b" => Stage::Beta,
            "rc" => Stage::Rc,
            _ => Stage::Other,
        };
        let number = lower[label_end..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .unwrap_or(0);

        Self {
            stage,
            number,
            raw: raw.to_string(),
        }
    }
}

impl Ord for Suffix {
    fn cmp(&self, other: &Self) -> Ordering {
        self.stage
            .cmp(&other.stage)
            .then(self.number.cmp(&other.number))
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for Suffix {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A parsed version. Ordering is total, so [`join`] is commutative,
/// associative and idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    segments: Vec<u64>,
    suffix: Option<Suffix>,
}

impl Version {
    /// Numeric segments as written
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// True for "-beta", "-RC1" and similar pre-release versions
    pub fn is_prerelease(&self) -> bool {
        self.suffix.is_some()
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let numeric_end = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let numeric = trimmed[..numeric_end].trim_end_matches('.');

        if numeric.is_empty() || numeric.starts_with('.') {
            return Err(VersionParseError(s.to_string()));
        }

        let segments = numeric
            .split('.')
            .map(|part| part.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VersionParseError(s.to_string()))?;

        let rest = trimmed[numeric_end..].trim_start_matches(['-', '.', '+']);
        let suffix = (!rest.is_empty()).then(|| Suffix::parse(rest));

        Ok(Self { segments, suffix })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numbers = self
            .segments
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        match &self.suffix {
            Some(suffix) => write!(f, "{}-{}", numbers, suffix.raw),
            None => f.write_str(&numbers),
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.segments.len().max(other.segments.len());
        for i in 0..width {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }

        let by_suffix = match (&self.suffix, &other.suffix) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        };

        // "5.0" and "5.0.0" are numerically equal; keep the order total anyway.
        by_suffix.then(self.segments.len().cmp(&other.segments.len()))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Three-way comparison of two versions
pub fn compare(a: &Version, b: &Version) -> Ordering {
    a.cmp(b)
}

/// The lattice join: the greater of the two versions
pub fn join(a: &Version, b: &Version) -> Version {
    if a >= b { a.clone() } else { b.clone() }
}
