// src/version/mod.rs

//! Version ordering and constraint satisfaction
//!
//! Versions are dotted/segmented strings compared segment by segment:
//! numeric segments compare numerically, alphabetic segments lexically,
//! and when one version runs out of segments the tie-break rank is
//! numeric > absent > alphabetic, so `2.0.1 > 2.0 > 2.0rc1`.
//!
//! Constraints are unions of inclusive ranges, written `@1.2` (single),
//! `@1.0:1.5` (range, either end may be open) or `@1.0,2.0:2.5` (set).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// One parsed version segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Num(u64),
    Alpha(String),
}

impl Segment {
    /// Rank used when comparing against a missing segment:
    /// numeric (2) > absent (1) > alphabetic (0).
    fn rank(&self) -> u8 {
        match self {
            Segment::Num(_) => 2,
            Segment::Alpha(_) => 0,
        }
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Num(a), Segment::Num(b)) => a.cmp(b),
            (Segment::Alpha(a), Segment::Alpha(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A concrete version
///
/// Keeps the original text for display; comparison, equality, and hashing
/// all use the parsed segments so `1.2-3` and `1.2.3` order identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    raw: String,
    segments: Vec<Segment>,
}

impl Version {
    /// Parse a version string like "1.2.3", "2.0rc1", "1.4-beta2"
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::parse(s, 0, "empty version"));
        }

        let mut segments = Vec::new();
        let mut chars = s.char_indices().peekable();

        while let Some(&(pos, c)) = chars.peek() {
            if c == '.' || c == '-' || c == '_' {
                chars.next();
            } else if c.is_ascii_digit() {
                let mut num = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_digit() {
                        num.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = num.parse::<u64>().map_err(|e| {
                    Error::parse(s, pos, format!("numeric segment out of range: {}", e))
                })?;
                segments.push(Segment::Num(value));
            } else if c.is_ascii_alphabetic() {
                let mut word = String::new();
                while let Some(&(_, a)) = chars.peek() {
                    if a.is_ascii_alphabetic() {
                        word.push(a);
                        chars.next();
                    } else {
                        break;
                    }
                }
                segments.push(Segment::Alpha(word));
            } else {
                return Err(Error::parse(s, pos, format!("invalid character '{}'", c)));
            }
        }

        if segments.is_empty() {
            return Err(Error::parse(s, 0, "version has no segments"));
        }

        Ok(Self {
            raw: s.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Canonical rendering from the parsed segments; versions that compare
    /// equal render identically (`1.2-3` and `1.2.3` both give "1.2.3")
    pub fn canonical(&self) -> String {
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|s| match s {
                Segment::Num(n) => n.to_string(),
                Segment::Alpha(a) => a.clone(),
            })
            .collect();
        parts.join(".")
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for Version {}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let ord = match (self.segments.get(i), other.segments.get(i)) {
                (Some(a), Some(b)) => a.cmp(b),
                // absent ranks between numeric and alphabetic
                (Some(a), None) => a.rank().cmp(&1),
                (None, Some(b)) => 1.cmp(&b.rank()),
                (None, None) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

/// An inclusive version range; `None` at either end means open
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionRange {
    pub lo: Option<Version>,
    pub hi: Option<Version>,
}

impl VersionRange {
    /// Range containing exactly one version
    pub fn exact(v: Version) -> Self {
        Self {
            lo: Some(v.clone()),
            hi: Some(v),
        }
    }

    pub fn contains(&self, v: &Version) -> bool {
        if let Some(ref lo) = self.lo {
            if v < lo {
                return false;
            }
        }
        if let Some(ref hi) = self.hi {
            if v > hi {
                return false;
            }
        }
        true
    }

    /// Intersection of two ranges, or None when they are disjoint
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let lo = match (&self.lo, &other.lo) {
            (Some(a), Some(b)) => Some(a.clone().max(b.clone())),
            (Some(a), None) => Some(a.clone()),
            (None, b) => b.clone(),
        };
        let hi = match (&self.hi, &other.hi) {
            (Some(a), Some(b)) => Some(a.clone().min(b.clone())),
            (Some(a), None) => Some(a.clone()),
            (None, b) => b.clone(),
        };
        if let (Some(l), Some(h)) = (&lo, &hi) {
            if l > h {
                return None;
            }
        }
        Some(Self { lo, hi })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.lo, &self.hi) {
            (Some(lo), Some(hi)) if lo == hi => write!(f, "{}", lo),
            (Some(lo), Some(hi)) => write!(f, "{}:{}", lo, hi),
            (Some(lo), None) => write!(f, "{}:", lo),
            (None, Some(hi)) => write!(f, ":{}", hi),
            (None, None) => write!(f, ":"),
        }
    }
}

/// A version constraint: a union of inclusive ranges
///
/// An empty range list means "any version". Ranges are kept sorted by
/// lower bound so equal constraints print identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VersionConstraint {
    ranges: Vec<VersionRange>,
}

impl VersionConstraint {
    /// The unconstrained ("any version") constraint
    pub fn any() -> Self {
        Self::default()
    }

    pub fn exact(v: Version) -> Self {
        Self {
            ranges: vec![VersionRange::exact(v)],
        }
    }

    pub fn from_ranges(mut ranges: Vec<VersionRange>) -> Self {
        ranges.sort_by(|a, b| a.lo.cmp(&b.lo).then_with(|| a.hi.cmp(&b.hi)));
        ranges.dedup();
        Self { ranges }
    }

    /// Parse the text after `@`: `1.2`, `1.0:1.5`, `:1.5`, `1.0:`, `a,b,c`
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::parse(s, 0, "empty version constraint"));
        }

        let mut ranges = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(Error::parse(s, 0, "empty element in version set"));
            }
            if let Some(colon) = part.find(':') {
                let (lo_str, hi_str) = part.split_at(colon);
                let hi_str = &hi_str[1..];
                let lo = if lo_str.is_empty() {
                    None
                } else {
                    Some(Version::parse(lo_str)?)
                };
                let hi = if hi_str.is_empty() {
                    None
                } else {
                    Some(Version::parse(hi_str)?)
                };
                ranges.push(VersionRange { lo, hi });
            } else {
                ranges.push(VersionRange::exact(Version::parse(part)?));
            }
        }

        Ok(Self::from_ranges(ranges))
    }

    pub fn is_any(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[VersionRange] {
        &self.ranges
    }

    /// True when the constraint admits exactly one version, returning it
    pub fn as_exact(&self) -> Option<&Version> {
        match self.ranges.as_slice() {
            [VersionRange {
                lo: Some(lo),
                hi: Some(hi),
            }] if lo == hi => Some(lo),
            _ => None,
        }
    }

    pub fn satisfies(&self, v: &Version) -> bool {
        self.is_any() || self.ranges.iter().any(|r| r.contains(v))
    }

    /// Intersection of two constraints; None when no version can satisfy both
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        if self.is_any() {
            return Some(other.clone());
        }
        if other.is_any() {
            return Some(self.clone());
        }
        let mut ranges = Vec::new();
        for a in &self.ranges {
            for b in &other.ranges {
                if let Some(r) = a.intersect(b) {
                    ranges.push(r);
                }
            }
        }
        if ranges.is_empty() {
            return None;
        }
        Some(Self::from_ranges(ranges))
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ranges.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for VersionConstraint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        VersionConstraint::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_version_parse_simple() {
        let ver = v("1.2.3");
        assert_eq!(
            ver.segments(),
            &[Segment::Num(1), Segment::Num(2), Segment::Num(3)]
        );
        assert_eq!(ver.to_string(), "1.2.3");
    }

    #[test]
    fn test_version_parse_mixed_segments() {
        let ver = v("2.0rc1");
        assert_eq!(
            ver.segments(),
            &[
                Segment::Num(2),
                Segment::Num(0),
                Segment::Alpha("rc".to_string()),
                Segment::Num(1)
            ]
        );
    }

    #[test]
    fn test_version_parse_rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("1.2+3").is_err());
        assert!(Version::parse("...").is_err());
    }

    #[test]
    fn test_version_numeric_order() {
        assert!(v("1.2.10") > v("1.2.9"));
        assert!(v("1.10") > v("1.9"));
    }

    #[test]
    fn test_version_prerelease_sorts_below_release() {
        // numeric > absent > alphabetic at the tie-break position
        assert!(v("2.0") > v("2.0rc1"));
        assert!(v("2.0.1") > v("2.0"));
        assert!(v("2.0rc2") > v("2.0rc1"));
        assert!(v("2.0rc1") < v("2.0.0"));
    }

    #[test]
    fn test_version_alpha_lexical_order() {
        assert!(v("1.0beta") > v("1.0alpha"));
    }

    #[test]
    fn test_version_separator_insensitive_equality() {
        assert_eq!(v("1.2-3"), v("1.2.3"));
    }

    #[test]
    fn test_canonical_rendering_ignores_separators() {
        assert_eq!(v("1.2-3").canonical(), "1.2.3");
        assert_eq!(v("1.2.3").canonical(), "1.2.3");
        assert_eq!(v("2.0rc1").canonical(), "2.0.rc.1");
    }

    #[test]
    fn test_range_contains() {
        let r = VersionRange {
            lo: Some(v("1.0")),
            hi: Some(v("1.5")),
        };
        assert!(r.contains(&v("1.0")));
        assert!(r.contains(&v("1.5")));
        assert!(r.contains(&v("1.3.2")));
        assert!(!r.contains(&v("1.6")));
        assert!(!r.contains(&v("0.9")));
    }

    #[test]
    fn test_range_open_ends() {
        let lo_open = VersionConstraint::parse(":1.5").unwrap();
        assert!(lo_open.satisfies(&v("0.1")));
        assert!(!lo_open.satisfies(&v("1.6")));

        let hi_open = VersionConstraint::parse("1.0:").unwrap();
        assert!(hi_open.satisfies(&v("99")));
        assert!(!hi_open.satisfies(&v("0.9")));
    }

    #[test]
    fn test_constraint_set() {
        let c = VersionConstraint::parse("1.0,2.0:2.5").unwrap();
        assert!(c.satisfies(&v("1.0")));
        assert!(c.satisfies(&v("2.3")));
        assert!(!c.satisfies(&v("1.5")));
    }

    #[test]
    fn test_constraint_intersect_overlap() {
        let a = VersionConstraint::parse("1.0:1.5").unwrap();
        let b = VersionConstraint::parse("1.3:2.0").unwrap();
        let i = a.intersect(&b).unwrap();
        assert!(i.satisfies(&v("1.4")));
        assert!(!i.satisfies(&v("1.2")));
        assert!(!i.satisfies(&v("1.6")));
    }

    #[test]
    fn test_constraint_intersect_disjoint() {
        let a = VersionConstraint::parse("1.0:1.5").unwrap();
        let b = VersionConstraint::parse("1.6:2.0").unwrap();
        assert!(a.intersect(&b).is_none());
    }

    #[test]
    fn test_constraint_intersect_any() {
        let a = VersionConstraint::any();
        let b = VersionConstraint::parse("1.0:1.5").unwrap();
        assert_eq!(a.intersect(&b).unwrap(), b);
    }

    #[test]
    fn test_constraint_as_exact() {
        let c = VersionConstraint::parse("1.2.3").unwrap();
        assert_eq!(c.as_exact(), Some(&v("1.2.3")));
        assert!(VersionConstraint::parse("1.0:1.5").unwrap().as_exact().is_none());
        assert!(VersionConstraint::any().as_exact().is_none());
    }

    #[test]
    fn test_constraint_display_roundtrip() {
        for s in ["1.2.3", "1.0:1.5", ":1.5", "1.0:", "1.0,2.0:2.5"] {
            let c = VersionConstraint::parse(s).unwrap();
            let reparsed = VersionConstraint::parse(&c.to_string()).unwrap();
            assert_eq!(c, reparsed);
        }
    }
}
