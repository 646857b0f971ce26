//! Minecraft version triples and `since`/`until` gating.
//!
//! Versions are written `1.20` or `1.20.1` in schema attributes; a missing
//! patch component defaults to zero, so `1.20` and `1.20.0` are the same
//! version. Comparison is lexicographic over `(major, minor, patch)`.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A Minecraft release version, e.g. `1.20.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    #[must_use]
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Error produced when a version string cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid version format: {0}")]
    Format(String),
    #[error("invalid version component: {0}")]
    Component(String),
}

impl FromStr for Version {
    type Err = VersionError;

    /// Accepts `MAJOR.MINOR` and `MAJOR.MINOR.PATCH`; anything else is an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(VersionError::Format(s.to_string()));
        }

        let component = |p: &str| {
            p.parse::<u32>()
                .map_err(|_| VersionError::Component(p.to_string()))
        };

        let major = component(parts[0])?;
        let minor = component(parts[1])?;
        let patch = if parts.len() == 3 {
            component(parts[2])?
        } else {
            0
        };

        Ok(Version::new(major, minor, patch))
    }
}

/// A `since`/`until` pair controlling whether a schema node participates in
/// validation for a target version. Both endpoints are inclusive; an unset
/// endpoint drops its bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionGate {
    pub since: Option<Version>,
    pub until: Option<Version>,
}

impl VersionGate {
    pub const OPEN: VersionGate = VersionGate {
        since: None,
        until: None,
    };

    #[must_use]
    pub fn new(since: Option<Version>, until: Option<Version>) -> Self {
        Self { since, until }
    }

    /// Whether a node with this gate is active for `target`.
    #[must_use]
    pub fn applies(&self, target: Version) -> bool {
        if let Some(since) = self.since {
            if target < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if target > until {
                return false;
            }
        }
        true
    }

    /// Intersect two gates: the later `since` and the earlier `until` win.
    /// Used when a spread carries its own gate on top of the inherited
    /// fields' gates.
    #[must_use]
    pub fn conjoin(&self, other: &VersionGate) -> VersionGate {
        let since = match (self.since, other.since) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let until = match (self.until, other.until) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        VersionGate { since, until }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.since.is_none() && self.until.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_two_component_defaults_patch() {
        assert_eq!(v("1.20"), Version::new(1, 20, 0));
        assert_eq!(v("1.20"), v("1.20.0"));
    }

    #[test]
    fn test_three_component() {
        assert_eq!(v("1.20.1"), Version::new(1, 20, 1));
    }

    #[test]
    fn test_ordering() {
        assert!(v("1.20") < v("1.20.1"));
        assert!(v("1.19.4") < v("1.20"));
        assert!(v("1.9") < v("1.10"));
        assert!(v("2.0") > v("1.99.99"));
    }

    #[test]
    fn test_display_always_three_components() {
        assert_eq!(v("1.20").to_string(), "1.20.0");
        assert_eq!(v("1.20.1").to_string(), "1.20.1");
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!("1".parse::<Version>().is_err());
        assert!("1.2.3.4".parse::<Version>().is_err());
        assert!("1.x".parse::<Version>().is_err());
        assert!("".parse::<Version>().is_err());
        assert!("-1.2".parse::<Version>().is_err());
    }

    #[test]
    fn test_gate_both_endpoints_inclusive() {
        let gate = VersionGate::new(Some(v("1.19")), Some(v("1.20.1")));
        assert!(!gate.applies(v("1.18.2")));
        assert!(gate.applies(v("1.19")));
        assert!(gate.applies(v("1.20")));
        assert!(gate.applies(v("1.20.1")));
        assert!(!gate.applies(v("1.20.2")));
    }

    #[test]
    fn test_gate_open_endpoints() {
        assert!(VersionGate::OPEN.applies(v("1.0")));
        let since_only = VersionGate::new(Some(v("1.19")), None);
        assert!(since_only.applies(v("99.0")));
        assert!(!since_only.applies(v("1.18")));
        let until_only = VersionGate::new(None, Some(v("1.19")));
        assert!(until_only.applies(v("1.0")));
        assert!(!until_only.applies(v("1.19.1")));
    }

    #[test]
    fn test_gate_monotone_in_target() {
        // Once a since-only gate starts applying it never stops.
        let gate = VersionGate::new(Some(v("1.19")), None);
        let versions = ["1.18", "1.18.2", "1.19", "1.19.4", "1.20", "1.21"];
        let mut seen_true = false;
        for s in versions {
            let applies = gate.applies(v(s));
            if seen_true {
                assert!(applies);
            }
            seen_true |= applies;
        }
    }

    #[test]
    fn test_conjoin_tightens_both_sides() {
        let field = VersionGate::new(Some(v("1.17")), Some(v("1.21")));
        let spread = VersionGate::new(Some(v("1.18")), Some(v("1.20")));
        let merged = field.conjoin(&spread);
        assert_eq!(merged.since, Some(v("1.18")));
        assert_eq!(merged.until, Some(v("1.20")));
    }

    #[test]
    fn test_conjoin_with_open_gate_is_identity() {
        let gate = VersionGate::new(Some(v("1.19")), None);
        assert_eq!(gate.conjoin(&VersionGate::OPEN), gate);
        assert_eq!(VersionGate::OPEN.conjoin(&gate), gate);
    }
}
