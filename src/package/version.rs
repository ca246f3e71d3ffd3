//! Version-range resolution.
//!
//! Ranges use the bounded grammar `<low> <cmp> v <cmp> <high>` where each
//! comparator is `<` or `<=`, e.g. `1.0.0 <= v < 2.0.0`.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};

use super::catalog::VersionCatalog;

static RANGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]+\.[0-9]+\.[0-9]+) (<=|<) v (<=|<) ([0-9]+\.[0-9]+\.[0-9]+)$")
        .expect("valid range regex")
});

/// Which satisfying version wins when several are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
    /// Highest satisfying version.
    #[default]
    Highest,
    /// First satisfying version in catalog order.
    First,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Less,
    LessEq,
}

impl Comparator {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "<" => Some(Comparator::Less),
            "<=" => Some(Comparator::LessEq),
            _ => None,
        }
    }

    fn holds(self, lhs: &Version, rhs: &Version) -> bool {
        match self {
            Comparator::Less => lhs < rhs,
            Comparator::LessEq => lhs <= rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub low: Version,
    pub low_cmp: Comparator,
    pub high_cmp: Comparator,
    pub high: Version,
}

impl VersionRange {
    /// Parses a range expression; `None` if it doesn't match the grammar.
    pub fn parse(expr: &str) -> Option<Self> {
        let caps = RANGE_REGEX.captures(expr.trim())?;
        Some(Self {
            low: Version::parse(&caps[1]).ok()?,
            low_cmp: Comparator::parse(&caps[2])?,
            high_cmp: Comparator::parse(&caps[3])?,
            high: Version::parse(&caps[4]).ok()?,
        })
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.low_cmp.holds(&self.low, version) && self.high_cmp.holds(version, &self.high)
    }
}

/// Resolves `expr` against `published` versions.
///
/// Returns the selected version, or the expression itself when it can't be
/// resolved: a grammar violation (logged), no satisfying version, or an
/// exact version that needs no resolution.
pub fn resolve_version(expr: &str, published: &[String], policy: SelectionPolicy) -> String {
    let Some(range) = VersionRange::parse(expr) else {
        if Version::parse(expr.trim()).is_err() {
            tracing::warn!("couldn't parse version range: \"{}\"", expr);
        }
        return expr.to_string();
    };

    let mut satisfying = published.iter().filter_map(|raw| {
        Version::parse(raw)
            .ok()
            .filter(|v| range.contains(v))
            .map(|v| (v, raw))
    });

    let selected = match policy {
        SelectionPolicy::First => satisfying.next(),
        SelectionPolicy::Highest => satisfying.max_by(|(a, _), (b, _)| a.cmp(b)),
    };

    match selected {
        Some((_, raw)) => raw.clone(),
        None => {
            tracing::debug!("no published version satisfies \"{}\"", expr);
            expr.to_string()
        }
    }
}

/// Version Range Resolver bound to a shared, read-only catalog.
#[derive(Debug, Clone)]
pub struct VersionRangeResolver {
    catalog: Arc<VersionCatalog>,
    policy: SelectionPolicy,
}

impl VersionRangeResolver {
    pub fn new(catalog: Arc<VersionCatalog>, policy: SelectionPolicy) -> Self {
        Self { catalog, policy }
    }

    /// Resolves the range declared for `package` to one concrete version.
    pub fn resolve(&self, package: &str, expr: &str) -> String {
        resolve_version(expr, self.catalog.versions(package), self.policy)
    }
}
