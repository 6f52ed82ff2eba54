use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

use super::compare::{compare_versions, Version};

/// One end of a version interval.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionBound {
    pub version: String,
    pub inclusive: bool,
}

impl VersionBound {
    pub fn inclusive(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            inclusive: true,
        }
    }

    pub fn exclusive(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            inclusive: false,
        }
    }

    fn order_key(&self, other: &Self) -> Ordering {
        compare_versions(&self.version, &other.version)
    }
}

/// A version interval in canonical form. No bounds means any version is accepted.
///
/// Parsing never fails: expressions that cannot be represented as a single
/// interval degrade to the unbounded constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VersionConstraint {
    pub min: Option<VersionBound>,
    pub max: Option<VersionBound>,
}

impl VersionConstraint {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn exact(version: &str) -> Self {
        Self {
            min: Some(VersionBound::inclusive(version)),
            max: Some(VersionBound::inclusive(version)),
        }
    }

    pub fn is_any(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() || text == "*" {
            return Self::any();
        }
        if text.contains("||") {
            log::debug!(
                "[VersionConstraint] Alternatives are not representable, treating '{}' as any",
                text
            );
            return Self::any();
        }

        let parsed = if text.starts_with('[') || text.starts_with('(') {
            parse_bracket(text)
        } else if text.contains(',') {
            parse_comma_list(text)
        } else {
            parse_comparator_set(text)
        };

        match parsed {
            Some(constraint) => constraint,
            None => {
                log::debug!(
                    "[VersionConstraint] Unrecognized range '{}', treating as any",
                    text
                );
                Self::any()
            }
        }
    }

    /// True when the candidate lies inside the interval. A candidate that is not a
    /// recognizable version is accepted.
    pub fn satisfies(&self, candidate: &str) -> bool {
        if self.is_any() {
            return true;
        }
        let Some(candidate) = Version::parse(candidate) else {
            return true;
        };

        if let Some(min) = &self.min {
            let ord = compare_versions(candidate.as_str(), &min.version);
            if ord == Ordering::Less || (ord == Ordering::Equal && !min.inclusive) {
                return false;
            }
        }
        if let Some(max) = &self.max {
            let ord = compare_versions(candidate.as_str(), &max.version);
            if ord == Ordering::Greater || (ord == Ordering::Equal && !max.inclusive) {
                return false;
            }
        }
        true
    }

    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            min: pick_bound(self.min.as_ref(), other.min.as_ref(), Ordering::Greater),
            max: pick_bound(self.max.as_ref(), other.max.as_ref(), Ordering::Less),
        }
    }

    /// Whether at least one version can satisfy the interval.
    pub fn is_satisfiable(&self) -> bool {
        match (&self.min, &self.max) {
            (Some(min), Some(max)) => match min.order_key(max) {
                Ordering::Less => true,
                Ordering::Equal => min.inclusive && max.inclusive,
                Ordering::Greater => false,
            },
            _ => true,
        }
    }

    /// Canonical bracket notation, empty for the unbounded constraint.
    pub fn format(&self) -> String {
        if self.is_any() {
            return String::new();
        }
        let mut out = String::new();
        match &self.min {
            Some(b) => {
                out.push(if b.inclusive { '[' } else { '(' });
                out.push_str(&b.version);
            }
            None => out.push('('),
        }
        out.push(',');
        match &self.max {
            Some(b) => {
                out.push_str(&b.version);
                out.push(if b.inclusive { ']' } else { ')' });
            }
            None => out.push(')'),
        }
        out
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            f.write_str("*")
        } else {
            f.write_str(&self.format())
        }
    }
}

impl Serialize for VersionConstraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.format())
    }
}

impl<'de> Deserialize<'de> for VersionConstraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}

/// `prefer` is the ordering that makes a bound tighter: Greater for lower bounds,
/// Less for upper bounds. Semantically equal bounds keep the lexicographically
/// smaller spelling (`1.20` over `1.20.0`) so the result is independent of operand order.
fn pick_bound(
    a: Option<&VersionBound>,
    b: Option<&VersionBound>,
    prefer: Ordering,
) -> Option<VersionBound> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (Some(x), Some(y)) => {
            let ord = x.order_key(y);
            if ord == prefer {
                Some(x.clone())
            } else if ord == prefer.reverse() {
                Some(y.clone())
            } else {
                Some(VersionBound {
                    version: std::cmp::min(&x.version, &y.version).clone(),
                    inclusive: x.inclusive && y.inclusive,
                })
            }
        }
    }
}

fn normalized(text: &str) -> Option<String> {
    Version::parse(text).map(|v| v.as_str().to_string())
}

/// Maven style: `[1.0,2.0)`, `[1.0,)`, `(,2.0]`, `[1.0]`.
fn parse_bracket(text: &str) -> Option<VersionConstraint> {
    let open = text.chars().next()?;
    let close = text.chars().last()?;
    if text.len() < 2 || !matches!(close, ']' | ')') {
        return None;
    }
    let inner = &text[1..text.len() - 1];
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();

    match parts.as_slice() {
        [single] => {
            if open != '[' || close != ']' || single.is_empty() {
                return None;
            }
            Some(VersionConstraint::exact(&normalized(single)?))
        }
        [lo, hi] => {
            let min = if lo.is_empty() {
                None
            } else {
                Some(VersionBound {
                    version: normalized(lo)?,
                    inclusive: open == '[',
                })
            };
            let max = if hi.is_empty() {
                None
            } else {
                Some(VersionBound {
                    version: normalized(hi)?,
                    inclusive: close == ']',
                })
            };
            Some(VersionConstraint { min, max })
        }
        // Multi-interval sets such as `[1,2),[3,4)` land here.
        _ => None,
    }
}

/// `a,b` with two plain versions is the half-open interval `[a,b)`; anything else is
/// a conjunction of comparator sets.
fn parse_comma_list(text: &str) -> Option<VersionConstraint> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if let [a, b] = parts.as_slice() {
        if let (Some(lo), Some(hi)) = (normalized(a), normalized(b)) {
            return Some(VersionConstraint {
                min: Some(VersionBound::inclusive(lo)),
                max: Some(VersionBound::exclusive(hi)),
            });
        }
    }
    parts.iter().try_fold(VersionConstraint::any(), |acc, part| {
        Some(acc.intersect(&parse_comparator_set(part)?))
    })
}

const OPERATORS: [&str; 6] = [">=", "<=", "==", ">", "<", "="];

/// Whitespace separated comparators, ANDed. `>= 1.0` with a space is accepted.
fn parse_comparator_set(text: &str) -> Option<VersionConstraint> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for raw in text.split_whitespace() {
        if let Some(op) = OPERATORS.iter().find(|op| **op == raw) {
            pending_op = Some(*op);
            continue;
        }
        match pending_op.take() {
            Some(op) => tokens.push(format!("{}{}", op, raw)),
            None => tokens.push(raw.to_string()),
        }
    }
    if pending_op.is_some() || tokens.is_empty() {
        return None;
    }

    tokens.iter().try_fold(VersionConstraint::any(), |acc, token| {
        Some(acc.intersect(&parse_comparator(token)?))
    })
}

fn parse_comparator(token: &str) -> Option<VersionConstraint> {
    if token == "*" {
        return Some(VersionConstraint::any());
    }
    for op in OPERATORS {
        if let Some(rest) = token.strip_prefix(op) {
            let version = normalized(rest)?;
            return Some(match op {
                ">=" => VersionConstraint {
                    min: Some(VersionBound::inclusive(version)),
                    max: None,
                },
                ">" => VersionConstraint {
                    min: Some(VersionBound::exclusive(version)),
                    max: None,
                },
                "<=" => VersionConstraint {
                    min: None,
                    max: Some(VersionBound::inclusive(version)),
                },
                "<" => VersionConstraint {
                    min: None,
                    max: Some(VersionBound::exclusive(version)),
                },
                _ => VersionConstraint::exact(&version),
            });
        }
    }
    if let Some(rest) = token.strip_prefix('^') {
        return caret_range(rest);
    }
    if let Some(rest) = token.strip_prefix('~') {
        return tilde_range(rest);
    }
    if token.ends_with(".x") || token.ends_with(".X") || token.ends_with(".*") {
        return wildcard_range(token);
    }
    Some(VersionConstraint::exact(&normalized(token)?))
}

/// Leading numeric release segments of a version (`1.20.1-beta` -> [1, 20, 1]).
fn numeric_segments(version: &str) -> Option<Vec<u64>> {
    let core = version.split(['-', '+']).next()?;
    let segments: Option<Vec<u64>> = core.split('.').map(|s| s.parse().ok()).collect();
    segments.filter(|s| !s.is_empty())
}

fn bump(segments: &[u64], index: usize) -> String {
    segments
        .iter()
        .enumerate()
        .map(|(i, v)| match i.cmp(&index) {
            Ordering::Less => v.to_string(),
            Ordering::Equal => (v + 1).to_string(),
            Ordering::Greater => "0".to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn half_open(min: String, max: String) -> VersionConstraint {
    VersionConstraint {
        min: Some(VersionBound::inclusive(min)),
        max: Some(VersionBound::exclusive(max)),
    }
}

/// `^1.2.3` allows changes that keep the first non-zero segment.
fn caret_range(rest: &str) -> Option<VersionConstraint> {
    let version = normalized(rest)?;
    let segments = numeric_segments(&version)?;
    let index = segments
        .iter()
        .position(|v| *v != 0)
        .unwrap_or(segments.len() - 1);
    Some(half_open(version, bump(&segments, index)))
}

/// `~1.2.3` allows patch changes, `~1` allows minor changes.
fn tilde_range(rest: &str) -> Option<VersionConstraint> {
    let version = normalized(rest)?;
    let segments = numeric_segments(&version)?;
    let index = if segments.len() >= 2 { 1 } else { 0 };
    Some(half_open(version, bump(&segments, index)))
}

/// `1.20.x` / `1.20.*` cover every release starting with `1.20`.
fn wildcard_range(token: &str) -> Option<VersionConstraint> {
    let prefix = &token[..token.len() - 2];
    let segments = numeric_segments(prefix)?;
    let min = segments
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".");
    Some(half_open(min, bump(&segments, segments.len() - 1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(text: &str) -> VersionConstraint {
        VersionConstraint::parse(text)
    }

    #[test]
    fn test_bracket_round_trip() {
        let parsed = c("[1.2.0,2.0.0)");
        assert_eq!(parsed.min, Some(VersionBound::inclusive("1.2.0")));
        assert_eq!(parsed.max, Some(VersionBound::exclusive("2.0.0")));
        assert_eq!(parsed.format(), "[1.2.0,2.0.0)");
        assert_eq!(c(&parsed.format()), parsed);
    }

    #[test]
    fn test_open_ended_brackets() {
        assert_eq!(c("[47,)").format(), "[47,)");
        assert_eq!(c("(,1.20.1]").format(), "(,1.20.1]");
        assert_eq!(c("[1.0]"), VersionConstraint::exact("1.0"));
    }

    #[test]
    fn test_unbounded_inputs() {
        for text in ["", "  ", "*", "[1,2),[3,4)", ">=1.0 || <0.5", "not a version", "[1.0", ">="] {
            assert!(c(text).is_any(), "expected '{}' to be unbounded", text);
        }
        assert_eq!(c("*").format(), "");
    }

    #[test]
    fn test_comparators() {
        let ge = c(">=1.0.0");
        assert!(ge.satisfies("1.0.0"));
        assert!(ge.satisfies("3.1"));
        assert!(!ge.satisfies("0.9"));

        let spaced = c(">= 1.0.0 < 2.0.0");
        assert_eq!(spaced.format(), "[1.0.0,2.0.0)");

        assert!(!c(">1.0").satisfies("1.0"));
        assert!(c("<=1.0").satisfies("1.0"));
        assert!(c("=1.5").satisfies("1.5.0"));
        assert_eq!(c("1.4.2"), VersionConstraint::exact("1.4.2"));
    }

    #[test]
    fn test_comma_pair_is_half_open() {
        let pair = c("1.0,2.0");
        assert_eq!(pair.format(), "[1.0,2.0)");
        assert_eq!(c(">=1.0, <3.0").format(), "[1.0,3.0)");
    }

    #[test]
    fn test_npm_shorthands() {
        assert_eq!(c("^1.2.3").format(), "[1.2.3,2.0.0)");
        assert_eq!(c("^0.4.1").format(), "[0.4.1,0.5.0)");
        assert_eq!(c("~1.2.3").format(), "[1.2.3,1.3.0)");
        assert_eq!(c("1.20.x").format(), "[1.20,1.21)");
        assert!(c("1.20.*").satisfies("1.20.4"));
        assert!(!c("1.20.*").satisfies("1.21"));
    }

    #[test]
    fn test_satisfies_edges() {
        let r = c("[1.0.0,2.0.0)");
        assert!(r.satisfies("1.0.0"));
        assert!(r.satisfies("1.9.9"));
        assert!(!r.satisfies("2.0.0"));
        assert!(!r.satisfies("0.9"));
        // Unrecognizable candidates pass
        assert!(r.satisfies("${version}"));
        assert!(VersionConstraint::any().satisfies("anything"));
    }

    #[test]
    fn test_intersection_properties() {
        let samples = [
            c("[1.0,3.0)"),
            c(">=2.0"),
            c("(1.0,2.5]"),
            c("<2.0.0"),
            c("[1.0.0,)"),
            VersionConstraint::any(),
            c("2.0"),
        ];
        for a in &samples {
            for b in &samples {
                assert_eq!(a.intersect(b), b.intersect(a), "{} vs {}", a, b);
                for d in &samples {
                    assert_eq!(
                        a.intersect(b).intersect(d),
                        a.intersect(&b.intersect(d)),
                        "{} {} {}",
                        a,
                        b,
                        d
                    );
                }
                let both = a.intersect(b);
                assert_eq!(c(&both.format()), both);
            }
        }
    }

    #[test]
    fn test_intersection_ties() {
        let a = c("[1.0,2.0]");
        let b = c("(1.0.0,2.0)");
        let both = a.intersect(&b);
        assert_eq!(both.min, Some(VersionBound::exclusive("1.0")));
        assert_eq!(both.max, Some(VersionBound::exclusive("2.0")));
        assert!(!c("[2.0,)").intersect(&c("(,1.0]")).is_satisfiable());
        assert!(c("[1.0,1.0]").is_satisfiable());
    }

    #[test]
    fn test_serde_uses_bracket_form() {
        let constraint = c(">=1.2");
        let json = serde_json::to_string(&constraint).unwrap();
        assert_eq!(json, "\"[1.2,)\"");
        let back: VersionConstraint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, constraint);
    }
}
