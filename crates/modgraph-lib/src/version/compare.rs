use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9][A-Za-z0-9._+\-]*$").expect("version pattern is valid")
});

/// A mod version as found in manifests, ordered the way loaders order them.
/// Equality follows the ordering, so `1.20` equals `1.20.0`.
#[derive(Debug, Clone)]
pub struct Version(String);

impl Version {
    /// Accepts `1.20.1`, `v2.0`, `0.5.3+mc1.20.1`, `1.0.0-beta.2`.
    /// Rejects anything that does not start with a digit once a leading `v` is removed.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        if VERSION_PATTERN.is_match(trimmed) {
            Some(Version(trimmed.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn split_parts(s: &str) -> Vec<Part> {
        let mut parts = Vec::new();
        for segment in s.split(['.', '-', '_']) {
            if segment.is_empty() {
                continue;
            }
            let mut current = String::new();
            let mut current_numeric = false;
            for c in segment.chars() {
                let is_digit = c.is_ascii_digit();
                if !current.is_empty() && is_digit != current_numeric {
                    parts.push(Part::from_run(&current, current_numeric));
                    current.clear();
                }
                current_numeric = is_digit;
                current.push(c);
            }
            if !current.is_empty() {
                parts.push(Part::from_run(&current, current_numeric));
            }
        }
        parts
    }

    /// Splits off the pre-release tag, ignoring build metadata after `+`.
    fn base_and_tag(&self) -> (&str, Option<&str>) {
        let core = self.0.split_once('+').map(|(c, _)| c).unwrap_or(&self.0);
        match core.split_once('-') {
            Some((base, tag)) => (base, Some(tag)),
            None => (core, None),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Part {
    Numeric(u64),
    String(String),
}

impl Part {
    fn from_run(run: &str, numeric: bool) -> Self {
        if numeric {
            Part::Numeric(run.parse().unwrap_or(u64::MAX))
        } else {
            Part::String(run.to_ascii_lowercase())
        }
    }

    fn is_zero(&self) -> bool {
        matches!(self, Part::Numeric(0))
    }
}

fn compare_padded(a: &[Part], b: &[Part]) -> Ordering {
    for (ap, bp) in a.iter().zip(b.iter()) {
        match ap.cmp(bp) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }
    // 1.20 == 1.20.0; 1.20 < 1.20.1
    let (longer, flip) = if a.len() >= b.len() {
        (&a[b.len()..], false)
    } else {
        (&b[a.len()..], true)
    };
    let ord = if longer.iter().all(Part::is_zero) {
        Ordering::Equal
    } else {
        Ordering::Greater
    };
    if flip {
        ord.reverse()
    } else {
        ord
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a_base, a_tag) = self.base_and_tag();
        let (b_base, b_tag) = other.base_and_tag();

        match compare_padded(&Self::split_parts(a_base), &Self::split_parts(b_base)) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // Base versions are equal, compare tags
        match (a_tag, b_tag) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less, // version-tag < version
            (None, Some(_)) => Ordering::Greater,
            (Some(at), Some(bt)) => {
                let at_parts = Self::split_parts(at);
                let bt_parts = Self::split_parts(bt);
                for (ap, bp) in at_parts.iter().zip(bt_parts.iter()) {
                    match ap.cmp(bp) {
                        Ordering::Equal => continue,
                        ord => return ord,
                    }
                }
                at_parts.len().cmp(&bt_parts.len())
            }
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compares two version strings. Unparseable input sorts before any valid version
/// and falls back to plain string order against other unparseable input.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (Version::parse(a), Version::parse(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_sorting() {
        assert_eq!(compare_versions("1.0.0", "1.0.1"), Ordering::Less);
        assert_eq!(compare_versions("1.0.1", "1.0.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.0", "1.0.0"), Ordering::Equal);

        assert_eq!(compare_versions("1.0.0-beta.1", "1.0.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0.0-beta.1", "1.0.0-beta.2"), Ordering::Less);
        assert_eq!(compare_versions("1.0.0-alpha.1", "1.0.0-beta.1"), Ordering::Less);

        assert_eq!(compare_versions("0.14.22", "0.14.21"), Ordering::Greater);
        assert_eq!(compare_versions("47.2.0", "47.1.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.20.0", "1.20.1"), Ordering::Less);
        assert_eq!(compare_versions("1.10.0", "1.9.9"), Ordering::Greater);
    }

    #[test]
    fn test_trailing_zeros_are_equal() {
        assert_eq!(compare_versions("1.20", "1.20.0"), Ordering::Equal);
        assert_eq!(compare_versions("2", "2.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.20", "1.20.1"), Ordering::Less);
    }

    #[test]
    fn test_equality_agrees_with_ordering() {
        let short = Version::parse("1.20").unwrap();
        let long = Version::parse("1.20.0").unwrap();
        assert_eq!(short, long);
        assert_eq!(short.cmp(&long), Ordering::Equal);
        assert_ne!(short, Version::parse("1.20.1").unwrap());
        assert_ne!(long, Version::parse("1.20.0-rc.1").unwrap());
    }

    #[test]
    fn test_build_metadata_is_ignored() {
        assert_eq!(compare_versions("0.5.3+mc1.20.1", "0.5.3"), Ordering::Equal);
        assert_eq!(compare_versions("0.5.3+build.7", "0.5.4+build.1"), Ordering::Less);
    }

    #[test]
    fn test_parse_rules() {
        assert_eq!(Version::parse("v2.1.0").map(|v| v.to_string()), Some("2.1.0".into()));
        assert!(Version::parse("${file.jarVersion}").is_none());
        assert!(Version::parse("unknown").is_none());
        assert!(Version::parse("").is_none());
        assert!(Version::parse("1.0 beta").is_none());
    }
}
