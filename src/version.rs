//! Schema version parsing and total ordering

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Pattern for qualified migration names: `V<version>__<description>`,
/// e.g. `V1_2__Add_users` or `v20130115113001__init`.
static QUALIFIED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[Vv](\d[\w.\-]*?)(?:__(.+))?$").expect("qualified name pattern is valid"));

/// A comparable schema version identifier.
///
/// Versions are parsed from arbitrary dotted or dashed strings
/// (`1.2.3`, `1_2-3`, `20130115113001`). Parsing never fails: any
/// string is accepted, and components that are not numeric fall back to
/// lexicographic comparison. The optional description plays no part in
/// comparison, equality or hashing.
///
/// # Examples
///
/// ```
/// use floodgate::SchemaVersion;
///
/// assert_eq!(SchemaVersion::new("1.0"), SchemaVersion::new("1"));
/// assert!(SchemaVersion::new("1.2.13-3") > SchemaVersion::new("1.2.3.3"));
/// assert!(SchemaVersion::new("2.0") < SchemaVersion::LATEST);
/// ```
#[derive(Debug, Clone)]
pub struct SchemaVersion {
    /// Normalized version string; `None` marks the latest sentinel.
    raw: Option<String>,
    description: Option<String>,
    key: Vec<VersionComponent>,
}

impl SchemaVersion {
    /// Sentinel ordering above every parsed version and equal only to itself.
    pub const LATEST: SchemaVersion = SchemaVersion {
        raw: None,
        description: None,
        key: Vec::new(),
    };

    /// Parse a version from a raw identifier.
    pub fn new(raw: &str) -> Self {
        let normalized = normalize(raw);
        let key = comparison_key(&normalized);
        Self {
            raw: Some(normalized),
            description: None,
            key,
        }
    }

    /// Parse a version and attach a human-readable description.
    pub fn with_description(raw: &str, description: &str) -> Self {
        let mut version = Self::new(raw);
        version.description = Some(description.to_string());
        version
    }

    /// Parse a `V<version>__<description>` identifier, the convention used
    /// for migration script and type names.
    ///
    /// Underscores in the description read as spaces. Returns `None` when
    /// the identifier does not follow the convention.
    pub fn from_qualified_name(name: &str) -> Option<Self> {
        let captures = QUALIFIED_NAME.captures(name)?;
        let raw = captures.get(1)?.as_str();
        match captures.get(2) {
            Some(description) => Some(Self::with_description(
                raw,
                &description.as_str().replace('_', " "),
            )),
            None => Some(Self::new(raw)),
        }
    }

    /// The normalized version string, or `None` for the latest sentinel.
    pub fn version(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// The attached description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether this is the latest sentinel.
    pub fn is_latest(&self) -> bool {
        self.raw.is_none()
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.raw {
            Some(version) => f.write_str(version),
            None => f.write_str("<< latest >>"),
        }
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.raw, &other.raw) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(_), Some(_)) => self.key.cmp(&other.key),
        }
    }
}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SchemaVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SchemaVersion {}

impl Hash for SchemaVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Must agree with Eq: raw strings and descriptions are ignored,
        // "1" and "1.0" hash identically.
        self.raw.is_none().hash(state);
        self.key.hash(state);
    }
}

/// Normalize a raw version string: `_` and `-` become `.`, and leading
/// zeros are stripped from all-numeric components (`"01"` becomes `"1"`).
fn normalize(raw: &str) -> String {
    let dotted = raw.replace(['_', '-'], ".");
    let components: Vec<String> = dotted.split('.').map(normalize_component).collect();
    components.join(".")
}

fn normalize_component(component: &str) -> String {
    if component.is_empty() {
        return "0".to_string();
    }
    if component.bytes().all(|b| b.is_ascii_digit()) {
        let stripped = component.trim_start_matches('0');
        if stripped.is_empty() {
            "0".to_string()
        } else {
            stripped.to_string()
        }
    } else {
        component.to_string()
    }
}

/// Comparison key of a normalized version: one entry per component,
/// trailing zero-valued numeric components trimmed so `1`, `1.0` and
/// `1.0.0` share a key.
fn comparison_key(normalized: &str) -> Vec<VersionComponent> {
    let mut key: Vec<VersionComponent> = normalized.split('.').map(VersionComponent::parse).collect();
    while key.last().is_some_and(VersionComponent::is_zero) {
        key.pop();
    }
    key
}

/// One version component, split into its leading numeric run and the
/// remaining text. `13` orders above `3` numerically, `1a` and `1b`
/// tie on the number and fall to the case-sensitive suffix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct VersionComponent {
    number: Magnitude,
    suffix: String,
}

impl VersionComponent {
    fn parse(component: &str) -> Self {
        let digits_end = component
            .bytes()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(component.len());
        let (digits, suffix) = component.split_at(digits_end);
        Self {
            number: Magnitude::from_digits(digits),
            suffix: suffix.to_string(),
        }
    }

    /// A zero-valued numeric component with no text, the kind that is
    /// implicit padding at the end of a version.
    fn is_zero(&self) -> bool {
        self.number.is_zero() && self.suffix.is_empty()
    }
}

/// Non-negative integer kept as its zero-stripped decimal digits.
/// Comparing by length and then lexicographically gives numeric order
/// without overflow on timestamp-sized versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Magnitude(String);

impl Magnitude {
    fn from_digits(digits: &str) -> Self {
        Self(digits.trim_start_matches('0').to_string())
    }

    fn is_zero(&self) -> bool {
        self.0.is_empty()
    }
}

impl Ord for Magnitude {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Magnitude {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
