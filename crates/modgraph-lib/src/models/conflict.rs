use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    MissingDependency,
    VersionConflict,
    KnownIncompatible,
    FeatureOverlap,
    EnvironmentMismatch,
    CircularDependency,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::MissingDependency => "missing_dependency",
            ConflictType::VersionConflict => "version_conflict",
            ConflictType::KnownIncompatible => "known_incompatible",
            ConflictType::FeatureOverlap => "feature_overlap",
            ConflictType::EnvironmentMismatch => "environment_mismatch",
            ConflictType::CircularDependency => "circular_dependency",
        }
    }
}

impl std::str::FromStr for ConflictType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "missing_dependency" => Ok(ConflictType::MissingDependency),
            "version_conflict" => Ok(ConflictType::VersionConflict),
            "known_incompatible" => Ok(ConflictType::KnownIncompatible),
            "feature_overlap" => Ok(ConflictType::FeatureOverlap),
            "environment_mismatch" => Ok(ConflictType::EnvironmentMismatch),
            "circular_dependency" => Ok(ConflictType::CircularDependency),
            other => Err(format!("unknown conflict type '{}'", other)),
        }
    }
}

/// Ordered most severe first, so sorting ascending puts critical problems on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Detail values are either a single string or a list of mod ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    Text(String),
    List(Vec<String>),
}

impl From<&str> for DetailValue {
    fn from(value: &str) -> Self {
        DetailValue::Text(value.to_string())
    }
}

impl From<String> for DetailValue {
    fn from(value: String) -> Self {
        DetailValue::Text(value)
    }
}

impl From<Vec<String>> for DetailValue {
    fn from(value: Vec<String>) -> Self {
        DetailValue::List(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    pub severity: Severity,
    pub description: String,
    pub affected_mods: Vec<String>,
    #[serde(default)]
    pub details: BTreeMap<String, DetailValue>,
}

impl Conflict {
    pub fn new(
        conflict_type: ConflictType,
        severity: Severity,
        description: impl Into<String>,
        affected_mods: Vec<String>,
    ) -> Self {
        Self {
            conflict_type,
            severity,
            description: description.into(),
            affected_mods,
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<DetailValue>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// A user or curator supplied statement that two mods do not work together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRule {
    /// Assigned by the store on first save.
    #[serde(default)]
    pub id: u64,
    pub mod_id_a: String,
    pub mod_id_b: String,
    pub conflict_type: ConflictType,
    pub description: String,
    pub severity: Severity,
}

impl ConflictRule {
    pub fn matches_pair(&self, a: &str, b: &str) -> bool {
        (self.mod_id_a == a && self.mod_id_b == b) || (self.mod_id_a == b && self.mod_id_b == a)
    }
}
