use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an issue report.
///
/// Status transitions are owned by the surrounding platform; this core only
/// reads them (and writes nothing beyond the assignment decision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueStatus {
    NotVerified,
    Verified,
    Assigned,
    InProgress,
    Resolved,
}

impl IssueStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotVerified => "not-verified",
            Self::Verified => "verified",
            Self::Assigned => "assigned",
            Self::InProgress => "in-progress",
            Self::Resolved => "resolved",
        }
    }
}

/// Geographic point attached to reports and organizations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Hierarchical address. All fields optional; formatting skips empty parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
}

impl Address {
    /// Human-readable single-line rendering, most specific part first.
    #[must_use]
    pub fn to_line(&self) -> String {
        [
            self.area.as_deref(),
            self.city.as_deref(),
            self.district.as_deref(),
            self.state.as_deref(),
            self.pincode.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// A citizen-reported issue. Owned by the reports collaborator; this core
/// consumes it for indexing, scheduling and matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueReport {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub address: Address,
    /// Urgency score in [0.0, 10.0], produced by the external verifier.
    #[serde(default)]
    pub severity: f32,
    pub status: IssueStatus,
    #[serde(default)]
    pub assigned_to: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl IssueReport {
    /// Verified but not yet handed to any organization.
    #[must_use]
    pub fn is_pending_assignment(&self) -> bool {
        self.status == IssueStatus::Verified && self.assigned_to.is_empty()
    }
}

/// A responding organization. Owned by the organizations collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub address: Address,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

/// Static reference document (FAQ, platform knowledge) fed to the chatbot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDoc {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Discriminator for the heterogeneous entries sharing one vector space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Organization,
    Issue,
    Reference,
}

impl EntryType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Issue => "issue",
            Self::Reference => "reference",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "organization" => Some(Self::Organization),
            "issue" => Some(Self::Issue),
            "reference" => Some(Self::Reference),
            _ => None,
        }
    }

    /// Build the globally unique index id `<type>:<source_id>`.
    #[must_use]
    pub fn entry_id(self, source_id: &str) -> String {
        format!("{}:{source_id}", self.as_str())
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a `<type>:<source_id>` index id back into its parts.
#[must_use]
pub fn split_entry_id(id: &str) -> Option<(EntryType, &str)> {
    let (prefix, source_id) = id.split_once(':')?;
    let entry_type = EntryType::parse(prefix)?;
    if source_id.is_empty() {
        return None;
    }
    Some((entry_type, source_id))
}

/// Primitive-only metadata value. Nested structures are unrepresentable by
/// construction, which is what keeps index entries flat and queryable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl MetadataValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<f32> for MetadataValue {
    fn from(value: f32) -> Self {
        Self::Num(f64::from(value))
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

pub type Metadata = HashMap<String, MetadataValue>;

/// Metadata keys every live entry must carry.
pub const META_TYPE: &str = "type";
pub const META_SOURCE_ID: &str = "source_id";
pub const META_EMBEDDING_MODEL_ID: &str = "embedding_model_id";
/// Hash of the normalized text, used to skip re-embedding unchanged records.
pub const META_TEXT_HASH: &str = "text_hash";

/// The unit stored in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedEntry {
    /// Globally unique, `<type>:<source_id>`.
    pub id: String,
    /// Fixed dimensionality = embedder output size.
    pub vector: Vec<f32>,
    /// Normalized document text; the source of retrieval snippets.
    pub text: String,
    pub metadata: Metadata,
}

impl IndexedEntry {
    #[must_use]
    pub fn entry_type(&self) -> Option<EntryType> {
        self.metadata
            .get(META_TYPE)
            .and_then(MetadataValue::as_str)
            .and_then(EntryType::parse)
    }

    #[must_use]
    pub fn embedding_model_id(&self) -> Option<&str> {
        self.metadata
            .get(META_EMBEDDING_MODEL_ID)
            .and_then(MetadataValue::as_str)
    }

    #[must_use]
    pub fn text_hash(&self) -> Option<&str> {
        self.metadata
            .get(META_TEXT_HASH)
            .and_then(MetadataValue::as_str)
    }
}

/// Outcome of one matching invocation. Ephemeral; persistence of the
/// assignment is the collaborators' write, not ours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub issue_id: String,
    pub organization_id: String,
    pub score: f32,
    /// Zero-based position among the returned candidates.
    pub rank: usize,
}

/// One retrieval result, with enough provenance for UI rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub entry_id: String,
    pub entry_type: EntryType,
    pub source_id: String,
    pub score: f32,
    pub snippet: String,
    pub metadata: Metadata,
}
