//! Document normalization: heterogeneous source records to canonical
//! `(id, text, metadata)` triples ready for embedding.
//!
//! Field order is fixed per record type so the same record always produces
//! the same text; the sha256 hash of that text is stored alongside the entry
//! and lets the write path skip re-embedding unchanged records.

use sha2::Digest;
use sha2::Sha256;

use crate::errors::CivicRagError;
use crate::errors::Result;
use crate::models::Address;
use crate::models::EntryType;
use crate::models::IssueReport;
use crate::models::Metadata;
use crate::models::Organization;
use crate::models::ReferenceDoc;
use crate::models::META_SOURCE_ID;
use crate::models::META_TEXT_HASH;
use crate::models::META_TYPE;

/// A source record reduced to the canonical embedding input.
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    /// Full index id, `<type>:<source_id>`.
    pub id: String,
    pub entry_type: EntryType,
    pub source_id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// Hex-encoded sha256 of the normalized text.
#[must_use]
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

fn join_parts(parts: Vec<Option<String>>) -> String {
    parts
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" | ")
}

/// `"Label: value"`, or nothing when the value is blank.
fn labeled(label: &str, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(format!("{label}: {value}"))
    }
}

fn categories_line(categories: &[String]) -> String {
    categories
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn base_metadata(entry_type: EntryType, source_id: &str, text: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(META_TYPE.to_string(), entry_type.as_str().into());
    metadata.insert(META_SOURCE_ID.to_string(), source_id.into());
    metadata.insert(META_TEXT_HASH.to_string(), text_hash(text).into());
    metadata
}

fn require_descriptive(id: &str, description: &str, categories: &[String]) -> Result<()> {
    if id.trim().is_empty() {
        return Err(CivicRagError::InvalidRecord(
            "record id must not be empty".to_string(),
        ));
    }
    if description.trim().is_empty() && categories_line(categories).is_empty() {
        return Err(CivicRagError::InvalidRecord(format!(
            "record {id} has no descriptive fields (description and categories are both empty)"
        )));
    }
    Ok(())
}

/// Normalize an organization profile.
///
/// Text field order: name, description, categories, address.
pub fn normalize_organization(org: &Organization) -> Result<NormalizedDocument> {
    require_descriptive(&org.id, &org.description, &org.categories)?;

    let text = join_parts(vec![
        labeled("Organization", &org.name),
        labeled("Description", &org.description),
        labeled("Categories", &categories_line(&org.categories)),
        labeled("Address", &org.address.to_line()),
    ]);

    let mut metadata = base_metadata(EntryType::Organization, &org.id, &text);
    metadata.insert("name".to_string(), org.name.as_str().into());
    metadata.insert(
        "categories".to_string(),
        categories_line(&org.categories).into(),
    );
    insert_address(&mut metadata, &org.address);

    Ok(NormalizedDocument {
        id: EntryType::Organization.entry_id(&org.id),
        entry_type: EntryType::Organization,
        source_id: org.id.clone(),
        text,
        metadata,
    })
}

/// Normalize an issue report.
///
/// Text field order: description, categories, location. Severity is
/// deliberately left out of the text; it gates the acceptance threshold in
/// the matcher and must not move entries around in the vector space.
pub fn normalize_report(report: &IssueReport) -> Result<NormalizedDocument> {
    require_descriptive(&report.id, &report.description, &report.categories)?;

    let text = issue_text(&report.description, &report.categories, &report.address);

    let mut metadata = base_metadata(EntryType::Issue, &report.id, &text);
    metadata.insert("status".to_string(), report.status.as_str().into());
    metadata.insert(
        "severity".to_string(),
        crate::clamp_severity(report.severity).into(),
    );
    metadata.insert(
        "categories".to_string(),
        categories_line(&report.categories).into(),
    );
    insert_address(&mut metadata, &report.address);

    Ok(NormalizedDocument {
        id: EntryType::Issue.entry_id(&report.id),
        entry_type: EntryType::Issue,
        source_id: report.id.clone(),
        text,
        metadata,
    })
}

/// Normalize a static reference document.
///
/// Text field order: title, body, tags.
pub fn normalize_reference(doc: &ReferenceDoc) -> Result<NormalizedDocument> {
    if doc.id.trim().is_empty() {
        return Err(CivicRagError::InvalidRecord(
            "record id must not be empty".to_string(),
        ));
    }
    if doc.title.trim().is_empty() && doc.body.trim().is_empty() {
        return Err(CivicRagError::InvalidRecord(format!(
            "reference {} has neither title nor body",
            doc.id
        )));
    }

    let body = doc.body.trim();
    let text = join_parts(vec![
        labeled("Reference", &doc.title),
        (!body.is_empty()).then(|| body.to_string()),
        labeled("Tags", &categories_line(&doc.tags)),
    ]);

    let mut metadata = base_metadata(EntryType::Reference, &doc.id, &text);
    metadata.insert("title".to_string(), doc.title.as_str().into());

    Ok(NormalizedDocument {
        id: EntryType::Reference.entry_id(&doc.id),
        entry_type: EntryType::Reference,
        source_id: doc.id.clone(),
        text,
        metadata,
    })
}

/// Query text for matching an issue against organization entries. Shares the
/// issue text shape so queries and documents live in the same vector space.
#[must_use]
pub fn issue_query_text(description: &str, categories: &[String], address: &Address) -> String {
    issue_text(description, categories, address)
}

fn issue_text(description: &str, categories: &[String], address: &Address) -> String {
    join_parts(vec![
        labeled("Issue", description),
        labeled("Categories", &categories_line(categories)),
        labeled("Location", &address.to_line()),
    ])
}

fn insert_address(metadata: &mut Metadata, address: &Address) {
    if let Some(city) = address.city.as_deref().filter(|c| !c.trim().is_empty()) {
        metadata.insert("city".to_string(), city.into());
    }
    if let Some(state) = address.state.as_deref().filter(|s| !s.trim().is_empty()) {
        metadata.insert("state".to_string(), state.into());
    }
    if let Some(pincode) = address.pincode.as_deref().filter(|p| !p.trim().is_empty()) {
        metadata.insert("pincode".to_string(), pincode.into());
    }
}
