//! Change listing queries
//!
//! The server's listing endpoint takes repeated `q` parameters (one result
//! list per query, i.e. OR across groups), repeated `o` parameters (optional
//! sub-objects to include), `n` (limit) and `S` (skip).

use serde::{Deserialize, Serialize};
use std::fmt;

use super::request::QueryParams;

/// Optional sub-objects the server can include in a change (`o=` values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeField {
    /// Summary label votes
    Labels,
    /// Per-account label votes and permitted values
    DetailedLabels,
    /// Full account objects instead of bare ids
    DetailedAccounts,
    /// The current revision
    CurrentRevision,
    /// Commit info of the current revision
    CurrentCommit,
    /// Modified files of the current revision
    CurrentFiles,
    /// Every revision instead of only the current one
    AllRevisions,
    /// Change messages
    Messages,
    /// Whether the change is submittable
    Submittable,
}

impl ChangeField {
    /// Value sent as `o=`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeField::Labels => "LABELS",
            ChangeField::DetailedLabels => "DETAILED_LABELS",
            ChangeField::DetailedAccounts => "DETAILED_ACCOUNTS",
            ChangeField::CurrentRevision => "CURRENT_REVISION",
            ChangeField::CurrentCommit => "CURRENT_COMMIT",
            ChangeField::CurrentFiles => "CURRENT_FILES",
            ChangeField::AllRevisions => "ALL_REVISIONS",
            ChangeField::Messages => "MESSAGES",
            ChangeField::Submittable => "SUBMITTABLE",
        }
    }
}

impl fmt::Display for ChangeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort and dedup an annotation list; the server treats it as a set.
pub fn normalize_fields(fields: &[ChangeField]) -> Vec<ChangeField> {
    let mut fields = fields.to_vec();
    fields.sort_unstable();
    fields.dedup();
    fields
}

/// Pagination. `None` leaves the server default in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offset {
    /// Maximum number of results (`n`)
    pub count: Option<u32>,
    /// Number of results to skip (`S`)
    pub offset: Option<u32>,
}

impl Offset {
    /// Limit and skip together.
    pub fn new(count: u32, offset: u32) -> Self {
        Self {
            count: Some(count),
            offset: Some(offset),
        }
    }
}

/// Build the parameters of a change listing.
///
/// - one `q` per filter group, terms joined by a space
/// - one `o` per distinct annotation
/// - `n` and `S` only when present
pub fn build_change_list_query(
    filter_groups: &[Vec<String>],
    offset: Option<Offset>,
    fields: &[ChangeField],
) -> QueryParams {
    let mut params = QueryParams::new();
    for group in filter_groups {
        params.push("q", group.join(" "));
    }
    for field in normalize_fields(fields) {
        params.push("o", field.as_str());
    }
    if let Some(offset) = offset {
        if let Some(count) = offset.count {
            params.push("n", count.to_string());
        }
        if let Some(skip) = offset.offset {
            params.push("S", skip.to_string());
        }
    }
    params
}

/// Fluent description of a change listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeQuery {
    /// Filter groups; terms within a group are ANDed, groups are ORed
    pub filters: Vec<Vec<String>>,
    /// Pagination
    pub offset: Option<Offset>,
    /// Annotations
    pub fields: Vec<ChangeField>,
}

impl ChangeQuery {
    /// Empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter group (conjunction of `terms`).
    pub fn group<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.push(terms.into_iter().map(Into::into).collect());
        self
    }

    /// Request an annotation.
    pub fn field(mut self, field: ChangeField) -> Self {
        self.fields.push(field);
        self
    }

    /// Request several annotations.
    pub fn fields(mut self, fields: &[ChangeField]) -> Self {
        self.fields.extend_from_slice(fields);
        self
    }

    /// Limit the number of results.
    pub fn limit(mut self, count: u32) -> Self {
        self.offset.get_or_insert_with(Offset::default).count = Some(count);
        self
    }

    /// Skip results.
    pub fn skip(mut self, skip: u32) -> Self {
        self.offset.get_or_insert_with(Offset::default).offset = Some(skip);
        self
    }

    /// Encoded parameters.
    pub fn params(&self) -> QueryParams {
        build_change_list_query(&self.filters, self.offset, &self.fields)
    }
}
