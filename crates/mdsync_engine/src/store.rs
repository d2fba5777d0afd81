//! Store capability abstraction.
//!
//! The engine talks to the master store and to every sub-account through
//! the same [`DocumentStore`] trait, allowing different implementations
//! (HTTP, in-memory for testing, etc.).

use crate::config::Credentials;
use crate::document::Document;
use crate::error::SyncResult;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A document store reachable through master-data style operations.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Account this store is bound to, used in log lines.
    fn account(&self) -> &str;

    /// Fetches one document by id, restricted to `fields`.
    ///
    /// A missing document yields [`crate::SyncError::NotFound`].
    async fn get_document(&self, entity: &str, id: &str, fields: &[String])
        -> SyncResult<Document>;

    /// Runs a paged search.
    async fn search(&self, entity: &str, query: &SearchQuery) -> SyncResult<Vec<Document>>;

    /// Reads one scroll page.
    async fn scroll(&self, entity: &str, request: &ScrollRequest) -> SyncResult<ScrollPage>;

    /// Creates a document under the id it carries.
    ///
    /// Implementations must use a create-or-update request so that a
    /// retried call never produces a second record.
    async fn create_document(&self, entity: &str, document: &Document) -> SyncResult<DocumentRef>;

    /// Partially updates the document addressed by `id`.
    async fn update_partial_document(
        &self,
        entity: &str,
        id: &str,
        document: &Document,
    ) -> SyncResult<DocumentRef>;
}

/// Builds target-scoped store clients.
pub trait StoreConnector: Send + Sync {
    /// Returns a client bound to `account` and authenticated with the shared
    /// application credentials.
    fn connect(&self, account: &str, credentials: &Credentials)
        -> SyncResult<Arc<dyn DocumentStore>>;
}

/// Reference to a persisted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// Id of the written record.
    pub id: String,
}

impl DocumentRef {
    /// Creates a new reference.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Filter predicate in the store's where-clause syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `field=value`.
    Eq {
        /// Field name.
        field: String,
        /// Expected value.
        value: String,
    },
    /// Records created or updated after the given date.
    ChangedSince(String),
}

impl Predicate {
    /// Equality predicate.
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Created-or-updated-after predicate.
    pub fn changed_since(date: impl Into<String>) -> Self {
        Self::ChangedSince(date.into())
    }

    /// Evaluates the predicate against a document.
    ///
    /// Dates are compared lexicographically, which is correct for ISO-8601.
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Predicate::Eq { field, value } => document.text(field).as_deref() == Some(value),
            Predicate::ChangedSince(date) => ["createdIn", "updatedIn"]
                .iter()
                .filter_map(|field| document.text(field))
                .any(|stamp| stamp.as_str() > date.as_str()),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Eq { field, value } => write!(f, "{}={}", field, value),
            Predicate::ChangedSince(date) => {
                write!(f, "(createdIn > {}) OR (updatedIn > {})", date, date)
            }
        }
    }
}

/// A paged search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Fields to return.
    pub fields: Vec<String>,
    /// Filter.
    pub predicate: Predicate,
    /// Page number, starting at 1.
    pub page: u32,
    /// Documents per page.
    pub page_size: u32,
}

impl SearchQuery {
    /// Creates a first-page query.
    pub fn new(fields: Vec<String>, predicate: Predicate, page_size: u32) -> Self {
        Self {
            fields,
            predicate,
            page: 1,
            page_size,
        }
    }

    /// Inclusive offset range covered by this page.
    pub fn range(&self) -> (u64, u64) {
        let size = u64::from(self.page_size.max(1));
        let start = u64::from(self.page.max(1) - 1) * size;
        (start, start + size - 1)
    }
}

/// A scroll page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollRequest {
    /// Fields to return.
    pub fields: Vec<String>,
    /// Optional filter; `None` selects every record.
    pub predicate: Option<Predicate>,
    /// Documents per page.
    pub page_size: u32,
    /// Continuation token from the previous page.
    pub token: Option<String>,
}

/// One page of a scroll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrollPage {
    /// Documents on this page.
    pub documents: Vec<Document>,
    /// Token for the next page; `None` marks the final page.
    ///
    /// A page with no documents is final whatever its token says.
    pub token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_rendering() {
        assert_eq!(Predicate::eq("email", "a@x.com").to_string(), "email=a@x.com");
        assert_eq!(
            Predicate::changed_since("2024-01-01").to_string(),
            "(createdIn > 2024-01-01) OR (updatedIn > 2024-01-01)"
        );
    }

    #[test]
    fn predicate_matching() {
        let doc = Document::new()
            .with("email", "a@x.com")
            .with("createdIn", "2023-06-01T00:00:00Z")
            .with("updatedIn", "2024-02-01T00:00:00Z");

        assert!(Predicate::eq("email", "a@x.com").matches(&doc));
        assert!(!Predicate::eq("email", "b@x.com").matches(&doc));
        assert!(Predicate::changed_since("2024-01-01").matches(&doc));
        assert!(!Predicate::changed_since("2024-03-01").matches(&doc));
        assert!(!Predicate::changed_since("2024-01-01").matches(&Document::new()));
    }

    #[test]
    fn search_range() {
        let query = SearchQuery::new(vec!["id".into()], Predicate::eq("email", "a"), 1);
        assert_eq!(query.range(), (0, 0));

        let query = SearchQuery {
            page: 3,
            page_size: 10,
            ..query
        };
        assert_eq!(query.range(), (20, 29));
    }
}
