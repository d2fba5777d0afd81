//! Idempotent upsert resolution against one target store.
//!
//! A document is matched by primary identity first, then by the secondary
//! `email` key. A match is partially updated in place; anything else is
//! created under an explicit id through a create-or-update request, so a
//! retried call can never produce a duplicate record.

use crate::document::{Document, EMAIL_FIELD, ID_FIELD};
use crate::error::SyncResult;
use crate::store::{DocumentRef, DocumentStore, Predicate, SearchQuery};
use tracing::{debug, warn};
use uuid::Uuid;

/// How a document was matched in the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A record with the document's own id exists.
    ById(String),
    /// A record with the document's email exists under `id`.
    ByEmail(String),
    /// No record matched.
    NoMatch,
}

impl Resolution {
    /// The matched record's id.
    pub fn matched_id(&self) -> Option<&str> {
        match self {
            Resolution::ById(id) | Resolution::ByEmail(id) => Some(id),
            Resolution::NoMatch => None,
        }
    }
}

/// Result of one upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new record was written.
    Created(DocumentRef),
    /// An existing record was partially updated.
    Updated(DocumentRef),
}

impl UpsertOutcome {
    /// The written record.
    pub fn reference(&self) -> &DocumentRef {
        match self {
            UpsertOutcome::Created(r) | UpsertOutcome::Updated(r) => r,
        }
    }
}

/// A document ready for upsert, with its creation id fixed up front.
///
/// Documents without an id receive a fresh UUID once, before any attempt,
/// so every retry of the same upsert writes the same record.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpsert {
    document: Document,
    creation_id: String,
}

impl PendingUpsert {
    /// Prepares a document.
    pub fn new(document: Document) -> Self {
        let creation_id = document
            .id()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            document,
            creation_id,
        }
    }

    /// The source document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Id used if the document has to be created.
    pub fn creation_id(&self) -> &str {
        &self.creation_id
    }
}

/// Resolves create-versus-update for documents of one data entity.
#[derive(Debug, Clone)]
pub struct UpsertResolver {
    entity: String,
}

impl UpsertResolver {
    /// Creates a resolver for `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
        }
    }

    /// Finds the record `document` should update, if any.
    ///
    /// A 404 on the id lookup falls through to the email search; any other
    /// lookup error propagates. Search failures are treated as no match so
    /// they never block the create path.
    pub async fn resolve(
        &self,
        target: &dyn DocumentStore,
        document: &Document,
    ) -> SyncResult<Resolution> {
        let id_only = [ID_FIELD.to_string()];

        if let Some(id) = document.id() {
            match target.get_document(&self.entity, &id, &id_only).await {
                Ok(existing) => return Ok(Resolution::ById(existing.id().unwrap_or(id))),
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }

        if let Some(email) = document.email() {
            let query = SearchQuery::new(id_only.to_vec(), Predicate::eq(EMAIL_FIELD, email), 1);
            match target.search(&self.entity, &query).await {
                Ok(hits) => {
                    if let Some(id) = hits.first().and_then(Document::id) {
                        return Ok(Resolution::ByEmail(id));
                    }
                }
                Err(err) => {
                    warn!(
                        target_account = target.account(),
                        document_id = %document.display_id(),
                        error = %err.detail(),
                        "email lookup failed; treating as no match"
                    );
                }
            }
        }

        Ok(Resolution::NoMatch)
    }

    /// Creates or partially updates `pending` in `target`.
    pub async fn upsert(
        &self,
        target: &dyn DocumentStore,
        pending: &PendingUpsert,
    ) -> SyncResult<UpsertOutcome> {
        let document = pending.document();
        let resolution = self.resolve(target, document).await?;

        match resolution.matched_id() {
            Some(matched) => {
                debug!(
                    target_account = target.account(),
                    document_id = %document.display_id(),
                    matched_id = matched,
                    "updating existing record"
                );
                // The matched record keeps its own id.
                let fields = document.without(ID_FIELD);
                target
                    .update_partial_document(&self.entity, matched, &fields)
                    .await
                    .map(UpsertOutcome::Updated)
            }
            None => {
                debug!(
                    target_account = target.account(),
                    document_id = %pending.creation_id(),
                    "creating record"
                );
                let fields = document.clone().with(ID_FIELD, pending.creation_id());
                target
                    .create_document(&self.entity, &fields)
                    .await
                    .map(UpsertOutcome::Created)
            }
        }
    }
}
