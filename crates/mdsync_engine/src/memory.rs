//! In-memory store for testing and embedding.

use crate::config::Credentials;
use crate::document::{Document, ID_FIELD};
use crate::error::{SyncError, SyncResult};
use crate::store::{
    DocumentRef, DocumentStore, Predicate, ScrollPage, ScrollRequest, SearchQuery, StoreConnector,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Store operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    /// `get_document`.
    GetDocument,
    /// `search`.
    Search,
    /// `scroll`.
    Scroll,
    /// `create_document`.
    Create,
    /// `update_partial_document`.
    UpdatePartial,
}

/// A recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// Point lookup.
    GetDocument {
        /// Requested id.
        id: String,
        /// Requested projection.
        fields: Vec<String>,
    },
    /// Search.
    Search {
        /// Rendered where-clause.
        predicate: String,
    },
    /// Scroll page read.
    Scroll {
        /// Rendered where-clause, if any.
        predicate: Option<String>,
        /// Token presented.
        token: Option<String>,
    },
    /// Create-or-update with explicit id.
    Create {
        /// Id written.
        id: String,
    },
    /// Partial update.
    UpdatePartial {
        /// Id addressed.
        id: String,
    },
}

impl StoreCall {
    /// Returns true for create and update calls.
    pub fn is_write(&self) -> bool {
        matches!(self, StoreCall::Create { .. } | StoreCall::UpdatePartial { .. })
    }
}

#[derive(Debug, Clone)]
struct ScrollCursor {
    predicate: Option<Predicate>,
    offset: usize,
}

/// An in-memory document store.
///
/// Records every call, honours the scroll-token invariant (a token is only
/// valid with the predicate it was issued for) and supports scripted
/// failures.
pub struct MemoryStore {
    account: String,
    records: RwLock<BTreeMap<String, BTreeMap<String, Document>>>,
    calls: RwLock<Vec<StoreCall>>,
    scripted: Mutex<HashMap<StoreOperation, VecDeque<SyncError>>>,
    failing_writes: RwLock<HashMap<String, SyncError>>,
    cursors: Mutex<HashMap<String, ScrollCursor>>,
    next_token: AtomicU64,
    write_latency: RwLock<Option<Duration>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store bound to `account`.
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            records: RwLock::new(BTreeMap::new()),
            calls: RwLock::new(Vec::new()),
            scripted: Mutex::new(HashMap::new()),
            failing_writes: RwLock::new(HashMap::new()),
            cursors: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            write_latency: RwLock::new(None),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Inserts a record directly, bypassing the call log.
    ///
    /// Records without an `id` are ignored.
    pub fn insert(&self, entity: &str, document: Document) {
        if let Some(id) = document.id() {
            self.records
                .write()
                .entry(entity.to_string())
                .or_default()
                .insert(id, document);
        }
    }

    /// Returns a stored record.
    pub fn record(&self, entity: &str, id: &str) -> Option<Document> {
        self.records.read().get(entity)?.get(id).cloned()
    }

    /// Returns every record of an entity in id order.
    pub fn records(&self, entity: &str) -> Vec<Document> {
        self.records
            .read()
            .get(entity)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns all recorded calls.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.read().clone()
    }

    /// Returns the recorded create and update calls.
    pub fn writes(&self) -> Vec<StoreCall> {
        self.calls.read().iter().filter(|c| c.is_write()).cloned().collect()
    }

    /// Clears the call log.
    pub fn clear_calls(&self) {
        self.calls.write().clear();
    }

    /// Makes the next call of `operation` fail with `error`.
    ///
    /// Scripted failures queue up and are consumed one per call.
    pub fn fail_next(&self, operation: StoreOperation, error: SyncError) {
        self.scripted
            .lock()
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Makes every write of document `id` fail with `error`.
    pub fn fail_writes_for(&self, id: impl Into<String>, error: SyncError) {
        self.failing_writes.write().insert(id.into(), error);
    }

    /// Delays every write, so concurrent uploads overlap.
    pub fn set_write_latency(&self, latency: Duration) {
        *self.write_latency.write() = Some(latency);
    }

    /// Highest number of writes observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn record_call(&self, call: StoreCall) {
        self.calls.write().push(call);
    }

    fn scripted_failure(&self, operation: StoreOperation) -> SyncResult<()> {
        match self
            .scripted
            .lock()
            .get_mut(&operation)
            .and_then(|queue| queue.pop_front())
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn write(&self, entity: &str, id: &str, document: &Document) -> SyncResult<()> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        let latency = *self.write_latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failure = self.failing_writes.read().get(id).cloned();
        let result = match failure {
            Some(error) => Err(error),
            None => {
                let mut records = self.records.write();
                let record = records
                    .entry(entity.to_string())
                    .or_default()
                    .entry(id.to_string())
                    .or_default();
                record.merge(document);
                record.insert(ID_FIELD, id);
                Ok(())
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn matching(&self, entity: &str, predicate: Option<&Predicate>) -> Vec<Document> {
        self.records
            .read()
            .get(entity)
            .map(|records| {
                records
                    .values()
                    .filter(|doc| predicate.map_or(true, |p| p.matches(doc)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn account(&self) -> &str {
        &self.account
    }

    async fn get_document(
        &self,
        entity: &str,
        id: &str,
        fields: &[String],
    ) -> SyncResult<Document> {
        self.record_call(StoreCall::GetDocument {
            id: id.to_string(),
            fields: fields.to_vec(),
        });
        self.scripted_failure(StoreOperation::GetDocument)?;

        self.record(entity, id)
            .map(|doc| doc.project(fields))
            .ok_or_else(|| SyncError::not_found(entity, id))
    }

    async fn search(&self, entity: &str, query: &SearchQuery) -> SyncResult<Vec<Document>> {
        self.record_call(StoreCall::Search {
            predicate: query.predicate.to_string(),
        });
        self.scripted_failure(StoreOperation::Search)?;

        let (start, end) = query.range();
        Ok(self
            .matching(entity, Some(&query.predicate))
            .into_iter()
            .skip(start as usize)
            .take((end - start + 1) as usize)
            .map(|doc| doc.project(&query.fields))
            .collect())
    }

    async fn scroll(&self, entity: &str, request: &ScrollRequest) -> SyncResult<ScrollPage> {
        self.record_call(StoreCall::Scroll {
            predicate: request.predicate.as_ref().map(|p| p.to_string()),
            token: request.token.clone(),
        });
        self.scripted_failure(StoreOperation::Scroll)?;

        let offset = match &request.token {
            None => 0,
            Some(token) => {
                let cursors = self.cursors.lock();
                let cursor = cursors
                    .get(token)
                    .ok_or_else(|| SyncError::remote(400, format!("unknown token {}", token)))?;
                if cursor.predicate != request.predicate {
                    return Err(SyncError::remote(
                        400,
                        "token was issued for a different filter",
                    ));
                }
                cursor.offset
            }
        };

        let matching = self.matching(entity, request.predicate.as_ref());
        let page_size = request.page_size.max(1) as usize;
        let documents: Vec<Document> = matching
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|doc| doc.project(&request.fields))
            .collect();

        let next_offset = offset + documents.len();
        let token = if next_offset < matching.len() {
            let token = format!("md-{}", self.next_token.fetch_add(1, Ordering::SeqCst));
            self.cursors.lock().insert(
                token.clone(),
                ScrollCursor {
                    predicate: request.predicate.clone(),
                    offset: next_offset,
                },
            );
            Some(token)
        } else {
            None
        };

        Ok(ScrollPage { documents, token })
    }

    async fn create_document(&self, entity: &str, document: &Document) -> SyncResult<DocumentRef> {
        let id = document
            .id()
            .ok_or_else(|| SyncError::InvalidRequest("create requires an explicit id".into()))?;
        self.record_call(StoreCall::Create { id: id.clone() });
        self.scripted_failure(StoreOperation::Create)?;

        self.write(entity, &id, document).await?;
        Ok(DocumentRef::new(id))
    }

    async fn update_partial_document(
        &self,
        entity: &str,
        id: &str,
        document: &Document,
    ) -> SyncResult<DocumentRef> {
        self.record_call(StoreCall::UpdatePartial { id: id.to_string() });
        self.scripted_failure(StoreOperation::UpdatePartial)?;

        if self.record(entity, id).is_none() {
            return Err(SyncError::not_found(entity, id));
        }
        self.write(entity, id, document).await?;
        Ok(DocumentRef::new(id))
    }
}

/// Connector handing out pre-registered [`MemoryStore`]s by account name.
///
/// Unknown accounts are reported as unreachable.
#[derive(Default)]
pub struct MemoryConnector {
    stores: RwLock<HashMap<String, Arc<MemoryStore>>>,
    connections: RwLock<Vec<String>>,
}

impl MemoryConnector {
    /// Creates an empty connector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a store for `account`, returning it.
    pub fn register(&self, account: &str) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new(account));
        self.stores
            .write()
            .insert(account.to_string(), Arc::clone(&store));
        store
    }

    /// Returns the registered store for `account`.
    pub fn store(&self, account: &str) -> Option<Arc<MemoryStore>> {
        self.stores.read().get(account).cloned()
    }

    /// Accounts connected to, in order.
    pub fn connections(&self) -> Vec<String> {
        self.connections.read().clone()
    }
}

impl StoreConnector for MemoryConnector {
    fn connect(
        &self,
        account: &str,
        _credentials: &Credentials,
    ) -> SyncResult<Arc<dyn DocumentStore>> {
        self.connections.write().push(account.to_string());
        let store = self
            .store(account)
            .ok_or_else(|| SyncError::Unreachable(format!("no store for account {}", account)))?;
        Ok(store as Arc<dyn DocumentStore>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> Document {
        Document::new().with("id", id)
    }

    #[tokio::test]
    async fn get_document_projects_and_reports_missing() {
        let store = MemoryStore::new("master");
        store.insert("CL", doc("a").with("email", "a@x.com"));

        let found = store
            .get_document("CL", "a", &["id".to_string()])
            .await
            .unwrap();
        assert_eq!(found, doc("a"));

        let missing = store.get_document("CL", "b", &[]).await;
        assert!(matches!(missing, Err(SyncError::NotFound { .. })));
    }

    #[tokio::test]
    async fn scroll_issues_tokens_until_exhausted() {
        let store = MemoryStore::new("master");
        for i in 0..5 {
            store.insert("CL", doc(&format!("doc-{}", i)));
        }

        let mut request = ScrollRequest {
            fields: vec![],
            predicate: None,
            page_size: 2,
            token: None,
        };
        let mut seen = 0;
        let mut pages = 0;
        loop {
            let page = store.scroll("CL", &request).await.unwrap();
            seen += page.documents.len();
            pages += 1;
            match page.token {
                Some(token) => request.token = Some(token),
                None => break,
            }
        }
        assert_eq!(seen, 5);
        assert_eq!(pages, 3);
    }

    #[tokio::test]
    async fn scroll_token_is_bound_to_predicate() {
        let store = MemoryStore::new("master");
        for i in 0..3 {
            store.insert("CL", doc(&format!("doc-{}", i)));
        }
        let first = store
            .scroll(
                "CL",
                &ScrollRequest {
                    fields: vec![],
                    predicate: None,
                    page_size: 1,
                    token: None,
                },
            )
            .await
            .unwrap();

        let mismatched = store
            .scroll(
                "CL",
                &ScrollRequest {
                    fields: vec![],
                    predicate: Some(Predicate::changed_since("2024-01-01")),
                    page_size: 1,
                    token: first.token,
                },
            )
            .await;
        assert_eq!(mismatched.unwrap_err().status(), Some(400));
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let store = MemoryStore::new("target");
        store.fail_next(StoreOperation::Create, SyncError::remote(503, "busy"));

        let first = store.create_document("CL", &doc("a")).await;
        assert_eq!(first.unwrap_err().status(), Some(503));

        store.create_document("CL", &doc("a")).await.unwrap();
        assert!(store.record("CL", "a").is_some());
        assert_eq!(store.writes().len(), 2);
    }

    #[tokio::test]
    async fn create_requires_id() {
        let store = MemoryStore::new("target");
        let result = store
            .create_document("CL", &Document::new().with("email", "a@x.com"))
            .await;
        assert!(matches!(result, Err(SyncError::InvalidRequest(_))));
    }

    #[test]
    fn connector_reports_unknown_accounts() {
        let connector = MemoryConnector::new();
        connector.register("store-a");
        let credentials = Credentials {
            app_key: "k".into(),
            app_token: "t".into(),
        };

        assert!(connector.connect("store-a", &credentials).is_ok());
        assert!(matches!(
            connector.connect("store-z", &credentials),
            Err(SyncError::Unreachable(_))
        ));
        assert_eq!(connector.connections(), vec!["store-a", "store-z"]);
    }
}
