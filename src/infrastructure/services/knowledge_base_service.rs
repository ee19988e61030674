//! Knowledge Base service - fan-out search and ingestion across providers

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::domain::embedding::EmbeddingProvider;
use crate::domain::knowledge_base::{
    AddDocumentOutcome, ChunkPage, ChunkUpdate, Document, DocumentChunk, DocumentPayload,
    DocumentStore, KnowledgeBaseProvider, ProviderSource, QueryInput, SearchResult,
};
use crate::domain::DomainError;
use crate::infrastructure::knowledge_base::ProviderRegistry;

/// Document id used by Flowise to address every loader in a store
pub const ALL_DOCUMENTS: &str = "all";

/// Tunables applied to every search and provider call
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub match_threshold: f32,
    pub match_count: u32,
    pub provider_timeout: Duration,
    /// Targets used when a caller names none; empty means every configured provider
    pub default_targets: Vec<ProviderSource>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            match_threshold: 0.78,
            match_count: 5,
            provider_timeout: Duration::from_secs(5),
            default_targets: Vec::new(),
        }
    }
}

impl SearchSettings {
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_default_targets(mut self, targets: Vec<ProviderSource>) -> Self {
        self.default_targets = targets;
        self
    }
}

type StorePair = (Arc<dyn KnowledgeBaseProvider>, DocumentStore);

enum PlannedUpsert {
    Ready {
        provider: Arc<dyn KnowledgeBaseProvider>,
        store_id: String,
    },
    Failed(AddDocumentOutcome),
}

/// Aggregates search, ingestion and store management over every configured backend
pub struct KnowledgeBaseService {
    registry: ProviderRegistry,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    settings: SearchSettings,
}

impl std::fmt::Debug for KnowledgeBaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBaseService")
            .field("providers", &self.registry.sources())
            .field("has_embedder", &self.embedder.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

impl KnowledgeBaseService {
    pub fn new(registry: ProviderRegistry, settings: SearchSettings) -> Self {
        Self {
            registry,
            embedder: None,
            settings,
        }
    }

    /// Embedding provider used by Supabase and Pinecone
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Configured backends in fan-out order
    pub fn configured_providers(&self) -> Vec<ProviderSource> {
        self.registry.sources()
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Requested targets, deduplicated and in [`ProviderSource`] order
    fn resolve_targets(&self, targets: Option<&[ProviderSource]>) -> Vec<ProviderSource> {
        let requested: BTreeSet<ProviderSource> = match targets {
            Some(targets) => targets.iter().copied().collect(),
            None if self.settings.default_targets.is_empty() => {
                self.registry.sources().into_iter().collect()
            }
            None => self.settings.default_targets.iter().copied().collect(),
        };

        requested.into_iter().collect()
    }

    /// Configured providers among the targets; unconfigured ones are logged and skipped
    fn target_providers(&self, targets: &[ProviderSource]) -> Vec<Arc<dyn KnowledgeBaseProvider>> {
        targets
            .iter()
            .filter_map(|source| {
                let provider = self.registry.get(*source);
                if provider.is_none() {
                    warn!(provider = %source, "Skipping unconfigured knowledge base provider");
                }
                provider
            })
            .collect()
    }

    async fn timed<T, F>(&self, source: ProviderSource, future: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        match timeout(self.settings.provider_timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::provider(
                source.as_str(),
                format!(
                    "Request timed out after {}ms",
                    self.settings.provider_timeout.as_millis()
                ),
            )),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| DomainError::configuration("No embedding provider configured"))?;

        match timeout(self.settings.provider_timeout, embedder.embed_text(text)).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::provider(
                embedder.provider_name(),
                "Embedding request timed out",
            )),
        }
    }

    /// Stores of every provider, listed concurrently; failed listings are logged and skipped
    async fn list_all_stores(
        &self,
        providers: &[Arc<dyn KnowledgeBaseProvider>],
    ) -> Vec<StorePair> {
        let listings = join_all(providers.iter().map(|provider| async move {
            let result = self.timed(provider.source(), provider.list_stores()).await;
            (provider.clone(), result)
        }))
        .await;

        let mut pairs = Vec::new();
        for (provider, result) in listings {
            match result {
                Ok(stores) => pairs.extend(stores.into_iter().map(|s| (provider.clone(), s))),
                Err(e) => {
                    warn!(
                        provider = %provider.source(),
                        error = %e,
                        "Failed to list document stores"
                    )
                }
            }
        }
        pairs
    }

    /// First provider, in target order, that reports the store
    async fn locate_store(
        &self,
        providers: &[Arc<dyn KnowledgeBaseProvider>],
        store_id: &str,
    ) -> Option<StorePair> {
        for provider in providers {
            match self.timed(provider.source(), provider.get_store(store_id)).await {
                Ok(store) => return Some((provider.clone(), store)),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(
                        provider = %provider.source(),
                        store_id,
                        error = %e,
                        "Failed to look up document store"
                    )
                }
            }
        }
        None
    }

    async fn query_store(
        &self,
        provider: &Arc<dyn KnowledgeBaseProvider>,
        store: &DocumentStore,
        input: &QueryInput,
    ) -> Vec<SearchResult> {
        let source = provider.source();
        let raw = match self.timed(source, provider.query(&store.id, input)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    provider = %source,
                    store_id = %store.id,
                    error = %e,
                    "Knowledge base query failed"
                );
                return Vec::new();
            }
        };

        raw.into_iter()
            .filter_map(|m| match provider.normalize(store, m) {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!(
                        provider = %source,
                        store_id = %store.id,
                        error = %e,
                        "Dropping malformed match"
                    );
                    None
                }
            })
            .collect()
    }

    /// Search every selected store and merge the results by similarity
    ///
    /// Failures of individual stores are logged and contribute no results, so
    /// this only fails on invalid input.
    pub async fn search(
        &self,
        query: &str,
        targets: Option<&[ProviderSource]>,
        store_id: Option<&str>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        if query.trim().is_empty() {
            return Err(DomainError::validation("query is required"));
        }

        let targets = self.resolve_targets(targets);
        let providers = self.target_providers(&targets);
        debug!(?targets, store_id, "Searching knowledge bases");

        let mut pairs = match store_id {
            Some(id) => self.locate_store(&providers, id).await.into_iter().collect(),
            None => self.list_all_stores(&providers).await,
        };

        let mut input = QueryInput::new(query)
            .with_top_k(self.settings.match_count)
            .with_match_threshold(self.settings.match_threshold);

        if pairs.iter().any(|(provider, _)| provider.requires_embedding()) {
            match self.embed(query).await {
                Ok(vector) => input = input.with_vector(vector),
                Err(e) => {
                    warn!(error = %e, "Query embedding failed, skipping vector stores");
                    pairs.retain(|(provider, _)| !provider.requires_embedding());
                }
            }
        }

        let input = &input;
        let per_store = join_all(
            pairs
                .iter()
                .map(|(provider, store)| self.query_store(provider, store, input)),
        )
        .await;

        let mut results: Vec<SearchResult> = per_store.into_iter().flatten().collect();
        sort_by_similarity(&mut results);

        debug!(results = results.len(), stores = pairs.len(), "Search completed");
        Ok(results)
    }

    /// Upsert into the one provider that owns the store
    async fn plan_owned_upsert(&self, store_id: &str) -> Result<PlannedUpsert, DomainError> {
        let (provider, store) = self.owner_of(store_id).await?;
        Ok(PlannedUpsert::Ready {
            provider,
            store_id: store.id,
        })
    }

    /// Owner of a store among the default targets
    async fn owner_of(&self, store_id: &str) -> Result<StorePair, DomainError> {
        let targets = self.resolve_targets(None);
        let providers = self.target_providers(&targets);

        self.locate_store(&providers, store_id)
            .await
            .ok_or_else(|| {
                DomainError::not_found(format!("Document store '{}' not found", store_id))
            })
    }

    async fn plan_upserts(
        &self,
        targets: &[ProviderSource],
        store_id: Option<&str>,
    ) -> Vec<PlannedUpsert> {
        let mut planned = Vec::new();

        let mut providers = Vec::new();
        for source in targets {
            match self.registry.get_required(*source) {
                Ok(provider) => providers.push(provider),
                Err(e) => planned.push(PlannedUpsert::Failed(AddDocumentOutcome::error(
                    *source,
                    store_id.map(String::from),
                    e,
                ))),
            }
        }

        if let Some(id) = store_id {
            planned.extend(providers.into_iter().map(|provider| PlannedUpsert::Ready {
                provider,
                store_id: id.to_string(),
            }));
            return planned;
        }

        let listings = join_all(providers.iter().map(|provider| async move {
            let result = self.timed(provider.source(), provider.list_stores()).await;
            (provider.clone(), result)
        }))
        .await;

        for (provider, result) in listings {
            match result {
                Ok(stores) => planned.extend(stores.into_iter().map(|store| PlannedUpsert::Ready {
                    provider: provider.clone(),
                    store_id: store.id,
                })),
                Err(e) => {
                    warn!(
                        provider = %provider.source(),
                        error = %e,
                        "Failed to list document stores"
                    );
                    planned.push(PlannedUpsert::Failed(AddDocumentOutcome::error(
                        provider.source(),
                        None,
                        e,
                    )));
                }
            }
        }

        planned
    }

    /// Add a document to every targeted store, one outcome per store
    ///
    /// A `store_id` without explicit targets goes to the one provider that owns it.
    ///
    /// Upserts run concurrently and are not rolled back when a sibling fails.
    pub async fn add_document(
        &self,
        document: Document,
        targets: Option<&[ProviderSource]>,
        store_id: Option<&str>,
    ) -> Result<Vec<AddDocumentOutcome>, DomainError> {
        if document.content.trim().is_empty() {
            return Err(DomainError::validation("content is required"));
        }

        let mut planned = match (targets, store_id) {
            (None, Some(id)) => vec![self.plan_owned_upsert(id).await?],
            _ => {
                let targets = self.resolve_targets(targets);
                self.plan_upserts(&targets, store_id).await
            }
        };

        let mut payload = DocumentPayload::new(document);
        let needs_embedding = planned.iter().any(|p| match p {
            PlannedUpsert::Ready { provider, .. } => provider.requires_embedding(),
            PlannedUpsert::Failed(_) => false,
        });

        if needs_embedding {
            match self.embed(&payload.document.content).await {
                Ok(vector) => payload = payload.with_embedding(vector),
                Err(e) => {
                    warn!(error = %e, "Document embedding failed");
                    planned = planned
                        .into_iter()
                        .map(|p| match p {
                            PlannedUpsert::Ready { provider, store_id }
                                if provider.requires_embedding() =>
                            {
                                PlannedUpsert::Failed(AddDocumentOutcome::error(
                                    provider.source(),
                                    Some(store_id),
                                    &e,
                                ))
                            }
                            other => other,
                        })
                        .collect();
                }
            }
        }

        let payload = &payload;
        let outcomes = join_all(planned.into_iter().map(|p| async move {
            match p {
                PlannedUpsert::Failed(outcome) => outcome,
                PlannedUpsert::Ready { provider, store_id } => {
                    let source = provider.source();
                    match self.timed(source, provider.upsert(&store_id, payload)).await {
                        Ok(result) => {
                            debug!(
                                provider = %source,
                                store_id = %store_id,
                                ids = ?result.ids,
                                "Document upserted"
                            );
                            AddDocumentOutcome::success(source, store_id)
                        }
                        Err(e) => {
                            warn!(
                                provider = %source,
                                store_id = %store_id,
                                error = %e,
                                "Document upsert failed"
                            );
                            AddDocumentOutcome::error(source, Some(store_id), e)
                        }
                    }
                }
            }
        }))
        .await;

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(targets = outcomes.len(), succeeded, "Document added");
        Ok(outcomes)
    }

    /// Delete a document from exactly one provider
    ///
    /// An empty target set deletes nothing and returns `false`. Without explicit
    /// targets the provider that owns `store_id` is used.
    pub async fn delete_document(
        &self,
        document_id: &str,
        targets: Option<&[ProviderSource]>,
        store_id: Option<&str>,
    ) -> Result<bool, DomainError> {
        if document_id.trim().is_empty() {
            return Err(DomainError::validation("documentId is required"));
        }

        let explicit = targets.is_some();
        let targets = self.resolve_targets(targets);
        let (provider, store_id) = match (targets.as_slice(), store_id) {
            ([], _) => return Ok(false),
            ([source], _) => {
                let provider = self.registry.get_required(*source)?;
                let store_id = match store_id {
                    Some(id) => id.to_string(),
                    None => provider.default_store_id().ok_or_else(|| {
                        DomainError::validation(format!(
                            "storeId is required to delete from {}",
                            source
                        ))
                    })?,
                };
                (provider, store_id)
            }
            (_, Some(id)) if !explicit => {
                let (provider, store) = self.owner_of(id).await?;
                (provider, store.id)
            }
            _ => {
                return Err(DomainError::unsupported(
                    "Deleting from more than one provider at once is not supported",
                ))
            }
        };
        let source = provider.source();

        let deleted = self
            .timed(source, provider.delete_by_id(&store_id, document_id))
            .await?;

        info!(provider = %source, store_id = %store_id, document_id, "Document deleted");
        Ok(deleted)
    }

    /// List document stores of one provider, or of every default target
    pub async fn list_stores(
        &self,
        target: Option<ProviderSource>,
    ) -> Result<Vec<DocumentStore>, DomainError> {
        if let Some(source) = target {
            let provider = self.registry.get_required(source)?;
            return self.timed(source, provider.list_stores()).await;
        }

        let targets = self.resolve_targets(None);
        let providers = self.target_providers(&targets);

        let listings = join_all(
            providers
                .iter()
                .map(|provider| self.timed(provider.source(), provider.list_stores())),
        )
        .await;

        let mut stores = Vec::new();
        let mut first_error = None;
        let mut succeeded = 0;
        for (provider, result) in providers.iter().zip(listings) {
            match result {
                Ok(found) => {
                    succeeded += 1;
                    stores.extend(found);
                }
                Err(e) => {
                    warn!(
                        provider = %provider.source(),
                        error = %e,
                        "Failed to list document stores"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(stores),
        }
    }

    /// Fetch one store from the given provider, or from the first one that has it
    pub async fn get_store(
        &self,
        store_id: &str,
        target: Option<ProviderSource>,
    ) -> Result<DocumentStore, DomainError> {
        if store_id.trim().is_empty() {
            return Err(DomainError::validation("storeId is required"));
        }

        if let Some(source) = target {
            let provider = self.registry.get_required(source)?;
            return self.timed(source, provider.get_store(store_id)).await;
        }

        self.owner_of(store_id).await.map(|(_, store)| store)
    }

    /// Paged chunks of a document, or of every document in the store
    pub async fn document_chunks(
        &self,
        store_id: &str,
        document_id: Option<&str>,
        page: Option<u32>,
    ) -> Result<ChunkPage, DomainError> {
        let chunks = self.registry.chunk_store()?;
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(DomainError::validation("page starts at 1"));
        }

        let document_id = document_id.unwrap_or(ALL_DOCUMENTS);
        self.timed(
            ProviderSource::Flowise,
            chunks.list_chunks(store_id, document_id, page),
        )
        .await
    }

    pub async fn update_chunk(
        &self,
        store_id: &str,
        document_id: &str,
        chunk_id: &str,
        update: ChunkUpdate,
    ) -> Result<DocumentChunk, DomainError> {
        let chunks = self.registry.chunk_store()?;
        if update.content.trim().is_empty() {
            return Err(DomainError::validation("content is required"));
        }

        self.timed(
            ProviderSource::Flowise,
            chunks.update_chunk(store_id, document_id, chunk_id, &update),
        )
        .await
    }

    pub async fn delete_chunk(
        &self,
        store_id: &str,
        document_id: &str,
        chunk_id: &str,
    ) -> Result<bool, DomainError> {
        let chunks = self.registry.chunk_store()?;
        self.timed(
            ProviderSource::Flowise,
            chunks.delete_chunk(store_id, document_id, chunk_id),
        )
        .await
    }
}

/// Stable sort: similarity descending, unscored results last
pub fn sort_by_similarity(results: &mut [SearchResult]) {
    results.sort_by(|a, b| match (a.similarity, b.similarity) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
