//! Article store
//!
//! The pipeline treats article persistence as an abstract document store
//! keyed uniquely by source URL, with support for targeted partial updates:
//! flipping a triple's `added` flag or removing a pending triple addresses
//! the triple by its (subject, relation, objects) identity rather than
//! rewriting the whole record, so concurrent unrelated updates to the same
//! article are not lost.
//!
//! [`SqliteArticleStore`] is the shipped backend; every targeted mutation
//! runs inside a single transaction.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{
    ArticleRecord, ArticleSummary, CorefEntity, StoredSentence, StoredTriple, Triple,
};

mod sqlite;

pub use sqlite::SqliteArticleStore;

/// Operation contract of the article document store
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert or replace an article record
    async fn upsert_article(&self, record: &ArticleRecord) -> Result<(), StoreError>;

    /// Fetch one article by source URL
    async fn find_by_source(&self, source: &str) -> Result<Option<ArticleRecord>, StoreError>;

    /// Articles whose triples have not been extracted yet
    async fn find_unextracted(&self) -> Result<Vec<ArticleRecord>, StoreError>;

    /// All article listings
    async fn all_articles(&self) -> Result<Vec<ArticleSummary>, StoreError>;

    /// Listings of articles whose triples have been extracted
    async fn all_extracted_articles(&self) -> Result<Vec<ArticleSummary>, StoreError>;

    /// Full records of articles with extracted triples
    async fn all_with_triples(&self) -> Result<Vec<ArticleRecord>, StoreError>;

    /// Full records of articles with stored coreference entities
    async fn all_with_coref_entities(&self) -> Result<Vec<ArticleRecord>, StoreError>;

    /// Replace the extracted triples of an article
    async fn save_triples(
        &self,
        source: &str,
        groups: &[StoredSentence],
    ) -> Result<(), StoreError>;

    /// Replace the conflicts of an article
    async fn save_conflicts(&self, source: &str, conflicts: &[Triple]) -> Result<(), StoreError>;

    /// Replace the coreference entities of an article
    async fn save_coref_entities(
        &self,
        source: &str,
        entities: &[CorefEntity],
    ) -> Result<(), StoreError>;

    /// Flip the `added` flag of every stored triple matching the given
    /// triple identity. `source = None` targets all articles.
    async fn set_added(
        &self,
        source: Option<&str>,
        triple: &Triple,
        added: bool,
    ) -> Result<(), StoreError>;

    /// Append a triple to the sentence group matching `sentence`; an
    /// unknown sentence lands in an empty-sentence group so manually
    /// inserted knowledge still attaches to the article
    async fn push_triple(
        &self,
        source: &str,
        sentence: &str,
        triple: &StoredTriple,
    ) -> Result<(), StoreError>;

    /// Remove a pending triple from the sentence group matching `sentence`
    async fn remove_pending(
        &self,
        source: &str,
        sentence: &str,
        triple: &Triple,
    ) -> Result<(), StoreError>;

    /// Insert or replace a user-submitted triple (outside any article)
    async fn upsert_user_triple(&self, triple: &StoredTriple) -> Result<(), StoreError>;

    /// Flip the `added` flag of a user-submitted triple
    async fn set_user_triple_added(&self, triple: &Triple, added: bool)
        -> Result<(), StoreError>;
}
