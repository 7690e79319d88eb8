//! Knowledge graph updater
//!
//! Everything related to moving extracted knowledge into and out of the
//! persisted knowledge graph: batch extraction over stored articles,
//! insertion of non-conflicting triples, deletion with flag reconciliation,
//! pending/conflict reporting, and entity-equality resolution.
//!
//! The long-running "catch up on unextracted articles" batch job must never
//! run twice concurrently. Instead of a hidden module-level flag, the
//! updater owns an explicit [`UpdateLock`]: acquire before running, release
//! on completion or error (the guard releases on drop, so a panic cannot
//! leak the token), and reject concurrent attempts rather than queueing
//! them. A status endpoint polls [`UpdateLock::is_running`].

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::kg::KnowledgeGraph;
use crate::metrics;
use crate::models::{
    CorefEntity, CorefMention, SentenceTriples, StoredSentence, StoredTriple, Triple,
};
use crate::producer::{ExtractionScope, TripleProducer};
use crate::storage::ArticleStore;

// ============================================================================
// Exclusive run token
// ============================================================================

/// Single-run-at-a-time token for the batch update job
#[derive(Debug, Clone, Default)]
pub struct UpdateLock {
    running: Arc<AtomicBool>,
}

impl UpdateLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to acquire the token. Returns `None` when an update is already
    /// running; callers must treat that as a rejection, not wait.
    pub fn try_acquire(&self) -> Option<UpdateGuard> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(UpdateGuard {
                running: Arc::clone(&self.running),
            })
        } else {
            None
        }
    }

    /// Whether an update currently holds the token
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Held for the duration of one update run; releases the token on drop
#[derive(Debug)]
pub struct UpdateGuard {
    running: Arc<AtomicBool>,
}

impl Drop for UpdateGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

// ============================================================================
// Report shapes
// ============================================================================

/// Triples of one article, as exchanged with API callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleKnowledge {
    pub source: String,
    pub triples: Vec<SentenceTriples>,
}

/// Stored triples of one article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredArticleKnowledge {
    pub source: String,
    pub triples: Vec<StoredSentence>,
}

/// Conflicts recorded for one article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleConflicts {
    pub source: String,
    pub conflicts: Vec<Triple>,
}

/// Coreference entities of one article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleCorefEntities {
    pub source: String,
    pub coref_entities: Vec<CorefEntity>,
}

// ============================================================================
// Updater
// ============================================================================

/// Coordinates extraction, persistence, and knowledge graph mutation
pub struct KnowledgeGraphUpdater {
    store: Arc<dyn ArticleStore>,
    kg: KnowledgeGraph,
    producer: TripleProducer,
    auto_update: bool,
    lock: UpdateLock,
}

impl KnowledgeGraphUpdater {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        kg: KnowledgeGraph,
        producer: TripleProducer,
        auto_update: bool,
    ) -> Self {
        Self {
            store,
            kg,
            producer,
            auto_update,
            lock: UpdateLock::new(),
        }
    }

    /// The exclusive run token guarding batch updates
    pub fn lock(&self) -> &UpdateLock {
        &self.lock
    }

    /// Extract triples from stored articles whose triples have not been
    /// extracted yet and persist the results.
    ///
    /// `kg_auto_update` overrides the configured auto-update flag for this
    /// run; when active, non-conflicting triples are inserted into the
    /// knowledge graph right away.
    ///
    /// Per-article failures that a batch may survive (store hiccups on one
    /// article) are logged and skipped; pipeline invariant violations abort
    /// the whole run.
    pub async fn update_missed_knowledge(
        &self,
        kg_auto_update: Option<bool>,
        scope: ExtractionScope,
    ) -> Result<()> {
        metrics::record_update_started();
        let articles = self.store.find_unextracted().await?;
        tracing::info!(count = articles.len(), "updating missed knowledge");

        for article in articles {
            let result = self
                .extract_and_save(&article.source, &article.texts, scope, kg_auto_update)
                .await;
            if let Err(error) = result {
                if error.is_skippable() {
                    tracing::error!(
                        source = %article.source,
                        error = %error,
                        "extraction failed for article, skipping"
                    );
                } else {
                    metrics::record_update_failed();
                    return Err(error);
                }
            }
        }
        Ok(())
    }

    /// Extract triples from one article text and persist them, marking the
    /// triples already present in the knowledge graph as added
    async fn extract_and_save(
        &self,
        source: &str,
        texts: &str,
        scope: ExtractionScope,
        kg_auto_update: Option<bool>,
    ) -> Result<()> {
        tracing::info!(source, "extracting triples for article");
        let groups = self.producer.produce(texts, scope).await?;

        let mut stored_groups = Vec::with_capacity(groups.len());
        let mut conflicts: Vec<Triple> = Vec::new();
        for SentenceTriples { sentence, triples } in groups {
            let mut stored = Vec::with_capacity(triples.len());
            for triple in triples {
                let added = self.kg.triple_object_exists(&triple, false).await?;
                if !added {
                    if let Some(found) = self
                        .kg
                        .get_triples(&triple.subject, &triple.relation, true)
                        .await?
                    {
                        for conflict in found {
                            if !conflicts.contains(&conflict) {
                                conflicts.push(conflict);
                            }
                        }
                    }
                }
                stored.push(StoredTriple::new(triple, added));
            }
            stored_groups.push(StoredSentence {
                sentence,
                triples: stored,
            });
        }
        self.store.save_triples(source, &stored_groups).await?;
        self.store.save_conflicts(source, &conflicts).await?;

        // Coreference clusters are persisted with each mention's sameAs
        // resolution state, so unresolved pairs can be surfaced for review.
        let clusters = self.producer.coref_resolver().clusters(texts).await?;
        let mut entities = Vec::with_capacity(clusters.len());
        for (main, mentions) in clusters {
            let mut stored_mentions = Vec::with_capacity(mentions.len());
            for mention in mentions {
                let resolved = self.kg.check_same_as(&main, &mention).await?;
                stored_mentions.push(CorefMention { mention, resolved });
            }
            stored_mentions.sort_by(|a, b| a.mention.cmp(&b.mention));
            entities.push(CorefEntity {
                main,
                mentions: stored_mentions,
            });
        }
        entities.sort_by(|a, b| a.main.cmp(&b.main));
        self.store.save_coref_entities(source, &entities).await?;

        if kg_auto_update.unwrap_or(self.auto_update) {
            tracing::info!(source, "inserting non-conflicting knowledge");
            self.insert_all_nonconflicting_knowledge(source).await?;
        }
        Ok(())
    }

    /// Insert the non-conflicting triples of an article into the knowledge
    /// graph and flip their added flags
    pub async fn insert_all_nonconflicting_knowledge(&self, source: &str) -> Result<()> {
        let article = self
            .store
            .find_by_source(source)
            .await?
            .ok_or_else(|| Error::Config(format!("unknown article source '{source}'")))?;

        let Some(mut groups) = article.triples else {
            return Ok(());
        };
        for group in &mut groups {
            for stored in &mut group.triples {
                if self.kg.triple_object_exists(&stored.triple, false).await? {
                    stored.added = true;
                    continue;
                }
                let conflicts = self
                    .kg
                    .get_triples(&stored.triple.subject, &stored.triple.relation, true)
                    .await?;
                match conflicts {
                    Some(found) if !found.is_empty() => stored.added = false,
                    _ => {
                        self.kg.insert_triple_object(&stored.triple).await?;
                        stored.added = true;
                    }
                }
            }
        }
        self.store.save_triples(source, &groups).await?;
        Ok(())
    }

    /// Delete every triple extracted from an article from the knowledge
    /// graph. Triples must have been extracted and stored beforehand.
    pub async fn delete_all_knowledge_from_article(&self, source: &str) -> Result<()> {
        tracing::info!(source, "deleting triples of article");
        let Some(article) = self.store.find_by_source(source).await? else {
            return Ok(());
        };
        if let Some(groups) = article.triples {
            for group in groups {
                let triples: Vec<Triple> =
                    group.triples.into_iter().map(|stored| stored.triple).collect();
                self.delete_knowledge(&triples).await?;
            }
        }
        Ok(())
    }

    /// Remove triples from the knowledge graph and reconcile the added
    /// flags everywhere the triples appear — the triples may have come from
    /// any article or from user input
    pub async fn delete_knowledge(&self, triples: &[Triple]) -> Result<()> {
        for triple in triples {
            self.kg.delete_triple_object(triple).await?;
            self.store.set_added(None, triple, false).await?;
            self.store.set_user_triple_added(triple, false).await?;
        }
        Ok(())
    }

    /// Pending (not yet added) triples for one article
    pub async fn get_article_pending_knowledge(
        &self,
        source: &str,
    ) -> Result<Option<Vec<StoredSentence>>> {
        let Some(article) = self.store.find_by_source(source).await? else {
            return Ok(None);
        };
        Ok(article.triples.map(pending_only))
    }

    /// Pending triples for all extracted articles
    pub async fn get_all_pending_knowledge(&self) -> Result<Vec<StoredArticleKnowledge>> {
        let mut result = Vec::new();
        for article in self.store.all_with_triples().await? {
            let Some(groups) = article.triples else {
                continue;
            };
            let pending = pending_only(groups);
            if pending.iter().any(|group| !group.triples.is_empty()) {
                result.push(StoredArticleKnowledge {
                    source: article.source,
                    triples: pending,
                });
            }
        }
        Ok(result)
    }

    /// All extracted triples of one article, regardless of added state
    pub async fn get_article_knowledge(
        &self,
        source: &str,
    ) -> Result<Option<Vec<StoredSentence>>> {
        let Some(article) = self.store.find_by_source(source).await? else {
            return Ok(None);
        };
        Ok(article.triples)
    }

    /// All extracted triples of all articles
    pub async fn get_all_articles_knowledge(&self) -> Result<Vec<StoredArticleKnowledge>> {
        Ok(self
            .store
            .all_with_triples()
            .await?
            .into_iter()
            .filter_map(|article| {
                article.triples.map(|triples| StoredArticleKnowledge {
                    source: article.source,
                    triples,
                })
            })
            .collect())
    }

    /// Conflicts recorded for one article
    pub async fn get_article_conflicts(&self, source: &str) -> Result<Option<Vec<Triple>>> {
        let Some(article) = self.store.find_by_source(source).await? else {
            return Ok(None);
        };
        Ok(article.conflicts)
    }

    /// Conflicts recorded for all articles
    pub async fn get_all_article_conflicts(&self) -> Result<Vec<ArticleConflicts>> {
        Ok(self
            .store
            .all_with_triples()
            .await?
            .into_iter()
            .filter_map(|article| match article.conflicts {
                Some(conflicts) if !conflicts.is_empty() => Some(ArticleConflicts {
                    source: article.source,
                    conflicts,
                }),
                _ => None,
            })
            .collect())
    }

    /// Corefering entities whose sameAs relation has not been asserted yet
    pub async fn get_all_unresolved_corefering_entities(
        &self,
    ) -> Result<Vec<ArticleCorefEntities>> {
        let mut result = Vec::new();
        for article in self.store.all_with_coref_entities().await? {
            let Some(entities) = article.coref_entities else {
                continue;
            };
            let unresolved: Vec<CorefEntity> = entities
                .into_iter()
                .map(|entity| CorefEntity {
                    main: entity.main,
                    mentions: entity
                        .mentions
                        .into_iter()
                        .filter(|mention| !mention.resolved)
                        .collect(),
                })
                .filter(|entity| !entity.mentions.is_empty())
                .collect();
            if !unresolved.is_empty() {
                result.push(ArticleCorefEntities {
                    source: article.source,
                    coref_entities: unresolved,
                });
            }
        }
        Ok(result)
    }

    /// Resolve two entities as denoting the same real-world entity
    pub async fn insert_entities_equality(&self, entity_a: &str, entity_b: &str) -> Result<()> {
        self.kg.add_same_as(entity_a, entity_b).await?;
        Ok(())
    }

    /// Insert article-scoped triples into the knowledge graph and reconcile
    /// the stored records: known triples get their flag flipped, new triples
    /// are appended to their sentence group (or an empty-sentence group when
    /// the sentence is unknown)
    pub async fn insert_articles_knowledge(&self, articles: &[ArticleKnowledge]) -> Result<()> {
        for article in articles {
            let stored = self
                .store
                .find_by_source(&article.source)
                .await?
                .and_then(|record| record.triples)
                .unwrap_or_default();

            for group in &article.triples {
                let stored_group = stored.iter().find(|g| g.sentence == group.sentence);
                for triple in &group.triples {
                    self.kg.insert_triple_object(triple).await?;
                    let already_known = stored_group
                        .map(|g| g.triples.iter().any(|s| s.triple == *triple))
                        .unwrap_or(false);
                    if already_known {
                        self.store
                            .set_added(Some(&article.source), triple, true)
                            .await?;
                    } else {
                        self.store
                            .push_triple(
                                &article.source,
                                &group.sentence,
                                &StoredTriple::new(triple.clone(), true),
                            )
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Insert one triple into the knowledge graph.
    ///
    /// With `check_conflict`, a subject+relation match on a different object
    /// aborts the insert and returns the conflicting triples instead.
    pub async fn insert_knowledge(
        &self,
        triple: &Triple,
        check_conflict: bool,
    ) -> Result<Option<Vec<Triple>>> {
        self.store
            .upsert_user_triple(&StoredTriple::new(triple.clone(), false))
            .await?;

        if check_conflict && !self.kg.triple_object_exists(triple, false).await? {
            if let Some(conflicts) = self
                .kg
                .get_triples(&triple.subject, &triple.relation, false)
                .await?
            {
                return Ok(Some(conflicts));
            }
        }

        self.kg.insert_triple_object(triple).await?;
        self.store.set_user_triple_added(triple, true).await?;
        Ok(None)
    }

    /// Triples matching the given subject and relation; with objects given,
    /// the exact triple is returned only if it exists
    pub async fn get_knowledge(
        &self,
        subject: &str,
        relation: &str,
        objects: Option<Vec<String>>,
    ) -> Result<Option<Vec<Triple>>> {
        match objects {
            None => Ok(self.kg.get_triples(subject, relation, false).await?),
            Some(objects) => {
                let triple = Triple::new(subject, relation, objects);
                if self.kg.triple_object_exists(&triple, false).await? {
                    Ok(Some(vec![triple]))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// All triples of an entity
    pub async fn get_entity(&self, subject: &str) -> Result<Option<Vec<Triple>>> {
        Ok(self.kg.get_entity(subject, false).await?)
    }
}

/// Keep only the triples not yet added to the knowledge graph
fn pending_only(groups: Vec<StoredSentence>) -> Vec<StoredSentence> {
    groups
        .into_iter()
        .map(|group| StoredSentence {
            sentence: group.sentence,
            triples: group
                .triples
                .into_iter()
                .filter(|stored| !stored.added)
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_rejects_concurrent_acquisition() {
        let lock = UpdateLock::new();
        let guard = lock.try_acquire().expect("first acquire succeeds");
        assert!(lock.is_running());
        assert!(lock.try_acquire().is_none());
        drop(guard);
        assert!(!lock.is_running());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn guard_releases_on_panic_unwind() {
        let lock = UpdateLock::new();
        let cloned = lock.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = cloned.try_acquire().unwrap();
            panic!("update blew up");
        });
        assert!(result.is_err());
        assert!(!lock.is_running());
    }

    #[test]
    fn pending_filter_keeps_unadded_triples() {
        let groups = vec![StoredSentence {
            sentence: "s".into(),
            triples: vec![
                StoredTriple::new(Triple::new("a", "r", vec!["o".into()]), true),
                StoredTriple::new(Triple::new("b", "r", vec!["o".into()]), false),
            ],
        }];
        let pending = pending_only(groups);
        assert_eq!(pending[0].triples.len(), 1);
        assert_eq!(pending[0].triples[0].triple.subject, "b");
    }
}
