//! SQLite article store backend
//!
//! Documents are stored one row per article; the nested collections
//! (triples, conflicts, coreference entities) are serialized JSON columns.
//! Targeted partial updates read, modify, and write the affected column
//! inside one transaction, keyed on triple identity, so they compose with
//! concurrent updates to other parts of the record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::{
    ArticleRecord, ArticleSummary, CorefEntity, StoredSentence, StoredTriple, Triple,
};

use super::ArticleStore;

/// Article store over a single SQLite database
pub struct SqliteArticleStore {
    conn: Mutex<Connection>,
}

impl SqliteArticleStore {
    /// Open (and initialize) the store at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).ok();
            }
        }
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (used by tests)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS articles (
                source TEXT PRIMARY KEY,
                texts TEXT NOT NULL,
                date INTEGER,
                headlines TEXT NOT NULL DEFAULT '[]',
                triples TEXT,
                conflicts TEXT,
                coref_entities TEXT
            );
            CREATE TABLE IF NOT EXISTS user_triples (
                subject TEXT NOT NULL,
                relation TEXT NOT NULL,
                objects TEXT NOT NULL,
                added INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (subject, relation, objects)
            );",
        )?;
        Ok(())
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<RawArticleRow> {
        Ok(RawArticleRow {
            source: row.get("source")?,
            texts: row.get("texts")?,
            date: row.get("date")?,
            headlines: row.get("headlines")?,
            triples: row.get("triples")?,
            conflicts: row.get("conflicts")?,
            coref_entities: row.get("coref_entities")?,
        })
    }
}

/// Raw row shape before JSON decoding
struct RawArticleRow {
    source: String,
    texts: String,
    date: Option<i64>,
    headlines: String,
    triples: Option<String>,
    conflicts: Option<String>,
    coref_entities: Option<String>,
}

impl RawArticleRow {
    fn decode(self) -> Result<ArticleRecord, StoreError> {
        Ok(ArticleRecord {
            source: self.source,
            texts: self.texts,
            date: self.date.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
            headlines: serde_json::from_str(&self.headlines)?,
            triples: self
                .triples
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            conflicts: self
                .conflicts
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            coref_entities: self
                .coref_entities
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
        })
    }

    fn summary(&self) -> Result<ArticleSummary, StoreError> {
        let headlines: Vec<String> = serde_json::from_str(&self.headlines)?;
        Ok(ArticleSummary {
            source: self.source.clone(),
            headlines: headlines.join(". "),
            date: self.date,
        })
    }
}

const SELECT_COLUMNS: &str =
    "source, texts, date, headlines, triples, conflicts, coref_entities";

#[async_trait]
impl ArticleStore for SqliteArticleStore {
    async fn upsert_article(&self, record: &ArticleRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO articles (source, texts, date, headlines, triples, conflicts, coref_entities)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(source) DO UPDATE SET
                texts = excluded.texts,
                date = excluded.date,
                headlines = excluded.headlines,
                triples = excluded.triples,
                conflicts = excluded.conflicts,
                coref_entities = excluded.coref_entities",
            params![
                record.source,
                record.texts,
                record.date.map(|d| d.timestamp()),
                serde_json::to_string(&record.headlines)?,
                record.triples.as_ref().map(serde_json::to_string).transpose()?,
                record.conflicts.as_ref().map(serde_json::to_string).transpose()?,
                record
                    .coref_entities
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
            ],
        )?;
        Ok(())
    }

    async fn find_by_source(&self, source: &str) -> Result<Option<ArticleRecord>, StoreError> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM articles WHERE source = ?1"),
                params![source],
                Self::row_to_record,
            )
            .optional()?;
        row.map(RawArticleRow::decode).transpose()
    }

    async fn find_unextracted(&self) -> Result<Vec<ArticleRecord>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM articles WHERE triples IS NULL"
        ))?;
        let rows = stmt.query_map([], Self::row_to_record)?;
        rows.map(|row| row.map_err(StoreError::from).and_then(RawArticleRow::decode))
            .collect()
    }

    async fn all_articles(&self) -> Result<Vec<ArticleSummary>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM articles"))?;
        let rows = stmt.query_map([], Self::row_to_record)?;
        rows.map(|row| row.map_err(StoreError::from).and_then(|r| r.summary()))
            .collect()
    }

    async fn all_extracted_articles(&self) -> Result<Vec<ArticleSummary>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM articles WHERE triples IS NOT NULL"
        ))?;
        let rows = stmt.query_map([], Self::row_to_record)?;
        rows.map(|row| row.map_err(StoreError::from).and_then(|r| r.summary()))
            .collect()
    }

    async fn all_with_triples(&self) -> Result<Vec<ArticleRecord>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM articles WHERE triples IS NOT NULL"
        ))?;
        let rows = stmt.query_map([], Self::row_to_record)?;
        rows.map(|row| row.map_err(StoreError::from).and_then(RawArticleRow::decode))
            .collect()
    }

    async fn all_with_coref_entities(&self) -> Result<Vec<ArticleRecord>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM articles WHERE coref_entities IS NOT NULL"
        ))?;
        let rows = stmt.query_map([], Self::row_to_record)?;
        rows.map(|row| row.map_err(StoreError::from).and_then(RawArticleRow::decode))
            .collect()
    }

    async fn save_triples(
        &self,
        source: &str,
        groups: &[StoredSentence],
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE articles SET triples = ?2 WHERE source = ?1",
            params![source, serde_json::to_string(groups)?],
        )?;
        if updated == 0 {
            return Err(StoreError::ArticleNotFound(source.to_string()));
        }
        Ok(())
    }

    async fn save_conflicts(&self, source: &str, conflicts: &[Triple]) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE articles SET conflicts = ?2 WHERE source = ?1",
            params![source, serde_json::to_string(conflicts)?],
        )?;
        if updated == 0 {
            return Err(StoreError::ArticleNotFound(source.to_string()));
        }
        Ok(())
    }

    async fn save_coref_entities(
        &self,
        source: &str,
        entities: &[CorefEntity],
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE articles SET coref_entities = ?2 WHERE source = ?1",
            params![source, serde_json::to_string(entities)?],
        )?;
        if updated == 0 {
            return Err(StoreError::ArticleNotFound(source.to_string()));
        }
        Ok(())
    }

    async fn set_added(
        &self,
        source: Option<&str>,
        triple: &Triple,
        added: bool,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        {
            let (sql, filter): (String, Vec<&str>) = match source {
                Some(source) => (
                    "SELECT source, triples FROM articles \
                     WHERE triples IS NOT NULL AND source = ?1"
                        .to_string(),
                    vec![source],
                ),
                None => (
                    "SELECT source, triples FROM articles WHERE triples IS NOT NULL".to_string(),
                    vec![],
                ),
            };
            let mut stmt = tx.prepare(&sql)?;
            let rows: Vec<(String, String)> = stmt
                .query_map(rusqlite::params_from_iter(filter), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<rusqlite::Result<_>>()?;

            for (row_source, triples_json) in rows {
                let mut groups: Vec<StoredSentence> = serde_json::from_str(&triples_json)?;
                let mut changed = false;
                for group in &mut groups {
                    for stored in &mut group.triples {
                        if stored.triple == *triple && stored.added != added {
                            stored.added = added;
                            changed = true;
                        }
                    }
                }
                if changed {
                    tx.execute(
                        "UPDATE articles SET triples = ?2 WHERE source = ?1",
                        params![row_source, serde_json::to_string(&groups)?],
                    )?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn push_triple(
        &self,
        source: &str,
        sentence: &str,
        triple: &StoredTriple,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        {
            let triples_json: Option<String> = tx
                .query_row(
                    "SELECT triples FROM articles WHERE source = ?1",
                    params![source],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| StoreError::ArticleNotFound(source.to_string()))?;

            let mut groups: Vec<StoredSentence> = triples_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?
                .unwrap_or_default();

            match groups.iter_mut().find(|g| g.sentence == sentence) {
                Some(group) => group.triples.push(triple.clone()),
                None => groups.push(StoredSentence {
                    sentence: String::new(),
                    triples: vec![triple.clone()],
                }),
            }

            tx.execute(
                "UPDATE articles SET triples = ?2 WHERE source = ?1",
                params![source, serde_json::to_string(&groups)?],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn remove_pending(
        &self,
        source: &str,
        sentence: &str,
        triple: &Triple,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        {
            let triples_json: Option<String> = tx
                .query_row(
                    "SELECT triples FROM articles WHERE source = ?1",
                    params![source],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| StoreError::ArticleNotFound(source.to_string()))?;

            let Some(triples_json) = triples_json else {
                tx.commit()?;
                return Ok(());
            };
            let mut groups: Vec<StoredSentence> = serde_json::from_str(&triples_json)?;
            for group in &mut groups {
                if group.sentence == sentence {
                    group.triples.retain(|stored| stored.triple != *triple);
                }
            }

            tx.execute(
                "UPDATE articles SET triples = ?2 WHERE source = ?1",
                params![source, serde_json::to_string(&groups)?],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn upsert_user_triple(&self, triple: &StoredTriple) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO user_triples (subject, relation, objects, added)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(subject, relation, objects) DO UPDATE SET added = excluded.added",
            params![
                triple.triple.subject,
                triple.triple.relation,
                serde_json::to_string(&triple.triple.objects)?,
                triple.added as i64,
            ],
        )?;
        Ok(())
    }

    async fn set_user_triple_added(
        &self,
        triple: &Triple,
        added: bool,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE user_triples SET added = ?4
             WHERE subject = ?1 AND relation = ?2 AND objects = ?3",
            params![
                triple.subject,
                triple.relation,
                serde_json::to_string(&triple.objects)?,
                added as i64,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &str) -> ArticleRecord {
        ArticleRecord {
            source: source.to_string(),
            texts: "Mr Giuliani ignored social distancing.".to_string(),
            date: None,
            headlines: vec!["Giuliani flouts guidance".to_string()],
            triples: None,
            conflicts: None,
            coref_entities: None,
        }
    }

    fn stored_groups() -> Vec<StoredSentence> {
        vec![StoredSentence {
            sentence: "Mr Giuliani ignored social distancing.".to_string(),
            triples: vec![StoredTriple::new(
                Triple::new("s", "r", vec!["o".into()]),
                false,
            )],
        }]
    }

    #[tokio::test]
    async fn upsert_and_fetch_round_trip() {
        let store = SqliteArticleStore::open_in_memory().unwrap();
        store.upsert_article(&record("http://a")).await.unwrap();
        let fetched = store.find_by_source("http://a").await.unwrap().unwrap();
        assert_eq!(fetched.texts, record("http://a").texts);
        assert!(fetched.triples.is_none());
    }

    #[tokio::test]
    async fn unextracted_articles_have_no_triples() {
        let store = SqliteArticleStore::open_in_memory().unwrap();
        store.upsert_article(&record("http://a")).await.unwrap();
        store.upsert_article(&record("http://b")).await.unwrap();
        store
            .save_triples("http://b", &stored_groups())
            .await
            .unwrap();

        let unextracted = store.find_unextracted().await.unwrap();
        assert_eq!(unextracted.len(), 1);
        assert_eq!(unextracted[0].source, "http://a");
    }

    #[tokio::test]
    async fn set_added_targets_matching_identity_only() {
        let store = SqliteArticleStore::open_in_memory().unwrap();
        store.upsert_article(&record("http://a")).await.unwrap();
        let mut groups = stored_groups();
        groups[0].triples.push(StoredTriple::new(
            Triple::new("s2", "r2", vec!["o2".into()]),
            false,
        ));
        store.save_triples("http://a", &groups).await.unwrap();

        store
            .set_added(None, &Triple::new("s", "r", vec!["o".into()]), true)
            .await
            .unwrap();

        let fetched = store.find_by_source("http://a").await.unwrap().unwrap();
        let triples = &fetched.triples.unwrap()[0].triples;
        assert!(triples[0].added);
        assert!(!triples[1].added);
    }

    #[tokio::test]
    async fn push_to_unknown_sentence_creates_empty_group() {
        let store = SqliteArticleStore::open_in_memory().unwrap();
        store.upsert_article(&record("http://a")).await.unwrap();
        store
            .save_triples("http://a", &stored_groups())
            .await
            .unwrap();

        store
            .push_triple(
                "http://a",
                "a sentence nobody extracted",
                &StoredTriple::new(Triple::new("x", "y", vec!["z".into()]), true),
            )
            .await
            .unwrap();

        let fetched = store.find_by_source("http://a").await.unwrap().unwrap();
        let groups = fetched.triples.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].sentence, "");
        assert!(groups[1].triples[0].added);
    }

    #[tokio::test]
    async fn remove_pending_deletes_matching_triple() {
        let store = SqliteArticleStore::open_in_memory().unwrap();
        store.upsert_article(&record("http://a")).await.unwrap();
        store
            .save_triples("http://a", &stored_groups())
            .await
            .unwrap();

        store
            .remove_pending(
                "http://a",
                "Mr Giuliani ignored social distancing.",
                &Triple::new("s", "r", vec!["o".into()]),
            )
            .await
            .unwrap();

        let fetched = store.find_by_source("http://a").await.unwrap().unwrap();
        assert!(fetched.triples.unwrap()[0].triples.is_empty());
    }

    #[tokio::test]
    async fn missing_article_is_reported() {
        let store = SqliteArticleStore::open_in_memory().unwrap();
        let result = store.save_triples("http://nope", &stored_groups()).await;
        assert!(matches!(result, Err(StoreError::ArticleNotFound(_))));
    }
}
