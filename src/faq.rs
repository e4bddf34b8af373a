//! FAQ retrieval engine.
//!
//! The FAQ collection is a SQLite table of question/answer pairs with the
//! question's embedding stored as a BLOB. Retrieval embeds the query and
//! ranks stored questions by cosine similarity in Rust; answering feeds the
//! top-k answers as context into one grounded completion call.
//!
//! Ingestion is idempotent at the collection level: if the table already
//! exists, the run is skipped entirely and existing content is trusted
//! verbatim. The existence check and create-and-populate are atomic — the
//! `CREATE TABLE` runs inside the populating transaction, so concurrent
//! cold starts serialize and the loser treats the collection as ingested.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::AssistError;
use crate::models::FaqEntry;
use crate::traits::{ChatCompletion, ChatMessage, ChatParams, Embedder};

/// Questions are embedded in batches of this size during ingestion.
const EMBED_BATCH_SIZE: usize = 64;

const ANSWER_TEMPERATURE: f32 = 0.8;
const ANSWER_MAX_TOKENS: u32 = 500;

/// Grounding instructions for the answering completion. The model may only
/// use the supplied context and must emit the fixed sentinel verbatim when
/// the context is insufficient.
const ANSWER_SYSTEM_PROMPT: &str = "\
Given the question and context below, generate an answer based on the context.
If you don't know the answer inside the context, then say \"I don't know\".
Don't make things up.";

/// One row of the FAQ source CSV.
#[derive(Debug, serde::Deserialize)]
struct FaqCsvRow {
    question: String,
    answer: String,
}

/// Similarity-searchable FAQ collection plus its answering completion.
pub struct FaqEngine {
    pool: SqlitePool,
    collection: String,
    top_k: usize,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatCompletion>,
}

impl FaqEngine {
    pub fn new(
        pool: SqlitePool,
        collection: String,
        top_k: usize,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatCompletion>,
    ) -> Self {
        Self {
            pool,
            collection,
            top_k,
            embedder,
            chat,
        }
    }

    /// Whether the collection table exists.
    pub async fn collection_exists(&self) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name = ?",
        )
        .bind(&self.collection)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Number of entries in the collection.
    pub async fn collection_size(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.collection))
            .fetch_one(&self.pool)
            .await
    }

    /// Ingest the FAQ CSV into the collection.
    ///
    /// Skipped entirely when the collection already exists; re-running is a
    /// no-op, not an upsert. Ids are assigned in CSV row order: `id_0` is
    /// the first row.
    pub async fn ingest(&self, csv_path: &Path) -> Result<()> {
        if self.collection_exists().await? {
            info!(collection = %self.collection, "collection already exists, skipping ingestion");
            return Ok(());
        }

        info!(collection = %self.collection, csv = %csv_path.display(), "ingesting FAQ data");

        let mut reader = csv::Reader::from_path(csv_path)
            .with_context(|| format!("failed to open FAQ CSV: {}", csv_path.display()))?;

        let mut entries: Vec<FaqEntry> = Vec::new();
        for (i, record) in reader.deserialize::<FaqCsvRow>().enumerate() {
            let row = record.with_context(|| format!("bad FAQ CSV record at row {i}"))?;
            entries.push(FaqEntry {
                id: format!("id_{i}"),
                question: row.question,
                answer: row.answer,
            });
        }
        if entries.is_empty() {
            anyhow::bail!("FAQ CSV {} contains no rows", csv_path.display());
        }

        // Embed the searchable question texts in batches.
        let questions: Vec<String> = entries.iter().map(|e| e.question.clone()).collect();
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(questions.len());
        for batch in questions.chunks(EMBED_BATCH_SIZE) {
            let mut batch_vecs = self.embedder.embed(batch).await?;
            vectors.append(&mut batch_vecs);
        }
        if vectors.len() != entries.len() {
            anyhow::bail!(
                "encoder returned {} vectors for {} questions",
                vectors.len(),
                entries.len()
            );
        }

        // Create and populate in one transaction; a concurrent cold start
        // that wins the race makes our CREATE TABLE fail, which means the
        // collection is already being ingested.
        let mut tx = self.pool.begin().await?;
        let create = format!(
            "CREATE TABLE {} (id TEXT PRIMARY KEY, question TEXT NOT NULL, \
             answer TEXT NOT NULL, embedding BLOB NOT NULL)",
            self.collection
        );
        if sqlx::query(&create).execute(&mut *tx).await.is_err() {
            warn!(collection = %self.collection, "lost ingestion race, collection created elsewhere");
            return Ok(());
        }

        let insert = format!(
            "INSERT INTO {} (id, question, answer, embedding) VALUES (?, ?, ?, ?)",
            self.collection
        );
        for (entry, vector) in entries.iter().zip(&vectors) {
            sqlx::query(&insert)
                .bind(&entry.id)
                .bind(&entry.question)
                .bind(&entry.answer)
                .bind(vec_to_blob(vector))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!(entries = entries.len(), "FAQ ingestion complete");
        Ok(())
    }

    /// Retrieve the top-k entries nearest to the query, best first.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<(FaqEntry, f32)>, AssistError> {
        if !self.collection_exists().await? {
            return Err(AssistError::FaqIndexMissing(self.collection.clone()));
        }

        let query_vec = self
            .embedder
            .embed_one(query)
            .await
            .map_err(|e| AssistError::Infrastructure(format!("encoder unavailable: {e}")))?;

        let rows = sqlx::query(&format!(
            "SELECT id, question, answer, embedding FROM {}",
            self.collection
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(FaqEntry, f32)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let similarity = cosine_similarity(&query_vec, &blob_to_vec(&blob));
                (
                    FaqEntry {
                        id: row.get("id"),
                        question: row.get("question"),
                        answer: row.get("answer"),
                    },
                    similarity,
                )
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.top_k);
        Ok(scored)
    }

    /// Answer a query from the collection.
    ///
    /// Concatenates the top-k stored answers (similarity-ranked, no
    /// separator) into the context for one grounded completion call and
    /// returns the completion text unmodified.
    pub async fn answer(&self, query: &str) -> Result<String, AssistError> {
        let ranked = self.retrieve(query).await?;
        let context: String = ranked
            .iter()
            .map(|(entry, _)| entry.answer.as_str())
            .collect();

        let messages = [
            ChatMessage::system(ANSWER_SYSTEM_PROMPT),
            ChatMessage::user(format!("QUESTION: {query}\nCONTEXT: {context}")),
        ];
        let params = ChatParams {
            temperature: ANSWER_TEMPERATURE,
            max_tokens: Some(ANSWER_MAX_TOKENS),
        };

        self.chat
            .complete(&messages, params)
            .await
            .map_err(|e| AssistError::Infrastructure(format!("completion service failed: {e}")))
    }
}
