//! NL2Query compiler and executor.
//!
//! Turns a natural-language product question into a safe, executable SQL
//! query and runs it against the read-only product store:
//!
//! 1. [`SqlChain::generate_query`] — one completion call with the fixed
//!    schema prompt; the model wraps its query in `<SQL></SQL>` tags.
//! 2. [`extract`] — strict single-pass tag parser; first pair wins.
//! 3. [`validate`] — the safety gate: case-insensitive `SELECT` prefix and
//!    no multi-statement payloads. Anything else never reaches the store.
//! 4. [`SqlChain::run_query`] — scoped connection, dynamic row decoding,
//!    released on every exit path.
//!
//! If the product database is missing, the executor materializes it from
//! the bulk CSV on demand; if that is also missing it fails with a
//! remediation hint.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::db;
use crate::error::AssistError;
use crate::models::{ProductRecord, QueryRow};
use crate::traits::{ChatCompletion, ChatMessage, ChatParams};

const SQL_OPEN_TAG: &str = "<SQL>";
const SQL_CLOSE_TAG: &str = "</SQL>";

const COMPILE_TEMPERATURE: f32 = 0.2;
const COMPILE_MAX_TOKENS: u32 = 1024;

/// Fixed system instruction for query compilation. Describes the exact
/// product schema and the output contract: `SELECT *`, case-insensitive
/// brand matching via `LIKE` (never `ILIKE`), a single query inside
/// `<SQL></SQL>` tags, nothing else.
const COMPILE_SYSTEM_PROMPT: &str = "\
You are an expert in understanding the database schema and generating SQL queries for a natural language
question pertaining to the data you have. The schema is provided in the schema tags.
<schema>
table: product

fields:
product_link - string (hyperlink to the product)
title - string (name of the product)
brand - string (brand of the product)
price - integer (price of the product in Indian Rupees)
discount - float (discount on the product. 10% discount is represented as 0.1, 20% discount is represented as 0.2)
avg_rating - float (average rating of the product. Range 0-5, 5 is the highest)
total_ratings - integer (total number of ratings for the product)
</schema>

Make sure whenever you try to search for a brand name, the name can be in any case.
So, make sure to use %LIKE% to find the brand in the condition. Never use \"ILIKE\".
Create a single SQL query for the question provided.
The query should have all the fields in the SELECT clause (i.e. SELECT *).
Just the SQL query is needed, nothing else.
The SQL query should be generated within <SQL></SQL> tags.";

/// Result of scanning completion output for an embedded SQL query.
///
/// `NotFound` is a normal, expected outcome — models sometimes answer in
/// prose — not an exceptional one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Extracted(String),
    NotFound,
}

/// Extract the first well-formed `<SQL>…</SQL>` pair from completion output.
///
/// Single pass, non-greedy: the first opening tag and the first closing tag
/// after it win. Embedded newlines are allowed inside the tags; prose is
/// tolerated only outside them. Contents are trimmed.
pub fn extract(text: &str) -> Extraction {
    let Some(start) = text.find(SQL_OPEN_TAG) else {
        return Extraction::NotFound;
    };
    let after = &text[start + SQL_OPEN_TAG.len()..];
    let Some(end) = after.find(SQL_CLOSE_TAG) else {
        return Extraction::NotFound;
    };
    Extraction::Extracted(after[..end].trim().to_string())
}

/// The read-only safety gate.
///
/// Accepts only statements that begin, case-insensitively, with `SELECT`
/// and contain no statement separator (one trailing `;` is tolerated).
/// Returns the rejection reason on failure; a rejected query must never be
/// executed.
pub fn validate(query: &str) -> std::result::Result<(), String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err("empty query".to_string());
    }
    if !trimmed.to_uppercase().starts_with("SELECT") {
        return Err("only SELECT queries are allowed".to_string());
    }
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    if body.contains(';') {
        return Err("multi-statement queries are not allowed".to_string());
    }
    Ok(())
}

/// Compiler and executor for product questions.
pub struct SqlChain {
    chat: Arc<dyn ChatCompletion>,
    product_path: PathBuf,
    product_csv: PathBuf,
}

impl SqlChain {
    pub fn new(chat: Arc<dyn ChatCompletion>, product_path: PathBuf, product_csv: PathBuf) -> Self {
        Self {
            chat,
            product_path,
            product_csv,
        }
    }

    /// Compile a natural-language question into raw completion output.
    ///
    /// The embedded query still has to pass [`extract`] and [`validate`].
    pub async fn generate_query(&self, question: &str) -> Result<String, AssistError> {
        let messages = [
            ChatMessage::system(COMPILE_SYSTEM_PROMPT),
            ChatMessage::user(question.to_string()),
        ];
        let params = ChatParams {
            temperature: COMPILE_TEMPERATURE,
            max_tokens: Some(COMPILE_MAX_TOKENS),
        };

        self.chat
            .complete(&messages, params)
            .await
            .map_err(|e| AssistError::Infrastructure(format!("completion service failed: {e}")))
    }

    /// Run a validated query and return its rows in order.
    ///
    /// The connection is scoped to this call and released on every exit
    /// path, including query failure. A store rejection of a validated
    /// query is caught, logged with the offending text, and surfaced as
    /// [`AssistError::Execution`].
    pub async fn run_query(&self, sql: &str) -> Result<Vec<QueryRow>, AssistError> {
        self.ensure_product_db().await?;

        let pool = db::connect_product(&self.product_path)
            .await
            .map_err(|e| AssistError::Infrastructure(format!("product store unreachable: {e}")))?;

        let result = sqlx::query(sql).fetch_all(&pool).await;
        pool.close().await;

        match result {
            Ok(rows) => Ok(rows.iter().map(row_to_json).collect()),
            Err(e) => {
                error!(query = sql, cause = %e, "SQL execution failed");
                Err(AssistError::Execution {
                    sql: sql.to_string(),
                    cause: e.to_string(),
                })
            }
        }
    }

    /// Materialize the product database from the bulk CSV when missing.
    ///
    /// The build only runs when the DB file is absent; with both the DB and
    /// the CSV missing this fails with a remediation hint naming both paths.
    pub async fn ensure_product_db(&self) -> Result<(), AssistError> {
        if self.product_path.exists() {
            return Ok(());
        }
        if !self.product_csv.exists() {
            return Err(AssistError::DataSourceMissing {
                db: self.product_path.clone(),
                csv: self.product_csv.clone(),
            });
        }

        info!(
            db = %self.product_path.display(),
            csv = %self.product_csv.display(),
            "building product database from bulk CSV"
        );
        build_product_db(&self.product_path, &self.product_csv)
            .await
            .map_err(|e| AssistError::Infrastructure(format!("product DB build failed: {e}")))?;
        Ok(())
    }
}

/// Build the product SQLite database from the bulk CSV.
///
/// Used both by the on-demand fallback and the `storebot init` command.
pub async fn build_product_db(db_path: &Path, csv_path: &Path) -> Result<()> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open product CSV: {}", csv_path.display()))?;

    let mut records: Vec<ProductRecord> = Vec::new();
    for (i, record) in reader.deserialize::<ProductRecord>().enumerate() {
        records.push(record.with_context(|| format!("bad product CSV record at row {i}"))?);
    }

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = db::connect_rw(db_path).await?;

    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product (
            product_link TEXT,
            title TEXT,
            brand TEXT,
            price INTEGER,
            discount REAL,
            avg_rating REAL,
            total_ratings REAL
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    for r in &records {
        sqlx::query(
            "INSERT INTO product (product_link, title, brand, price, discount, avg_rating, total_ratings) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&r.product_link)
        .bind(&r.title)
        .bind(&r.brand)
        .bind(r.price)
        .bind(r.discount)
        .bind(r.avg_rating)
        .bind(r.total_ratings)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!(rows = records.len(), db = %db_path.display(), "product table created");
    pool.close().await;
    Ok(())
}

/// Decode one result row into a JSON-shaped mapping by declared column type.
fn row_to_json(row: &SqliteRow) -> QueryRow {
    let mut map = QueryRow::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let value = match column.type_info().name() {
            "INTEGER" => row
                .try_get::<i64, _>(idx)
                .map(serde_json::Value::from)
                .unwrap_or(serde_json::Value::Null),
            "REAL" => row
                .try_get::<f64, _>(idx)
                .map(serde_json::Value::from)
                .unwrap_or(serde_json::Value::Null),
            "NULL" => serde_json::Value::Null,
            // TEXT, BLOB rendered as text, and expression columns
            _ => row
                .try_get::<String, _>(idx)
                .map(serde_json::Value::from)
                .unwrap_or(serde_json::Value::Null),
        };
        map.insert(column.name().to_string(), value);
    }
    map
}
