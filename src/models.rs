//! Core data models used throughout storebot.
//!
//! These types represent the FAQ entries, product records, and query results
//! that flow through the routing and answer-generation pipeline.

use serde::{Deserialize, Serialize};

/// One question/answer pair in the FAQ collection.
///
/// Ids are generated sequentially at ingestion time (`id_0`, `id_1`, …) and
/// are unique within a single ingestion run. Insertion order is irrelevant
/// to retrieval, which is similarity-ranked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqEntry {
    pub id: String,
    pub question: String,
    pub answer: String,
}

/// An immutable product snapshot read from the relational store.
///
/// `price` is in Indian Rupees; `discount` is a fraction in `[0, 1)`
/// (0.2 = 20% off); `avg_rating` is in `[0, 5]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_link: String,
    pub title: String,
    pub brand: String,
    pub price: i64,
    pub discount: f64,
    pub avg_rating: f64,
    pub total_ratings: f64,
}

/// One result row from an executed product query, keyed by column name.
///
/// Rows are JSON-shaped because the generated SQL is only *expected* to be
/// `SELECT *` over the product table — the executor decodes whatever columns
/// actually come back.
pub type QueryRow = serde_json::Map<String, serde_json::Value>;
