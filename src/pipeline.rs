//! The dispatcher: one query in, one user-displayable answer out.
//!
//! [`Assistant`] owns the injected collaborators (router, FAQ engine, SQL
//! chain, completion client) and runs each query through the strictly
//! sequential pipeline: route → retrieve/compile → execute → synthesize.
//!
//! [`Assistant::ask`] never fails. Every pipeline error is caught here,
//! logged with context, and mapped to the user-visible string for its kind;
//! no raw error ever reaches the front end.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, warn};

use crate::config::Config;
use crate::db;
use crate::error::AssistError;
use crate::faq::FaqEngine;
use crate::router::{seed_router, IntentRouter};
use crate::sql::{extract, validate, Extraction, SqlChain};
use crate::synth::synthesize;
use crate::traits::{ChatCompletion, Embedder};

const APOLOGY: &str =
    "Sorry, something went wrong while answering your question. Please try again in a moment.";

/// The assembled query-answering pipeline.
pub struct Assistant {
    router: IntentRouter,
    faq: FaqEngine,
    sql: SqlChain,
    chat: Arc<dyn ChatCompletion>,
}

impl Assistant {
    /// Assemble the pipeline: connect the assistant database and seed the
    /// intent router (one embedding batch over all registered utterances).
    pub async fn new(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatCompletion>,
    ) -> Result<Self> {
        let pool = db::connect_rw(&config.db.assistant_path).await?;
        let faq = FaqEngine::new(
            pool,
            config.faq.collection.clone(),
            config.faq.top_k,
            embedder.clone(),
            chat.clone(),
        );
        let router = seed_router(&config.router, embedder).await?;
        let sql = SqlChain::new(
            chat.clone(),
            config.db.product_path.clone(),
            config.db.product_csv.clone(),
        );

        Ok(Self {
            router,
            faq,
            sql,
            chat,
        })
    }

    pub fn router(&self) -> &IntentRouter {
        &self.router
    }

    pub fn faq(&self) -> &FaqEngine {
        &self.faq
    }

    /// Answer one query end-to-end. Always returns displayable text.
    pub async fn ask(&self, query: &str) -> String {
        let route = match self.router.classify(query).await {
            Ok(route) => route,
            Err(e) => return user_message(&e),
        };

        match route {
            Some("faq") => self
                .faq
                .answer(query)
                .await
                .unwrap_or_else(|e| user_message(&e)),
            Some("product") => self
                .product_chain(query)
                .await
                .unwrap_or_else(|e| user_message(&e)),
            Some(other) => {
                warn!(route = other, "route resolved but not handled");
                format!("Sorry, '{other}' questions are not supported yet.")
            }
            None => {
                warn!(query, "no route resolved");
                "Sorry, this type of question is not supported yet.".to_string()
            }
        }
    }

    /// The product path: compile → extract → validate → execute → synthesize.
    async fn product_chain(&self, question: &str) -> Result<String, AssistError> {
        let completion = self.sql.generate_query(question).await?;

        let sql = match extract(&completion) {
            Extraction::Extracted(sql) => sql,
            Extraction::NotFound => {
                warn!(completion = %completion, "no SQL block in completion output");
                return Err(AssistError::QueryNotFound);
            }
        };

        validate(&sql).map_err(AssistError::Rejected)?;

        let rows = self.sql.run_query(&sql).await?;
        synthesize(&self.chat, question, &rows).await
    }
}

/// Map a pipeline error to its user-visible string, logging the detail.
fn user_message(err: &AssistError) -> String {
    match err {
        AssistError::Infrastructure(detail) => {
            error!(detail = %detail, "infrastructure failure");
            APOLOGY.to_string()
        }
        AssistError::FaqIndexMissing(collection) => {
            error!(collection = %collection, "FAQ collection missing");
            "The FAQ knowledge base has not been set up yet. Please run `storebot ingest` first."
                .to_string()
        }
        AssistError::QueryNotFound => {
            "Sorry, I could not generate a query for that question.".to_string()
        }
        AssistError::Rejected(reason) => {
            warn!(reason = %reason, "unsafe query rejected");
            format!("That request was rejected by the safety check: {reason}.")
        }
        AssistError::Execution { cause, .. } => {
            format!("Error executing the product query: {cause}")
        }
        AssistError::DataSourceMissing { .. } => {
            // The Display impl carries the remediation hint with both paths.
            format!("{err}")
        }
        AssistError::Other(detail) => {
            error!(%detail, "unexpected failure");
            APOLOGY.to_string()
        }
    }
}
