//! Semantic intent routing.
//!
//! Maps a raw query to the route whose registered example utterances are
//! semantically closest to it. Routes are registered once at startup, their
//! utterances embedded a single time, and the set is immutable for the
//! process lifetime.
//!
//! Classification is nearest-neighbor under cosine similarity across all
//! seeded utterances; the winning route must clear a minimum-confidence
//! threshold, otherwise the query is unresolved.

use anyhow::Context;
use std::sync::Arc;
use tracing::debug;

use crate::config::{RouteConfig, RouterConfig};
use crate::embedding::cosine_similarity;
use crate::error::AssistError;
use crate::traits::Embedder;

/// A named intent category with its canonical example utterances.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub utterances: Vec<String>,
}

impl From<RouteConfig> for Route {
    fn from(cfg: RouteConfig) -> Self {
        Self {
            name: cfg.name,
            utterances: cfg.utterances,
        }
    }
}

/// Nearest-neighbor intent classifier over seeded utterance embeddings.
pub struct IntentRouter {
    routes: Vec<Route>,
    /// `(route index, utterance embedding)` for every registered utterance.
    seeded: Vec<(usize, Vec<f32>)>,
    threshold: f32,
    embedder: Arc<dyn Embedder>,
}

impl IntentRouter {
    /// Seed the classifier: embed every registered utterance once.
    ///
    /// Fails if the encoder is unreachable — the router never starts with a
    /// partially seeded set.
    pub async fn seed(
        config: &RouterConfig,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, AssistError> {
        let routes: Vec<Route> = config.routes.iter().cloned().map(Route::from).collect();

        let mut texts = Vec::new();
        let mut owners = Vec::new();
        for (idx, route) in routes.iter().enumerate() {
            for utterance in &route.utterances {
                texts.push(utterance.clone());
                owners.push(idx);
            }
        }

        let vectors = embedder
            .embed(&texts)
            .await
            .map_err(|e| AssistError::Infrastructure(format!("encoder unavailable: {e}")))?;
        if vectors.len() != texts.len() {
            return Err(AssistError::Infrastructure(format!(
                "encoder returned {} vectors for {} utterances",
                vectors.len(),
                texts.len()
            )));
        }

        let seeded = owners.into_iter().zip(vectors).collect();

        Ok(Self {
            routes,
            seeded,
            threshold: config.threshold,
            embedder,
        })
    }

    /// All registered routes.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Classify a query to the route owning the nearest seeded utterance.
    ///
    /// Returns `Ok(None)` when no utterance clears the threshold — the
    /// unresolved outcome. An unreachable encoder is an error, never a
    /// silent default route.
    pub async fn classify(&self, query: &str) -> Result<Option<&str>, AssistError> {
        let query_vec = self
            .embedder
            .embed_one(query)
            .await
            .map_err(|e| AssistError::Infrastructure(format!("encoder unavailable: {e}")))?;

        let mut best: Option<(usize, f32)> = None;
        for (route_idx, utterance_vec) in &self.seeded {
            let score = cosine_similarity(&query_vec, utterance_vec);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((*route_idx, score));
            }
        }

        match best {
            Some((route_idx, score)) if score >= self.threshold => {
                let name = self.routes[route_idx].name.as_str();
                debug!(route = name, score, "query routed");
                Ok(Some(name))
            }
            Some((_, score)) => {
                debug!(score, threshold = self.threshold, "no route cleared threshold");
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

/// Build an [`IntentRouter`] from config, with a readable error context.
pub async fn seed_router(
    config: &RouterConfig,
    embedder: Arc<dyn Embedder>,
) -> anyhow::Result<IntentRouter> {
    IntentRouter::seed(config, embedder)
        .await
        .context("failed to seed intent router")
}
