use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub faq: FaqConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// Assistant database (holds the FAQ collection).
    pub assistant_path: PathBuf,
    /// Read-only product database.
    pub product_path: PathBuf,
    /// Bulk CSV used to build the product database when it is missing.
    pub product_csv: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FaqConfig {
    #[serde(default = "default_faq_csv")]
    pub csv_path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for FaqConfig {
    fn default() -> Self {
        Self {
            csv_path: default_faq_csv(),
            collection: default_collection(),
            top_k: default_top_k(),
        }
    }
}

fn default_faq_csv() -> PathBuf {
    PathBuf::from("./resources/faq_data.csv")
}
fn default_collection() -> String {
    "faqs".to_string()
}
fn default_top_k() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct RouterConfig {
    /// Minimum cosine similarity a seeded utterance must reach for its
    /// route to be selected. Below this the query is unresolved.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            routes: default_routes(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RouteConfig {
    pub name: String,
    pub utterances: Vec<String>,
}

fn default_threshold() -> f32 {
    0.5
}

/// Canonical example utterances for the two built-in routes.
fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig {
            name: "faq".to_string(),
            utterances: [
                "What is your return policy?",
                "Tell me about your return policy",
                "How do returns work?",
                "How can I cancel my order?",
                "Do you offer international shipping?",
                "How can I contact customer support?",
                "What payment methods do you accept?",
                "Do you provide cash on delivery?",
                "What is your defective product policy?",
                "Policy for damaged or faulty items",
                "If product is defective, what to do?",
                "Who do I contact for a damaged order?",
                "Do I get discount with the HDFC credit card?",
                "How can I track my order?",
                "How long does it take to process a refund?",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        },
        RouteConfig {
            name: "product".to_string(),
            utterances: [
                "Show me smartphones under 20000",
                "Smartphones below 20000",
                "Pink puma shoes under 10000",
                "Wireless earbuds in stock",
                "Price of iPhone 15 Pro",
                "Laptops for gaming",
                "Red dress size M",
                "Discounts on shoes",
                "I want to buy nike shoes that have 50% discount.",
                "Are there any shoes under Rs. 3000?",
                "Do you have formal shoes in size 9?",
                "Are there any Puma shoes on sale?",
                "What is the price of puma running shoes?",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        },
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible API base (chat completions and embeddings).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Embedding model identifier. The chat model comes from `GROQ_MODEL`.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            embedding_model: default_embedding_model(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate router
    if !(0.0..=1.0).contains(&config.router.threshold) {
        anyhow::bail!("router.threshold must be in [0.0, 1.0]");
    }
    if config.router.routes.is_empty() {
        anyhow::bail!("router.routes must not be empty");
    }
    for route in &config.router.routes {
        if route.utterances.is_empty() {
            anyhow::bail!("route '{}' has no example utterances", route.name);
        }
    }

    // Validate FAQ retrieval
    if config.faq.top_k < 1 {
        anyhow::bail!("faq.top_k must be >= 1");
    }
    if config.faq.collection.is_empty()
        || !config
            .faq
            .collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        anyhow::bail!("faq.collection must be a plain [A-Za-z0-9_] table name");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &std::path::Path, body: &str) -> PathBuf {
        let path = dir.join("storebot.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    const MINIMAL: &str = r#"
[db]
assistant_path = "/tmp/assistant.sqlite"
product_path = "/tmp/products.db"
product_csv = "/tmp/products.csv"

[server]
bind = "127.0.0.1:7410"
"#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(tmp.path(), MINIMAL);
        let cfg = load_config(&path).unwrap();

        assert_eq!(cfg.faq.top_k, 2);
        assert_eq!(cfg.faq.collection, "faqs");
        assert!((cfg.router.threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(cfg.router.routes.len(), 2);
        assert_eq!(cfg.router.routes[0].name, "faq");
        assert_eq!(cfg.router.routes[1].name, "product");
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let body = format!("{MINIMAL}\n[router]\nthreshold = 1.5\n");
        let path = write_config(tmp.path(), &body);
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_collection_name_must_be_plain() {
        let tmp = tempfile::tempdir().unwrap();
        let body = format!("{MINIMAL}\n[faq]\ncollection = \"faqs; drop\"\n");
        let path = write_config(tmp.path(), &body);
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_route_without_utterances_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let body = format!(
            "{MINIMAL}\n[router]\nthreshold = 0.5\n[[router.routes]]\nname = \"faq\"\nutterances = []\n"
        );
        let path = write_config(tmp.path(), &body);
        assert!(load_config(&path).is_err());
    }
}
