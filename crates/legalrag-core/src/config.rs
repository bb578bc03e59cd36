//! Configuration loader, typed settings, and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_RETRIEVAL__TOP_N`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Load from the current working directory.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load `config.toml` and the `RUST_ENV` overlay from `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Extract and validate the full typed settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub ingest: IngestSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
    pub llm: LlmSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.ingest.chunk_size == 0 {
            return Err(Error::InvalidConfig("ingest.chunk_size must be greater than 0".into()));
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                self.ingest.chunk_overlap, self.ingest.chunk_size
            )));
        }
        if self.retrieval.top_n == 0 {
            return Err(Error::InvalidConfig("retrieval.top_n must be greater than 0".into()));
        }
        if self.retrieval.candidate_k < self.retrieval.top_n {
            return Err(Error::InvalidConfig(format!(
                "retrieval.candidate_k ({}) must be at least retrieval.top_n ({})",
                self.retrieval.candidate_k, self.retrieval.top_n
            )));
        }
        validate_collection_name(&self.storage.collection)
    }
}

/// Name of the key/value table shared by every collection under one root.
pub const META_TABLE: &str = "meta";
/// Suffix of the staging collection a rebuild writes into before swapping.
pub const STAGING_SUFFIX: &str = "__rebuild";
/// Suffix the live collection is moved to while a rebuild is swapped in.
pub const PREVIOUS_SUFFIX: &str = "__previous";

/// Collection names must be non-empty, must not collide with the meta table,
/// and must not end in a suffix reserved for rebuilds.
pub fn validate_collection_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidConfig("storage.collection must not be empty".into()));
    }
    if name == META_TABLE {
        return Err(Error::InvalidConfig(format!("storage.collection '{name}' is reserved for collection metadata")));
    }
    if name.ends_with(STAGING_SUFFIX) || name.ends_with(PREVIOUS_SUFFIX) {
        return Err(Error::InvalidConfig(format!("storage.collection '{name}' uses a suffix reserved for rebuilds")));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding the persisted collections.
    pub root: String,
    /// Stable name of this corpus' collection under `root`.
    pub collection: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { root: "data/index".into(), collection: "legal_documents".into() }
    }
}

impl StorageSettings {
    pub fn root_path(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.root) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub upload_dir: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Skip chunks whose content hash is already in the collection.
    pub skip_duplicates: bool,
    pub extensions: Vec<String>,
    /// PDF pages with fewer cleaned characters than this are dropped
    /// (covers, blank and index pages).
    pub min_page_chars: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            upload_dir: "data/uploads".into(),
            chunk_size: 1000,
            chunk_overlap: 200,
            skip_duplicates: false,
            extensions: vec!["txt".into(), "md".into(), "text".into(), "pdf".into()],
            min_page_chars: 200,
        }
    }
}

impl IngestSettings {
    pub fn upload_path(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.upload_dir) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// Deterministic feature hashing; no model files, no network.
    Hashing,
    /// XLM-RoBERTa sentence embedding model (BGE-M3 layout) loaded from `model_dir`.
    Local,
    /// OpenAI-compatible `/embeddings` endpoint.
    Openai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    /// Output dimensionality for the hashing and remote providers.
    pub dim: usize,
    /// Directory with `tokenizer.json`, `config.json` and `pytorch_model.bin`.
    pub model_dir: String,
    pub max_len: usize,
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Hashing,
            dim: 384,
            model_dir: "models/bge-m3".into(),
            max_len: 256,
            base_url: "https://api.openai.com/v1".into(),
            model: "text-embedding-3-small".into(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

impl EmbeddingSettings {
    pub fn model_path(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.model_dir) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordFilterMode {
    /// Keep candidates containing every query word (case-insensitive substring).
    AllTerms,
    /// As `AllTerms`, but fall back to the unfiltered candidates when none match.
    AllTermsOrVector,
    /// Pure vector ranking.
    #[serde(rename = "none")]
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Width of the vector candidate set fetched before filtering.
    pub candidate_k: usize,
    /// Maximum number of chunks returned to the caller.
    pub top_n: usize,
    pub keyword_filter: KeywordFilterMode,
    pub max_context_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { candidate_k: 20, top_n: 5, keyword_filter: KeywordFilterMode::AllTerms, max_context_chars: 12_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    /// Falls back to `GROQ_API_KEY` when empty.
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".into(),
            model: "llama-3.1-8b-instant".into(),
            api_key: String::new(),
            temperature: 0.0,
            max_tokens: 1024,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self { Self { filter: "info".into() } }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
