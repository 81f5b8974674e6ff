use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// On-disk snapshot of the vector index.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub backtrace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    pub dimension: usize,
    pub model: String,
    /// Optional explicit provider ("openai", "ollama", "hashed").
    /// When absent the provider is inferred from the LLM endpoint/key.
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Base similarity score a top candidate must reach for auto-assignment.
    pub accept_threshold: f32,
    /// Candidates fetched per match invocation.
    pub candidates_k: usize,
    /// How severity adjusts the acceptance threshold. Default: not at all.
    #[serde(default)]
    pub severity_policy: crate::matcher::SeverityPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub top_k: usize,
    /// Hard cap on assembled context length, in characters.
    pub max_context_chars: usize,
    /// Per-hit snippet cap, in characters.
    pub snippet_max_chars: usize,
    pub temperature: f32,
    pub max_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub llm_endpoint: String,
    pub llm_key: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    /// Generation timeout; elapsed means the extractive fallback answers.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_model() -> String {
    "gemma3:27b".to_string()
}

const fn default_llm_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub index: IndexConfig,
    pub logging: LoggingConfig,
    pub embeddings: EmbeddingsConfig,
    pub matching: MatchingConfig,
    pub chat: ChatConfig,
    pub llm: LlmConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(crate::CivicRagError::Io)?;

        let config: Self = toml::from_str(&content).map_err(crate::CivicRagError::TomlParsing)?;

        Ok(config)
    }

    /// Load configuration from default config file path
    pub fn load() -> crate::Result<Self> {
        // Try to load from config.toml first, then fall back to config.example.toml
        if Path::new("config.toml").exists() {
            Self::from_file("config.toml")
        } else if Path::new("config.example.toml").exists() {
            println!(
                "Warning: Using config.example.toml. Please create config.toml for production use."
            );
            Self::from_file("config.example.toml")
        } else {
            Err(crate::CivicRagError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config file found. Please create config.toml or config.example.toml",
            )))
        }
    }

    /// Get index snapshot path
    pub fn index_path(&self) -> &str {
        &self.index.path
    }

    /// Get embedding dimension
    pub fn embedding_dimension(&self) -> usize {
        self.embeddings.dimension
    }

    /// Get embedding model name
    pub fn embedding_model(&self) -> &str {
        &self.embeddings.model
    }

    /// Get base acceptance threshold for matching
    pub fn accept_threshold(&self) -> f32 {
        self.matching.accept_threshold
    }

    /// Get candidate count per match invocation
    pub fn candidates_k(&self) -> usize {
        self.matching.candidates_k
    }

    /// Get chat retrieval depth
    pub fn chat_top_k(&self) -> usize {
        self.chat.top_k
    }

    /// Get assembled context cap in characters
    pub fn max_context_chars(&self) -> usize {
        self.chat.max_context_chars
    }

    /// Get LLM endpoint
    pub fn llm_endpoint(&self) -> &str {
        &self.llm.llm_endpoint
    }

    /// Get LLM key
    pub fn llm_key(&self) -> &str {
        &self.llm.llm_key
    }

    /// Get LLM model
    pub fn llm_model(&self) -> &str {
        &self.llm.llm_model
    }

    /// Get LLM request timeout in seconds
    pub fn llm_timeout_secs(&self) -> u64 {
        self.llm.timeout_secs
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            index: IndexConfig {
                path: "vector_store/index.json".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                backtrace: true,
            },
            embeddings: EmbeddingsConfig {
                dimension: 384,
                model: "all-minilm".to_string(),
                provider: None,
            },
            matching: MatchingConfig {
                accept_threshold: 0.25,
                candidates_k: 5,
                severity_policy: crate::matcher::SeverityPolicy::default(),
            },
            chat: ChatConfig {
                top_k: 6,
                max_context_chars: 3000,
                snippet_max_chars: 800,
                temperature: 0.0,
                max_tokens: 512,
            },
            llm: LlmConfig {
                llm_endpoint: "http://localhost:11434".to_string(),
                llm_key: "ollama".to_string(),
                llm_model: "gemma3:27b".to_string(),
                timeout_secs: 30,
            },
        }
    }
}
