use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port to bind to
    #[arg(long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Local path to the sentiment model directory
    #[arg(long, env = "MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Model ID from Hugging Face Hub
    #[arg(long, env = "MODEL_ID")]
    pub model_id: Option<String>,

    /// Model revision/branch on Hugging Face
    #[arg(long, env = "MODEL_REVISION", default_value = "main")]
    pub model_revision: String,

    /// Use PyTorch weights instead of safetensors
    #[arg(long, env = "USE_PTH")]
    pub use_pth: bool,

    /// Run on CPU instead of GPU
    #[arg(long, env = "CPU_ONLY")]
    pub cpu_only: bool,

    /// Maximum token length before truncation
    #[arg(long, env = "MAX_SEQUENCE_LENGTH", default_value = "256")]
    pub max_sequence_length: usize,

    /// API key for the remote completion provider
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Chat-completion endpoint of the remote provider
    #[arg(
        long,
        env = "GROQ_API_URL",
        default_value = "https://api.groq.com/openai/v1/chat/completions"
    )]
    pub api_url: String,

    /// Model identifier sent to the remote provider
    #[arg(long, env = "REMOTE_MODEL", default_value = "llama3-8b-8192")]
    pub remote_model: String,

    /// Cap on generated completion tokens
    #[arg(long, env = "MAX_COMPLETION_TOKENS", default_value = "100")]
    pub max_completion_tokens: u32,

    /// Timeout in seconds for the outbound completion call
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value = "30")]
    pub upstream_timeout_secs: u64,

    /// Single origin allowed by the CORS policy
    #[arg(long, env = "ALLOWED_ORIGIN", default_value = "http://localhost:3000")]
    pub allowed_origin: String,
}

impl Config {
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["sentiment-router"]).unwrap();
        assert_eq!(config.server_address(), "0.0.0.0:8000");
        assert_eq!(config.max_sequence_length, 256);
        assert_eq!(config.max_completion_tokens, 100);
        assert_eq!(config.remote_model, "llama3-8b-8192");
        assert_eq!(config.allowed_origin, "http://localhost:3000");
        assert_eq!(config.upstream_timeout(), Duration::from_secs(30));
        assert!(config.model_path.is_none());
        assert!(config.model_id.is_none());
    }

    #[test]
    fn overrides() {
        let config = Config::try_parse_from([
            "sentiment-router",
            "--host",
            "127.0.0.1",
            "--port",
            "9001",
            "--model-path",
            "/models/sentiment",
            "--api-key",
            "test-key",
            "--upstream-timeout-secs",
            "5",
        ])
        .unwrap();
        assert_eq!(config.server_address(), "127.0.0.1:9001");
        assert_eq!(config.model_path, Some(PathBuf::from("/models/sentiment")));
        assert_eq!(config.api_key.as_deref(), Some("test-key"));
        assert_eq!(config.upstream_timeout(), Duration::from_secs(5));
    }
}
