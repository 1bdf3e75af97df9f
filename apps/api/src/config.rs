use anyhow::{Context, Result};

const DEFAULT_MODEL: &str = "gpt-5";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub llm_timeout_secs: u64,
    pub port: u16,
    /// Upper bound on the whole multipart request body.
    pub max_upload_bytes: usize,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let max_upload_mb = parse_env::<usize>("MAX_UPLOAD_MB", 10)
            .context("MAX_UPLOAD_MB must be a whole number of megabytes")?;

        Ok(Config {
            openai_api_key: require_env("OPENAI_API_KEY")?,
            openai_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            llm_timeout_secs: parse_env("LLM_TIMEOUT_SECS", 60)
                .context("LLM_TIMEOUT_SECS must be a number of seconds")?,
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value '{raw}' for '{key}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let value: u16 = parse_env("RESUME_ANALYZER_TEST_UNSET_PORT", 8080).unwrap();
        assert_eq!(value, 8080);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("RESUME_ANALYZER_TEST_BAD_PORT", "not-a-port");
        let result: Result<u16> = parse_env("RESUME_ANALYZER_TEST_BAD_PORT", 8080);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_env_trims_whitespace() {
        std::env::set_var("RESUME_ANALYZER_TEST_TIMEOUT", " 45 ");
        let value: u64 = parse_env("RESUME_ANALYZER_TEST_TIMEOUT", 60).unwrap();
        assert_eq!(value, 45);
    }
}
