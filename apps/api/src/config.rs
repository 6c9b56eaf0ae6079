use anyhow::{bail, Context, Result};

/// Default upload ceiling: 10 MiB.
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// How uploads are framed before generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceDetectionMode {
    /// Plain centre square crop, no detector call.
    Off,
    /// Ask Gemini for face boxes and crop around the largest one.
    Gemini,
}

impl FaceDetectionMode {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "off" | "none" | "" => Ok(Self::Off),
            "gemini" => Ok(Self::Gemini),
            other => bail!("FACE_DETECTION must be 'off' or 'gemini', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub port: u16,
    pub rust_log: String,
    pub max_upload_bytes: usize,
    pub face_detection: FaceDetectionMode,
    pub session_ttl_secs: u64,
    /// Lets URL imports reach loopback and private networks. Local development only.
    pub allow_private_url_imports: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            gemini_api_base: std::env::var("GEMINI_API_BASE")
                .unwrap_or_else(|_| DEFAULT_GEMINI_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            max_upload_bytes: optional_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            face_detection: FaceDetectionMode::parse(
                &std::env::var("FACE_DETECTION").unwrap_or_default(),
            )?,
            session_ttl_secs: optional_env("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
            allow_private_url_imports: optional_env("ALLOW_PRIVATE_URL_IMPORTS", false)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Configuration used by handler tests; never reaches the network.
    pub fn for_tests() -> Self {
        Config {
            gemini_api_key: "test-key".to_string(),
            gemini_api_base: "http://127.0.0.1:9".to_string(),
            port: 0,
            rust_log: "debug".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            face_detection: FaceDetectionMode::Off,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            allow_private_url_imports: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_detection_mode_parsing() {
        assert_eq!(FaceDetectionMode::parse("off").unwrap(), FaceDetectionMode::Off);
        assert_eq!(FaceDetectionMode::parse("").unwrap(), FaceDetectionMode::Off);
        assert_eq!(
            FaceDetectionMode::parse(" Gemini ").unwrap(),
            FaceDetectionMode::Gemini
        );
        assert!(FaceDetectionMode::parse("mediapipe").is_err());
    }
}
