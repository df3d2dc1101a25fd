//! # Configuration Management
//!
//! This module handles loading the credentials and endpoint URLs for the three upstream
//! services, plus the server settings, from multiple sources:
//! - Configuration files (config.toml / config.json, optional)
//! - Environment variables (with APP__ prefix)
//! - Well-known platform variables (API keys, PORT, VCAP_APP_PORT, VCAP_SERVICES)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **Closures**: `load_with` takes the environment lookup as a closure so tests never touch the real env
//! - **Result<T, E>**: Error handling that forces you to handle potential failures
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Platform variables (TEXT_TO_SPEECH_APIKEY, PORT, etc.)
//! 2. Environment variables (APP__SERVER__PORT, APP__API_KEYS__TEXT_TO_SPEECH, etc.)
//! 3. Configuration file (config.toml or config.json)
//! 4. Default values (defined in the Default impl)
//!
//! The configuration is read once at startup and never changes afterwards.

use anyhow::Result;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

/// Main application configuration that contains all settings.
///
/// ## Rust Concepts:
/// - **#[derive(...)]**: Automatically implements common traits:
///   - `Clone`: Allows making copies of the struct
///   - `Serialize`: Needed so the defaults can be fed back into the `config` builder
///   - `Deserialize`: Can create this struct from TOML, JSON, env vars
/// - **Manual Debug** on `ApiKeysConfig`: secrets must never end up in logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub api_keys: ApiKeysConfig,
    pub services: ServicesConfig,
    pub platform: PlatformConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (hosted)
/// - `port = 3000`: Default listening port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Per-service API keys, plus the translator's instance URL.
///
/// All four values are required; startup fails if any of them is empty.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    pub text_to_speech: String,
    pub speech_to_text: String,
    pub language_translator: String,
    pub language_translator_url: String,
}

impl fmt::Debug for ApiKeysConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeysConfig")
            .field("text_to_speech", &redact(&self.text_to_speech))
            .field("speech_to_text", &redact(&self.speech_to_text))
            .field("language_translator", &redact(&self.language_translator))
            .field("language_translator_url", &self.language_translator_url)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

/// Fixed upstream endpoints that are not tied to a particular service instance.
///
/// ## Fields:
/// - `text_to_speech_url`: Base URL of the speech synthesizer (without `/v1/synthesize`)
/// - `iam_url`: Identity token endpoint used to exchange API keys for bearer tokens
/// - `translator_version`: Dated API version sent on every translate call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub text_to_speech_url: String,
    pub iam_url: String,
    pub translator_version: String,
}

/// Hosting platform detection.
///
/// `hosted` is switched on by the presence of `VCAP_SERVICES`. It enables the HTTPS
/// redirect and hides error details from 5xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub hosted: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(), // Localhost only (safe for development)
                port: 3000,
            },
            api_keys: ApiKeysConfig::default(), // No usable default, must be configured
            services: ServicesConfig {
                text_to_speech_url: "https://stream.watsonplatform.net/text-to-speech/api".to_string(),
                iam_url: "https://iam.cloud.ibm.com/identity/token".to_string(),
                translator_version: "2020-03-30".to_string(),
            },
            platform: PlatformConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// See [`AppConfig::load_with`] for the layering rules.
    pub fn load() -> Result<Self> {
        Self::load_with(|name| env::var(name).ok())
    }

    /// Load configuration, resolving platform variables through `lookup`.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml / config.json (if present)
    /// 3. Override with environment variables prefixed with APP__
    /// 4. Apply platform variables looked up through `lookup`
    ///
    /// ## Rust Concepts:
    /// - **impl Fn**: Any closure taking a variable name and returning `Option<String>`
    /// - **Builder pattern**: Chain method calls to configure the config loader
    /// - **?**: Early return on error (if any step fails, return the error)
    ///
    /// ## Environment Variable Examples:
    /// - `APP__SERVER__HOST=0.0.0.0`: Override server host
    /// - `TEXT_TO_SPEECH_APIKEY=...`: Speech synthesizer key
    /// - `LANGUAGE_TRANSLATOR_URL=https://...`: Translator instance URL
    /// - `VCAP_APP_PORT=8080` or `PORT=8080`: Listening port on hosting platforms
    /// - `VCAP_SERVICES=...`: Any value marks the process as hosted
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            // "__" keeps snake_case keys intact: APP__API_KEYS__TEXT_TO_SPEECH
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        for &(var, key) in PLATFORM_OVERRIDES {
            if let Some(value) = lookup(var) {
                settings = settings.set_override(key, value)?;
            }
        }

        // VCAP_APP_PORT wins over PORT, matching the hosting platform's own precedence
        if let Some(port) = lookup("VCAP_APP_PORT").or_else(|| lookup("PORT")) {
            settings = settings.set_override("server.port", port)?;
        }

        if lookup("VCAP_SERVICES").is_some() {
            settings = settings.set_override("platform.hosted", true)?;
            // Hosted platforms route traffic to the container, not to loopback
            if lookup("HOST").is_none() {
                settings = settings.set_override("server.host", "0.0.0.0")?;
            }
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - Every API key is present
    /// - Every upstream URL parses as an absolute http(s) URL
    ///
    /// ## Why validate:
    /// A missing credential would otherwise only show up as a 401 on the first request.
    /// Failing here stops the process before it serves broken endpoints.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        let keys = [
            ("api_keys.text_to_speech", &self.api_keys.text_to_speech),
            ("api_keys.speech_to_text", &self.api_keys.speech_to_text),
            ("api_keys.language_translator", &self.api_keys.language_translator),
        ];
        for (name, value) in keys {
            if value.trim().is_empty() {
                return Err(anyhow::anyhow!("Missing required API key: {}", name));
            }
        }

        let urls = [
            ("api_keys.language_translator_url", &self.api_keys.language_translator_url),
            ("services.text_to_speech_url", &self.services.text_to_speech_url),
            ("services.iam_url", &self.services.iam_url),
        ];
        for (name, value) in urls {
            validate_url(name, value)?;
        }

        if self.services.translator_version.trim().is_empty() {
            return Err(anyhow::anyhow!("services.translator_version cannot be empty"));
        }

        Ok(())
    }
}

/// Platform variable name → config key.
const PLATFORM_OVERRIDES: &[(&str, &str)] = &[
    ("HOST", "server.host"),
    ("TEXT_TO_SPEECH_APIKEY", "api_keys.text_to_speech"),
    ("SPEECH_TO_TEXT_APIKEY", "api_keys.speech_to_text"),
    ("LANGUAGE_TRANSLATOR_APIKEY", "api_keys.language_translator"),
    ("LANGUAGE_TRANSLATOR_URL", "api_keys.language_translator_url"),
];

fn validate_url(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow::anyhow!("Missing required URL: {}", name));
    }
    let url = Url::parse(value).map_err(|e| anyhow::anyhow!("Invalid URL for {}: {}", name, e))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow::anyhow!("URL for {} must use http or https", name));
    }
    Ok(())
}

#[cfg(test)]
impl AppConfig {
    /// Configuration with every upstream pointed at a single mock server.
    pub fn for_upstream(base_url: &str) -> Self {
        let mut config = AppConfig::default();
        config.api_keys = ApiKeysConfig {
            text_to_speech: "tts-key".to_string(),
            speech_to_text: "stt-key".to_string(),
            language_translator: "lt-key".to_string(),
            language_translator_url: format!("{}/language-translator", base_url),
        };
        config.services.text_to_speech_url = format!("{}/text-to-speech", base_url);
        config.services.iam_url = format!("{}/identity/token", base_url);
        config
    }
}

/// Tests for the configuration module.
///
/// ## Testing philosophy:
/// Platform variables are injected through `load_with`, so the tests stay independent
/// of whatever happens to be set in the test runner's environment.
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    const ALL_KEYS: &[(&str, &str)] = &[
        ("TEXT_TO_SPEECH_APIKEY", "tts"),
        ("SPEECH_TO_TEXT_APIKEY", "stt"),
        ("LANGUAGE_TRANSLATOR_APIKEY", "lt"),
        ("LANGUAGE_TRANSLATOR_URL", "https://api.example.com/language-translator/api"),
    ];

    /// Defaults carry sensible endpoints but no credentials, so they must not validate.
    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.services.translator_version, "2020-03-30");
        assert!(!config.platform.hosted);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_platform_variables_fill_credentials() {
        let config = AppConfig::load_with(lookup_from(ALL_KEYS)).unwrap();
        assert_eq!(config.api_keys.text_to_speech, "tts");
        assert_eq!(config.api_keys.speech_to_text, "stt");
        assert_eq!(config.api_keys.language_translator, "lt");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_precedence() {
        let mut vars = ALL_KEYS.to_vec();
        vars.push(("PORT", "8080"));
        let config = AppConfig::load_with(lookup_from(&vars)).unwrap();
        assert_eq!(config.server.port, 8080);

        vars.push(("VCAP_APP_PORT", "6001"));
        let config = AppConfig::load_with(lookup_from(&vars)).unwrap();
        assert_eq!(config.server.port, 6001);
    }

    #[test]
    fn test_vcap_services_marks_hosted() {
        let mut vars = ALL_KEYS.to_vec();
        vars.push(("VCAP_SERVICES", "{}"));
        let config = AppConfig::load_with(lookup_from(&vars)).unwrap();
        assert!(config.platform.hosted);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_missing_key_fails_validation() {
        let mut config = AppConfig::for_upstream("http://127.0.0.1:9");
        assert!(config.validate().is_ok());

        config.api_keys.speech_to_text = "  ".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("api_keys.speech_to_text"));
    }

    #[test]
    fn test_invalid_url_fails_validation() {
        let mut config = AppConfig::for_upstream("http://127.0.0.1:9");
        config.api_keys.language_translator_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.api_keys.language_translator_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_output_hides_keys() {
        let config = AppConfig::for_upstream("http://127.0.0.1:9");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("tts-key"));
        assert!(debug.contains("<redacted>"));
    }
}
