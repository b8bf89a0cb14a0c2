use callrelay_core::{GenerationSettings, llm_client::GEMINI_OPENAI_BASE};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Credentials and numbers used to originate calls through Twilio.
#[derive(Clone, Debug)]
pub struct TwilioSettings {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub target_number: String,
    pub api_base: String,
}

/// What the telephony provider is told to dial into once the call connects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayTarget {
    pub ws_url: String,
    pub welcome_greeting: String,
    pub tts_provider: String,
    pub voice: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub public_domain: String,
    pub twilio: TwilioSettings,
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub generation: GenerationSettings,
    pub model_timeout: Duration,
    pub welcome_greeting: String,
    pub tts_provider: String,
    pub voice: String,
    pub fallback_reply: String,
    pub log_level: Level,
    pub prompts_path: PathBuf,
}

pub const DEFAULT_WELCOME_GREETING: &str = "Hi there! Got a minute to talk about laundry?";
pub const DEFAULT_FALLBACK_REPLY: &str = "Sorry, I lost my train of thought. Could you say that again?";

fn required(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}

fn optional(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let port: u16 = parsed("PORT", 8080)?;
        let bind_address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

        let public_domain = required("NGROK_URL")?
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();

        let twilio = TwilioSettings {
            account_sid: required("TWILIO_ACCOUNT_SID")?,
            auth_token: required("TWILIO_AUTH_TOKEN")?,
            from_number: required("TWILIO_PHONE_FROM")?,
            target_number: required("TARGET_PHONE")?,
            api_base: optional("TWILIO_API_BASE", "https://api.twilio.com"),
        };

        let gemini_api_key = required("GEMINI_API_KEY")?;
        let gemini_api_base = optional("GEMINI_API_BASE", GEMINI_OPENAI_BASE);

        let defaults = GenerationSettings::default();
        let generation = GenerationSettings {
            model: optional("CHAT_MODEL", &defaults.model),
            temperature: parsed("MODEL_TEMPERATURE", defaults.temperature)?,
            max_output_tokens: parsed("MODEL_MAX_OUTPUT_TOKENS", defaults.max_output_tokens)?,
        };
        let model_timeout_secs: u64 = parsed("MODEL_TIMEOUT_SECS", 20)?;
        if model_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "MODEL_TIMEOUT_SECS".to_string(),
                "must be at least 1 second".to_string(),
            ));
        }
        let model_timeout = Duration::from_secs(model_timeout_secs);

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        Ok(Self {
            bind_address,
            public_domain,
            twilio,
            gemini_api_key,
            gemini_api_base,
            generation,
            model_timeout,
            welcome_greeting: optional("WELCOME_GREETING", DEFAULT_WELCOME_GREETING),
            tts_provider: optional("TTS_PROVIDER", "ElevenLabs"),
            voice: optional("TTS_VOICE", "FGY2WhTYpPnrIDTdsKH5"),
            fallback_reply: optional("FALLBACK_REPLY", DEFAULT_FALLBACK_REPLY),
            log_level,
            prompts_path,
        })
    }

    /// WebSocket URL the telephony provider connects the relay to.
    pub fn ws_url(&self) -> String {
        format!("wss://{}/ws", self.public_domain)
    }

    /// URL the telephony provider fetches call-control instructions from.
    pub fn twiml_url(&self) -> String {
        format!("https://{}/twiml", self.public_domain)
    }

    pub fn relay_target(&self) -> RelayTarget {
        RelayTarget {
            ws_url: self.ws_url(),
            welcome_greeting: self.welcome_greeting.clone(),
            tts_provider: self.tts_provider.clone(),
            voice: self.voice.clone(),
        }
    }
}
