use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use std::{env, fs, path::PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::session::{Boundary, Identifier, SessionConfig};

pub const PAGE_SIZE: &str = "SCREENFLOW_USSD_PAGE_SIZE";
pub const NEXT_OPTION: &str = "SCREENFLOW_USSD_NEXT_OPTION";
pub const NEXT_TEXT: &str = "SCREENFLOW_USSD_NEXT_TEXT";
pub const BACK_OPTION: &str = "SCREENFLOW_USSD_BACK_OPTION";
pub const BACK_TEXT: &str = "SCREENFLOW_USSD_BACK_TEXT";
pub const USSD_SESSION_TTL: &str = "SCREENFLOW_USSD_SESSION_TTL";
pub const RESUMABLE_SESSIONS: &str = "SCREENFLOW_USSD_RESUMABLE_SESSIONS";
pub const CHAT_SESSION_TTL: &str = "SCREENFLOW_CHAT_SESSION_TTL";
pub const COMBINE_VALIDATION_ERROR: &str = "SCREENFLOW_COMBINE_VALIDATION_ERROR";
pub const SESSION_BOUNDARIES: &str = "SCREENFLOW_SESSION_BOUNDARIES";
pub const SESSION_IDENTIFIER: &str = "SCREENFLOW_SESSION_IDENTIFIER";
pub const HASH_PHONE_NUMBERS: &str = "SCREENFLOW_HASH_PHONE_NUMBERS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no gateway configured")]
    MissingGateway,

    #[error("no session store configured")]
    MissingSessionStore,

    #[error("flow `{flow}` has no action named `{action}`")]
    UnknownAction { flow: String, action: String },

    #[error("invalid value `{value}` for {key}: {reason}")]
    Invalid { key: String, value: String, reason: String },

    #[error("page size {page_size} leaves no room for text next to the navigation options")]
    PageSizeTooSmall { page_size: usize },

    #[error("could not update {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything tunable about flow execution, built once and injected into
/// each processor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct FlowConfig {
    pub ussd: UssdConfig,
    pub chat: ChatConfig,
    pub prompt: PromptConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct UssdConfig {
    pub pagination: PaginationConfig,
    /// Seconds a USSD session survives without activity.
    pub session_ttl_secs: u64,
    /// Key sessions by phone number so a dropped dial can pick up where it left off.
    pub resumable_sessions: bool,
}

impl Default for UssdConfig {
    fn default() -> Self {
        Self {
            pagination: PaginationConfig::default(),
            session_ttl_secs: 300,
            resumable_sessions: false,
        }
    }
}

impl UssdConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Provider session ids unless sessions should survive a dropped dial.
    pub fn default_identifier(&self) -> Identifier {
        if self.resumable_sessions {
            Identifier::Durable
        } else {
            Identifier::Ephemeral
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    pub session_ttl_secs: u64,
    /// Buttons can carry a media header only up to this many choices.
    pub max_choices_with_media: Option<usize>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 7 * 24 * 60 * 60,
            max_choices_with_media: Some(3),
        }
    }
}

impl ChatConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct PromptConfig {
    /// Show the validation error above the original question instead of
    /// replacing it.
    pub combine_validation_error: bool,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            combine_validation_error: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct PaginationConfig {
    /// Maximum characters per USSD screen, navigation included.
    pub page_size: usize,
    pub next_option: String,
    pub next_text: String,
    pub back_option: String,
    pub back_text: String,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: 182,
            next_option: "#".into(),
            next_text: "More".into(),
            back_option: "0".into(),
            back_text: "Back".into(),
        }
    }
}

impl PaginationConfig {
    /// The navigation line for the next page, e.g. `# More`.
    pub fn next_label(&self) -> String {
        format!("{} {}", self.next_option, self.next_text)
    }

    pub fn back_label(&self) -> String {
        format!("{} {}", self.back_option, self.back_text)
    }
}

impl FlowConfig {
    /// Defaults overridden by whatever `manager` holds.
    pub async fn from_manager(manager: &ConfigManager) -> Result<Self, ConfigError> {
        let source = manager.0.as_ref();
        let mut config = FlowConfig::default();

        let pagination = &mut config.ussd.pagination;
        if let Some(page_size) = parse(source, PAGE_SIZE).await? {
            pagination.page_size = page_size;
        }
        for (key, field) in [
            (NEXT_OPTION, &mut pagination.next_option),
            (NEXT_TEXT, &mut pagination.next_text),
            (BACK_OPTION, &mut pagination.back_option),
            (BACK_TEXT, &mut pagination.back_text),
        ] {
            if let Some(value) = source.get(key).await {
                *field = value;
            }
        }

        if let Some(ttl) = parse(source, USSD_SESSION_TTL).await? {
            config.ussd.session_ttl_secs = ttl;
        }
        if let Some(resumable) = parse(source, RESUMABLE_SESSIONS).await? {
            config.ussd.resumable_sessions = resumable;
        }
        if let Some(ttl) = parse(source, CHAT_SESSION_TTL).await? {
            config.chat.session_ttl_secs = ttl;
        }
        if let Some(combine) = parse(source, COMBINE_VALIDATION_ERROR).await? {
            config.prompt.combine_validation_error = combine;
        }
        if let Some(hash) = parse(source, HASH_PHONE_NUMBERS).await? {
            config.session.hash_phone_numbers = hash;
        }
        if let Some(identifier) = parse::<Identifier>(source, SESSION_IDENTIFIER).await? {
            config.session.identifier = Some(identifier);
        }
        if let Some(raw) = source.get(SESSION_BOUNDARIES).await {
            config.session.boundaries = parse_boundaries(&raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let pagination = &self.ussd.pagination;
        let reserved = 3 + pagination.next_label().chars().count() + pagination.back_label().chars().count() + 1;
        if pagination.page_size <= reserved {
            return Err(ConfigError::PageSizeTooSmall {
                page_size: pagination.page_size,
            });
        }
        Ok(())
    }
}

async fn parse<T>(source: &dyn ConfigManagerType, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(value) = source.get(key).await else {
        return Ok(None);
    };
    value.trim().parse::<T>().map(Some).map_err(|err| ConfigError::Invalid {
        key: key.to_string(),
        value: value.clone(),
        reason: err.to_string(),
    })
}

/// Comma separated; `none` or an empty value means no boundaries.
fn parse_boundaries(raw: &str) -> Result<Vec<Boundary>, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(|part| {
            part.trim().parse::<Boundary>().map_err(|err| ConfigError::Invalid {
                key: SESSION_BOUNDARIES.to_string(),
                value: raw.to_string(),
                reason: err.to_string(),
            })
        })
        .collect()
}

/// A source of string settings.
#[async_trait]
pub trait ConfigManagerType: Send + Sync {
    async fn as_vec(&self) -> Vec<(String, String)> {
        let mut config = vec![];
        for key in self.keys().await {
            if let Some(value) = self.get(&key).await {
                config.push((key, value));
            }
        }
        config
    }
    async fn keys(&self) -> Vec<String>;
    async fn get(&self, key: &str) -> Option<String>;
    async fn del(&self, key: &str);
    async fn set(&self, key: &str, value: &str) -> Result<(), ConfigError>;
    fn clone_box(&self) -> Box<dyn ConfigManagerType>;
    fn debug_box(&self) -> String;
}

pub struct ConfigManager(pub Box<dyn ConfigManagerType>);

impl ConfigManager {
    pub fn into_inner(self) -> Box<dyn ConfigManagerType> {
        self.0
    }
}

impl Clone for ConfigManager {
    fn clone(&self) -> Self {
        ConfigManager(self.0.clone_box())
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.debug_box())
    }
}

/// Process environment, seeded from an optional `.env` file.
///
/// Writes go to an in-process overlay (consulted before the environment)
/// and are persisted to the `.env` file so they survive a restart.
#[derive(Clone, Debug)]
pub struct EnvConfigManager {
    env_file: PathBuf,
    overlay: std::sync::Arc<DashMap<String, Option<String>>>,
}

impl EnvConfigManager {
    pub fn new(env_file: PathBuf) -> Box<Self> {
        if env_file.exists() {
            match dotenvy::from_path(&env_file) {
                Ok(()) => info!("Loaded .env from {}", env_file.display()),
                Err(err) => warn!("could not parse {}: {}", env_file.display(), err),
            }
        } else {
            info!("no .env at {}, using the process environment", env_file.display());
        }

        Box::new(Self {
            env_file,
            overlay: std::sync::Arc::new(DashMap::new()),
        })
    }

    fn rewrite_env_file(&self, key: &str, value: Option<&str>) -> Result<(), ConfigError> {
        let content = fs::read_to_string(&self.env_file).unwrap_or_default();
        let mut lines: Vec<String> = Vec::new();
        let mut found = false;

        for line in content.lines() {
            match line.split_once('=') {
                Some((k, _)) if k.trim() == key => {
                    found = true;
                    if let Some(value) = value {
                        lines.push(format!("{key}={value}"));
                    }
                }
                _ => lines.push(line.to_string()),
            }
        }
        if let (false, Some(value)) = (found, value) {
            lines.push(format!("{key}={value}"));
        }

        fs::write(&self.env_file, lines.join("\n")).map_err(|source| ConfigError::Io {
            path: self.env_file.clone(),
            source,
        })
    }
}

#[async_trait]
impl ConfigManagerType for EnvConfigManager {
    async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = env::vars()
            .map(|(k, _)| k)
            .filter(|k| !self.overlay.contains_key(k))
            .collect();
        keys.extend(
            self.overlay
                .iter()
                .filter(|entry| entry.value().is_some())
                .map(|entry| entry.key().clone()),
        );
        keys
    }

    async fn get(&self, key: &str) -> Option<String> {
        match self.overlay.get(key) {
            Some(entry) => entry.value().clone(),
            None => env::var(key).ok(),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.overlay.insert(key.to_string(), Some(value.to_string()));
        self.rewrite_env_file(key, Some(value))
    }

    async fn del(&self, key: &str) {
        self.overlay.insert(key.to_string(), None);
        if self.env_file.exists() {
            if let Err(err) = self.rewrite_env_file(key, None) {
                warn!("could not remove {} from .env: {}", key, err);
            }
        }
    }

    fn clone_box(&self) -> Box<dyn ConfigManagerType> {
        Box::new(self.clone())
    }

    fn debug_box(&self) -> String {
        "EnvConfigManager".to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MapConfigManager {
    #[schemars(with = "std::collections::HashMap<String, String>")]
    map: DashMap<String, String>,
}

impl MapConfigManager {
    pub fn new() -> Box<Self> {
        Box::new(Self { map: DashMap::new() })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Box<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Box::new(Self { map })
    }
}

#[async_trait]
impl ConfigManagerType for MapConfigManager {
    async fn keys(&self) -> Vec<String> {
        self.map.iter().map(|entry| entry.key().clone()).collect()
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).map(|v| v.clone())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn del(&self, key: &str) {
        self.map.remove(key);
    }

    fn clone_box(&self) -> Box<dyn ConfigManagerType> {
        Box::new(self.clone())
    }

    fn debug_box(&self) -> String {
        format!("MapConfigManager({} entries)", self.map.len())
    }
}
