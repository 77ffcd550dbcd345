//! Configuration management
//!
//! 設定は以下の優先順位で読み込まれます:
//! 1. 環境変数
//! 2. canvass-gateway.toml 設定ファイル
//! 3. デフォルト値
//!
//! 設定ファイル内では `${VAR_NAME}` 形式で環境変数を展開できます。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::conversation::Script;
use crate::Error;

/// Default config file looked up by [`Config::load`]
pub const CONFIG_FILE: &str = "canvass-gateway.toml";

/// WhatsApp Cloud API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Bearer token for the Graph API
    #[serde(default)]
    pub access_token: String,

    /// Business phone number ID; also the bot's own sender address
    #[serde(default)]
    pub phone_number_id: String,

    /// Secret echoed back by Meta during webhook verification
    #[serde(default = "default_verify_token")]
    pub verify_token: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for one outbound send
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            verify_token: default_verify_token(),
            api_version: default_api_version(),
            base_url: default_base_url(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port for the webhook server
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer key required by `/metrics`. If unset the endpoint is open.
    pub metrics_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            metrics_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Messages handled concurrently before new ones wait for a slot
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandoffConfig {
    /// Advisors who get a WhatsApp message on every handoff
    #[serde(default)]
    pub agent_numbers: Vec<String>,
}

/// Main configuration for canvass-gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub handoff: HandoffConfig,

    /// Conversation texts
    #[serde(default)]
    pub script: Script,
}

fn default_verify_token() -> String {
    "canvass-verify".to_string()
}

fn default_api_version() -> String {
    "v20.0".to_string()
}

fn default_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_send_timeout_secs() -> u64 {
    10
}

fn default_port() -> u16 {
    8000
}

fn default_db_path() -> String {
    "data/canvass-gateway.db".to_string()
}

fn default_max_in_flight() -> usize {
    64
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// 設定ファイルから環境変数を展開する
    ///
    /// `${VAR_NAME}` 形式の文字列を環境変数の値に置換します。
    /// 環境変数が存在しない場合は空文字列になります。
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // '{' を消費

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// TOML 設定ファイルから設定を読み込む
    ///
    /// 設定ファイル内の `${VAR_NAME}` は環境変数の値に置換され、
    /// その後で環境変数による上書きが適用されます。
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut cfg = Self::from_toml_str(&toml_content)?;
        cfg.apply_env_overrides();

        Ok(cfg)
    }

    /// Parse TOML text, expanding `${VAR}` references first
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let expanded_content = Self::expand_env_vars(content);

        toml::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// デフォルトパスから設定を読み込む
    ///
    /// 1. `./canvass-gateway.toml`
    /// 2. 見つからない場合は環境変数のみ
    pub fn load() -> crate::Result<Self> {
        if Path::new(CONFIG_FILE).exists() {
            return Self::from_toml_file(CONFIG_FILE);
        }

        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> crate::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Config::load`], but missing WhatsApp credentials fall back to
    /// defaults. Used by modes that never talk to the Cloud API.
    pub fn load_offline() -> crate::Result<Self> {
        if Path::new(CONFIG_FILE).exists() {
            return Self::from_toml_file(CONFIG_FILE);
        }

        let mut cfg = Config::default();
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> crate::Result<Self> {
        let access_token = lookup("WHATSAPP_TOKEN")
            .ok_or_else(|| Error::Config("WHATSAPP_TOKEN not set".to_string()))?;
        let phone_number_id = lookup("PHONE_NUMBER_ID")
            .ok_or_else(|| Error::Config("PHONE_NUMBER_ID not set".to_string()))?;

        let mut cfg = Config {
            whatsapp: WhatsAppConfig {
                access_token,
                phone_number_id,
                ..WhatsAppConfig::default()
            },
            ..Config::default()
        };
        cfg.apply_overrides(lookup);

        Ok(cfg)
    }

    /// 環境変数で設定を上書きする
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Only non-empty values override (respect TOML config)
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        // WhatsApp 設定の上書き
        if let Some(token) = get("WHATSAPP_TOKEN") {
            self.whatsapp.access_token = token;
        }
        if let Some(id) = get("PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = id;
        }
        if let Some(token) = get("VERIFY_TOKEN") {
            self.whatsapp.verify_token = token;
        }
        if let Some(version) = get("WHATSAPP_API_VERSION") {
            self.whatsapp.api_version = version;
        }
        if let Some(url) = get("WHATSAPP_BASE_URL") {
            self.whatsapp.base_url = url;
        }
        if let Some(secs) = get("SEND_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.whatsapp.send_timeout_secs = secs;
        }

        // Server 設定の上書き
        if let Some(port) = get("PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(key) = get("METRICS_KEY") {
            self.server.metrics_key = Some(key);
        }

        if let Some(path) = get("DB_PATH") {
            self.database.path = path;
        }

        if let Some(n) = get("DISPATCH_MAX_IN_FLIGHT").and_then(|v| v.parse().ok()) {
            self.dispatch.max_in_flight = n;
        }

        if let Some(numbers) = get("HANDOFF_AGENT_NUMBERS") {
            self.handoff.agent_numbers = split_list(&numbers);
        }
    }

    /// Check the settings the webhook server cannot run without
    pub fn validate(&self) -> crate::Result<()> {
        if self.whatsapp.access_token.is_empty() {
            return Err(Error::Config("whatsapp.access_token is empty".to_string()));
        }
        if self.whatsapp.phone_number_id.is_empty() {
            return Err(Error::Config("whatsapp.phone_number_id is empty".to_string()));
        }
        if self.whatsapp.verify_token.is_empty() {
            return Err(Error::Config("whatsapp.verify_token is empty".to_string()));
        }
        if self.dispatch.max_in_flight == 0 {
            return Err(Error::Config("dispatch.max_in_flight must be at least 1".to_string()));
        }
        Ok(())
    }
}
