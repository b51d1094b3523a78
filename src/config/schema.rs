use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file looked up in the working directory when `--config`
/// is not given.
pub const DEFAULT_CONFIG_FILE: &str = "notecatch.toml";

/// Title used when the model does not produce one.
pub const DEFAULT_TITLE: &str = "Untitled note";

// ── Top-level config ─────────────────────────────────────────────

/// Full runtime configuration.
///
/// Every field has a default so a bare environment is a valid starting
/// point; `validate()` decides whether the result is usable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Chat user id allowed to issue captures. `0` denies everyone.
    pub owner_id: u64,
    pub discord: DiscordConfig,
    pub llm: LlmConfig,
    pub storage: StorageConfig,
    pub gateway: GatewayConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DiscordConfig {
    pub bot_token: Option<String>,
}

/// Gemini text-generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".into(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            timeout_secs: 30,
        }
    }
}

/// Which note-storage backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Remote,
    /// In-process store; nothing leaves the machine.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub base_url: Option<String>,
    /// Long-lived session token. Preferred over username/password.
    pub session_token: Option<String>,
    pub username: Option<String>,
    pub app_password: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Remote,
            base_url: None,
            session_token: None,
            username: None,
            app_password: None,
            timeout_secs: 30,
        }
    }
}

/// Health endpoint bind address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Whether captures are written immediately or staged for confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    #[default]
    Direct,
    Confirm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub mode: CaptureMode,
    pub default_title: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Direct,
            default_title: DEFAULT_TITLE.into(),
        }
    }
}

/// Credentials for the note-storage backend.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A previously minted session token, optionally with the account it
    /// belongs to and a password pair to fall back on.
    Token {
        token: String,
        fallback: Option<(String, String)>,
    },
    Password { username: String, app_password: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token { fallback, .. } => f
                .debug_struct("Token")
                .field("token", &"<redacted>")
                .field("has_fallback", &fallback.is_some())
                .finish(),
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("app_password", &"<redacted>")
                .finish(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl Config {
    /// Load from an optional TOML file, then apply environment overrides,
    /// then validate.
    ///
    /// With `path == None`, `./notecatch.toml` is used when it exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file {}: {e}", path.display())
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| {
            anyhow::anyhow!("Invalid config file {}: {e}", path.display())
        })?;
        Ok(config)
    }

    /// Overlay values from the environment. `lookup` is `std::env::var`
    /// in production and a map in tests.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(token) = get("DISCORD_TOKEN") {
            self.discord.bot_token = Some(token);
        }

        if let Some(key) = get("GEMINI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = get("GEMINI_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = get("GEMINI_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(raw) = get("LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = raw
                .parse()
                .map_err(|_| anyhow::anyhow!("LLM_TIMEOUT_SECS must be an integer, got '{raw}'"))?;
        }

        if let Some(raw) = get("NOTES_BACKEND") {
            self.storage.backend = match raw.to_ascii_lowercase().as_str() {
                "remote" => BackendKind::Remote,
                "memory" => BackendKind::Memory,
                other => anyhow::bail!("NOTES_BACKEND must be 'remote' or 'memory', got '{other}'"),
            };
        }
        if let Some(url) = get("NOTES_BASE_URL") {
            self.storage.base_url = Some(url);
        }
        if let Some(token) = get("NOTES_SESSION_TOKEN") {
            self.storage.session_token = Some(token);
        }
        if let Some(user) = get("NOTES_USER").or_else(|| get("GOOGLE_USER")) {
            self.storage.username = Some(user);
        }
        if let Some(pw) = get("NOTES_APP_PASSWORD").or_else(|| get("GOOGLE_APP_PASSWORD")) {
            self.storage.app_password = Some(pw);
        }

        if let Some(raw) = get("OWNER_ID") {
            // A typo here must never widen access.
            self.owner_id = raw.parse().unwrap_or_else(|_| {
                tracing::warn!("OWNER_ID '{raw}' is not a numeric id; denying all requests");
                0
            });
        }

        if let Some(raw) = get("PORT") {
            self.gateway.port = raw
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid port number, got '{raw}'"))?;
        }
        if let Some(host) = get("HEALTH_HOST") {
            self.gateway.host = host;
        }

        if let Some(raw) = get("CAPTURE_MODE") {
            self.capture.mode = match raw.to_ascii_lowercase().as_str() {
                "direct" => CaptureMode::Direct,
                "confirm" => CaptureMode::Confirm,
                other => anyhow::bail!("CAPTURE_MODE must be 'direct' or 'confirm', got '{other}'"),
            };
        }
        if let Some(title) = get("DEFAULT_TITLE") {
            self.capture.default_title = title;
        }

        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm.model.trim().is_empty() {
            anyhow::bail!("llm.model must not be empty");
        }
        if self.llm.timeout_secs == 0 {
            anyhow::bail!("llm.timeout_secs must be greater than zero");
        }
        if self.storage.timeout_secs == 0 {
            anyhow::bail!("storage.timeout_secs must be greater than zero");
        }
        if self.capture.default_title.trim().is_empty() {
            anyhow::bail!("capture.default_title must not be empty");
        }
        Ok(())
    }

    /// Checks for commands that open a storage session. `classify` skips
    /// them so it works without note-storage settings.
    pub fn validate_storage(&self) -> anyhow::Result<()> {
        if self.storage.backend == BackendKind::Remote && self.storage.base_url.is_none() {
            anyhow::bail!("storage.base_url (NOTES_BASE_URL) is required for the remote backend");
        }
        Ok(())
    }

    /// Resolve storage credentials. A session token wins over a
    /// username/password pair; `None` means nothing usable is configured.
    pub fn credentials(&self) -> Option<Credentials> {
        let password_pair = match (&self.storage.username, &self.storage.app_password) {
            (Some(user), Some(pw)) => Some((user.clone(), pw.clone())),
            _ => None,
        };

        if let Some(token) = &self.storage.session_token {
            return Some(Credentials::Token {
                token: token.clone(),
                fallback: password_pair,
            });
        }

        password_pair.map(|(username, app_password)| Credentials::Password {
            username,
            app_password,
        })
    }

    /// The principal allowed to issue captures, or `None` when nobody is.
    pub fn authorized_principal(&self) -> Option<String> {
        (self.owner_id != 0).then(|| self.owner_id.to_string())
    }
}
