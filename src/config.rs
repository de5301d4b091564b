use anyhow::Context;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::theme::{Palette, ThemeSection};

pub const DEFAULT_QUERY: &str = "Daft Punk One More Time";
pub const DEFAULT_OVERLAY_SECONDS: f32 = 0.55;
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";
const PREVIEW_FILE_NAME: &str = "swipe_sonic_preview.mp3";

const CLIENT_ID_ENV: &str = "SPOTIFY_CLIENT_ID";
const CLIENT_SECRET_ENV: &str = "SPOTIFY_CLIENT_SECRET";

#[derive(Debug, Clone)]
pub struct Config {
    pub source: Option<PathBuf>,
    pub spotify: SpotifyConfig,
    pub preview: PreviewConfig,
    pub ui: UiConfig,
    pub palette: Palette,
    pub warnings: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: None,
            spotify: SpotifyConfig::default(),
            preview: PreviewConfig::default(),
            ui: UiConfig::default(),
            palette: Palette::default(),
            warnings: Vec::new(),
        }
    }
}

impl Config {
    /// Loads the first config file found, or defaults when there is none.
    ///
    /// An explicit path must exist. A file that exists but cannot be read or
    /// parsed is an error; the caller treats that as fatal.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match candidate_paths().into_iter().find(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Config::default(),
            },
        };
        config.spotify.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::parse(&data)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn parse(data: &str) -> anyhow::Result<Self> {
        let doc: ConfigDocument = toml::from_str(data)?;
        Ok(doc.into())
    }

    /// Re-reads only the live-tunable parts (palette and overlay length)
    /// from the file this config was loaded from.
    pub fn reload_live(&mut self) -> anyhow::Result<()> {
        let Some(path) = self.source.clone() else {
            return Ok(());
        };
        let fresh = Self::from_file(&path)?;
        self.palette = fresh.palette;
        self.ui.overlay_seconds = fresh.ui.overlay_seconds;
        self.warnings = fresh.warnings;
        Ok(())
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(current_dir) = env::current_dir() {
        candidates.push(current_dir.join("config.toml"));
        candidates.push(current_dir.join("config").join("config.toml"));
        candidates.push(current_dir.join("config").join("swipe_sonic.toml"));
    }

    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.join("config.toml"));
            candidates.push(dir.join("config").join("config.toml"));
            candidates.push(dir.join("config").join("swipe_sonic.toml"));
        }
    }

    candidates
}

/// Client-credentials pair. Only constructed when both halves are present.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_url: String,
    pub api_base: String,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl SpotifyConfig {
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(env::var(CLIENT_ID_ENV).ok(), env::var(CLIENT_SECRET_ENV).ok());
    }

    /// Values that are present replace whatever the file set.
    fn apply_overrides(&mut self, client_id: Option<String>, client_secret: Option<String>) {
        if let Some(id) = client_id {
            self.client_id = Some(id);
        }
        if let Some(secret) = client_secret {
            self.client_secret = Some(secret);
        }
    }

    /// Validated credentials, or `None` if either value is missing or blank.
    pub fn credentials(&self) -> Option<Credentials> {
        let id = self.client_id.as_deref().map(str::trim).unwrap_or("");
        let secret = self.client_secret.as_deref().map(str::trim).unwrap_or("");
        if id.is_empty() || secret.is_empty() {
            return None;
        }
        Some(Credentials {
            client_id: id.to_string(),
            client_secret: secret.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PreviewConfig {
    pub query: String,
    pub audio_path: PathBuf,
    pub timeout: Option<Duration>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            query: DEFAULT_QUERY.to_string(),
            audio_path: env::temp_dir().join(PREVIEW_FILE_NAME),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub overlay_seconds: f32,
    pub watch_config: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            overlay_seconds: DEFAULT_OVERLAY_SECONDS,
            watch_config: false,
        }
    }
}

impl UiConfig {
    pub fn overlay_seconds(&self) -> f32 {
        self.overlay_seconds.clamp(0.05, 5.0)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    spotify: SpotifySection,
    #[serde(default)]
    preview: PreviewSection,
    #[serde(default)]
    ui: UiSection,
    #[serde(default)]
    theme: ThemeSection,
}

impl From<ConfigDocument> for Config {
    fn from(value: ConfigDocument) -> Self {
        let defaults = Config::default();
        let mut warnings = Vec::new();

        let spotify = SpotifyConfig {
            client_id: value.spotify.client_id,
            client_secret: value.spotify.client_secret,
            token_url: value
                .spotify
                .token_url
                .unwrap_or(defaults.spotify.token_url),
            api_base: value
                .spotify
                .api_base
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.spotify.api_base),
        };

        let query = match value.preview.query {
            Some(q) if !q.trim().is_empty() => q,
            Some(_) => {
                warnings.push("preview.query is empty; using the default query".to_string());
                defaults.preview.query
            }
            None => defaults.preview.query,
        };

        let preview = PreviewConfig {
            query,
            audio_path: value
                .preview
                .audio_path
                .unwrap_or(defaults.preview.audio_path),
            timeout: value.preview.timeout_secs.map(Duration::from_secs),
        };

        let overlay_seconds = match value.ui.overlay_seconds {
            Some(secs) if secs.is_finite() => secs,
            Some(secs) => {
                warnings.push(format!(
                    "ui.overlay_seconds = {secs} is not a finite number; using {DEFAULT_OVERLAY_SECONDS}"
                ));
                defaults.ui.overlay_seconds
            }
            None => defaults.ui.overlay_seconds,
        };

        let ui = UiConfig {
            overlay_seconds,
            watch_config: value.ui.watch_config.unwrap_or(false),
        };

        let palette = value.theme.resolve(&mut warnings);

        Config {
            source: None,
            spotify,
            preview,
            ui,
            palette,
            warnings,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SpotifySection {
    client_id: Option<String>,
    client_secret: Option<String>,
    token_url: Option<String>,
    api_base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PreviewSection {
    query: Option<String>,
    audio_path: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct UiSection {
    overlay_seconds: Option<f32>,
    watch_config: Option<bool>,
}
