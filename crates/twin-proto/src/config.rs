use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

/// Environment override for the chat endpoint base URL.
pub const API_URL_ENV: &str = "TWIN_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub timings: TimingsConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base URL of the assistant; requests go to `<endpoint>/chat`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Every delay of the onboarding sequence, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingsConfig {
    /// How long the welcome text stays before it starts fading.
    #[serde(default = "default_text_dwell_ms")]
    pub text_dwell_ms: u64,
    /// Fade duration between the welcome text and the welcome video.
    #[serde(default = "default_fade_ms")]
    pub fade_ms: u64,
    /// Length of the welcome avatar clip.
    #[serde(default = "default_welcome_video_ms")]
    pub welcome_video_ms: u64,
    #[serde(default = "default_avatar_fade_ms")]
    pub avatar_fade_ms: u64,
    /// Length of the landing intro video.
    #[serde(default = "default_intro_video_ms")]
    pub intro_video_ms: u64,
    /// Reveal the landing UI even if the intro video never ends.
    #[serde(default = "default_reveal_fallback_ms")]
    pub reveal_fallback_ms: u64,
    /// Door animation before handing off to the chat screen.
    #[serde(default = "default_handoff_ms")]
    pub handoff_ms: u64,
    #[serde(default = "default_refocus_ms")]
    pub refocus_ms: u64,
    #[serde(default = "default_drift_interval_ms")]
    pub drift_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_audio_enabled")]
    pub enabled: bool,
    /// Narration track kept in sync with the landing intro video.
    #[serde(default = "default_narration")]
    pub narration: PathBuf,
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Slow random gain/cutoff drift applied while narration plays.
    #[serde(default = "default_drift")]
    pub drift: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_avatar_image")]
    pub avatar_image: PathBuf,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for TimingsConfig {
    fn default() -> Self {
        Self {
            text_dwell_ms: default_text_dwell_ms(),
            fade_ms: default_fade_ms(),
            welcome_video_ms: default_welcome_video_ms(),
            avatar_fade_ms: default_avatar_fade_ms(),
            intro_video_ms: default_intro_video_ms(),
            reveal_fallback_ms: default_reveal_fallback_ms(),
            handoff_ms: default_handoff_ms(),
            refocus_ms: default_refocus_ms(),
            drift_interval_ms: default_drift_interval_ms(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: default_audio_enabled(),
            narration: default_narration(),
            volume: default_volume(),
            drift: default_drift(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            avatar_image: default_avatar_image(),
        }
    }
}

impl TimingsConfig {
    pub fn text_dwell(&self) -> Duration {
        Duration::from_millis(self.text_dwell_ms)
    }

    pub fn fade(&self) -> Duration {
        Duration::from_millis(self.fade_ms)
    }

    pub fn welcome_video(&self) -> Duration {
        Duration::from_millis(self.welcome_video_ms)
    }

    pub fn avatar_fade(&self) -> Duration {
        Duration::from_millis(self.avatar_fade_ms)
    }

    pub fn intro_video(&self) -> Duration {
        Duration::from_millis(self.intro_video_ms)
    }

    pub fn reveal_fallback(&self) -> Duration {
        Duration::from_millis(self.reveal_fallback_ms)
    }

    pub fn handoff(&self) -> Duration {
        Duration::from_millis(self.handoff_ms)
    }

    pub fn refocus(&self) -> Duration {
        Duration::from_millis(self.refocus_ms)
    }

    pub fn drift_interval(&self) -> Duration {
        Duration::from_millis(self.drift_interval_ms)
    }
}

fn default_endpoint() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_text_dwell_ms() -> u64 {
    2000
}

fn default_fade_ms() -> u64 {
    700
}

fn default_welcome_video_ms() -> u64 {
    3000
}

fn default_avatar_fade_ms() -> u64 {
    700
}

fn default_intro_video_ms() -> u64 {
    4000
}

fn default_reveal_fallback_ms() -> u64 {
    9000
}

fn default_handoff_ms() -> u64 {
    600
}

fn default_refocus_ms() -> u64 {
    100
}

fn default_drift_interval_ms() -> u64 {
    4000
}

fn default_audio_enabled() -> bool {
    true
}

fn default_narration() -> PathBuf {
    platform::data_dir().join("narration.mp3")
}

fn default_volume() -> f32 {
    0.5
}

fn default_drift() -> bool {
    true
}

fn default_avatar_image() -> PathBuf {
    platform::data_dir().join("avatar.png")
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Chat endpoint base URL, `TWIN_API_URL` winning over the file.
    pub fn chat_endpoint(&self) -> String {
        match std::env::var(API_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => self.chat.endpoint.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.chat.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chat: ChatConfig::default(),
            timings: TimingsConfig::default(),
            audio: AudioConfig::default(),
            media: MediaConfig::default(),
        }
    }
}
