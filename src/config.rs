use crate::audio::WavCaptureConfig;
use crate::handoff::HandoffConfig;
use crate::session::{SessionConfig, StepKind};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub handoff: HandoffConfig,
    pub capture: CaptureConfig,
    pub journal: JournalConfig,
    /// Ordered prompt list for the session
    pub prompts: Vec<StepKind>,
}

#[derive(Debug, Deserialize)]
pub struct CaptureConfig {
    pub output_dir: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
}

#[derive(Debug, Deserialize)]
pub struct JournalConfig {
    pub path: String,
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_channels() -> u16 {
    1
}

impl Config {
    /// Load `<path>.toml` (or any format the `config` crate recognises),
    /// then apply `REFLECT__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("REFLECT").separator("__"))
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.prompts.is_empty() {
            anyhow::bail!("Config lists no prompts");
        }
        self.session
            .validate()
            .context("Invalid breathing configuration")?;
        if self.capture.sample_rate == 0 || self.capture.channels == 0 {
            anyhow::bail!("Capture sample rate and channels must be non-zero");
        }
        Ok(())
    }

    pub fn capture_config(&self) -> WavCaptureConfig {
        WavCaptureConfig {
            output_dir: expand(&self.capture.output_dir),
            sample_rate: self.capture.sample_rate,
            channels: self.capture.channels,
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        expand(&self.journal.path)
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
