use std::path::PathBuf;

use anyhow::Context;
use chipview_core::config::{BackendPreference, LoopConfig, Throttle};
use chipview_core::engine::Rom;
use clap::Parser;
use tracing::Level;

use crate::player;

#[derive(Parser, Debug)]
#[command(name = "chipview", version, about = "Show a stepped engine's monochrome framebuffer")]
pub struct Cli {
    /// ROM to load at startup; a built-in demo plays when omitted
    pub rom: Option<PathBuf>,

    /// Pause between engine steps, in microseconds (0 runs flat out)
    #[arg(long, default_value_t = 50)]
    pub throttle_us: u64,

    /// Which graphics tiers to try: auto, modern or legacy
    #[arg(long, default_value = "auto")]
    pub backend: BackendPreference,

    /// Window size as a multiple of the framebuffer
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=64))]
    pub scale: u32,

    #[arg(long, default_value = "warn")]
    pub log_level: Level,
}

/// Everything the app needs from the outside world, resolved.
#[derive(Debug, Clone)]
pub struct Settings {
    pub rom: Rom,
    pub loop_config: LoopConfig,
    pub backend: BackendPreference,
    pub scale: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self { rom: player::demo_rom(), loop_config: LoopConfig::default(), backend: BackendPreference::Auto, scale: 10 }
    }
}

impl Cli {
    pub fn into_settings(self) -> anyhow::Result<Settings> {
        let rom = match &self.rom {
            Some(path) => {
                let bytes = std::fs::read(path).with_context(|| format!("couldn't read rom {}", path.display()))?;
                let name = path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
                Rom::new(name, bytes)
            }
            None => player::demo_rom(),
        };

        Ok(Settings {
            rom,
            loop_config: LoopConfig::with_throttle(Throttle::from_micros(self.throttle_us)),
            backend: self.backend,
            scale: self.scale,
        })
    }
}
