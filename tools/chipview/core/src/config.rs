use std::str::FromStr;
use std::time::Duration;

use crate::backend::BackendKind;

/// Artificial delay after every engine step. Bounds the emulated clock rate.
///
/// Two values are on record for this pause:
///
/// * 0.05 ms ([`Throttle::OBSERVED_FINE`]), the build whose source survives.
/// * A considerably longer pause in a second build of the same frontend. Only
///   its effect (a visibly slower machine) is known; the figure itself was not
///   kept, so there is no constant for it. Pass it through `--throttle-us`.
///
/// Neither is known to be the intended one, so the pause is a setting.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Throttle(pub Duration);

impl Throttle {
    pub const NONE: Throttle = Throttle(Duration::ZERO);
    pub const OBSERVED_FINE: Throttle = Throttle(Duration::from_micros(50));

    pub fn from_micros(us: u64) -> Self {
        Throttle(Duration::from_micros(us))
    }

    pub fn is_none(&self) -> bool {
        self.0.is_zero()
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Throttle::OBSERVED_FINE
    }
}

/// Safety valve for a loop that never pauses: without it a ROM that never
/// raises `vram` would keep the callback stepping forever.
pub const UNTHROTTLED_TICK_CAP: u32 = 100_000;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopConfig {
    pub throttle: Throttle,
    /// Ticks after which a frame is presented even without a `vram` signal.
    /// `None` steps until the engine asks for a redraw or halts.
    pub max_ticks_per_frame: Option<u32>,
}

impl LoopConfig {
    /// Uncapped while the loop pauses between steps, capped when it doesn't.
    pub fn with_throttle(throttle: Throttle) -> Self {
        Self { throttle, max_ticks_per_frame: throttle.is_none().then_some(UNTHROTTLED_TICK_CAP) }
    }
}

/// Which tiers the negotiator may try.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BackendPreference {
    #[default]
    Auto,
    ModernOnly,
    LegacyOnly,
}

impl BackendPreference {
    pub fn allows(&self, kind: BackendKind) -> bool {
        match self {
            BackendPreference::Auto => kind != BackendKind::None,
            BackendPreference::ModernOnly => kind == BackendKind::ModernGpu,
            BackendPreference::LegacyOnly => kind == BackendKind::LegacyRaster,
        }
    }
}

impl FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendPreference::Auto),
            "modern" | "webgpu" | "gpu" => Ok(BackendPreference::ModernOnly),
            "legacy" | "webgl" | "gl" => Ok(BackendPreference::LegacyOnly),
            other => Err(format!("unknown backend '{other}', expected auto, modern or legacy")),
        }
    }
}
