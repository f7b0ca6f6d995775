//! The per-callback driver.
//!
//! Scheduling is single-threaded and cooperative. A callback steps the engine
//! until it asks for a redraw, presents exactly one frame, then asks the host
//! for the next callback. The only suspension points are the throttle pause
//! between steps and the wait for that next callback. The presenter is
//! borrowed in short, non-suspending bursts so input handlers can run while a
//! callback is paused.

use std::cell::RefCell;
use std::time::Duration;

use futures::future::LocalBoxFuture;
use log::{debug, warn};

use crate::config::LoopConfig;
use crate::engine::{Engine, Rom};
use crate::error::RenderError;
use crate::frame::{FrameSource, LiveFrame};
use crate::negotiator::RenderHandle;
use crate::session::Session;

pub trait Host {
    fn now_ms(&self) -> f64;

    /// Yield to the host scheduler for roughly `quantum`.
    fn pause(&self, quantum: Duration) -> LocalBoxFuture<'static, ()>;

    /// Ask for the next display-refresh callback.
    fn request_frame(&self);
}

/// Fire-and-forget sound played on `beep`.
pub trait AudioCue {
    fn beep(&mut self);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Engine advancing, no frame pending.
    Stepping,
    /// Frame submitted, waiting for the next callback.
    Presenting,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoopState {
    pub last_timestamp: Option<f64>,
    pub running: bool,
    pub phase: Phase,
    pub generation: u64,
    pub in_flight: bool,
    pub frames: u64,
}

impl LoopState {
    pub fn new(generation: u64) -> Self {
        Self { last_timestamp: None, running: true, phase: Phase::Stepping, generation, in_flight: false, frames: 0 }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Redraw,
    Halted,
    Superseded,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameReport {
    Presented { ticks: u32 },
    /// Another callback already owns the frame, or the loop was stopped.
    Skipped,
    /// A ROM swap replaced the loop state while this callback was paused.
    Superseded,
}

/// Session context shared by the frame loop and the input handlers.
pub struct Presenter<E> {
    pub session: Session<E>,
    handle: RenderHandle,
    state: LoopState,
    audio: Box<dyn AudioCue>,
}

impl<E: Engine> Presenter<E> {
    pub fn new(session: Session<E>, handle: RenderHandle, audio: Box<dyn AudioCue>) -> Self {
        let state = LoopState::new(session.generation());
        Self { session, handle, state, audio }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn handle(&self) -> &RenderHandle {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut RenderHandle {
        &mut self.handle
    }

    /// Swap in a new engine and restart the loop from Stepping.
    pub fn load_rom(&mut self, rom: &Rom) -> Result<(), RenderError> {
        self.session.load_rom(rom);

        let dims = self.session.dims();
        if self.handle.resources().map(|r| r.dims) != Some(dims) {
            debug!("framebuffer changed to {}x{}, rebuilding resources", dims.width, dims.height);
            self.handle.rebuild(dims)?;
        }

        self.state = LoopState::new(self.session.generation());
        Ok(())
    }

    /// Stop presenting. Later callbacks are skipped.
    pub fn stop(&mut self) {
        self.state.running = false;
    }

    fn begin_frame(&mut self, now: f64) -> Option<u64> {
        if !self.state.running || self.state.in_flight {
            return None;
        }
        self.state.in_flight = true;
        self.state.phase = Phase::Stepping;
        self.state.last_timestamp = Some(now);
        Some(self.state.generation)
    }

    fn step(&mut self, generation: u64) -> StepOutcome {
        if self.state.generation != generation {
            return StepOutcome::Superseded;
        }

        let engine = self.session.engine_mut();
        if !engine.next() {
            return StepOutcome::Halted;
        }

        let output = engine.tick();
        if output.beep {
            self.audio.beep();
        }

        if output.vram {
            StepOutcome::Redraw
        } else {
            StepOutcome::Continue
        }
    }

    fn present(&mut self, generation: u64, ticks: u32) -> Result<FrameReport, RenderError> {
        if self.state.generation != generation {
            return Ok(FrameReport::Superseded);
        }

        self.state.phase = Phase::Presenting;
        let result = {
            let mut frame = LiveFrame::new(self.session.engine());
            frame.read().and_then(|pixels| self.handle.submit_frame(pixels))
        };
        self.state.in_flight = false;

        result?;
        self.state.frames += 1;
        Ok(FrameReport::Presented { ticks })
    }
}

/// One display-refresh callback.
pub async fn run_frame<E, H>(
    presenter: &RefCell<Presenter<E>>,
    host: &H,
    config: &LoopConfig,
) -> Result<FrameReport, RenderError>
where
    E: Engine,
    H: Host + ?Sized,
{
    let Some(generation) = presenter.borrow_mut().begin_frame(host.now_ms()) else {
        return Ok(FrameReport::Skipped);
    };

    let mut ticks = 0u32;
    loop {
        let outcome = presenter.borrow_mut().step(generation);
        match outcome {
            StepOutcome::Superseded => {
                debug!("frame for generation {generation} superseded");
                host.request_frame();
                return Ok(FrameReport::Superseded);
            }
            StepOutcome::Halted => break,
            StepOutcome::Redraw => {
                ticks += 1;
                break;
            }
            StepOutcome::Continue => {
                ticks += 1;
                if config.max_ticks_per_frame.is_some_and(|cap| ticks >= cap) {
                    warn!("no redraw after {ticks} ticks, presenting anyway");
                    break;
                }
                if !config.throttle.is_none() {
                    host.pause(config.throttle.0).await;
                }
            }
        }
    }

    let report = presenter.borrow_mut().present(generation, ticks)?;
    host.request_frame();
    Ok(report)
}
