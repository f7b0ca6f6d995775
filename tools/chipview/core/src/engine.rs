/// What one engine step reported.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TickOutput {
    /// The framebuffer changed and should be redrawn.
    pub vram: bool,
    /// An audio cue should be played.
    pub beep: bool,
}

/// The stepped virtual machine whose framebuffer is being displayed.
///
/// Implementations are external; this crate only drives them. `vram` must
/// return the live buffer, `vram_width() * vram_height()` bytes of 0/1.
pub trait Engine {
    fn load(&mut self, rom: &[u8]);

    /// Advance one instruction. `false` means the engine has nothing to run.
    fn next(&mut self) -> bool;

    /// Post-step bookkeeping (timers, display, sound).
    fn tick(&mut self) -> TickOutput;

    fn set_key(&mut self, code: u8);
    fn unset_key(&mut self, code: u8);

    fn vram(&self) -> &[u8];
    fn vram_width(&self) -> u32;
    fn vram_height(&self) -> u32;
}

/// A program image, opaque to everything but the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rom {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Rom {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), bytes: bytes.into() }
    }
}
