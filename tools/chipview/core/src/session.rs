use std::hash::Hash;

use log::info;

use crate::engine::{Engine, Rom};
use crate::frame::FrameDims;
use crate::input::{InputState, KeyMap};

/// The engine instance currently on screen, plus the input it is fed.
///
/// Loading a ROM replaces the engine outright; anything that was looking at the
/// old one is stale from that point on, which `generation` makes detectable.
pub struct Session<E> {
    engine: E,
    factory: Box<dyn Fn() -> E>,
    input: InputState,
    generation: u64,
    rom_name: Option<String>,
}

impl<E: Engine> Session<E> {
    pub fn new(factory: impl Fn() -> E + 'static) -> Self {
        Self { engine: factory(), factory: Box::new(factory), input: InputState::default(), generation: 0, rom_name: None }
    }

    pub fn with_rom(factory: impl Fn() -> E + 'static, rom: &Rom) -> Self {
        let mut session = Self::new(factory);
        session.load_rom(rom);
        session
    }

    pub fn load_rom(&mut self, rom: &Rom) {
        info!("loading rom '{}' ({} bytes)", rom.name, rom.bytes.len());
        let mut engine = (self.factory)();
        engine.load(&rom.bytes);
        self.engine = engine;
        self.input.clear();
        self.generation += 1;
        self.rom_name = Some(rom.name.clone());
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn dims(&self) -> FrameDims {
        FrameDims::of(&self.engine)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn rom_name(&self) -> Option<&str> {
        self.rom_name.as_deref()
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    /// Returns the on-screen keypad slot to highlight, if the key is bound.
    ///
    /// Synchronous on purpose: the engine reads its key state between steps of
    /// the same cooperative loop, so a handler must finish without yielding.
    pub fn key_down<K: Hash + Eq>(&mut self, key: &K, map: &KeyMap<K>) -> Option<usize> {
        let binding = map.get(key)?;
        if self.input.press(binding.code) {
            self.engine.set_key(binding.code);
        }
        Some(binding.display_index)
    }

    pub fn key_up<K: Hash + Eq>(&mut self, key: &K, map: &KeyMap<K>) -> Option<usize> {
        let binding = map.get(key)?;
        if self.input.release(binding.code) {
            self.engine.unset_key(binding.code);
        }
        Some(binding.display_index)
    }
}
