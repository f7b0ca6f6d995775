use std::collections::HashMap;
use std::hash::Hash;

/// Logical keypad key (0x0..=0xF) and its slot in the on-screen keypad.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyBinding {
    pub code: u8,
    pub display_index: usize,
}

/// Logical keys in on-screen order, row by row.
#[rustfmt::skip]
pub const HEX_KEYPAD: [u8; 16] = [
    0x1, 0x2, 0x3, 0xC,
    0x4, 0x5, 0x6, 0xD,
    0x7, 0x8, 0x9, 0xE,
    0xA, 0x0, 0xB, 0xF,
];

/// Host key → keypad key lookup.
#[derive(Clone, Debug)]
pub struct KeyMap<K> {
    bindings: HashMap<K, KeyBinding>,
}

impl<K: Hash + Eq> Default for KeyMap<K> {
    fn default() -> Self {
        Self { bindings: HashMap::new() }
    }
}

impl<K: Hash + Eq> KeyMap<K> {
    /// Bind sixteen host keys, given in on-screen order, to the hex keypad.
    pub fn hex_keypad(keys: [K; 16]) -> Self {
        let mut map = Self::default();
        for (display_index, key) in keys.into_iter().enumerate() {
            map.bind(key, KeyBinding { code: HEX_KEYPAD[display_index], display_index });
        }
        map
    }

    pub fn bind(&mut self, key: K, binding: KeyBinding) {
        self.bindings.insert(key, binding);
    }

    pub fn get(&self, key: &K) -> Option<KeyBinding> {
        self.bindings.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Which keypad keys are currently held.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct InputState {
    pressed: u16,
}

impl InputState {
    /// Returns `true` if the key was not already held.
    pub fn press(&mut self, code: u8) -> bool {
        let bit = 1u16 << (code & 0xF);
        let changed = self.pressed & bit == 0;
        self.pressed |= bit;
        changed
    }

    /// Returns `true` if the key was held.
    pub fn release(&mut self, code: u8) -> bool {
        let bit = 1u16 << (code & 0xF);
        let changed = self.pressed & bit != 0;
        self.pressed &= !bit;
        changed
    }

    pub fn is_pressed(&self, code: u8) -> bool {
        self.pressed & (1u16 << (code & 0xF)) != 0
    }

    pub fn bits(&self) -> u16 {
        self.pressed
    }

    pub fn clear(&mut self) {
        self.pressed = 0;
    }
}
