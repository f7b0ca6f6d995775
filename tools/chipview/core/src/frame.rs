//! Read-through access to the engine's framebuffer.
//!
//! Nothing downstream keeps a frame around: a view is built at the start of
//! every Presenting phase and dropped before the next Stepping phase begins.

use crate::engine::Engine;
use crate::error::RenderError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameDims {
    pub width: u32,
    pub height: u32,
}

impl FrameDims {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of<E: Engine + ?Sized>(engine: &E) -> Self {
        Self::new(engine.vram_width(), engine.vram_height())
    }

    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait FrameSource {
    fn dims(&self) -> FrameDims;

    /// The engine's current pixels, exactly `dims().len()` bytes.
    fn read(&mut self) -> Result<&[u8], RenderError>;
}

fn checked(dims: FrameDims, bytes: &[u8]) -> Result<&[u8], RenderError> {
    if bytes.len() == dims.len() {
        Ok(bytes)
    } else {
        Err(RenderError::FrameSize { expected: dims.len(), actual: bytes.len() })
    }
}

/// Zero-copy view straight into engine memory.
pub struct LiveFrame<'a, E: ?Sized> {
    engine: &'a E,
}

impl<'a, E: Engine + ?Sized> LiveFrame<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }
}

impl<E: Engine + ?Sized> FrameSource for LiveFrame<'_, E> {
    fn dims(&self) -> FrameDims {
        FrameDims::of(self.engine)
    }

    fn read(&mut self) -> Result<&[u8], RenderError> {
        checked(self.dims(), self.engine.vram())
    }
}

/// Copies the framebuffer out on every read. Used where the engine's memory
/// cannot be borrowed directly; the scratch buffer is reused between frames
/// but its contents are always overwritten before being handed out.
pub struct CopyOutFrame<'a, E: ?Sized> {
    engine: &'a E,
    scratch: &'a mut Vec<u8>,
}

impl<'a, E: Engine + ?Sized> CopyOutFrame<'a, E> {
    pub fn new(engine: &'a E, scratch: &'a mut Vec<u8>) -> Self {
        Self { engine, scratch }
    }
}

impl<E: Engine + ?Sized> FrameSource for CopyOutFrame<'_, E> {
    fn dims(&self) -> FrameDims {
        FrameDims::of(self.engine)
    }

    fn read(&mut self) -> Result<&[u8], RenderError> {
        let dims = self.dims();
        self.scratch.clear();
        self.scratch.extend_from_slice(self.engine.vram());
        checked(dims, self.scratch.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TickOutput;

    struct Panel {
        width: u32,
        height: u32,
        vram: Vec<u8>,
    }

    impl Panel {
        fn new(width: u32, height: u32) -> Self {
            Self { width, height, vram: vec![0; (width * height) as usize] }
        }
    }

    impl Engine for Panel {
        fn load(&mut self, _rom: &[u8]) {}
        fn next(&mut self) -> bool {
            true
        }
        fn tick(&mut self) -> TickOutput {
            TickOutput::default()
        }
        fn set_key(&mut self, _code: u8) {}
        fn unset_key(&mut self, _code: u8) {}
        fn vram(&self) -> &[u8] {
            &self.vram
        }
        fn vram_width(&self) -> u32 {
            self.width
        }
        fn vram_height(&self) -> u32 {
            self.height
        }
    }

    #[test]
    fn read_length_matches_dims() {
        for (w, h) in [(64, 32), (128, 64), (1, 1), (7, 3)] {
            let panel = Panel::new(w, h);
            let mut live = LiveFrame::new(&panel);
            assert_eq!(live.read().unwrap().len(), (w * h) as usize);

            let mut scratch = Vec::new();
            let mut copy = CopyOutFrame::new(&panel, &mut scratch);
            assert_eq!(copy.read().unwrap().len(), (w * h) as usize);
        }
    }

    #[test]
    fn every_read_sees_latest_pixels() {
        let mut panel = Panel::new(4, 2);
        let mut scratch = Vec::new();

        panel.vram[5] = 1;
        {
            let mut copy = CopyOutFrame::new(&panel, &mut scratch);
            assert_eq!(copy.read().unwrap()[5], 1);
        }

        panel.vram[5] = 0;
        panel.vram[6] = 1;
        let mut copy = CopyOutFrame::new(&panel, &mut scratch);
        let bytes = copy.read().unwrap();
        assert_eq!(bytes[5], 0);
        assert_eq!(bytes[6], 1);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let mut panel = Panel::new(8, 8);
        panel.vram.truncate(60);
        let mut live = LiveFrame::new(&panel);
        match live.read() {
            Err(RenderError::FrameSize { expected: 64, actual: 60 }) => {}
            other => panic!("unexpected {other:?}"),
        }
    }
}
