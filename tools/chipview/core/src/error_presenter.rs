//! Last line of defence: draw the failure instead of leaving a dead canvas.

use std::error::Error;

use log::error;

/// Top-left of the error text, in surface pixels.
pub const ERROR_TEXT_POSITION: (f32, f32) = (16.0, 32.0);
pub const ERROR_TEXT_SIZE: f32 = 16.0;

/// The most basic drawing surface the host can offer.
pub trait TextSurface {
    fn clear(&mut self);
    fn fill_text(&mut self, text: &str, x: f32, y: f32, size_px: f32);
}

pub struct ErrorPresenter<S> {
    surface: S,
}

impl<S: TextSurface> ErrorPresenter<S> {
    pub fn new(surface: S) -> Self {
        Self { surface }
    }

    pub fn present(&mut self, err: &dyn Error) {
        self.present_message(&err.to_string());
    }

    pub fn present_message(&mut self, message: &str) {
        error!("{message}");
        let (x, y) = ERROR_TEXT_POSITION;
        self.surface.clear();
        self.surface.fill_text(message, x, y, ERROR_TEXT_SIZE);
    }

    /// Present the error, if any, and swallow it.
    pub fn guard<T, E: Error>(&mut self, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.present(&e);
                None
            }
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }
}
