//! Where the error presenter draws when no renderer can.

use std::sync::Arc;

use chipview_core::error_presenter::TextSurface;
use winit::window::Window;

#[cfg(target_arch = "wasm32")]
pub type HostTextSurface = CanvasTextSurface;
#[cfg(not(target_arch = "wasm32"))]
pub type HostTextSurface = ConsoleTextSurface;

#[cfg(target_arch = "wasm32")]
pub fn host_surface(window: &Arc<Window>) -> HostTextSurface {
    use winit::platform::web::WindowExtWebSys;

    // the legacy tier may have put a fresh canvas in the window's place
    let on_page = web_sys::window().and_then(|w| w.document()).and_then(|d| crate::helpers::get_canvas(&d));
    #[allow(clippy::map_clone)]
    let canvas = on_page.or_else(|| window.canvas().map(|canvas| canvas.clone()));
    CanvasTextSurface::new(canvas)
}

#[cfg(not(target_arch = "wasm32"))]
pub fn host_surface(window: &Arc<Window>) -> HostTextSurface {
    ConsoleTextSurface::new(Some(window.clone()))
}

/// Native fallback: the message goes to stderr and the window title.
pub struct ConsoleTextSurface {
    window: Option<Arc<Window>>,
    pub lines: Vec<String>,
}

impl ConsoleTextSurface {
    pub fn new(window: Option<Arc<Window>>) -> Self {
        Self { window, lines: Vec::new() }
    }
}

impl TextSurface for ConsoleTextSurface {
    fn clear(&mut self) {
        self.lines.clear();
    }

    fn fill_text(&mut self, text: &str, _x: f32, _y: f32, _size_px: f32) {
        eprintln!("{text}");
        if let Some(window) = &self.window {
            window.set_title(&format!("chipview: {text}"));
        }
        self.lines.push(text.to_owned());
    }
}

/// Browser fallback. A canvas that already handed out a GPU context can't
/// give a 2-D one, so `clear` swaps in a fresh canvas element first.
#[cfg(target_arch = "wasm32")]
pub struct CanvasTextSurface {
    canvas: Option<web_sys::HtmlCanvasElement>,
    context: Option<web_sys::CanvasRenderingContext2d>,
}

#[cfg(target_arch = "wasm32")]
impl CanvasTextSurface {
    pub fn new(canvas: Option<web_sys::HtmlCanvasElement>) -> Self {
        Self { canvas, context: None }
    }

    fn fresh_context(&mut self) -> Option<web_sys::CanvasRenderingContext2d> {
        use wasm_bindgen::JsCast;

        let fresh = crate::helpers::replace_canvas(self.canvas.as_ref()?)?;
        let context = fresh.get_context("2d").ok()??.dyn_into().ok();
        self.canvas = Some(fresh);
        context
    }
}

#[cfg(target_arch = "wasm32")]
impl TextSurface for CanvasTextSurface {
    fn clear(&mut self) {
        self.context = self.fresh_context();
        if let (Some(ctx), Some(canvas)) = (&self.context, &self.canvas) {
            ctx.set_fill_style_str("#303030");
            ctx.fill_rect(0.0, 0.0, canvas.width() as f64, canvas.height() as f64);
        }
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, size_px: f32) {
        if let Some(ctx) = &self.context {
            ctx.set_font(&format!("{size_px}px monospace"));
            ctx.set_fill_style_str("#dedede");
            let _ = ctx.fill_text(text, x as f64, y as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chipview_core::error_presenter::ErrorPresenter;

    #[test]
    fn console_surface_keeps_the_latest_message() {
        let mut presenter = ErrorPresenter::new(ConsoleTextSurface::new(None));
        presenter.present_message("first");
        presenter.present_message("No device found");

        assert_eq!(presenter.surface().lines, vec!["No device found".to_owned()]);
    }
}
