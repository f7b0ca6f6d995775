#[cfg(target_arch = "wasm32")]
use web_sys::{Document, HtmlCanvasElement};

pub fn get_now_ms() -> f64 {
    #[cfg(target_arch = "wasm32")]
    {
        web_sys::window().and_then(|window| window.performance()).map_or(0.0, |performance| performance.now())
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        use std::sync::OnceLock;
        use std::time::Instant;

        static START_INSTANT: OnceLock<Instant> = OnceLock::new();
        START_INSTANT.get_or_init(Instant::now).elapsed().as_secs_f64() * 1000.0
    }
}

/// The page's display canvas, in the light DOM or inside `#shadow-host`.
#[cfg(target_arch = "wasm32")]
pub fn get_canvas(document: &Document) -> Option<HtmlCanvasElement> {
    use wasm_bindgen::JsCast;
    use web_sys::HtmlElement;

    if let Some(elem) = document.get_element_by_id("chip-display") {
        return elem.dyn_into::<HtmlCanvasElement>().ok();
    }

    let shadow_root = document.get_element_by_id("shadow-host")?.dyn_ref::<HtmlElement>()?.shadow_root()?;
    shadow_root.query_selector("#chip-display").ok()??.dyn_into::<HtmlCanvasElement>().ok()
}

/// Swap `old` for a blank canvas with the same id and size. A canvas keeps
/// the first kind of context it handed out, so this is the only way to draw
/// into the same spot with another one.
#[cfg(target_arch = "wasm32")]
pub fn replace_canvas(old: &HtmlCanvasElement) -> Option<HtmlCanvasElement> {
    use wasm_bindgen::JsCast;

    let document = old.owner_document()?;
    let fresh: HtmlCanvasElement = document.create_element("canvas").ok()?.dyn_into().ok()?;
    fresh.set_width(old.width());
    fresh.set_height(old.height());
    fresh.set_id(&old.id());
    old.replace_with_with_node_1(&fresh).ok()?;
    Some(fresh)
}
