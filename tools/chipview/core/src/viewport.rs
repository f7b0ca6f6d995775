/// Width:height of the displayed framebuffer.
pub const DISPLAY_ASPECT: f32 = 2.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Largest rectangle of the given aspect ratio centred in the surface.
pub fn fit_aspect(surface_width: u32, surface_height: u32, aspect: f32) -> Viewport {
    let (sw, sh) = (surface_width as f32, surface_height as f32);
    if sw <= 0.0 || sh <= 0.0 {
        return Viewport { x: 0.0, y: 0.0, width: 0.0, height: 0.0 };
    }

    let (width, height) = if sw / sh > aspect { (sh * aspect, sh) } else { (sw, sw / aspect) };

    Viewport { x: ((sw - width) / 2.0).floor(), y: ((sh - height) / 2.0).floor(), width, height }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_fit() {
        assert_eq!(fit_aspect(640, 320, DISPLAY_ASPECT), Viewport { x: 0.0, y: 0.0, width: 640.0, height: 320.0 });
    }

    #[test]
    fn letterboxes_tall_surfaces() {
        let vp = fit_aspect(640, 480, DISPLAY_ASPECT);
        assert_eq!((vp.width, vp.height), (640.0, 320.0));
        assert_eq!(vp.y, 80.0);
    }

    #[test]
    fn pillarboxes_wide_surfaces() {
        let vp = fit_aspect(1000, 300, DISPLAY_ASPECT);
        assert_eq!((vp.width, vp.height), (600.0, 300.0));
        assert_eq!(vp.x, 200.0);
    }

    #[test]
    fn zero_surface() {
        assert_eq!(fit_aspect(0, 10, DISPLAY_ASPECT).width, 0.0);
    }
}
