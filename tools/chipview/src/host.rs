use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use chipview_core::render_loop::Host;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use winit::event_loop::EventLoopProxy;
use winit::window::Window;

use crate::helpers::get_now_ms;

/// Schedules frames through winit's redraw requests.
pub struct WindowHost {
    window: Arc<Window>,
}

impl WindowHost {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }
}

impl Host for WindowHost {
    fn now_ms(&self) -> f64 {
        get_now_ms()
    }

    fn pause(&self, quantum: Duration) -> LocalBoxFuture<'static, ()> {
        #[cfg(target_arch = "wasm32")]
        {
            // setTimeout granularity: sub-millisecond pauses become a plain yield
            let millis = quantum.as_millis().min(u32::MAX as u128) as u32;
            gloo_timers::future::TimeoutFuture::new(millis).boxed_local()
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            crate::executor::Delay::new(quantum).boxed_local()
        }
    }

    fn request_frame(&self) {
        self.window.request_redraw();
    }
}

/// Wakes the event loop so it looks at what a spawned task left behind.
pub trait Nudge {
    fn nudge(&self);
}

impl Nudge for EventLoopProxy<()> {
    fn nudge(&self) {
        // fails only once the loop has exited
        let _ = self.send_event(());
    }
}

/// One-slot hand-off from a spawned task to the event loop. The first value
/// posted is kept until taken; later ones are dropped.
pub struct Mailbox<T, N> {
    slot: Rc<RefCell<Option<T>>>,
    nudge: N,
}

impl<T, N: Nudge> Mailbox<T, N> {
    pub fn new(nudge: N) -> Self {
        Self { slot: Rc::new(RefCell::new(None)), nudge }
    }

    pub fn post(&self, value: T) {
        {
            let mut slot = self.slot.borrow_mut();
            if slot.is_some() {
                return;
            }
            *slot = Some(value);
        }
        self.nudge.nudge();
    }

    pub fn take(&self) -> Option<T> {
        self.slot.borrow_mut().take()
    }
}

impl<T, N: Clone> Clone for Mailbox<T, N> {
    fn clone(&self) -> Self {
        Self { slot: self.slot.clone(), nudge: self.nudge.clone() }
    }
}
