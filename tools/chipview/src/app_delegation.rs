use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::WindowId;

use crate::app_initialized::AppInitialized;
use crate::app_uninit::App;

/// Negotiating until a renderer exists, presenting afterwards.
pub enum DelegatedApp {
    Uninitialized(App),
    Initialized(AppInitialized),
}

impl ApplicationHandler for DelegatedApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        match self {
            DelegatedApp::Uninitialized(app) => app.resumed(event_loop),
            DelegatedApp::Initialized(app) => app.resumed(event_loop),
        }
    }

    /// A spawned task left a result behind.
    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ()) {
        match self {
            DelegatedApp::Uninitialized(app) => {
                app.user_event(event_loop, event);
                self.promote();
            }
            DelegatedApp::Initialized(app) => app.user_event(event_loop, event),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        match self {
            DelegatedApp::Uninitialized(app) => app.window_event(event_loop, window_id, event),
            DelegatedApp::Initialized(app) => app.window_event(event_loop, window_id, event),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        #[cfg(not(target_arch = "wasm32"))]
        crate::executor::drive();

        match self {
            DelegatedApp::Uninitialized(app) => {
                app.about_to_wait(event_loop);
                self.promote();
            }
            DelegatedApp::Initialized(app) => app.about_to_wait(event_loop),
        }
    }
}

impl DelegatedApp {
    fn promote(&mut self) {
        if let DelegatedApp::Uninitialized(app) = self {
            if let Some(app_initialized) = app.app_initialized.take() {
                *self = DelegatedApp::Initialized(app_initialized);
            }
        }
    }
}
