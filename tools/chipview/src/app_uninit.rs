use std::sync::Arc;

use chipview_core::error::RenderError;
use chipview_core::error_presenter::ErrorPresenter;
use chipview_core::negotiator::{Negotiator, RenderHandle};
use chipview_core::session::Session;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoopProxy};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::app_initialized::AppInitialized;
use crate::cli::Settings;
use crate::error_surface::{host_surface, HostTextSurface};
use crate::graphics;
use crate::host::Mailbox;
use crate::player::{FramePlayer, HEIGHT, WIDTH};

type Negotiated = Result<RenderHandle, RenderError>;

pub struct App {
    pub settings: Settings,
    pub session: Option<Session<FramePlayer>>,
    pub window: Option<Arc<Window>>,

    pub app_initialized: Option<AppInitialized>,

    proxy: EventLoopProxy<()>,
    negotiated: Mailbox<Negotiated, EventLoopProxy<()>>,

    error_presenter: Option<ErrorPresenter<HostTextSurface>>,
}

impl App {
    pub fn new(settings: Settings, proxy: EventLoopProxy<()>) -> Self {
        let session = Session::with_rom(FramePlayer::default, &settings.rom);

        Self {
            settings,
            session: Some(session),
            window: None,
            app_initialized: None,
            negotiated: Mailbox::new(proxy.clone()),
            proxy,
            error_presenter: None,
        }
    }

    fn init_window(&mut self, event_loop: &ActiveEventLoop) {
        info!("initializing...");
        #[allow(unused_mut)]
        let mut window_attributes = WindowAttributes::default()
            .with_title("chipview")
            .with_min_inner_size(LogicalSize::new(WIDTH, HEIGHT));

        #[cfg(not(target_arch = "wasm32"))]
        {
            let scale = self.settings.scale;
            window_attributes = window_attributes.with_inner_size(LogicalSize::new(WIDTH * scale, HEIGHT * scale));
        }

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowAttributesExtWebSys;

            let canvas = web_sys::window().and_then(|w| w.document()).and_then(|d| crate::helpers::get_canvas(&d));
            match &canvas {
                Some(canvas) => info!("found canvas: ({}, {})", canvas.width(), canvas.height()),
                None => tracing::warn!("no #chip-display canvas on the page, creating one"),
            }
            window_attributes = window_attributes.with_canvas(canvas).with_append(true);
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        let Some(dims) = self.session.as_ref().map(Session::dims) else {
            return;
        };
        let probes = graphics::probes(window, self.settings.backend);
        let mailbox = self.negotiated.clone();

        crate::spawn(async move {
            let mut negotiator = Negotiator::new(probes);
            let negotiated = negotiator.negotiate(dims).await.map(|_| ());
            let result = negotiated.and_then(|()| {
                negotiator.take().ok_or_else(|| RenderError::SessionLost { reason: "negotiated handle went missing".into() })
            });
            mailbox.post(result);
        });

        info!("initialized");
    }

    fn try_render_handle(&mut self) {
        let Some(window) = self.window.as_ref() else {
            return;
        };

        match self.negotiated.take() {
            Some(Ok(handle)) => {
                let Some(session) = self.session.take() else {
                    return;
                };
                info!("rendering with the {} backend", handle.kind());
                let proxy = self.proxy.clone();
                self.app_initialized = Some(AppInitialized::new(window.clone(), session, handle, &self.settings, proxy));
            }
            Some(Err(e)) => {
                let mut presenter = ErrorPresenter::new(host_surface(window));
                presenter.present(&e);
                self.error_presenter = Some(presenter);
            }
            None => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            self.init_window(event_loop);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            _ => (),
        }
    }

    fn user_event(&mut self, _: &ActiveEventLoop, (): ()) {
        if self.app_initialized.is_none() && self.error_presenter.is_none() {
            self.try_render_handle();
        }
    }

    fn about_to_wait(&mut self, _: &ActiveEventLoop) {
        if self.app_initialized.is_none() && self.error_presenter.is_none() {
            self.try_render_handle();
        }
    }
}
