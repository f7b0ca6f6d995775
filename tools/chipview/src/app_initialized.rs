use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use chipview_core::config::LoopConfig;
use chipview_core::engine::Rom;
use chipview_core::error::RenderError;
use chipview_core::error_presenter::ErrorPresenter;
use chipview_core::input::KeyMap;
use chipview_core::negotiator::RenderHandle;
use chipview_core::render_loop::{run_frame, FrameReport, Presenter};
use chipview_core::session::Session;
use tracing::{debug, error, info, warn};
use wasm_bindgen::prelude::*;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoopProxy};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::audio::BeepAudio;
use crate::cli::Settings;
use crate::error_surface::{host_surface, HostTextSurface};
use crate::host::{Mailbox, WindowHost};
use crate::player::FramePlayer;

thread_local! {
    static ROM_DATA: RefCell<Option<Vec<u8>>> = const { RefCell::new(None) };
    static SHOULD_SHUTDOWN: Cell<bool> = const { Cell::new(false) };
    static LOOP_STOP: Cell<bool> = const { Cell::new(false) };
}

/// Hand a ROM to the viewer from the page.
#[wasm_bindgen]
pub fn update_rom_data(data: &[u8]) {
    info!("loading new rom into rust memory");
    ROM_DATA.with(|storage| {
        *storage.borrow_mut() = Some(data.to_vec());
    });
}

#[wasm_bindgen]
pub fn request_close() {
    warn!("closing viewer");
    SHOULD_SHUTDOWN.with(|flag| flag.set(true));
}

#[wasm_bindgen]
pub fn stop_frame_loop() {
    warn!("stopping frame loop");
    LOOP_STOP.with(|flag| flag.set(true));
}

/// Physical keys in on-screen keypad order: the left block of a QWERTY board.
fn keypad_bindings() -> KeyMap<KeyCode> {
    use KeyCode::*;

    #[rustfmt::skip]
    let keys = [
        Digit1, Digit2, Digit3, Digit4,
        KeyQ,   KeyW,   KeyE,   KeyR,
        KeyA,   KeyS,   KeyD,   KeyF,
        KeyZ,   KeyX,   KeyC,   KeyV,
    ];
    KeyMap::hex_keypad(keys)
}

pub struct AppInitialized {
    pub window: Arc<Window>,
    presenter: Rc<RefCell<Presenter<FramePlayer>>>,
    host: Rc<WindowHost>,
    loop_config: LoopConfig,
    input_bindings: KeyMap<KeyCode>,
    audio: BeepAudio,

    /// Errors raised inside a frame callback. Posting one wakes the loop.
    fatal: Mailbox<RenderError, EventLoopProxy<()>>,
    error_presenter: Option<ErrorPresenter<HostTextSurface>>,
}

impl AppInitialized {
    pub fn new(
        window: Arc<Window>,
        session: Session<FramePlayer>,
        mut handle: RenderHandle,
        settings: &Settings,
        proxy: EventLoopProxy<()>,
    ) -> Self {
        let size = window.inner_size();
        handle.resize(size.width, size.height);

        let audio = BeepAudio::default();
        // browsers refuse to open audio before a user gesture
        #[cfg(not(target_arch = "wasm32"))]
        audio.start();

        let app = Self {
            host: Rc::new(WindowHost::new(window.clone())),
            window,
            presenter: Rc::new(RefCell::new(Presenter::new(session, handle, Box::new(audio.clone())))),
            loop_config: settings.loop_config,
            input_bindings: keypad_bindings(),
            audio,
            fatal: Mailbox::new(proxy),
            error_presenter: None,
        };

        app.update_title();
        app.window.request_redraw();
        app
    }

    fn update_title(&self) {
        let presenter = self.presenter.borrow();
        let rom = presenter.session.rom_name().unwrap_or("no rom");
        self.window.set_title(&format!("chipview: {rom} ({})", presenter.handle().kind()));
    }

    fn is_stopped(&self) -> bool {
        self.error_presenter.is_some()
    }

    fn handle_redraw(&self) {
        if self.is_stopped() {
            return;
        }

        let presenter = self.presenter.clone();
        let host = self.host.clone();
        let config = self.loop_config;
        let fatal = self.fatal.clone();

        crate::spawn(async move {
            match run_frame(&presenter, &*host, &config).await {
                Ok(FrameReport::Presented { ticks }) => debug!("presented after {ticks} ticks"),
                Ok(report) => debug!("frame callback: {report:?}"),
                Err(e) => fatal.post(e),
            }
        });
    }

    fn handle_key(&self, event: &KeyEvent) {
        if event.repeat {
            return;
        }
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };

        let mut presenter = self.presenter.borrow_mut();
        let slot = match event.state {
            ElementState::Pressed => presenter.session.key_down(&code, &self.input_bindings),
            ElementState::Released => presenter.session.key_up(&code, &self.input_bindings),
        };
        if let Some(slot) = slot {
            debug!("keypad slot {slot} {:?}", event.state);
        }
    }

    fn load_rom(&mut self, rom: Rom) {
        if self.is_stopped() {
            warn!("renderer is gone, ignoring rom '{}'", rom.name);
            return;
        }

        let loaded = self.presenter.borrow_mut().load_rom(&rom);
        match loaded {
            Ok(()) => {
                info!("successfully loaded {}", rom.name);
                self.update_title();
                self.window.request_redraw();
            }
            Err(e) => self.fatal.post(e),
        }
    }

    fn load_rom_file(&mut self, path: &Path) {
        let name = path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        match std::fs::read(path) {
            Ok(bytes) => self.load_rom(Rom::new(name, bytes)),
            Err(e) => error!("couldn't read {}: {e}", path.display()),
        }
    }

    fn handle_fatal(&mut self) {
        let Some(e) = self.fatal.take() else {
            return;
        };

        {
            let mut presenter = self.presenter.borrow_mut();
            presenter.stop();
            presenter.handle_mut().teardown();
        }

        let mut error_presenter = ErrorPresenter::new(host_surface(&self.window));
        error_presenter.present(&e);
        self.error_presenter = Some(error_presenter);
    }
}

impl ApplicationHandler for AppInitialized {
    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {
        // nothing to do, the surface outlives suspension on every target we ship
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("close requested, stopping");
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => self.handle_redraw(),
            WindowEvent::Resized(new_size) => {
                if !self.is_stopped() {
                    self.presenter.borrow_mut().handle_mut().resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed {
                    self.audio.start();
                }
                self.handle_key(&event);
            }
            WindowEvent::MouseInput { .. } | WindowEvent::Touch(_) => self.audio.start(),
            WindowEvent::DroppedFile(path) => self.load_rom_file(&path),
            _ => (),
        }
    }

    fn user_event(&mut self, _: &ActiveEventLoop, (): ()) {
        self.handle_fatal();
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(data) = ROM_DATA.take() {
            if data.is_empty() {
                warn!("ignoring empty rom");
            } else {
                self.load_rom(Rom::new("uploaded", data));
            }
        }

        if LOOP_STOP.take() {
            self.presenter.borrow_mut().stop();
        }

        if SHOULD_SHUTDOWN.get() {
            event_loop.exit();
        }

        self.handle_fatal();
        self.audio.process_audio();
    }
}
