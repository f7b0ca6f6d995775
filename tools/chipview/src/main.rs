#![allow(clippy::single_match)]

mod app_delegation;
mod app_initialized;
mod app_uninit;
mod audio;
mod cli;
mod error_surface;
#[cfg(not(target_arch = "wasm32"))]
mod executor;
mod graphics;
mod helpers;
mod host;
mod player;

use std::future::Future;

use tracing::{info, Level};
use tracing_subscriber::util::SubscriberInitExt;
use winit::event_loop::{ControlFlow, EventLoop};

use crate::app_delegation::DelegatedApp::Uninitialized;
use crate::app_uninit::App;

#[cfg(target_arch = "wasm32")]
use web_sys::Event;

fn setup_logging(level: Level) {
    #[cfg(target_arch = "wasm32")]
    {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_wasm::{WASMLayer, WASMLayerConfigBuilder};

        let wlconfig = WASMLayerConfigBuilder::new().set_max_level(level).build();

        tracing_subscriber::registry().with(WASMLayer::new(wlconfig)).init();
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        tracing_subscriber::fmt().with_max_level(level).compact().finish().init();
    }
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen::prelude::wasm_bindgen(start))]
#[cfg(target_arch = "wasm32")]
pub fn wasm_main() {
    use std::panic;
    use winit::platform::web::EventLoopExtWebSys;

    panic::set_hook(Box::new(|panic_info| {
        console_error_panic_hook::hook(panic_info);
        // let the page know, so it can swap in its own fallback
        if let Some(window) = web_sys::window() {
            if let Ok(event) = Event::new("wasm-panic") {
                let _ = window.dispatch_event(&event);
            }
        }
    }));

    setup_logging(Level::WARN);
    info!("console logger started.");

    let event_loop = match EventLoop::<()>::with_user_event().build() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            tracing::error!("couldn't create event loop: {e}");
            return;
        }
    };
    event_loop.set_control_flow(ControlFlow::Wait);

    let proxy = event_loop.create_proxy();
    let app = Uninitialized(App::new(cli::Settings::default(), proxy));
    event_loop.spawn_app(app);
}

#[cfg(target_arch = "wasm32")]
pub fn main() {}

#[cfg(not(target_arch = "wasm32"))]
pub fn main() -> anyhow::Result<()> {
    use clap::Parser;
    use thread_priority::*;

    let cli = cli::Cli::parse();
    setup_logging(cli.log_level);
    info!("stdout logger started");

    let settings = cli.into_settings()?;

    let event_loop = EventLoop::<()>::with_user_event().build()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    // if it didn't work, oh well
    let _ = set_current_thread_priority(ThreadPriority::Max);

    let proxy = event_loop.create_proxy();
    let mut app = Uninitialized(App::new(settings, proxy));
    event_loop.run_app(&mut app)?;

    Ok(())
}

/// Queue a future: on the page's microtask queue in the browser, on the
/// event loop's own pool natively.
pub fn spawn<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    #[cfg(target_arch = "wasm32")]
    wasm_bindgen_futures::spawn_local(future);
    #[cfg(not(target_arch = "wasm32"))]
    executor::spawn(future);
}
