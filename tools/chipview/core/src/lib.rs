#![allow(clippy::single_match)]

//! Everything that decides *how* a monochrome framebuffer reaches the screen,
//! without linking a window system or a GPU API.
//!
//! Control flow is [`negotiator`] → [`resources`] → [`render_loop`], with
//! [`error_presenter`] catching whatever escapes. The host crate supplies the
//! concrete [`backend::BackendProbe`]s, a [`render_loop::Host`] and a
//! [`error_presenter::TextSurface`].

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod error_presenter;
pub mod frame;
pub mod input;
pub mod negotiator;
pub mod quad;
pub mod render_loop;
pub mod resources;
pub mod session;
pub mod viewport;

pub use error::RenderError;
