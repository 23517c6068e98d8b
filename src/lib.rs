//! SketchPair: paired front/side sketch canvases feeding a sketch-to-mesh
//! pipeline (graph build, graph inference, mesh fusion).

#[macro_use]
pub mod logger;

pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod controller;
pub mod error;
pub mod io;
pub mod ops;
pub mod pipeline;
pub mod renderer;
pub mod session;
pub mod settings;

pub use error::SketchError;
