pub mod canvas_ops;
pub mod graph;
pub mod reconstruct;
pub mod stroke;
