pub mod canvas_view;
pub mod pipeline_panel;
