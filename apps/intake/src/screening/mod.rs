pub mod overlay;
pub mod stage_view;
