pub mod merge_dialog;
pub mod panels;
pub mod plot;
