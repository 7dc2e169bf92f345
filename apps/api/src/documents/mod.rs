pub mod autosave;
pub mod handlers;
