pub mod chat;
pub mod document;
pub mod profile;
pub mod project;
pub mod recording;
