pub mod handlers;
pub mod titles;
