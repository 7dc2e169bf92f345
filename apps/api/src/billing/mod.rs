pub mod handlers;
pub mod plan;
pub mod stripe;
pub mod webhook;
