//! Request handlers, grouped by surface.

pub mod batch;
pub mod health;
pub mod jobs;
pub mod live;
