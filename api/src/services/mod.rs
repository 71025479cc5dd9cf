//! Dispatch-side logic shared by the route handlers.

pub mod blobs;
pub mod dispatch;
pub mod intake;
pub mod job_builder;
