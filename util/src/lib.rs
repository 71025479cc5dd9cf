pub mod config;
pub mod job;
pub mod manifest;
pub mod notebook;
pub mod paths;
pub mod state;
pub mod storage;
pub mod test_outcome;
pub mod tier;
pub mod worker_auth;
