pub mod host_callback;
pub mod jobs;
