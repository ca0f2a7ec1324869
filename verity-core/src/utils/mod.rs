pub mod backoff;
pub mod json;
