pub mod jobs;
pub mod waves;
pub mod webhooks;
