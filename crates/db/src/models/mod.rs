pub mod job;
pub mod lock;
pub mod wave;
