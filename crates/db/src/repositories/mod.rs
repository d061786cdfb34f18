//! One zero-sized repository per table.

pub mod job_repo;
pub mod lock_repo;
pub mod wave_repo;

pub use job_repo::JobRepo;
pub use lock_repo::LockRepo;
pub use wave_repo::WaveRepo;
