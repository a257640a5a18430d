pub mod job_repo;
pub mod run_repo;

pub use job_repo::JobRepo;
pub use run_repo::RunRepo;
