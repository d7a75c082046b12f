pub mod gig_job_repo;
pub mod gig_repo;
pub mod moderator_repo;

pub use gig_job_repo::GigJobRepo;
pub use gig_repo::GigRepo;
pub use moderator_repo::ModeratorRepo;
