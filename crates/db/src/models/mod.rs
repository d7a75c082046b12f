pub mod gig;
pub mod gig_job;
pub mod moderator;
