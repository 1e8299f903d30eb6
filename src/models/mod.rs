pub mod analytics;
pub mod certificate;
pub mod course;
pub mod enrollment;
pub mod notification;
pub mod payment;
pub mod submission;
pub mod task;
pub mod user;
