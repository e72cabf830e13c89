pub mod face_config;
pub mod failure;
pub mod job;
pub mod provider;
pub mod speech;
