pub mod candidate;
pub mod upload;
