pub mod batch;
pub mod orchestrator;
pub mod progress;
pub mod selection;
pub mod session;
pub mod validator;
