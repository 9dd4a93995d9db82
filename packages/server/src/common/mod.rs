// Common types shared across the kernel and domain layers

pub mod actor;
pub mod error;
pub mod resources;

pub use actor::{Actor, Role};
pub use error::SchedulerError;
pub use resources::ResourceVector;
