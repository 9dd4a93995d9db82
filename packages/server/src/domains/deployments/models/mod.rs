mod deployment;

pub use deployment::Deployment;
