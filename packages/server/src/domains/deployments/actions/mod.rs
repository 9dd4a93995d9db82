//! Deployment actions: the admission surface the HTTP shell binds to.

mod cancel;
mod complete;
mod queries;
mod submit;

pub use cancel::cancel_deployment;
pub use complete::complete_deployment;
pub use queries::{get_deployment, list_deployments};
pub use submit::{submit_deployment, SubmitDeploymentInput};
