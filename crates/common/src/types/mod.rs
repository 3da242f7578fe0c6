mod job_state;
mod snapshot;
mod split_url;
mod strategy;
mod transfer;
mod transfer_job;
mod webpage;
mod webpage_job;

pub use job_state::*;
pub use snapshot::*;
pub use split_url::*;
pub use strategy::*;
pub use transfer::*;
pub use transfer_job::*;
pub use webpage::*;
pub use webpage_job::*;
