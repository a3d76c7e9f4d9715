pub mod job;
pub mod pool;

pub use job::{Job, JobResult};
pub use pool::{JobQueue, WorkerPool};

// Lets callers name the result receiver type
pub use crossbeam_channel;
