pub mod guard;
pub mod worker_pool;

pub use worker_pool::WorkerPool;
