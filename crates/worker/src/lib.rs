pub mod context;
pub mod handlers;
pub mod service;

pub use context::TaskContext;
pub use handlers::{HandlerRegistry, TaskHandler};
pub use service::{WorkerService, WorkerServiceBuilder};
