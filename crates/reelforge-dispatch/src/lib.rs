//! Dispatchers hand a task holder tree and its input crawlers off for
//! execution: in a local child process or as render farm jobs.

pub mod dispatcher;
pub mod local;
pub mod renderfarm;

pub use dispatcher::{Dispatcher, DispatcherEnvelope, DispatcherFactory, DispatcherRegistry};
pub use local::{run_local_job, LocalDispatcher, LocalJob};
pub use renderfarm::job::{JobData, JobKind};
pub use renderfarm::manager::{DeadlineFarmManager, FarmManager, JobSubmission};
pub use renderfarm::{chunkify, run_farm_job, RenderfarmDispatcher};
