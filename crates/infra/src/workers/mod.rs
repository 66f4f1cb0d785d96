//! Background workers bound to the lifetime of their handles.

pub mod periodic;

pub use periodic::{PeriodicWorker, WorkerHandle};
