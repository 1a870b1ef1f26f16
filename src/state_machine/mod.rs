// Per-delivery state machines for the dispatcher and the worker.
//
// These states exist only for the duration of one delivery and are never
// persisted; the durable lifecycle lives in the task's `status` field.

pub mod states;

pub use states::{DispatcherState, WorkerState};
