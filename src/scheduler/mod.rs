// src/scheduler/mod.rs
mod runner;
mod trigger;

pub use runner::{CommandTaskRunner, TaskError, TaskRunner};
pub use trigger::{SchedulerTrigger, TokenGuard, TriggerError, TOKEN_HEADER};
