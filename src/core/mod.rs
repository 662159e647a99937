// src/core/mod.rs — Consultation workflow: roles, state machine, runner

pub mod chart;
pub mod checkpoint;
pub mod critique;
pub mod generator;
pub mod machine;
pub mod registry;
pub mod roles;
pub mod runner;
pub mod sentinel;
pub mod steps;
pub mod types;

pub use runner::WorkflowRunner;
pub use types::{
    BusinessContext, BusinessStage, CancelHandle, RunOptions, Stage, StageEvent, WorkflowState,
};
