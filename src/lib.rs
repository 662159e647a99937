// src/lib.rs — Library root for the consultation pipeline

pub mod cli;
pub mod core;
pub mod infra;
pub mod projection;
pub mod provider;
