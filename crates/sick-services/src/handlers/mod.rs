//! HTTP handlers

pub mod cola;
pub mod parameters;
pub mod status;
