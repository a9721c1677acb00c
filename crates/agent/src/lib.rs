//! HTTP surface and settings of the mediation agent

pub mod api;
pub mod settings;
