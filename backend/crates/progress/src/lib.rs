//! Weekly team progress and risk scoring.

pub mod calculators;
pub mod insights;
pub mod scheduler;
pub mod scoring;
pub mod service;
pub mod summary;
pub mod week;

#[cfg(test)]
mod testing;
