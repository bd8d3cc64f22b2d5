//! Student enrollment requests for an academic term.
//!
//! An enrollment owns the course-offering requirements a student files for a term. Every
//! requirement write runs through admission checks against the catalog, history, and calendar
//! services, is ranked for later seat allocation, and refreshes the enrollment's credit total
//! against the student's modality ceiling.

pub mod config;
pub mod error;
pub mod remote;
pub mod telemetry;
pub mod workflows;
