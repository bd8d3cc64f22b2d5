//! Enrollment and requirement workflow: calendar gating, admission checks, priority ranking,
//! and credit-raise aggregation over the enrollment store.
//!
//! A requirement write always runs validate, score, persist, then aggregate, in that order.
//! Writes to the same enrollment are serialized by the service.

pub(crate) mod admission;
pub mod credits;
pub mod domain;
pub mod memory;
pub mod ranking;
pub mod repository;
pub mod router;
pub mod service;
pub mod window;

#[cfg(test)]
mod tests;

pub use admission::{AdmissionValidator, Candidate};
pub use credits::{CreditAggregator, CreditAssessment, CreditError};
pub use domain::{
    CreditRaiseRequest, CreditRaiseStatus, EnrollmentCode, EnrollmentId, EnrollmentKey,
    EnrollmentRecord, EnrollmentStatus, EnrollmentView, Field, Rejection, Rejections,
    RequirementCode, RequirementId, RequirementRecord, RequirementStatus, RequirementView,
};
pub use memory::{MemoryEnrollmentRepository, MemoryRequirementRepository};
pub use ranking::{priority_score, semester_index, PrioritySignals, RankScorer, RankingError};
pub use repository::{EnrollmentRepository, RepositoryError, RequirementRepository};
pub use router::enrollment_router;
pub use service::{
    EnrollmentService, EnrollmentServiceError, EnrollmentUpdate, RequirementUpdate,
    RequirementWrite,
};
pub use window::{CalendarWindow, WindowError, WindowGate};
