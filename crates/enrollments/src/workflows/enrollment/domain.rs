use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store identifier of an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnrollmentId(pub u64);

/// Store identifier of a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequirementId(pub u64);

/// Natural key of an enrollment; unique across the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnrollmentKey {
    pub user: String,
    pub year: i32,
    pub period: String,
}

impl EnrollmentKey {
    pub fn new(user: impl Into<String>, year: i32, period: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            year,
            period: period.into(),
        }
    }

    pub fn code(&self) -> String {
        EnrollmentCode {
            year: self.year,
            period: self.period.clone(),
        }
        .to_string()
    }
}

/// External `"{year}-{period}"` code of an enrollment, scoped to its user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentCode {
    pub year: i32,
    pub period: String,
}

impl EnrollmentCode {
    pub fn parse(raw: &str) -> Option<Self> {
        let (year, period) = raw.split_once('-')?;
        let year = year.trim().parse().ok()?;
        let period = period.trim();
        if period.is_empty() {
            return None;
        }
        Some(Self {
            year,
            period: period.to_string(),
        })
    }

    pub fn key_for(&self, user: &str) -> EnrollmentKey {
        EnrollmentKey::new(user, self.year, self.period.clone())
    }
}

impl fmt::Display for EnrollmentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.period)
    }
}

/// External `"{discipline}-{offering}"` code of a requirement, scoped to its enrollment.
///
/// Offering codes contain dashes themselves (`2014-1-A`), so only the first dash separates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementCode {
    pub discipline: String,
    pub offering: String,
}

impl RequirementCode {
    /// Joins discipline and offering; a discipline may not contain it.
    pub const SEPARATOR: char = '-';

    pub fn parse(raw: &str) -> Option<Self> {
        let (discipline, offering) = raw.split_once(Self::SEPARATOR)?;
        if discipline.trim().is_empty() || offering.trim().is_empty() {
            return None;
        }
        Some(Self {
            discipline: discipline.trim().to_string(),
            offering: offering.trim().to_string(),
        })
    }
}

impl fmt::Display for RequirementCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.discipline, Self::SEPARATOR, self.offering)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    New,
    Processed,
    Cancelled,
}

impl EnrollmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EnrollmentStatus::New => "new",
            EnrollmentStatus::Processed => "processed",
            EnrollmentStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementStatus {
    New,
    Approved,
    Rejected,
    Quit,
}

impl RequirementStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequirementStatus::New => "new",
            RequirementStatus::Approved => "approved",
            RequirementStatus::Rejected => "rejected",
            RequirementStatus::Quit => "quit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditRaiseStatus {
    Pending,
    Approved,
    Rejected,
}

/// Raised when the requested credit load exceeds the modality ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditRaiseRequest {
    pub requested_credits: u32,
    pub requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    pub status: CreditRaiseStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub id: EnrollmentId,
    pub key: EnrollmentKey,
    pub status: EnrollmentStatus,
    pub credit_raise_request: Option<CreditRaiseRequest>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EnrollmentRecord {
    pub fn code(&self) -> String {
        self.key.code()
    }

    pub fn view(&self) -> EnrollmentView {
        EnrollmentView {
            code: self.code(),
            year: self.key.year,
            period: self.key.period.clone(),
            status: self.status.label(),
            credit_raise_request: self.credit_raise_request.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementRecord {
    pub id: RequirementId,
    pub enrollment: EnrollmentId,
    pub discipline: String,
    pub offering: String,
    pub status: RequirementStatus,
    pub comment: Option<String>,
    /// Ranking at last save, 0 (lowest) to 9.
    pub priority: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RequirementRecord {
    pub fn code(&self) -> String {
        RequirementCode {
            discipline: self.discipline.clone(),
            offering: self.offering.clone(),
        }
        .to_string()
    }

    pub fn view(&self, enrollment_code: &str) -> RequirementView {
        RequirementView {
            code: self.code(),
            enrollment: enrollment_code.to_string(),
            discipline: self.discipline.clone(),
            offering: self.offering.clone(),
            status: self.status.label(),
            comment: self.comment.clone(),
            priority: self.priority,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Sanitized representation of an enrollment; the owning user stays out of responses.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentView {
    pub code: String,
    pub year: i32,
    pub period: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_raise_request: Option<CreditRaiseRequest>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequirementView {
    pub code: String,
    pub enrollment: String,
    pub discipline: String,
    pub offering: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub priority: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entity field a rejection is reported against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    CreatedAt,
    Period,
    Status,
    Discipline,
    Offering,
}

impl Field {
    pub const fn label(self) -> &'static str {
        match self {
            Field::CreatedAt => "created_at",
            Field::Period => "period",
            Field::Status => "status",
            Field::Discipline => "discipline",
            Field::Offering => "offering",
        }
    }
}

/// Named business-rule failures, worded as the clients of this service expect them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("required")]
    Required,
    #[error("must not contain '-'")]
    Separator,
    #[error("outside the enrollment period")]
    OutsideEnrollmentPeriod,
    #[error("outside of enrollment cancellation period")]
    OutsideCancellationPeriod,
    #[error("discipline offering not found")]
    OfferingNotFound,
    #[error("discipline requirement not fulfilled")]
    PrerequisiteNotFulfilled,
    #[error("user was already approved on discipline")]
    AlreadyApproved,
    #[error("discipline with time conflict")]
    TimeConflict,
    #[error("outside of discipline quit period")]
    OutsideQuitPeriod,
}

/// Every failing field of a write, at most one reason per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rejections(BTreeMap<Field, Rejection>);

impl Rejections {
    /// Record a failure; the first reason reported for a field wins.
    pub fn reject(&mut self, field: Field, reason: Rejection) {
        self.0.entry(field).or_insert(reason);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: Field) -> Option<Rejection> {
        self.0.get(&field).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, Rejection)> + '_ {
        self.0.iter().map(|(field, reason)| (*field, *reason))
    }

    /// `{field: reason}` body handed to HTTP clients.
    pub fn payload(&self) -> BTreeMap<&'static str, String> {
        self.iter()
            .map(|(field, reason)| (field.label(), reason.to_string()))
            .collect()
    }
}

impl fmt::Display for Rejections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(field, reason)| format!("{}: {}", field.label(), reason))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}
