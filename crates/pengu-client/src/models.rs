//! Normalized entity models mirrored from the marketplace backend.
//!
//! Field names on the wire are camelCase (the backend's native convention)
//! with one historical exception, the student wallet field `pengu_credits`.
//! Every record is expected to have passed through [`crate::normalize`]
//! before deserialization, so a canonical string `id` is always present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anything living in a collection cache, keyed by its canonical id.
pub trait Entity {
    fn id(&self) -> &str;
}

macro_rules! impl_entity {
    ($($ty:ty),+ $(,)?) => {
        $(impl Entity for $ty {
            fn id(&self) -> &str {
                &self.id
            }
        })+
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Expert,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Banned,
    Suspended,
}

impl Default for UserStatus {
    fn default() -> Self {
        UserStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub status: UserStatus,
    /// Student wallet balance; refunded on withdrawal rejection.
    #[serde(rename = "pengu_credits", default)]
    pub pengu_credits: f64,
    /// Bearer token issued at login, forwarded to the gateway.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Submitted,
    Quoted,
    Negotiation,
    Accepted,
    Converted,
    Expired,
}

/// A student's service ask, converted into exactly one order on acceptance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub id: String,
    #[serde(default)]
    pub student_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    pub status: RequestStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationMessage {
    #[serde(default)]
    pub sender_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Versioned offer against a request, carrying its negotiation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: String,
    pub request_id: String,
    #[serde(default)]
    pub expert_id: Option<String>,
    pub amount: f64,
    pub status: QuoteStatus,
    #[serde(default)]
    pub negotiation_history: Vec<NegotiationMessage>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MilestoneStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "DELIVERED")]
    Delivered,
    #[serde(rename = "APPROVED")]
    Approved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub status: MilestoneStatus,
    /// File names submitted with a delivery.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

/// Order status. `Review` keeps its historical mixed-case wire spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "PENDING_VERIFICATION")]
    PendingVerification,
    #[serde(rename = "PAID_CONFIRMED")]
    PaidConfirmed,
    #[serde(rename = "ASSIGNED")]
    Assigned,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "Review")]
    Review,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "DISPUTE")]
    Dispute,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

/// The fulfillment unit. Progress is derived from milestone approval and is
/// only ever what the server last confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub expert_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub commission: Option<f64>,
    pub status: OrderStatus,
    /// Percentage of approved milestones, 0..=100.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutKind {
    Bank,
    #[serde(rename = "mobile_wallet")]
    MobileWallet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutMethod {
    pub id: String,
    pub kind: PayoutKind,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    /// At most one method per profile is primary; the server enforces this,
    /// the client only reflects it.
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpertProfile {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub earnings: f64,
    #[serde(default)]
    pub payout_methods: Vec<PayoutMethod>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    Pending,
    Confirmed,
    Approved,
    Paid,
    Rejected,
}

/// Payout ask tied to exactly one of an expert or a student, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: String,
    #[serde(default)]
    pub expert_id: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
    pub amount: f64,
    pub status: WithdrawalStatus,
    #[serde(default)]
    pub payout_method_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Income,
    Commission,
    Payout,
    ExpertCredit,
    StudentEarning,
}

/// Append-only ledger entry; never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialTransaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyllabusEvent {
    pub id: String,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub course_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    #[serde(default)]
    pub student_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpertApplication {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub expert_id: Option<String>,
    pub rating: f64,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub recipient_id: Option<String>,
    pub body: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarouselSlide {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
}

/// Platform-wide settings shared by every authenticated role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSettings {
    pub commission_rate: f64,
}

impl_entity!(
    User,
    ServiceRequest,
    Quote,
    Order,
    Milestone,
    ExpertProfile,
    PayoutMethod,
    WithdrawalRequest,
    FinancialTransaction,
    Skill,
    SyllabusEvent,
    Course,
    ExpertApplication,
    Review,
    Notification,
    Message,
    CarouselSlide,
);
