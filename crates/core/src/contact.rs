//! Human follow-up requests collected by the contact dialogue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    FraudReport,
    GeneralInquiry,
    Dissatisfied,
    Other,
}

impl QueryType {
    /// Whether the admissions team may see the requester's phone number.
    pub fn phone_visible(&self) -> bool {
        matches!(self, QueryType::FraudReport | QueryType::GeneralInquiry)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::FraudReport => "fraud_report",
            QueryType::GeneralInquiry => "general_inquiry",
            QueryType::Dissatisfied => "dissatisfied",
            QueryType::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QueryType::FraudReport => "Report fraud / unauthorized agent",
            QueryType::GeneralInquiry => "General admission inquiry",
            QueryType::Dissatisfied => "Not satisfied with the assistant",
            QueryType::Other => "Other",
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fraud_report" => Ok(QueryType::FraudReport),
            "general_inquiry" => Ok(QueryType::GeneralInquiry),
            "dissatisfied" => Ok(QueryType::Dissatisfied),
            "other" => Ok(QueryType::Other),
            other => Err(format!("unknown query type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    Pending,
    Contacted,
    Resolved,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::Pending => "pending",
            ContactStatus::Contacted => "contacted",
            ContactStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for ContactStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ContactStatus::Pending),
            "contacted" => Ok(ContactStatus::Contacted),
            "resolved" => Ok(ContactStatus::Resolved),
            other => Err(format!("unknown contact status: {other}")),
        }
    }
}

/// A finalized request for human follow-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRequest {
    pub reference_id: String,
    pub name: String,
    pub email: String,
    /// Digits only.
    pub phone: String,
    pub query_type: QueryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: ContactStatus,
    pub created_at: DateTime<Utc>,
}

impl ContactRequest {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        query_type: QueryType,
        message: Option<String>,
    ) -> Self {
        Self {
            reference_id: new_reference_id(),
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            query_type,
            message,
            status: ContactStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Copy suitable for a notification sink: the phone number is blanked
    /// unless the query type allows it to be shared.
    pub fn for_notification(&self) -> (ContactRequest, bool) {
        let visible = self.query_type.phone_visible();
        let mut copy = self.clone();
        if !visible {
            copy.phone = String::new();
        }
        (copy, visible)
    }
}

/// Short human-quotable reference: first 8 hex digits of a UUID v4.
pub fn new_reference_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_ascii_uppercase()
}
