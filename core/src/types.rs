//! Wire types for the courier API.
//!
//! Field names follow the API's camelCase JSON. Only the fields the
//! client reads are modelled; unknown fields are ignored on decode.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpResponse {
    pub otp_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub verification_code: String,
    pub verification_id: String,
    pub phone_number: String,
}

/// A customer/agent pair the signed-in user may act as.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub customer_id: String,
    pub agent_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub access_token: String,
    pub user_id: String,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageStatus {
    Request,
    Pending,
    Started,
    Placed,
    Complete,
    Canceled,
    /// Canceled before being placed.
    Incomplete,
}

impl PackageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PackageStatus::Request => "REQUEST",
            PackageStatus::Pending => "PENDING",
            PackageStatus::Started => "STARTED",
            PackageStatus::Placed => "PLACED",
            PackageStatus::Complete => "COMPLETE",
            PackageStatus::Canceled => "CANCELED",
            PackageStatus::Incomplete => "INCOMPLETE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub package_id: String,
    pub tracking_number: String,
    pub status: PackageStatus,
    #[serde(default)]
    pub tracking_link: Option<String>,
    #[serde(default)]
    pub driver_id: Option<String>,
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Paginated list as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Filters for listing a customer's packages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageQuery {
    pub statuses: Vec<PackageStatus>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub branch_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub contact_id: String,
    pub customer_id: String,
    pub phone_number_one: String,
    #[serde(default)]
    pub phone_number_two: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContactList {
    pub total_count: u64,
    pub contacts: Vec<Contact>,
}

/// Payload for creating a contact. `customer_id` goes in the path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    #[serde(skip)]
    pub customer_id: String,
    pub phone_number_one: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number_two: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
}
