//! Domain model types for Gatehouse.
//!
//! This module defines the core types shared by every session component:
//! - [`UserId`] - Identity key of an authenticated user
//! - [`UserProfile`] - Snapshot of the signed-in user's profile
//! - [`AccountType`] - Kind of customer account
//! - [`SessionStatus`] - Authoritative session state
//! - [`SessionSnapshot`] - Outward signal value observed by the UI layer
//! - [`LoginCredentials`], [`RegistrationRequest`], [`RegisteredUser`] - Boundary payloads

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::store::Secret;

/// Identity key of a user.
///
/// The backend issues numeric ids; they are kept as strings so that the
/// identity key can also be used as a storage path component.
///
/// # Examples
///
/// ```
/// use gatehouse_core::UserId;
///
/// let id = UserId::from(42_u64);
/// assert_eq!(id.as_str(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a new user id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the user id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<u64> for UserId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match NumberOrText::deserialize(deserializer)? {
            NumberOrText::Number(n) => Ok(Self::from(n)),
            NumberOrText::Text(s) => Ok(Self(s)),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u64),
    Text(String),
}

/// Kind of customer account.
///
/// The backend encodes it as `0` (individual), `1` (business) or
/// `2` (sole proprietor); older clients send the names instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum AccountType {
    #[default]
    Individual,
    Business,
    SoleProprietor,
    Other(String),
}

impl AccountType {
    /// Get the canonical name of this account type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Individual => "individual",
            Self::Business => "business",
            Self::SoleProprietor => "sole_proprietor",
            Self::Other(name) => name,
        }
    }

    /// Decode the numeric wire form.
    pub fn from_code(code: u64) -> Self {
        match code {
            0 => Self::Individual,
            1 => Self::Business,
            2 => Self::SoleProprietor,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<&str> for AccountType {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "0" | "individual" => Self::Individual,
            "1" | "business" | "legal_entity" => Self::Business,
            "2" | "sole_proprietor" | "entrepreneur" => Self::SoleProprietor,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AccountType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AccountType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match NumberOrText::deserialize(deserializer)? {
            NumberOrText::Number(code) => Ok(Self::from_code(code)),
            NumberOrText::Text(name) => Ok(Self::from(name.as_str())),
        }
    }
}

/// Snapshot of the signed-in user's profile.
///
/// Replaced wholesale on every successful profile fetch. Field names on the
/// wire follow the backend (`first_name`, `type_account`, `inn`, `kpp`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Identity key.
    pub id: UserId,

    pub email: String,

    #[serde(default)]
    pub phone: String,

    #[serde(rename = "first_name", alias = "display_name", default)]
    pub display_name: String,

    #[serde(rename = "type_account", alias = "account_type", default)]
    pub account_type: AccountType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,

    /// Taxpayer identification number.
    #[serde(rename = "inn", alias = "tax_id", default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,

    /// Tax registration reason code (businesses only).
    #[serde(rename = "kpp", default, skip_serializing_if = "Option::is_none")]
    pub tax_reason_code: Option<String>,

    #[serde(default)]
    pub premium: bool,

    #[serde(
        default,
        deserialize_with = "deserialize_expiry",
        skip_serializing_if = "Option::is_none"
    )]
    pub premium_expiry: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Create a minimal individual profile.
    pub fn new(id: impl Into<UserId>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            phone: String::new(),
            display_name: String::new(),
            account_type: AccountType::Individual,
            company_name: None,
            tax_id: None,
            tax_reason_code: None,
            premium: false,
            premium_expiry: None,
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Mark the profile as premium until the given instant (or indefinitely).
    pub fn with_premium(mut self, expiry: Option<DateTime<Utc>>) -> Self {
        self.premium = true;
        self.premium_expiry = expiry;
        self
    }

    /// Whether premium features are available at `now`.
    pub fn has_active_premium(&self, now: DateTime<Utc>) -> bool {
        self.premium && self.premium_expiry.is_none_or(|expiry| expiry > now)
    }
}

/// Accepts RFC 3339 timestamps as well as the naive form the backend emits.
fn deserialize_expiry<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

/// Authoritative session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Process start, no probe has run yet.
    #[default]
    Anonymous,
    /// Startup probe in flight.
    Initializing,
    Authenticated,
    Unauthenticated,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Initializing => "initializing",
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outward view of the session, published after every transition.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub profile: Option<UserProfile>,

    /// Set once the startup probe (or any later transition) has settled.
    pub initialized: bool,

    /// The session ended because credential renewal failed.
    pub expired: bool,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated && self.profile.is_some()
    }

    pub fn identity(&self) -> Option<&UserId> {
        self.profile.as_ref().map(|p| &p.id)
    }
}

/// Credentials submitted to the login endpoint.
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    /// Login identifier (the account email).
    pub identifier: String,
    pub secret: Secret,
}

impl LoginCredentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: Secret::new(secret),
        }
    }
}

/// Payload of the registration endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationRequest {
    pub email: String,
    pub password: Secret,
    pub phone: String,
    #[serde(rename = "type_account", serialize_with = "serialize_account_code")]
    pub account_type: AccountType,
    #[serde(rename = "first_name")]
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(rename = "inn", skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(rename = "kpp", skip_serializing_if = "Option::is_none")]
    pub tax_reason_code: Option<String>,
}

impl RegistrationRequest {
    /// An individual account with only the required fields set.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: Secret::new(password),
            phone: String::new(),
            account_type: AccountType::Individual,
            display_name: String::new(),
            company_name: None,
            tax_id: None,
            tax_reason_code: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Register a business, which the server requires a company name and tax id for.
    pub fn as_business(mut self, company_name: impl Into<String>, tax_id: impl Into<String>) -> Self {
        self.account_type = AccountType::Business;
        self.company_name = Some(company_name.into());
        self.tax_id = Some(tax_id.into());
        self
    }
}

fn serialize_account_code<S: Serializer>(
    account_type: &AccountType,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match account_type {
        AccountType::Individual => serializer.serialize_u8(0),
        AccountType::Business => serializer.serialize_u8(1),
        AccountType::SoleProprietor => serializer.serialize_u8(2),
        AccountType::Other(name) => serializer.serialize_str(name),
    }
}

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegisteredUser {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_from_backend_payload() {
        let profile: UserProfile = serde_json::from_value(serde_json::json!({
            "id": 7,
            "email": "anna@example.com",
            "phone": "79990001122",
            "first_name": "Anna",
            "type_account": 1,
            "company_name": "Horns & Hooves",
            "inn": "7701234567",
            "kpp": "770101001",
            "premium": true,
            "premium_expiry": "2031-05-01T12:00:00"
        }))
        .unwrap();

        assert_eq!(profile.id, UserId::new("7"));
        assert_eq!(profile.display_name, "Anna");
        assert_eq!(profile.account_type, AccountType::Business);
        assert_eq!(profile.tax_id.as_deref(), Some("7701234567"));
        assert_eq!(profile.tax_reason_code.as_deref(), Some("770101001"));
        assert!(profile.premium_expiry.is_some());
    }

    #[test]
    fn test_profile_accepts_string_account_type() {
        let profile: UserProfile = serde_json::from_value(serde_json::json!({
            "id": "u-1",
            "email": "a@example.com",
            "type_account": "sole_proprietor"
        }))
        .unwrap();

        assert_eq!(profile.account_type, AccountType::SoleProprietor);
        assert!(!profile.premium);
    }

    #[test]
    fn test_premium_expiry() {
        let now = Utc::now();
        let lapsed = UserProfile::new("1", "a@example.com")
            .with_premium(Some(now - chrono::Duration::days(1)));
        let active = UserProfile::new("1", "a@example.com")
            .with_premium(Some(now + chrono::Duration::days(1)));
        let open_ended = UserProfile::new("1", "a@example.com").with_premium(None);

        assert!(!lapsed.has_active_premium(now));
        assert!(active.has_active_premium(now));
        assert!(open_ended.has_active_premium(now));
        assert!(!UserProfile::new("1", "a@example.com").has_active_premium(now));
    }

    #[test]
    fn test_snapshot_requires_profile_to_be_authenticated() {
        let snapshot = SessionSnapshot {
            status: SessionStatus::Authenticated,
            profile: None,
            initialized: true,
            expired: false,
        };
        assert!(!snapshot.is_authenticated());
    }

    #[test]
    fn test_registration_uses_wire_names() {
        let request = RegistrationRequest {
            email: "a@example.com".to_string(),
            password: Secret::new("hunter22"),
            phone: "79990001122".to_string(),
            account_type: AccountType::SoleProprietor,
            display_name: "Anna".to_string(),
            company_name: None,
            tax_id: Some("770123456789".to_string()),
            tax_reason_code: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type_account"], 2);
        assert_eq!(value["first_name"], "Anna");
        assert_eq!(value["inn"], "770123456789");
        assert_eq!(value["password"], "hunter22");
        assert!(value.get("kpp").is_none());
    }
}
