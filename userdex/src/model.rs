//! User document model

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Document id of a user. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserKey(String);

impl UserKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::InvalidDocument("key must not be empty".to_string()));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<UserKey> for String {
    fn from(key: UserKey) -> Self {
        key.0
    }
}

impl AsRef<str> for UserKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user document.
///
/// Writes always replace the whole document stored under `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub key: UserKey,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl User {
    pub fn new(key: UserKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            email: None,
            phone: None,
            address: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_key_rejected() {
        assert!(UserKey::new("").is_err());

        let err = serde_json::from_value::<User>(json!({"key": "", "name": "Alice"}));
        assert!(err.is_err());
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let user = User::new(UserKey::new("u1").unwrap(), "Alice");
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value, json!({"key": "u1", "name": "Alice"}));
    }

    #[test]
    fn test_profile_fields_deserialize() {
        let user: User = serde_json::from_value(json!({
            "key": "u2",
            "name": "Bob",
            "email": "bob@example.com",
            "phone": "+47 555 01234"
        }))
        .unwrap();

        assert_eq!(user.key.as_str(), "u2");
        assert_eq!(user.email.as_deref(), Some("bob@example.com"));
        assert_eq!(user.phone.as_deref(), Some("+47 555 01234"));
        assert!(user.address.is_none());
    }

    #[test]
    fn test_missing_name_rejected() {
        assert!(serde_json::from_value::<User>(json!({"key": "u3"})).is_err());
    }
}
