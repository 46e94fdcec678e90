//! Normalized identity built from verified ID-token claims

use serde_json::Value;

use crate::models::{UserAttrs, UserStatus};

/// The minimal surface the login path and stores need from an identity.
pub trait IdentityLike: Send + Sync {
    fn external_id(&self) -> &str;
    fn preferred_username(&self) -> &str;
    fn to_user_attrs(&self) -> UserAttrs;
}

/// A verified Entra identity, normalized for the local store.
///
/// `first_name`/`last_name` have already been through the
/// [`Nametag`] fallback chain; consumers never see missing names.
#[derive(Debug, Clone)]
pub struct Identity {
    pub external_id: String,
    pub preferred_username: String,
    pub first_name: String,
    pub last_name: String,
    pub raw_claims: Value,
}

impl Identity {
    pub fn email(&self) -> &str {
        &self.preferred_username
    }
}

impl IdentityLike for Identity {
    fn external_id(&self) -> &str {
        &self.external_id
    }

    fn preferred_username(&self) -> &str {
        &self.preferred_username
    }

    fn to_user_attrs(&self) -> UserAttrs {
        UserAttrs {
            login: Some(self.preferred_username.clone()),
            firstname: self.first_name.clone(),
            lastname: self.last_name.clone(),
            mail: Some(self.preferred_username.clone()),
            external_id: Some(self.external_id.clone()),
            status: Some(UserStatus::Active),
            synced_at: None,
        }
    }
}

/// Name-fallback logic shared by the login path and the directory sync.
///
/// Prefers the provider's given name and surname. When either is absent,
/// the display name is split: first token becomes the first name, the
/// remaining tokens joined become the last name. A single-token display
/// name gets the literal last name "User"; no usable input at all yields
/// "Unknown"/"User".
#[derive(Debug, Clone)]
pub struct Nametag {
    given_name: Option<String>,
    surname: Option<String>,
    display_name: Option<String>,
}

impl Nametag {
    pub fn new(
        given_name: Option<String>,
        surname: Option<String>,
        display_name: Option<String>,
    ) -> Self {
        Self {
            given_name,
            surname,
            display_name,
        }
    }

    pub fn first_name(&self) -> String {
        match non_blank(&self.given_name) {
            Some(name) => name.to_string(),
            None => self.parsed_display_name().0,
        }
    }

    pub fn last_name(&self) -> String {
        match non_blank(&self.surname) {
            Some(name) => name.to_string(),
            None => self.parsed_display_name().1,
        }
    }

    fn parsed_display_name(&self) -> (String, String) {
        let Some(display) = non_blank(&self.display_name) else {
            return ("Unknown".to_string(), "User".to_string());
        };

        let mut tokens = display.split_whitespace();
        let first = tokens.next().unwrap_or("Unknown").to_string();
        let rest: Vec<&str> = tokens.collect();
        let last = if rest.is_empty() {
            "User".to_string()
        } else {
            rest.join(" ")
        };

        (first, last)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
