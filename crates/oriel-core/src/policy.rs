//! Update sanitization for provider-managed accounts

use crate::models::{LocalUser, ProfileUpdate};

/// Strips identity fields from a profile edit when the account is
/// provider-managed. Name and email come from Entra for those accounts;
/// everything else (locale, preferences) updates normally.
pub fn sanitize_profile_update(user: &LocalUser, mut attrs: ProfileUpdate) -> ProfileUpdate {
    if user.provider_managed() {
        attrs.firstname = None;
        attrs.lastname = None;
        attrs.mail = None;
    }

    attrs
}
