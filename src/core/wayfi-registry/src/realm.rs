//! Realm identifiers.
//!
//! A realm id is a dot-scoped hostname such as `staff.example.com`. An
//! authentication backend may narrow a user into a sub-realm by supplying a
//! prefix, which is joined to the provider realm with a dot.

use wayfi_pki::hostname::is_valid_hostname;

use crate::error::RegistryError;

/// Checks that `realm_id` is a syntactically valid dot-scoped realm.
pub fn validate_realm_id(realm_id: &str) -> Result<(), RegistryError> {
    if is_valid_hostname(realm_id) {
        Ok(())
    } else {
        Err(RegistryError::Validation(format!(
            "invalid realm id: {realm_id:?}"
        )))
    }
}

/// Joins an optional sub-realm prefix onto `realm_id`.
///
/// `Some("staff")` on `example.com` yields `staff.example.com`. A prefix that
/// is empty, starts with a dot, or contains an empty label is rejected, as is
/// any result that is not a valid realm id.
pub fn resolve_realm_prefix(
    realm_id: &str,
    sub_realm: Option<&str>,
) -> Result<String, RegistryError> {
    let resolved = match sub_realm {
        None => realm_id.to_string(),
        Some(prefix) => {
            if prefix.is_empty() || prefix.split('.').any(str::is_empty) {
                return Err(RegistryError::Validation(format!(
                    "invalid sub-realm prefix {prefix:?} for {realm_id}"
                )));
            }
            format!("{prefix}.{realm_id}")
        }
    };

    if resolved.starts_with('.') {
        return Err(RegistryError::Validation(format!(
            "realm may not begin with '.': {resolved}"
        )));
    }
    validate_realm_id(&resolved)?;

    Ok(resolved)
}
