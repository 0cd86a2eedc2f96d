//! Wire representations: request bodies, response shapes and pagination.

pub mod curso;
pub mod estudante;
pub mod matricula;
pub mod pagination;

use serde::{Deserialize, Deserializer};

/// DRF-style message for a missing required field.
pub(crate) const REQUIRED: &str = "This field is required.";

pub(crate) fn required_error() -> validator::ValidationError {
    validator::ValidationError::new("required").with_message(REQUIRED.into())
}

/// DRF-style message for an explicit `null`.
pub(crate) const NOT_NULL: &str = "This field may not be null.";

/// `deserialize_with` for fields that may be omitted but never `null`.
///
/// Pair with `#[serde(default)]` so an absent field still reads as `None`.
pub(crate) fn non_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)?
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(NOT_NULL))
}
