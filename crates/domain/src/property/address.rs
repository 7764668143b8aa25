//! Postal address value object.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::validation::{self, codes};

/// Postal address of a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl Address {
    /// Creates an address without validating it.
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
            postal_code: postal_code.into(),
            country: country.into(),
        }
    }

    /// Returns a trimmed copy, failing if any field is blank.
    pub fn validated(&self) -> Result<Self, DomainError> {
        Ok(Self {
            street: validation::required("Street", &self.street, codes::ADDRESS_INCOMPLETE)?,
            city: validation::required("City", &self.city, codes::ADDRESS_INCOMPLETE)?,
            postal_code: validation::required(
                "Postal code",
                &self.postal_code,
                codes::ADDRESS_INCOMPLETE,
            )?,
            country: validation::required("Country", &self.country, codes::ADDRESS_INCOMPLETE)?,
        })
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {} {}, {}",
            self.street, self.postal_code, self.city, self.country
        )
    }
}
