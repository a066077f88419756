//! User access profile
//!
//! Only the fields the access engine reads: the rest of the employee record
//! lives with the housing application.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::error::{AccessError, AccessResult};
use super::types::{PropertyId, RoleId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub role_id: RoleId,
    /// Default scope the user lands in after sign-in
    pub property_id: PropertyId,
    #[serde(default)]
    pub authorized_properties: BTreeSet<PropertyId>,
    #[serde(default)]
    pub is_super_admin: bool,
}

impl User {
    /// User authorized for exactly their default property
    pub fn new(id: UserId, role_id: RoleId, property_id: PropertyId) -> Self {
        Self {
            id,
            role_id,
            property_id,
            authorized_properties: BTreeSet::from([property_id]),
            is_super_admin: false,
        }
    }

    pub fn with_authorized_properties(
        mut self,
        properties: impl IntoIterator<Item = PropertyId>,
    ) -> Self {
        self.authorized_properties.extend(properties);
        self
    }

    pub fn super_admin(mut self) -> Self {
        self.is_super_admin = true;
        self
    }

    pub fn is_authorized_for(&self, property_id: PropertyId) -> bool {
        self.authorized_properties.contains(&property_id)
    }

    /// The default property must be one of the authorized properties
    pub fn check_default_property(&self) -> AccessResult<()> {
        if self.is_authorized_for(self.property_id) {
            Ok(())
        } else {
            Err(AccessError::DefaultPropertyNotAuthorized {
                user_id: self.id,
                property_id: self.property_id,
            })
        }
    }
}
