//! Reference data: users, partners and the travel catalog.

use crate::table::Entity;
use crate::types::TableName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Back-office role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Front desk agent.
    Agent,
    /// Operations manager.
    Manager,
    /// Accountant.
    Accountant,
    /// Administrator.
    Admin,
}

impl Role {
    /// Returns the persisted name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::Manager => "manager",
            Role::Accountant => "accountant",
            Role::Admin => "admin",
        }
    }

    /// May create and edit pending operations.
    #[must_use]
    pub const fn can_edit_operations(self) -> bool {
        matches!(self, Role::Manager | Role::Agent)
    }

    /// May validate or cancel operations.
    #[must_use]
    pub const fn can_manage_operations(self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A back-office user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Login name.
    pub username: String,
    /// Display name.
    pub full_name: String,
    /// Contact email.
    pub email: String,
    /// Password hash.
    pub password_hash: String,
    /// Role.
    pub role: Role,
    /// Whether the account may log in.
    pub is_active: bool,
}

impl Entity for User {
    const TABLE: TableName = TableName::Users;
    const INDEXED_FIELDS: &'static [&'static str] = &["username", "role"];

    fn index_values(&self) -> Vec<(&'static str, String)> {
        vec![
            ("username", self.username.clone()),
            ("role", self.role.as_str().to_string()),
        ]
    }
}

/// A reservation system, e.g. Amadeus or Sabre.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct System {
    /// System name.
    pub name: String,
    /// Free text.
    pub description: Option<String>,
}

impl Entity for System {
    const TABLE: TableName = TableName::Systems;
}

/// A service sold by the agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Service name.
    pub name: String,
    /// Short code.
    pub initial: Option<String>,
}

impl Entity for Service {
    const TABLE: TableName = TableName::Services;
}

/// An airline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airline {
    /// IATA code, e.g. `AF`.
    pub code: String,
    /// Full name.
    pub name: Option<String>,
}

impl Entity for Airline {
    const TABLE: TableName = TableName::Airlines;
    const INDEXED_FIELDS: &'static [&'static str] = &["code"];

    fn index_values(&self) -> Vec<(&'static str, String)> {
        vec![("code", self.code.clone())]
    }
}

/// Partner category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerKind {
    /// An airline.
    Airline,
    /// Another agency.
    Agency,
    /// A supplier.
    Supplier,
    /// Anything else.
    Other,
}

/// A business partner holding contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    /// Partner name.
    pub name: String,
    /// Category.
    pub kind: PartnerKind,
}

impl Entity for Partner {
    const TABLE: TableName = TableName::Partners;
}

/// A destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Itinerary {
    /// Airport or destination code.
    pub code: Option<String>,
    /// Country.
    pub country: Option<String>,
}

impl Entity for Itinerary {
    const TABLE: TableName = TableName::Itineraries;
}
