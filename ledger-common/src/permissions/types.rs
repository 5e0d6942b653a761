use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Admin,
    Superadmin,
    Unrecognized(String),
}

impl Role {
    /// Interprets a stored role column. Null and empty both mean `user`.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Role::User,
            Some("user") => Role::User,
            Some("admin") => Role::Admin,
            Some("superadmin") => Role::Superadmin,
            Some(other) => Role::Unrecognized(String::from(other)),
        }
    }

    pub fn level(&self) -> Option<u8> {
        match self {
            Role::User => Some(1),
            Role::Admin => Some(2),
            Role::Superadmin => Some(3),
            Role::Unrecognized(_) => None,
        }
    }

    /// Unrecognized roles only satisfy a floor they are exactly equal to.
    pub fn at_least(&self, floor: &Role) -> bool {
        match (self.level(), floor.level()) {
            (Some(level), Some(floor_level)) => level >= floor_level,
            _ => self == floor,
        }
    }

    pub fn is_admin_or_higher(&self) -> bool {
        self.at_least(&Role::Admin)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
            Role::Unrecognized(s) => s,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = LedgerError;

    /// Strict parse for role changes requested by callers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::Superadmin),
            _ => Err(LedgerError::Validation(format!("Unknown role '{s}'"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Approved,
    Rejected,
}

impl UserStatus {
    /// Empty status columns default to approved.
    pub fn from_stored(value: &str) -> Option<Self> {
        match value.trim() {
            "" | "approved" => Some(UserStatus::Approved),
            "pending" => Some(UserStatus::Pending),
            "rejected" => Some(UserStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Transactions,
    Categories,
    Reports,
    Users,
    All,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Transactions => "transactions",
            ResourceType::Categories => "categories",
            ResourceType::Reports => "reports",
            ResourceType::Users => "users",
            ResourceType::All => "all",
        }
    }

    /// Stored resource types whose grants cover a request for `self`.
    pub fn satisfying(&self) -> Vec<&'static str> {
        if *self == ResourceType::All {
            vec![ResourceType::All.as_str()]
        } else {
            vec![self.as_str(), ResourceType::All.as_str()]
        }
    }
}

impl FromStr for ResourceType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transactions" => Ok(ResourceType::Transactions),
            "categories" => Ok(ResourceType::Categories),
            "reports" => Ok(ResourceType::Reports),
            "users" => Ok(ResourceType::Users),
            "all" => Ok(ResourceType::All),
            _ => Err(LedgerError::Validation(format!(
                "Unknown resource type '{s}'"
            ))),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionType {
    Read,
    Write,
    All,
}

impl PermissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionType::Read => "read",
            PermissionType::Write => "write",
            PermissionType::All => "all",
        }
    }

    /// Stored permission types that satisfy a request for `self`. Write implies read and all
    /// implies anything.
    pub fn satisfying(&self) -> Vec<&'static str> {
        match self {
            PermissionType::Read => vec!["read", "write", "all"],
            PermissionType::Write => vec!["write", "all"],
            PermissionType::All => vec!["all"],
        }
    }

    pub fn is_grantable(&self) -> bool {
        matches!(self, PermissionType::Read | PermissionType::Write)
    }
}

impl FromStr for PermissionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(PermissionType::Read),
            "write" => Ok(PermissionType::Write),
            "all" => Ok(PermissionType::All),
            _ => Err(LedgerError::Validation(format!(
                "Unknown permission type '{s}'"
            ))),
        }
    }
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_stored_defaults_to_user() {
        assert_eq!(Role::from_stored(None), Role::User);
        assert_eq!(Role::from_stored(Some("")), Role::User);
        assert_eq!(Role::from_stored(Some("admin")), Role::Admin);
        assert_eq!(
            Role::from_stored(Some("auditor")),
            Role::Unrecognized(String::from("auditor"))
        );
    }

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::Superadmin.at_least(&Role::Admin));
        assert!(Role::Admin.at_least(&Role::Admin));
        assert!(Role::Admin.at_least(&Role::User));
        assert!(!Role::User.at_least(&Role::Admin));
        assert!(!Role::Admin.at_least(&Role::Superadmin));

        let auditor = Role::Unrecognized(String::from("auditor"));
        assert!(!auditor.at_least(&Role::User));
        assert!(auditor.at_least(&Role::Unrecognized(String::from("auditor"))));
        assert!(!Role::Superadmin.at_least(&auditor));
    }

    #[test]
    fn test_strict_role_parse() {
        assert_eq!("superadmin".parse::<Role>().unwrap(), Role::Superadmin);
        assert!(matches!(
            "Admin".parse::<Role>(),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_satisfying_sets() {
        assert_eq!(
            ResourceType::Reports.satisfying(),
            vec!["reports", "all"]
        );
        assert_eq!(ResourceType::All.satisfying(), vec!["all"]);

        assert!(PermissionType::Read.satisfying().contains(&"write"));
        assert!(!PermissionType::Write.satisfying().contains(&"read"));
        assert!(PermissionType::Write.satisfying().contains(&"all"));
    }

    #[test]
    fn test_status_defaults_to_approved() {
        assert_eq!(UserStatus::from_stored(""), Some(UserStatus::Approved));
        assert_eq!(UserStatus::from_stored("pending"), Some(UserStatus::Pending));
        assert_eq!(UserStatus::from_stored("banned"), None);
    }
}
