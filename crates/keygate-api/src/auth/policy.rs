//! Operation access policy
//!
//! Every entry point is named by an [`Operation`] and looked up in a static
//! table that declares its [`Access`]. Routes are wrapped with the guard
//! chain for their operation, so the table is the only place roles are
//! declared.

use keygate_core::Role;
use serde::Serialize;
use std::fmt;

/// Named entry points of the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    Login,
    Register,
    Me,
    ListUsers,
    CreateUser,
    DeleteUser,
    GetUser,
    Health,
    Metrics,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::Login,
        Operation::Register,
        Operation::Me,
        Operation::ListUsers,
        Operation::CreateUser,
        Operation::DeleteUser,
        Operation::GetUser,
        Operation::Health,
        Operation::Metrics,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Login => "Login",
            Operation::Register => "Register",
            Operation::Me => "Me",
            Operation::ListUsers => "ListUsers",
            Operation::CreateUser => "CreateUser",
            Operation::DeleteUser => "DeleteUser",
            Operation::GetUser => "GetUser",
            Operation::Health => "Health",
            Operation::Metrics => "Metrics",
        }
    }

    /// Declared access for this operation
    ///
    /// An operation missing from the table is treated as `Authenticated`.
    pub fn access(&self) -> Access {
        OPERATION_POLICIES
            .iter()
            .find(|(op, _)| op == self)
            .map(|(_, access)| *access)
            .unwrap_or(Access::Authenticated)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Non-empty set of roles allowed to invoke an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleRequirement {
    roles: &'static [Role],
}

impl RoleRequirement {
    /// # Panics
    ///
    /// At compile time when used in a const context with an empty slice.
    pub const fn new(roles: &'static [Role]) -> Self {
        assert!(!roles.is_empty(), "a role requirement needs at least one role");
        Self { roles }
    }

    pub fn roles(&self) -> &'static [Role] {
        self.roles
    }

    pub fn allows(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl fmt::Display for RoleRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.roles.iter().map(Role::as_str).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

pub const ADMIN_ONLY: RoleRequirement = RoleRequirement::new(&[Role::Admin]);

/// Access policy attached to an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No guard runs
    Public,
    /// A verified identity is required, any role
    Authenticated,
    /// A verified identity with one of the listed roles
    Roles(RoleRequirement),
}

pub const OPERATION_POLICIES: &[(Operation, Access)] = &[
    (Operation::Login, Access::Public),
    (Operation::Register, Access::Public),
    (Operation::Health, Access::Public),
    (Operation::Me, Access::Authenticated),
    (Operation::ListUsers, Access::Roles(ADMIN_ONLY)),
    (Operation::CreateUser, Access::Roles(ADMIN_ONLY)),
    (Operation::DeleteUser, Access::Roles(ADMIN_ONLY)),
    (Operation::GetUser, Access::Roles(ADMIN_ONLY)),
    (Operation::Metrics, Access::Roles(ADMIN_ONLY)),
];
