//! Authentication and authorization module
//!
//! - Credential hashing with Argon2id
//! - Stateless JWT issuance and verification
//! - Operation access policy table
//! - Identity and role guards, chained per operation
//! - Axum middleware running the guard chain
//! - Login, registration and account administration

pub mod guard;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod service;

pub use guard::{
    authenticate, authorize, bearer_token, AuthError, Guard, GuardChain, RequestContext,
    UnauthenticatedReason,
};
pub use jwt::{Claims, TokenError, TokenService};
pub use middleware::{enforce, OperationGate};
pub use password::{CredentialHasher, PasswordError};
pub use policy::{Access, Operation, RoleRequirement, ADMIN_ONLY, OPERATION_POLICIES};
pub use service::{
    AuthService, LoginRequest, LoginResponse, NewAccountRequest, RegisterRequest,
    MAX_PASSWORD_LENGTH,
};
