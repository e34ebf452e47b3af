//! Authentication module
//!
//! - Token signing and verification
//! - Password hashing with Argon2
//! - Token cookies and request token extraction
//! - Middleware resolving the caller's identity
//! - Authentication service for users, sessions and tokens

pub mod cookie;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;

pub use cookie::CookiePolicy;
pub use jwt::{encode_claims, sign_jwt, verify_jwt, Claims, JwtConfig, JwtError};
pub use middleware::{deserialize_user, require_user, AuthError, AuthenticatedUser};
pub use password::{hash_password, verify_password, PasswordConfig, PasswordError};
pub use service::{
    AuthService, LoginRequest, LogoutResponse, RegisterRequest, ReissuedAccess, TokenPair,
};
