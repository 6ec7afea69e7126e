//! Security primitives: session token issuance/verification and password
//! hashing.

pub mod jwt;
pub mod password;

pub use jwt::{Claims, TokenService};
pub use password::{hash_password, verify_password};
