//! `courier-auth`: pure authentication/authorization boundary.
//!
//! This crate is decoupled from HTTP and storage. It knows who an actor is
//! (role + identity), which stores the actor has scope over, and how to turn a
//! bearer token into validated claims.

pub mod claims;
pub mod jwt;
pub mod principal;
pub mod roles;
pub mod scope;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator, TokenError};
pub use principal::Actor;
pub use roles::{Role, UnknownRole};
pub use scope::{StoreOwnership, StoreScope};
