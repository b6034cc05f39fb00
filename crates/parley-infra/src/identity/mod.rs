//! Identity service implementations.

pub mod jwt;

pub use jwt::JwtIdentityService;
