//! OAuth 2.0 pre-authorization
//!
//! The authenticator's own credential towards the introspection endpoint,
//! obtained with the client-credentials grant and refreshed automatically.

mod client_credentials;
mod token;

pub use client_credentials::ClientCredentialsSource;
pub use token::TokenInfo;
