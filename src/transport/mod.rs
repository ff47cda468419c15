//! Outbound HTTP transport for introspection calls

mod resilient;

pub use self::resilient::ResilientTransport;
