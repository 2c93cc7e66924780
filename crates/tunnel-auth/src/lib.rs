//! Shared-secret authentication for agent connections

pub mod token;

pub use token::TokenValidator;
