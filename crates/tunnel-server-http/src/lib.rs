//! Public HTTP front
//!
//! Serves arbitrary public requests by relaying them over the agent channel
//! and turning the agent's reply envelope back into an HTTP response. Every
//! request gets a well-formed response; tunnel failures map to 501/502/504.

pub mod server;

pub use server::{router, AppState, HttpServer, HttpServerError};
