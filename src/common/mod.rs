//! Building blocks shared by every exchange client

pub mod auth;
pub mod channels;
pub mod errors;
pub mod rest;
pub mod symbols;
pub mod traits;
pub mod types;
