//! BlockFin module - Client implementation for BlockFin perpetual swaps

pub mod auth;
pub mod client;
pub mod messages;
pub mod rest;
pub mod websocket;

pub use client::BlockFinClient;
