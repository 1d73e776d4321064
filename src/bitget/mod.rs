//! Bitget module - Client implementation for the Bitget spot API

pub mod auth;
pub mod client;
pub mod messages;
pub mod rest;
pub mod websocket;

pub use client::BitgetClient;
