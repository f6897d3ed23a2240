//! eventhub server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod config;
pub mod error;
pub mod health;
pub mod hub;
pub mod publish;
pub mod routes;
pub mod state;
pub mod ws;
