//! Lifeline safety-alert server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod auth;
pub mod config;
pub mod contacts;
pub mod db;
pub mod notify;
pub mod push;
pub mod routes;
pub mod sos;
pub mod state;
pub mod ws;
