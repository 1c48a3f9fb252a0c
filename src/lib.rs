//! File Manager Daemon Library
//!
//! This crate provides the core functionality for the file manager daemon,
//! which performs privileged filesystem mutations requested over per-verb
//! Unix sockets.

pub mod commands;
pub mod config;
pub mod error;
pub mod fs;
pub mod protocol;
pub mod socket;
pub mod validation;
