//! Data models module
//!
//! Contains all data structures used throughout the application:
//! - Model coefficient tables
//! - Team enumeration and memberships
//! - Estimate, total, and average types

pub mod coefficients;
pub mod metrics;
pub mod team;
