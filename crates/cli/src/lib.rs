//! Shopcheck CLI
//!
//! Command-line interface for running storefront journeys, serving the HTTP
//! API, and managing profiles and configuration.

pub mod commands;
pub mod output;
