//! quantpipe — tiered market-data backtest pipeline.
//!
//! Daily observations move through four quality tiers: bronze (raw) is
//! validated into silver, silver feeds rolling feature computation, features
//! drive signal generation, and signals are simulated into a gold-tier equity
//! curve. Hexagonal architecture: domain logic in [`domain`], port traits in
//! [`ports`], concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
