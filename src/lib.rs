//! coinrank: a cached store of price records with a ranked listing.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
