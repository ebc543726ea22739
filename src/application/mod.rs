//! Application services layer.

pub mod cache_service;
pub mod error;
pub mod repos;
