//! Domain model: price records and the ranking rule applied to them.

pub mod entities;
pub mod ranking;
