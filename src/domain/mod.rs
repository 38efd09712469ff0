pub mod calendar;
pub mod filter;
pub mod models;
pub mod stats;
