pub mod core;
pub mod metrics;
pub mod pages;
pub mod schema;
pub mod stats;
pub mod tfidf;

pub use core::Database;
