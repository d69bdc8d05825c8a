pub mod cache;
pub mod core;
pub mod ml;
pub mod nlp;
pub mod observability;
pub mod persistence;
pub mod repositories;
