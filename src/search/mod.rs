pub mod engine;
pub mod executor;
pub mod results;
