pub mod ast;
pub mod cache;
pub mod optimizer;
pub mod parser;
pub mod planner;
