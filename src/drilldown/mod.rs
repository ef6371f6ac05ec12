pub mod aggregator;
pub mod request;
