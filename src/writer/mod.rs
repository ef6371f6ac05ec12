pub mod barrier;
pub mod event;
pub mod pipeline;
