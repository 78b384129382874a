// Real-time signal generation, validation and execution pipeline.
pub mod engine;
