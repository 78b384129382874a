// Real-time signal pipeline domain types (candles, oracle verdicts, HTF
// context, composed signals, agents, positions) and their port traits.
pub mod engine;
