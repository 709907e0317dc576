/// lib.rs — File-driven backtest toolkit
///
/// Candle CSV persistence and report artifacts around the crossover engine.
pub mod csv_data;
pub mod report;
