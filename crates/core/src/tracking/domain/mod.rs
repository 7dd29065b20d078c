pub mod box_predictor;
pub mod embedding_rate_limiter;
pub mod track;
pub mod track_manager;
