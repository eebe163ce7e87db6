pub mod alert_generator;
pub mod sentiment_scorer;
