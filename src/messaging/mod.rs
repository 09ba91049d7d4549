mod consumer;
mod producer;

pub use consumer::{handle_payload, Disposition, FeedAction, OrderConsumer};
pub use producer::OrderProducer;
