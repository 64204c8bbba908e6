//! ERP application services - token brokering and call serialization.

mod call_queue;
mod token_broker;

pub use call_queue::CallQueue;
pub use token_broker::{TokenBroker, TokenBrokerError};
