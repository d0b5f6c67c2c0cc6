pub mod collector;
pub mod handler;
pub mod kafka;
pub mod record;
pub mod source;

pub use collector::{CollectWindow, collect};
pub use handler::get_adx_data;
pub use kafka::KafkaEventSource;
pub use record::EventRecord;
pub use source::{EventSource, EventSourceError};
