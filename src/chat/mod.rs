pub mod handler;
pub mod model;
pub mod service;
pub mod vector;

pub use handler::chat_handler;
pub use service::ChatService;
