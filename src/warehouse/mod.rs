pub mod client;
pub mod handler;

pub use client::WarehouseClient;
pub use handler::get_databricks_data;
