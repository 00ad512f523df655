pub mod client;
pub mod config;
pub mod error;
pub mod framing;
pub mod network;
pub mod poll;
pub mod schema;
pub mod transport;
pub mod types;

pub use client::{ClientOptions, ExplorerClient};
pub use error::{Error, Result};
pub use poll::PollPolicy;
pub use types::{
    Collection, Direction, FilterClause, Filters, Operation, QueryPage, QuerySpec, ScalarValue,
    Table, ValueType,
};
