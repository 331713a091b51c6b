pub mod cache;
pub mod config;
pub mod exception;
pub mod freshness;
pub mod param;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;
pub mod stats;
pub mod util;

pub use cache::ResponseCache;
pub use exception::Exception;
pub use proxy::{Forwarder, Termination};
pub use request::Request;
pub use response::Response;
pub use stats::{StatsEvent, StatsHandle};
