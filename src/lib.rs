pub mod beacon;
pub mod config;
pub mod dom;
pub mod guard;
pub mod links;
pub mod navigation;
pub mod payload;
pub mod teardown;
pub mod tracker;
pub mod transport;

pub use beacon::Dispatch;
pub use config::Config;
pub use teardown::Teardown;
pub use tracker::Tracker;
