pub mod clock;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod fingerprint;
pub mod forward;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod route_table;
pub mod router;
pub mod server;
pub mod throttle;
pub mod time_window;
pub mod updater;
pub mod validation;

pub use clock::Clock;
pub use config::Config;
pub use error::{ProxyError, ProxyResult};
pub use forward::{Forwarder, HttpForwarder, UpstreamResponse};
pub use route_table::{RouteConfig, RouteTable};
pub use router::RequestRouter;
pub use server::{create_app, Server};
pub use throttle::{Decision, ThrottleRule};
pub use time_window::TimeWindowThrottle;
pub use updater::RuntimeConfigUpdater;
