//! Runtime configuration, loaded from CLI flags with environment fallbacks.

pub mod cli;
pub mod schema;

pub use cli::{Cli, ConfigError};
pub use schema::{Config, JwksSource, JwtConfig, MetricsConfig, ReplyChannelConfig, TlsConfig};
