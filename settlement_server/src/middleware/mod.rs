mod ip_whitelist;
mod shared_secret;

pub use ip_whitelist::{IpWhitelistMiddlewareFactory, IpWhitelistMiddlewareService};
pub use shared_secret::{SharedSecretMiddlewareFactory, SharedSecretMiddlewareService};
