//! CLI command implementations (SPEC_FULL §10.4): one module per
//! top-level subcommand.

pub mod accounts;
pub mod reload;
pub mod routes;
pub mod start;
pub mod stop;
pub mod test;
