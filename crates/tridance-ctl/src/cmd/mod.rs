//! CLI command modules.

pub mod http;
pub mod peers;
pub mod simulate;
pub mod status;
pub mod watch;
