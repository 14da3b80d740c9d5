//! CLI command implementations

mod config;
mod session;
mod shell;
mod tunnel;

pub use config::{config_init, config_show, resolve_path};
pub use session::{
    connect_via, hello_command, info_command, probe_command, run_sequence, send_command,
};
pub use shell::shell_command;
pub use tunnel::{stub_server_command, tunnel_command};
