//! Process entry point: loads and validates the configuration, wires
//! signal handling, binds every vhost endpoint, and runs the reactor to
//! completion.

use std::env;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

use webserv::config;
use webserv::server::Server;
use weblog::{error, info};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_signal(_signum: i32) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// SIGINT/TERM/QUIT flip the shutdown flag the reactor polls each loop
/// iteration; SIGPIPE is ignored so a client closing its read side mid-write
/// surfaces as an `EPIPE` write error instead of killing the process.
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, handle_signal as usize);
        libc::signal(libc::SIGTERM, handle_signal as usize);
        libc::signal(libc::SIGQUIT, handle_signal as usize);
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

const DEFAULT_CONFIG_PATH: &str = "config/webserv.conf";

fn main() -> ExitCode {
    install_signal_handlers();

    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let mut cfg = match config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("failed to load configuration from {config_path}: {e}");
            return ExitCode::FAILURE;
        }
    };
    register_default_cgi(&mut cfg);

    info!(
        "loaded {} listen endpoint(s) from {config_path}",
        cfg.listen_endpoints().count()
    );

    let mut server = match Server::new(cfg, &SHUTDOWN) {
        Ok(server) => server,
        Err(e) => {
            error!("failed to start server: {e}");
            return ExitCode::FAILURE;
        }
    };

    match server.run() {
        Ok(()) => {
            info!("shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("server loop failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Process-wide default CGI registry: `.php -> php-cgi`, `.py -> python3`,
/// `.pl -> perl`. Assembled here, in the orchestrator, rather than
/// hard-coded in `cgi::resolve_interpreter` itself.
fn register_default_cgi(config: &mut config::Config) {
    config.register_cgi("php", "php-cgi");
    config.register_cgi("py", "python3");
    config.register_cgi("pl", "perl");
}
