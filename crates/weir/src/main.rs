use std::net::{SocketAddr, TcpStream};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use weir_net::RelayServer;
use weir_utils::ArrayStr;

const MAX_USERNAME_LEN: usize = 32;

#[derive(Parser, Debug)]
#[command(author, version, about = "length-prefixed chat relay", long_about = None)]
struct Args {
    /// Launch in server mode, binding 0.0.0.0:<port>.
    #[arg(short = 'l', long = "listen", value_name = "PORT")]
    listen: Option<u16>,

    /// Launch in client mode against host:port.
    #[arg(short = 'c', long = "connect", value_name = "HOST:PORT")]
    connect: Option<String>,

    /// Username to present when connecting in client mode.
    #[arg(requires = "connect")]
    username: Option<String>,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn run_server(port: u16) -> ExitCode {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let mut server = match RelayServer::bind(addr) {
        Ok(server) => server,
        Err(err) => {
            error!(%err, %addr, "failed to bind relay server");
            return ExitCode::from(1);
        }
    };

    info!(%addr, "relay server listening");
    loop {
        if let Err(err) = server.run_once(Some(Duration::from_millis(100))) {
            error!(%err, "relay server iteration failed");
            return ExitCode::from(1);
        }
    }
}

/// Connects to a relay server and validates the username. The wire
/// conversation beyond the initial connect is out of scope here; this only
/// proves the connection is reachable and the username fits on the wire.
fn run_client(target: &str, username: &str) -> ExitCode {
    let name = match ArrayStr::<MAX_USERNAME_LEN>::try_from(username) {
        Ok(name) => name,
        Err(err) => {
            error!(%err, "username rejected");
            return ExitCode::from(1);
        }
    };

    match TcpStream::connect(target) {
        Ok(_stream) => {
            info!(%target, username = %name, "connected to relay server");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, %target, "failed to connect");
            ExitCode::from(1)
        }
    }
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    match (args.listen, args.connect) {
        (Some(port), None) => run_server(port),
        (None, Some(target)) => {
            let Some(username) = args.username else {
                eprintln!("client mode requires a username");
                return ExitCode::from(1);
            };
            run_client(&target, &username)
        }
        _ => {
            eprintln!("exactly one of -l <port> or -c <host:port> <username> is required");
            ExitCode::from(1)
        }
    }
}
