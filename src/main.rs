use std::net::TcpListener;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};

use rustis::client::Client;
use rustis::network::connection::Connection;
use rustis::parser::command::parse_message;
use rustis::replication::handshake::{Config as HandshakeConfig, Handshaker};
use rustis::server::config::Config;
use rustis::server::data::Server;
use rustis::server::handler::CommandHandler;
use rustis::server::metadata::ServerMetadata;

fn main() -> Result<()> {
    env_logger::init();

    let config = Config::new();
    let metadata = ServerMetadata::generate(&config);
    let master_address = config.master_address();
    let listening_port = config.listening_port();

    let server = Arc::new(Server::new(metadata));

    if let Some((master_host, master_port)) = master_address {
        let server = Arc::clone(&server);
        thread::spawn(move || {
            if let Err(err) = run_replica_link(master_host, master_port, listening_port, server) {
                log::error!("replication link failed: {err:#}");
            }
        });
    }

    let listener = TcpListener::bind(("0.0.0.0", listening_port))
        .with_context(|| format!("failed to bind listener on port {listening_port}"))?;
    log::info!("listening on port {listening_port}");

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                log::warn!("failed to accept connection: {err}");
                continue;
            }
        };
        let server = Arc::clone(&server);
        thread::spawn(move || handle_client(stream, server));
    }

    Ok(())
}

/// Drives one inbound connection for its lifetime: client commands until the
/// peer disconnects, or forever once it graduates into a registered replica
/// sink via `REPLCONF listening-port` + `PSYNC`.
fn handle_client(stream: TcpStream, server: Arc<Server>) {
    let peer = stream.peer_addr().ok();
    let conn = match stream.try_clone() {
        Ok(clone) => Connection::new(clone),
        Err(err) => {
            log::warn!("failed to clone client stream: {err}");
            return;
        }
    };
    let mut client = Client::new(conn);
    let mut handler = CommandHandler::new(stream, Arc::clone(&server));

    loop {
        let args = match client.next_command() {
            Ok(Some(args)) => args,
            Ok(None) => {
                if let Err(err) = handler.reply_invalid_command() {
                    log::warn!("failed to reply to client after parse error: {err}");
                    break;
                }
                continue;
            }
            Err(err) => {
                log::debug!("client connection closed: {err}");
                break;
            }
        };

        let command = match parse_message(&args) {
            Ok(command) => command,
            Err(err) => {
                log::warn!("failed to parse command: {err}");
                if let Err(err) = handler.reply_invalid_command() {
                    log::warn!("failed to reply to client after command error: {err}");
                    break;
                }
                continue;
            }
        };

        if let Err(err) = handler.handle_command(&command) {
            log::warn!("failed to handle command: {err}");
            break;
        }
    }

    if let Some(addr) = peer {
        server.remove_replica(addr);
    }
}

/// Performs the replica handshake and then applies every command the master
/// streams down the resulting link for as long as the process runs.
fn run_replica_link(
    master_host: String,
    master_port: u16,
    replica_port: u16,
    server: Arc<Server>,
) -> Result<()> {
    let handshaker = Handshaker::new(HandshakeConfig {
        master_host,
        master_port,
        replica_port,
    });
    let (mut client, rdb) = handshaker
        .perform_handshake()
        .map_err(|err| anyhow::anyhow!("handshake with master failed: {err}"))?;
    log::info!(
        "completed handshake with master, received {} byte RDB snapshot",
        rdb.rdb.len()
    );

    let stream = client.get_connection().stream.try_clone()?;
    let mut handler = CommandHandler::new_master_link(stream, server);

    loop {
        let args = match client.next_command() {
            Ok(Some(args)) => args,
            Ok(None) => {
                if let Err(err) = handler.reply_invalid_command() {
                    log::warn!("failed to reply on master link after parse error: {err}");
                    break;
                }
                continue;
            }
            Err(err) => {
                log::warn!("master link closed: {err}");
                break;
            }
        };

        let command = match parse_message(&args) {
            Ok(command) => command,
            Err(err) => {
                log::warn!("failed to parse command from master: {err}");
                if let Err(err) = handler.reply_invalid_command() {
                    log::warn!("failed to reply on master link after command error: {err}");
                    break;
                }
                continue;
            }
        };

        if let Err(err) = handler.handle_command(&command) {
            log::warn!("failed to apply command from master: {err}");
            break;
        }
    }

    Ok(())
}
