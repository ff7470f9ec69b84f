use std::io::Write;
use std::net::TcpStream;
use std::sync::Arc;

use crate::parser::command::{Command, ReplConfCommand};
use crate::parser::resp::Token;
use crate::replication::rdb::{get_empty_rdb, serialize_rdb};
use crate::replication::replica_manager::Replica;
use crate::server::metadata::ReplicaInfo;

use super::data::Server;

/// Whether this handler is driving a normal inbound client connection, or
/// the single outbound link a replica holds open to its master. The two
/// need different reply semantics: a client always gets a reply per
/// command; the master link applies commands silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    Client,
    MasterLink,
}

pub struct CommandHandler {
    stream: TcpStream,
    state: Arc<Server>,
    role: ConnectionRole,
}

impl CommandHandler {
    pub fn new(stream: TcpStream, state: Arc<Server>) -> Self {
        CommandHandler {
            stream,
            state,
            role: ConnectionRole::Client,
        }
    }

    pub fn new_master_link(stream: TcpStream, state: Arc<Server>) -> Self {
        CommandHandler {
            stream,
            state,
            role: ConnectionRole::MasterLink,
        }
    }

    fn is_client(&self) -> bool {
        self.role == ConnectionRole::Client
    }

    pub fn handle_command(&mut self, command: &Command) -> std::io::Result<()> {
        match command {
            Command::Ping => self.handle_ping(),
            Command::Echo(data) => self.handle_echo(data),
            Command::Get(key) => self.handle_get(key),
            Command::Set {
                key,
                value,
                expiry_ms,
            } => self.handle_set(key, value, *expiry_ms),
            Command::Info(section) => self.handle_info(section),
            Command::ReplConf(sub) => self.handle_replconf(sub),
            Command::Psync => self.handle_psync(),
        }
    }

    /// Replies with the protocol-level Simple Error used for both RESP
    /// decode failures and unrecognized/malformed commands. The connection
    /// stays open afterward.
    pub fn reply_invalid_command(&mut self) -> std::io::Result<()> {
        self.write_response(Token::SimpleError("Invalid Command".to_string()))
    }

    fn handle_ping(&mut self) -> std::io::Result<()> {
        log::debug!("received PING");
        if self.is_client() {
            self.write_response(Token::SimpleString("PONG".to_string()))?;
        } else {
            self.state.record_heartbeat();
        }
        Ok(())
    }

    fn handle_echo(&mut self, data: &[u8]) -> std::io::Result<()> {
        log::debug!("received ECHO {data:?}");
        if self.is_client() {
            self.write_response(Token::BulkString(data.to_vec()))?;
        }
        Ok(())
    }

    fn handle_get(&mut self, key: &[u8]) -> std::io::Result<()> {
        log::debug!("received GET {key:?}");
        if self.is_client() {
            let response = match self.state.get(key) {
                Some(value) => Token::BulkString(value),
                None => Token::NullBulkString,
            };
            self.write_response(response)?;
        }
        Ok(())
    }

    fn handle_set(&mut self, key: &[u8], value: &[u8], expiry_ms: Option<u64>) -> std::io::Result<()> {
        log::debug!("received SET {key:?} -> {value:?} (expiry_ms={expiry_ms:?})");
        self.state.apply_set(key, value, expiry_ms);

        if self.is_client() {
            self.write_response(Token::SimpleString("OK".to_string()))?;
        }
        Ok(())
    }

    fn handle_info(&mut self, section: &[u8]) -> std::io::Result<()> {
        log::debug!("received INFO {section:?}");
        if !self.is_client() {
            return Ok(());
        }
        match section {
            b"replication" => {
                let response = self.state.metadata.get_replica_info();
                self.write_response(Token::BulkString(response))?;
            }
            other => {
                log::warn!("unsupported INFO section {:?}", String::from_utf8_lossy(other));
                self.write_response(Token::BulkString(Vec::new()))?;
            }
        }
        Ok(())
    }

    /// A connection becomes a replica sink here, before the `OK` response is
    /// written, so a concurrent SET can never be missed by a replica that has
    /// already completed its handshake.
    fn handle_replconf(&mut self, sub: &ReplConfCommand) -> std::io::Result<()> {
        log::debug!("received REPLCONF {sub:?}");
        if let ReplConfCommand::ListeningPort(_) = sub {
            let replica = Replica::new(self.stream.try_clone()?);
            self.state.add_replica(replica)?;
        }
        if self.is_client() {
            self.write_response(Token::SimpleString("OK".to_string()))?;
        }
        Ok(())
    }

    fn handle_psync(&mut self) -> std::io::Result<()> {
        log::debug!("received PSYNC");
        let ReplicaInfo::Master(info) = &self.state.metadata.replica_info else {
            log::warn!("received PSYNC while not acting as master, ignoring");
            return Ok(());
        };

        let response = format!("FULLRESYNC {} 0", info.replication_id);
        self.write_response(Token::SimpleString(response))?;

        let rdb_payload = serialize_rdb(&get_empty_rdb());
        self.stream.write_all(&rdb_payload)?;
        Ok(())
    }

    fn write_response(&mut self, response: Token) -> std::io::Result<()> {
        self.stream.write_all(&response.serialize())?;
        Ok(())
    }
}
