use std::net::TcpStream;

use thiserror::Error;

use crate::{
    client::{Client, ClientError},
    network::connection::{Connection, ConnectionError},
    parser::{
        command::{Command, ReplConfCommand},
        rdb::parse_rdb_payload,
        resp::Token,
    },
};

pub struct RdbPayload {
    pub rdb: Vec<u8>,
}

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("failed to connect to master at {0}: {1}")]
    Connect(String, std::io::Error),
    #[error("connection error during handshake: {0}")]
    Connection(#[from] ConnectionError),
    #[error("peer closed the connection during handshake")]
    Closed,
    #[error("unexpected handshake response: {0}")]
    UnexpectedResponse(String),
}

impl From<ClientError> for HandshakeError {
    fn from(value: ClientError) -> Self {
        match value {
            ClientError::Closed => HandshakeError::Closed,
            ClientError::Connection(e) => HandshakeError::Connection(e),
        }
    }
}

pub type HandshakeResult<T> = std::result::Result<T, HandshakeError>;

pub struct Config {
    pub master_host: String,
    pub master_port: u16,
    pub replica_port: u16,
}

/// Drives the four-step replica-side handshake (PING, two REPLCONFs, PSYNC)
/// and hands back a `Client` wrapping the now-established replication link
/// plus the primary's initial RDB snapshot.
pub struct Handshaker {
    config: Config,
}

impl Handshaker {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn perform_handshake(&self) -> HandshakeResult<(Client, RdbPayload)> {
        let mut client = self.create_client()?;

        self.perform_ping(&mut client)?;
        self.send_replconf_information(&mut client)?;
        self.perform_sync(&mut client)?;
        let rdb = self.receive_rdb_payload(&mut client)?;

        Ok((client, rdb))
    }

    fn create_client(&self) -> HandshakeResult<Client> {
        let stream = TcpStream::connect((self.config.master_host.as_str(), self.config.master_port))
            .map_err(|e| HandshakeError::Connect(self.config.master_host.clone(), e))?;
        Ok(Client::new(Connection::new(stream)))
    }

    fn send_command(&self, client: &mut Client, command: Command) -> HandshakeResult<Token> {
        let message = command.to_resp_token().serialize();
        client.get_connection().write_message(&message)?;
        self.read_one_token(client)
    }

    fn read_one_token(&self, client: &mut Client) -> HandshakeResult<Token> {
        let result = client
            .get_connection()
            .try_parse(|buf| crate::parser::resp::parse_buffer(buf))?;
        client.get_connection().consume(result.len);
        Ok(result.token)
    }

    fn perform_ping(&self, client: &mut Client) -> HandshakeResult<()> {
        let response = self.send_command(client, Command::Ping)?;
        match response {
            Token::SimpleString(data) if data.eq_ignore_ascii_case("pong") => Ok(()),
            other => Err(HandshakeError::UnexpectedResponse(format!(
                "expected +PONG in response to PING, got {other:?}"
            ))),
        }
    }

    fn expect_ok(&self, response: Token, context: &str) -> HandshakeResult<()> {
        match response {
            Token::SimpleString(data) if data.eq_ignore_ascii_case("ok") => Ok(()),
            other => Err(HandshakeError::UnexpectedResponse(format!(
                "expected +OK in response to {context}, got {other:?}"
            ))),
        }
    }

    fn send_replconf_information(&self, client: &mut Client) -> HandshakeResult<()> {
        let response = self.send_command(
            client,
            Command::ReplConf(ReplConfCommand::ListeningPort(self.config.replica_port)),
        )?;
        self.expect_ok(response, "REPLCONF listening-port")?;

        let response = self.send_command(
            client,
            Command::ReplConf(ReplConfCommand::Capa("psync2".to_string())),
        )?;
        self.expect_ok(response, "REPLCONF capa psync2")
    }

    fn perform_sync(&self, client: &mut Client) -> HandshakeResult<()> {
        match self.send_command(client, Command::Psync)? {
            Token::SimpleString(_) => Ok(()),
            other => Err(HandshakeError::UnexpectedResponse(format!(
                "expected +FULLRESYNC in response to PSYNC, got {other:?}"
            ))),
        }
    }

    fn receive_rdb_payload(&self, client: &mut Client) -> HandshakeResult<RdbPayload> {
        let conn = client.get_connection();
        let result = conn.try_parse(parse_rdb_payload)?;
        conn.consume(result.len);
        Ok(RdbPayload { rdb: result.rdb })
    }
}
