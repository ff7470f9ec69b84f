use thiserror::Error;

use crate::network::connection::{Connection, ConnectionError};
use crate::parser::resp::parse_command;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("connection closed by peer")]
    Closed,
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
}

/// Ties a `Connection` to the RESP command grammar: a client only ever
/// sends top-level Arrays of BulkStrings.
pub struct Client {
    conn: Connection,
}

impl Client {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn get_connection(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Decodes exactly one command, never blocking for a second one. `Ok(None)`
    /// on a parse failure (the caller replies with a protocol error and keeps
    /// the connection open); `Err(ClientError::Closed)` when the peer hung up.
    ///
    /// A parse failure drops whatever is currently buffered: the grammar has
    /// no resync point, so the only way to avoid re-parsing the same
    /// malformed bytes forever is to discard them along with the error.
    pub fn next_command(&mut self) -> Result<Option<Vec<String>>, ClientError> {
        match self.conn.try_parse(parse_command) {
            Ok((args, len)) => {
                self.conn.consume(len);
                Ok(Some(args))
            }
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                Err(ClientError::Closed)
            }
            Err(ConnectionError::Io(io_err)) => Err(ClientError::Connection(io_err.into())),
            Err(ConnectionError::Parse(_)) => {
                let buffered = self.conn.get_buffer().len();
                self.conn.consume(buffered);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};

    fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn parse_error_drops_buffered_bytes_and_the_next_command_still_decodes() {
        let (mut writer, server_side) = connected_pair();
        let mut client = Client::new(Connection::new(server_side));

        writer.write_all(b"not a resp frame\r\n").unwrap();
        assert_eq!(client.next_command().unwrap(), None);

        writer.write_all(b"*1\r\n$4\r\nPING\r\n").unwrap();
        assert_eq!(client.next_command().unwrap(), Some(vec!["PING".to_string()]));
    }
}
