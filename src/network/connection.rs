use std::io::{Read, Write};
use std::net::TcpStream;

use bytes::BytesMut;
use thiserror::Error;

use crate::parser::resp::ParseError;
use crate::parser::resp::Result;

pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse message: {0}")]
    Parse(#[from] ParseError),
}

const READ_CHUNK_SIZE: usize = 4096;

/// Buffers bytes read from a socket and hands already-framed messages to a
/// parser, retrying the read when the parser reports `Incomplete`. A single
/// call to `TcpStream::read` is not guaranteed to return a whole frame, so
/// every suspension point in the connection task goes through here.
pub struct Connection {
    pub stream: TcpStream,
    buffer: BytesMut,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
        }
    }

    /// Builds a connection that already has `leftover` bytes buffered —
    /// used when the handshake's final PSYNC response shares a TCP segment
    /// with the first propagated write command.
    pub fn from_existing(stream: TcpStream, leftover: &[u8]) -> Self {
        let mut conn = Self::new(stream);
        conn.buffer.extend_from_slice(leftover);
        conn
    }

    pub fn get_buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn consume(&mut self, n: usize) {
        let _ = self.buffer.split_to(n);
    }

    fn read_from_stream(&mut self) -> ConnectionResult<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = self.stream.read(&mut chunk)?;
        if read == 0 {
            return Err(ConnectionError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            )));
        }
        self.buffer.extend_from_slice(&chunk[..read]);
        Ok(())
    }

    /// Applies `f` to the buffered bytes, reading more from the socket and
    /// retrying whenever `f` reports `ParseError::Incomplete`. On success
    /// the caller is responsible for calling `consume` with the amount of
    /// the buffer that `f` reported as read.
    pub fn try_parse<F, T>(&mut self, f: F) -> ConnectionResult<T>
    where
        F: Fn(&[u8]) -> Result<T>,
    {
        loop {
            match f(&self.buffer) {
                Ok(value) => return Ok(value),
                Err(ParseError::Incomplete) => self.read_from_stream()?,
                Err(e) => return Err(ConnectionError::Parse(e)),
            }
        }
    }

    pub fn write_message(&mut self, data: &[u8]) -> ConnectionResult<()> {
        self.stream.write_all(data)?;
        Ok(())
    }
}
