use thiserror::Error;

use crate::common::CRLF;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

pub type Result<T> = std::result::Result<T, ParseError>;

/// A single RESP frame. Arrays nest recursively; bulk strings carry their
/// payload as opaque bytes so callers decide when (and whether) to treat
/// them as UTF-8.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Token {
    SimpleString(String),
    SimpleError(String),
    BulkString(Vec<u8>),
    NullBulkString,
    Array(Vec<Token>),
}

impl Token {
    pub fn get_bulk_string_data(&self) -> Result<&Vec<u8>> {
        match self {
            Token::BulkString(data) => Ok(data),
            _ => Err(ParseError::Invalid),
        }
    }

    pub fn get_simple_string_data(&self) -> Result<&String> {
        match self {
            Token::SimpleString(data) => Ok(data),
            _ => Err(ParseError::Invalid),
        }
    }

    pub fn get_array_elements(&self) -> Result<&Vec<Token>> {
        match self {
            Token::Array(elements) => Ok(elements),
            _ => Err(ParseError::Invalid),
        }
    }

    /// Builds an Array of BulkStrings from raw command arguments, preserving
    /// byte content and order. Used both to encode outgoing requests (the
    /// handshake) and to re-encode a command vector for replica fan-out.
    pub fn command(args: &[Vec<u8>]) -> Token {
        Token::Array(
            args.iter()
                .map(|arg| Token::BulkString(arg.clone()))
                .collect(),
        )
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Token::SimpleString(data) => format!("+{data}{CRLF}").into_bytes(),
            Token::SimpleError(data) => format!("-{data}{CRLF}").into_bytes(),
            Token::BulkString(data) => {
                let mut out = format!("${}{CRLF}", data.len()).into_bytes();
                out.extend_from_slice(data);
                out.extend_from_slice(CRLF.as_bytes());
                out
            }
            Token::NullBulkString => b"$-1\r\n".to_vec(),
            Token::Array(elements) => {
                let mut out = format!("*{}{CRLF}", elements.len()).into_bytes();
                for element in elements {
                    out.extend_from_slice(&element.serialize());
                }
                out
            }
        }
    }
}

#[derive(Debug)]
pub struct ParseResult {
    pub token: Token,
    pub len: usize,
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("RESP message is malformed")]
    Invalid,
    #[error("need more data to correctly process message")]
    Incomplete,
}

impl From<std::num::ParseIntError> for ParseError {
    fn from(_value: std::num::ParseIntError) -> Self {
        ParseError::Invalid
    }
}

impl From<std::str::Utf8Error> for ParseError {
    fn from(_value: std::str::Utf8Error) -> Self {
        ParseError::Invalid
    }
}

pub fn find_first_crlf(message: &[u8]) -> Option<usize> {
    message.windows(2).position(|window| window == [CR, LF])
}

fn bytes_to_signed(bytes: &[u8]) -> Result<i64> {
    Ok(std::str::from_utf8(bytes)?.parse::<i64>()?)
}

fn parse_bytes(message: &[u8], len: usize) -> Result<&[u8]> {
    if len + 2 > message.len() {
        return Err(ParseError::Incomplete);
    }
    if message[len] != CR || message[len + 1] != LF {
        return Err(ParseError::Invalid);
    }
    Ok(&message[..len])
}

fn parse_bulk_string(message: &[u8]) -> Result<ParseResult> {
    assert_eq!(message.first(), Some(&b'$'));

    let size_offset = find_first_crlf(message).ok_or(ParseError::Incomplete)?;
    let data_size = bytes_to_signed(&message[1..size_offset])?;
    let data_start = size_offset + 2; // Skip CRLF

    if data_size < 0 {
        return Ok(ParseResult {
            token: Token::NullBulkString,
            len: data_start,
        });
    }

    let data_size = data_size as usize;
    let data = parse_bytes(&message[data_start..], data_size)?;
    let len = data_start + data_size + 2;

    Ok(ParseResult {
        token: Token::BulkString(data.to_vec()),
        len,
    })
}

fn parse_simple_string(message: &[u8]) -> Result<ParseResult> {
    assert_eq!(message.first(), Some(&b'+'));

    let str_size = find_first_crlf(message).ok_or(ParseError::Incomplete)?;
    let data = std::str::from_utf8(&message[1..str_size])?;

    Ok(ParseResult {
        token: Token::SimpleString(data.to_owned()),
        len: str_size + 2,
    })
}

fn parse_simple_error(message: &[u8]) -> Result<ParseResult> {
    assert_eq!(message.first(), Some(&b'-'));

    let str_size = find_first_crlf(message).ok_or(ParseError::Incomplete)?;
    let data = std::str::from_utf8(&message[1..str_size])?;

    Ok(ParseResult {
        token: Token::SimpleError(data.to_owned()),
        len: str_size + 2,
    })
}

fn parse_array(message: &[u8]) -> Result<ParseResult> {
    assert_eq!(message.first(), Some(&b'*'));

    let size_offset = find_first_crlf(message).ok_or(ParseError::Incomplete)?;
    let num_elements = bytes_to_signed(&message[1..size_offset])?;
    if num_elements < 0 {
        return Err(ParseError::Invalid);
    }

    let mut offset = size_offset + 2;
    let mut elements = Vec::with_capacity(num_elements as usize);

    for _ in 0..num_elements {
        let result = parse_buffer(&message[offset..])?;
        offset += result.len;
        elements.push(result.token);
    }

    Ok(ParseResult {
        token: Token::Array(elements),
        len: offset,
    })
}

/// Parses exactly one top-level RESP frame, re-reading the sigil of every
/// nested element rather than assuming array members share one type.
pub fn parse_buffer(buffer: &[u8]) -> Result<ParseResult> {
    match buffer {
        [first_byte, ..] => match first_byte {
            b'*' => parse_array(buffer),
            b'+' => parse_simple_string(buffer),
            b'-' => parse_simple_error(buffer),
            b'$' => parse_bulk_string(buffer),
            _ => Err(ParseError::Invalid),
        },
        [] => Err(ParseError::Incomplete),
    }
}

/// Decodes exactly one command: a top-level Array of BulkStrings, UTF-8
/// decoded into owned strings. Any other shape is a parse error.
pub fn parse_command(buffer: &[u8]) -> Result<(Vec<String>, usize)> {
    let result = parse_buffer(buffer)?;
    let elements = result.token.get_array_elements()?;

    let mut args = Vec::with_capacity(elements.len());
    for element in elements {
        let data = element.get_bulk_string_data()?;
        args.push(std::str::from_utf8(data)?.to_owned());
    }

    Ok((args, result.len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_string_parsing_works() {
        let message = b"+OK\r\n";
        let result = parse_simple_string(message).unwrap();
        assert_eq!(result.len, message.len());
        assert_eq!(result.token, Token::SimpleString("OK".to_owned()));
    }

    #[test]
    fn simple_error_parsing_works() {
        let message = b"-Invalid Command\r\n";
        let result = parse_simple_error(message).unwrap();
        assert_eq!(result.len, message.len());
        assert_eq!(result.token, Token::SimpleError("Invalid Command".to_owned()));
    }

    #[test]
    fn bulk_string_parsing_works() {
        let message = b"$5\r\nhello\r\n";
        let result = parse_bulk_string(message).unwrap();
        assert_eq!(result.len, message.len());
        assert_eq!(result.token, Token::BulkString(b"hello".to_vec()));
    }

    #[test]
    fn null_bulk_string_parsing_works() {
        let message = b"$-1\r\n";
        let result = parse_bulk_string(message).unwrap();
        assert_eq!(result.len, message.len());
        assert_eq!(result.token, Token::NullBulkString);
    }

    #[test]
    fn array_parsing_works() {
        let message = b"*2\r\n$3\r\nget\r\n$5\r\nfruit\r\n";
        let result = parse_array(message).unwrap();
        assert_eq!(result.len, message.len());
        assert_eq!(
            result.token,
            Token::Array(vec![
                Token::BulkString(b"get".to_vec()),
                Token::BulkString(b"fruit".to_vec()),
            ])
        );
    }

    #[test]
    fn array_of_array_parsing_works() {
        let message = b"*2\r\n*2\r\n$3\r\nget\r\n$5\r\nfruit\r\n*1\r\n$4\r\nPING\r\n";
        let result = parse_array(message).unwrap();
        assert_eq!(result.len, message.len());
        assert_eq!(
            result.token,
            Token::Array(vec![
                Token::Array(vec![
                    Token::BulkString(b"get".to_vec()),
                    Token::BulkString(b"fruit".to_vec()),
                ]),
                Token::Array(vec![Token::BulkString(b"PING".to_vec())]),
            ])
        );
    }

    #[test]
    fn incomplete_array_waits_for_more_data() {
        let message = b"*2\r\n$3\r\nget\r\n";
        assert!(matches!(parse_array(message), Err(ParseError::Incomplete)));
    }

    #[test]
    fn parse_command_decodes_array_of_bulk_strings() {
        let message = b"*2\r\n$4\r\nECHO\r\n$5\r\nhello\r\n";
        let (args, len) = parse_command(message).unwrap();
        assert_eq!(args, vec!["ECHO".to_string(), "hello".to_string()]);
        assert_eq!(len, message.len());
    }

    #[test]
    fn parse_command_rejects_non_array() {
        let message = b"+OK\r\n";
        assert!(matches!(parse_command(message), Err(ParseError::Invalid)));
    }

    #[test]
    fn serialize_round_trips_through_parse_buffer() {
        let token = Token::Array(vec![
            Token::BulkString(b"SET".to_vec()),
            Token::BulkString(b"key".to_vec()),
            Token::BulkString(b"value with \r\n bytes".to_vec()),
        ]);
        let serialized = token.serialize();
        let result = parse_buffer(&serialized).unwrap();
        assert_eq!(result.token, token);
        assert_eq!(result.len, serialized.len());
    }

    #[test]
    fn null_bulk_string_serializes_to_fixed_literal() {
        assert_eq!(Token::NullBulkString.serialize(), b"$-1\r\n");
    }
}
