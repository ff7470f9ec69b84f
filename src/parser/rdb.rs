use super::resp::{find_first_crlf, ParseError, Result};

pub struct RdbParseResult {
    pub rdb: Vec<u8>,
    pub len: usize,
}

/// Parses the deliberately non-conforming `$<len>\r\n<bytes>` header the
/// primary sends after FULLRESYNC — unlike a real bulk string, there is no
/// trailing CRLF after the payload.
pub fn parse_rdb_payload(message: &[u8]) -> Result<RdbParseResult> {
    let crlf = find_first_crlf(message);
    match crlf {
        Some(len) => {
            let n = std::str::from_utf8(&message[1..len])
                .map_err(|_| ParseError::Invalid)?
                .parse::<usize>()
                .map_err(|_| ParseError::Invalid)?;
            let rdb_start = len + 2;
            if rdb_start + n > message.len() {
                return Err(ParseError::Incomplete);
            }
            Ok(RdbParseResult {
                rdb: message[rdb_start..rdb_start + n].to_vec(),
                len: rdb_start + n,
            })
        }
        None => Err(ParseError::Incomplete),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_without_trailing_crlf() {
        let message = [b"$5\r\nhello".as_slice()].concat();
        let result = parse_rdb_payload(&message).unwrap();
        assert_eq!(result.rdb, b"hello");
        assert_eq!(result.len, message.len());
    }

    #[test]
    fn waits_for_more_data_when_payload_incomplete() {
        let message = b"$5\r\nhe";
        assert!(matches!(
            parse_rdb_payload(message),
            Err(ParseError::Incomplete)
        ));
    }
}
