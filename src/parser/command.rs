use thiserror::Error;

use super::resp::Token;

pub type Result<T> = std::result::Result<T, CommandError>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(String),
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("syntax error")]
    Syntax,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ReplConfCommand {
    ListeningPort(u16),
    Capa(String),
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Command {
    Ping,
    Echo(Vec<u8>),
    Get(Vec<u8>),
    Set {
        key: Vec<u8>,
        value: Vec<u8>,
        expiry_ms: Option<u64>,
    },
    Info(Vec<u8>),
    ReplConf(ReplConfCommand),
    Psync,
}

impl Command {
    /// Re-encodes this command as a RESP Array of BulkStrings, preserving
    /// argument order and byte content. Used for replica fan-out and for
    /// the replica-side handshake requests.
    pub fn to_resp_token(&self) -> Token {
        let args: Vec<Vec<u8>> = match self {
            Command::Ping => vec![b"PING".to_vec()],
            Command::Echo(data) => vec![b"ECHO".to_vec(), data.clone()],
            Command::Get(key) => vec![b"GET".to_vec(), key.clone()],
            Command::Set {
                key,
                value,
                expiry_ms,
            } => {
                let mut args = vec![b"SET".to_vec(), key.clone(), value.clone()];
                if let Some(px) = expiry_ms {
                    args.push(b"PX".to_vec());
                    args.push(px.to_string().into_bytes());
                }
                args
            }
            Command::Info(section) => vec![b"INFO".to_vec(), section.clone()],
            Command::ReplConf(sub) => match sub {
                ReplConfCommand::ListeningPort(port) => vec![
                    b"REPLCONF".to_vec(),
                    b"listening-port".to_vec(),
                    port.to_string().into_bytes(),
                ],
                ReplConfCommand::Capa(capa) => {
                    vec![b"REPLCONF".to_vec(), b"capa".to_vec(), capa.clone().into_bytes()]
                }
            },
            Command::Psync => vec![b"PSYNC".to_vec(), b"?".to_vec(), b"-1".to_vec()],
        };
        Token::command(&args)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Echo(_) => "ECHO",
            Command::Get(_) => "GET",
            Command::Set { .. } => "SET",
            Command::Info(_) => "INFO",
            Command::ReplConf(_) => "REPLCONF",
            Command::Psync => "PSYNC",
        }
    }

    /// Commands whose effects must be mirrored to connected replicas.
    pub fn is_write(&self) -> bool {
        matches!(self, Command::Set { .. })
    }
}

fn parse_u16(arg: &str) -> Result<u16> {
    arg.parse().map_err(|_| CommandError::NotAnInteger)
}

fn parse_u64(arg: &str) -> Result<u64> {
    arg.parse().map_err(|_| CommandError::NotAnInteger)
}

fn parse_replconf(args: &[String]) -> Result<Command> {
    if args.len() < 2 {
        return Err(CommandError::WrongArity("REPLCONF".to_string()));
    }

    match args[1].to_lowercase().as_str() {
        "listening-port" => {
            let port = args.get(2).ok_or(CommandError::WrongArity("REPLCONF".to_string()))?;
            Ok(Command::ReplConf(ReplConfCommand::ListeningPort(parse_u16(port)?)))
        }
        "capa" => {
            let capa = args.get(2).ok_or(CommandError::WrongArity("REPLCONF".to_string()))?;
            Ok(Command::ReplConf(ReplConfCommand::Capa(capa.clone())))
        }
        _ => Ok(Command::ReplConf(ReplConfCommand::Capa(args[1].clone()))),
    }
}

fn parse_set(args: &[String]) -> Result<Command> {
    if args.len() != 3 && args.len() != 5 {
        return Err(CommandError::WrongArity("SET".to_string()));
    }

    let key = args[1].clone().into_bytes();
    let value = args[2].clone().into_bytes();

    let expiry_ms = if args.len() == 5 {
        if !args[3].eq_ignore_ascii_case("px") {
            return Err(CommandError::Syntax);
        }
        Some(parse_u64(&args[4])?)
    } else {
        None
    };

    Ok(Command::Set {
        key,
        value,
        expiry_ms,
    })
}

/// Dispatches a decoded command vector (first element already known to be
/// the command name) to a `Command`. Arity violations on known commands are
/// rejected here rather than left undefined.
pub fn parse_message(args: &[String]) -> Result<Command> {
    let name = args.first().ok_or(CommandError::Unknown(String::new()))?;

    match name.to_lowercase().as_str() {
        "ping" => Ok(Command::Ping),
        "echo" => {
            let data = args.get(1).ok_or(CommandError::WrongArity("ECHO".to_string()))?;
            Ok(Command::Echo(data.clone().into_bytes()))
        }
        "get" => {
            let key = args.get(1).ok_or(CommandError::WrongArity("GET".to_string()))?;
            Ok(Command::Get(key.clone().into_bytes()))
        }
        "set" => parse_set(args),
        "info" => {
            let section = args.get(1).ok_or(CommandError::WrongArity("INFO".to_string()))?;
            Ok(Command::Info(section.clone().into_bytes()))
        }
        "replconf" => parse_replconf(args),
        "psync" => {
            if args.len() != 3 {
                return Err(CommandError::WrongArity("PSYNC".to_string()));
            }
            Ok(Command::Psync)
        }
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_ping() {
        assert_eq!(parse_message(&args(&["PING"])).unwrap(), Command::Ping);
    }

    #[test]
    fn test_parse_ping_case_insensitive() {
        for variant in ["ping", "PING", "Ping"] {
            assert_eq!(parse_message(&args(&[variant])).unwrap(), Command::Ping);
        }
    }

    #[test]
    fn test_parse_echo() {
        assert_eq!(
            parse_message(&args(&["ECHO", "hello"])).unwrap(),
            Command::Echo(b"hello".to_vec())
        );
    }

    #[test]
    fn test_parse_get() {
        assert_eq!(
            parse_message(&args(&["GET", "key"])).unwrap(),
            Command::Get(b"key".to_vec())
        );
    }

    #[test]
    fn test_parse_set_without_expiry() {
        assert_eq!(
            parse_message(&args(&["SET", "foo", "bar"])).unwrap(),
            Command::Set {
                key: b"foo".to_vec(),
                value: b"bar".to_vec(),
                expiry_ms: None,
            }
        );
    }

    #[test]
    fn test_parse_set_with_px() {
        assert_eq!(
            parse_message(&args(&["SET", "foo", "bar", "PX", "100"])).unwrap(),
            Command::Set {
                key: b"foo".to_vec(),
                value: b"bar".to_vec(),
                expiry_ms: Some(100),
            }
        );
    }

    #[test]
    fn test_parse_set_rejects_non_px_flag() {
        let result = parse_message(&args(&["SET", "foo", "bar", "EX", "100"]));
        assert_eq!(result, Err(CommandError::Syntax));
    }

    #[test]
    fn test_parse_set_rejects_wrong_arity() {
        let result = parse_message(&args(&["SET", "foo", "bar", "PX"]));
        assert_eq!(result, Err(CommandError::WrongArity("SET".to_string())));
    }

    #[test]
    fn test_parse_replconf_listening_port() {
        assert_eq!(
            parse_message(&args(&["REPLCONF", "listening-port", "6380"])).unwrap(),
            Command::ReplConf(ReplConfCommand::ListeningPort(6380))
        );
    }

    #[test]
    fn test_parse_replconf_listening_port_case_insensitive() {
        assert_eq!(
            parse_message(&args(&["REPLCONF", "LISTENING-PORT", "6380"])).unwrap(),
            Command::ReplConf(ReplConfCommand::ListeningPort(6380))
        );
    }

    #[test]
    fn test_parse_psync() {
        assert_eq!(
            parse_message(&args(&["PSYNC", "?", "-1"])).unwrap(),
            Command::Psync
        );
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(
            parse_message(&args(&["FLUSHALL"])),
            Err(CommandError::Unknown("flushall".to_string()))
        );
    }

    #[test]
    fn test_set_round_trips_through_resp_token() {
        let cmd = Command::Set {
            key: b"foo".to_vec(),
            value: b"bar".to_vec(),
            expiry_ms: Some(100),
        };
        let serialized = cmd.to_resp_token().serialize();
        assert_eq!(
            serialized,
            b"*5\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n$2\r\nPX\r\n$3\r\n100\r\n"
        );
    }
}
