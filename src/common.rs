pub const CRLF: &str = "\r\n";
