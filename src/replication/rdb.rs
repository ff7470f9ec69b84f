use base64::prelude::*;

use crate::common::CRLF;

const EMPTY_RDB_BASE64_ENCODED: &[u8] = b"UkVESVMwMDEx+glyZWRpcy12ZXIFNy4yLjD6CnJlZGlzLWJpdHPAQPoFY3RpbWXCbQi8ZfoIdXNlZC1tZW3CsMQQAPoIYW9mLWJhc2XAAP/wbjv+wP9aog==";

/// The fixed 88-byte empty RDB snapshot sent verbatim on every full-resync.
pub fn get_empty_rdb() -> Vec<u8> {
    BASE64_STANDARD
        .decode(EMPTY_RDB_BASE64_ENCODED)
        .expect("EMPTY_RDB_BASE64_ENCODED is not valid base64")
}

/// Wraps `rdb` in the deliberately non-conforming bulk header Redis uses for
/// full-resync: `$<len>\r\n<bytes>` with no trailing CRLF.
pub fn serialize_rdb(rdb: &[u8]) -> Vec<u8> {
    [b"$", rdb.len().to_string().as_bytes(), CRLF.as_bytes(), rdb].concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_rdb_is_88_bytes() {
        assert_eq!(get_empty_rdb().len(), 88);
    }

    #[test]
    fn serialize_rdb_has_no_trailing_crlf() {
        let rdb = get_empty_rdb();
        let serialized = serialize_rdb(&rdb);
        assert_eq!(serialized, [b"$88\r\n", rdb.as_slice()].concat());
        assert!(!serialized.ends_with(b"\r\n"));
    }
}
