//! Wire contract shared by the rpipe client and the rpiped server.
//!
//! Both binaries import endpoint paths, header names, and body literals from
//! here so the two sides cannot drift apart. The protocol itself is four
//! endpoints over HTTP/1.1; payload bodies are raw octets, custom header
//! values are ASCII.

/// Path of the job-creation endpoint (POST, `Command` header).
pub const NEW_PATH: &str = "/new";

/// Path of the chunk-upload endpoint (POST, `Job` + `Chunk-Size` headers).
pub const UPLOAD_PATH: &str = "/upload";

/// Path of the resume-offset endpoint (GET, `Job` header).
pub const RESUME_PATH: &str = "/resume";

/// Path of the job-completion endpoint (POST, `Job` header).
pub const DONE_PATH: &str = "/done";

/// Header carrying the shell command line on `/new`.
pub const COMMAND_HEADER: &str = "Command";

/// Header carrying the job id on `/upload`, `/resume`, and `/done`.
pub const JOB_HEADER: &str = "Job";

/// Header carrying the exact body length of an `/upload` request.
///
/// The value is authoritative: the server rejects a body whose length
/// differs from it, and a `200 ok` response means exactly this many bytes
/// reached the subprocess stdin.
pub const CHUNK_SIZE_HEADER: &str = "Chunk-Size";

/// Success body for `/upload` and `/done`.
pub const OK_BODY: &str = "ok";

/// Content type of chunk upload bodies.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// One mebibyte, the unit of the client's `--chunk-size` flag.
pub const MEBIBYTE: usize = 1024 * 1024;

/// Default chunk size: 10 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 10 * MEBIBYTE;

/// Parse a decimal ASCII byte count as it appears in `Chunk-Size` headers
/// and `/resume` response bodies. Leading/trailing whitespace is rejected.
pub fn parse_byte_count(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chunk_size_is_ten_mebibytes() {
        assert_eq!(DEFAULT_CHUNK_SIZE, 10 * 1024 * 1024);
    }

    #[test]
    fn parse_byte_count_accepts_plain_decimals() {
        assert_eq!(parse_byte_count("0"), Some(0));
        assert_eq!(parse_byte_count("10485760"), Some(10_485_760));
        assert_eq!(parse_byte_count(&u64::MAX.to_string()), Some(u64::MAX));
    }

    #[test]
    fn parse_byte_count_rejects_garbage() {
        assert_eq!(parse_byte_count(""), None);
        assert_eq!(parse_byte_count("-1"), None);
        assert_eq!(parse_byte_count("10 "), None);
        assert_eq!(parse_byte_count("0x10"), None);
        assert_eq!(parse_byte_count("ten"), None);
        // one past u64::MAX
        assert_eq!(parse_byte_count("18446744073709551616"), None);
    }
}
