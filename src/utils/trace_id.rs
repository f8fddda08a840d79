//! Request trace identifiers.

/// Number of random bytes in a generated trace id (hex-encoded to 32 chars).
const TRACE_ID_BYTES: usize = 16;

/// Longest inbound `X-Request-Id` accepted verbatim.
const MAX_INBOUND_LEN: usize = 64;

/// Generates a random trace id.
pub fn generate_trace_id() -> String {
    random_hex(TRACE_ID_BYTES)
}

/// Hex-encodes `bytes` random bytes.
///
/// Falls back to a timestamp-derived value if the system RNG is unavailable, so
/// request handling never fails for lack of entropy.
pub fn random_hex(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];

    match getrandom::fill(&mut buffer) {
        Ok(()) => hex::encode(buffer),
        Err(e) => {
            tracing::warn!("System RNG unavailable: {}", e);
            let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
            format!("{:0width$x}", nanos, width = bytes * 2)
        }
    }
}

/// Accepts a caller-supplied request id if it is short and made of safe characters.
pub fn accept_inbound(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let ok = !raw.is_empty()
        && raw.len() <= MAX_INBOUND_LEN
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    ok.then(|| raw.to_string())
}
