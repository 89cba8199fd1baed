//! Cleanup of attached exec output.

/// Multiplexed stream headers the engine prepends to short attached output.
const STREAM_HEADERS: [&str; 2] = ["\x01\x00\x00\x00\x00\x00\x00\r", "\x01\x00\x00\x00\x00\x00\x00)"];

/// Normalize raw exec output into a single line.
///
/// Newlines are dropped, and if the output starts with a stdout stream header
/// every occurrence of that header is removed.
///
/// # Examples
///
/// ```rust
/// use fleet_harness::runtime::sanitize_exec_output;
///
/// assert_eq!(sanitize_exec_output("8.0.0-SNAPSHOT\n"), "8.0.0-SNAPSHOT");
/// assert_eq!(
///     sanitize_exec_output("\x01\x00\x00\x00\x00\x00\x00\r/usr/bin/agent\n"),
///     "/usr/bin/agent"
/// );
/// ```
pub fn sanitize_exec_output(raw: &str) -> String {
    let mut output = raw.replace('\n', "");
    for header in STREAM_HEADERS {
        if output.starts_with(header) {
            output = output.replace(header, "");
            tracing::trace!(output = %output, "exec output sanitized");
        }
    }
    output
}
