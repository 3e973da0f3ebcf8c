//! Control-socket line framing.
//!
//! Newline-terminated ASCII lines over a unix stream socket; reads are
//! byte-wise against a hard deadline so a wedged worker can never block
//! the host past its timeout.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::time::{Duration, Instant};

use crate::TransportError;

const MAX_LINE_LEN: usize = 1024;

/// Write one line (the caller includes the trailing newline).
pub fn send_line(stream: &mut UnixStream, line: &str) -> Result<(), TransportError> {
    stream
        .write_all(line.as_bytes())
        .map_err(|e| TransportError::SocketWrite(e.to_string()))
}

/// Read one newline-terminated line within `timeout`.
pub fn read_line_with_timeout(
    stream: &mut UnixStream,
    timeout: Duration,
) -> Result<String, TransportError> {
    let deadline = Instant::now() + timeout;
    let mut out = String::new();
    let mut byte = [0u8; 1];
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .ok_or(TransportError::ResponseTimeout)?;
        stream.set_read_timeout(Some(remaining.max(Duration::from_millis(1))))?;
        match stream.read(&mut byte) {
            Ok(0) => return Err(TransportError::SocketClosed),
            Ok(_) => {
                if byte[0] == b'\n' {
                    return Ok(out);
                }
                out.push(byte[0] as char);
                if out.len() > MAX_LINE_LEN {
                    return Err(TransportError::LineTooLong);
                }
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                return Err(TransportError::ResponseTimeout);
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransportError::SocketRead(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;

    fn pair(dir: &std::path::Path) -> (UnixStream, UnixStream) {
        let path = dir.join("ctl.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let client = UnixStream::connect(&path).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn round_trips_a_line() {
        let dir = tempfile::tempdir().unwrap();
        let (mut client, mut server) = pair(dir.path());
        send_line(&mut client, "RUN 7\n").unwrap();
        let line = read_line_with_timeout(&mut server, Duration::from_secs(1)).unwrap();
        assert_eq!(line, "RUN 7");
    }

    #[test]
    fn times_out_when_peer_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let (_client, mut server) = pair(dir.path());
        let err = read_line_with_timeout(&mut server, Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, TransportError::ResponseTimeout));
    }

    #[test]
    fn closed_peer_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let (client, mut server) = pair(dir.path());
        drop(client);
        let err = read_line_with_timeout(&mut server, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, TransportError::SocketClosed));
    }

    #[test]
    fn overlong_line_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut client, mut server) = pair(dir.path());
        let long = "x".repeat(2000);
        send_line(&mut client, &long).unwrap();
        let err = read_line_with_timeout(&mut server, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TransportError::LineTooLong));
    }
}
