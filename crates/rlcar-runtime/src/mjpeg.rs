//! `multipart/x-mixed-replace` framing for the MJPEG stream.

/// Part separator token announced in the response header.
pub const BOUNDARY: &str = "frame";

/// Response head sent once per client.
pub const STREAM_HEADER: &str = "HTTP/1.1 200 OK\r\n\
Content-Type: multipart/x-mixed-replace; boundary=frame\r\n\
Cache-Control: no-cache\r\n\
Connection: close\r\n\r\n";

/// Written after each part's payload.
pub const PART_TRAILER: &[u8] = b"\r\n";

/// Boundary line and headers preceding a JPEG payload of `len` bytes.
pub fn part_header(len: usize) -> String {
    format!("--{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {len}\r\n\r\n")
}

/// A complete part: header, payload and trailer in one buffer.
pub fn encode_part(payload: &[u8]) -> Vec<u8> {
    let header = part_header(payload.len());
    let mut part = Vec::with_capacity(header.len() + payload.len() + PART_TRAILER.len());
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(payload);
    part.extend_from_slice(PART_TRAILER);
    part
}

/// Pull the first complete part out of `buf`.
///
/// Returns the payload and the number of bytes consumed, or `None` while the
/// part is still incomplete, `buf` does not start with a boundary line, or
/// the announced length cannot fit in memory.
pub fn decode_part(buf: &[u8]) -> Option<(Vec<u8>, usize)> {
    let head_end = find(buf, b"\r\n\r\n")? + 4;
    let head = std::str::from_utf8(&buf[..head_end]).ok()?;
    let mut lines = head.split("\r\n");
    if lines.next()? != format!("--{BOUNDARY}") {
        return None;
    }
    let len: usize = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())?;

    let body_end = head_end.checked_add(len)?;
    let end = body_end.checked_add(PART_TRAILER.len())?;
    if buf.len() < end || &buf[body_end..end] != PART_TRAILER {
        return None;
    }
    Some((buf[head_end..body_end].to_vec(), end))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_announces_boundary() {
        assert!(STREAM_HEADER.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(STREAM_HEADER.contains(&format!("boundary={BOUNDARY}\r\n")));
        assert!(STREAM_HEADER.ends_with("\r\n\r\n"));
    }

    #[test]
    fn part_carries_length_prefix() {
        let part = encode_part(&[0xFF, 0xD8, 0xFF, 0xD9]);
        let text = String::from_utf8_lossy(&part);
        let head = "--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 4\r\n\r\n";
        assert!(text.starts_with(head));
        assert!(part.ends_with(b"\xFF\xD9\r\n"));
    }

    #[test]
    fn decodes_consecutive_parts() {
        let mut stream = encode_part(b"first");
        stream.extend(encode_part(b"second frame"));

        let (one, used) = decode_part(&stream).unwrap();
        assert_eq!(one, b"first");
        let (two, rest) = decode_part(&stream[used..]).unwrap();
        assert_eq!(two, b"second frame");
        assert_eq!(used + rest, stream.len());
    }

    #[test]
    fn incomplete_part_is_not_decoded() {
        let part = encode_part(b"payload");
        assert!(decode_part(&part[..part.len() - 3]).is_none());
        assert!(decode_part(b"garbage\r\n\r\n").is_none());
    }

    #[test]
    fn oversized_length_is_rejected() {
        let max = format!("--frame\r\nContent-Length: {}\r\n\r\nabc", usize::MAX);
        assert!(decode_part(max.as_bytes()).is_none());
        let near = format!("--frame\r\nContent-Length: {}\r\n\r\nabc", usize::MAX - 40);
        assert!(decode_part(near.as_bytes()).is_none());
    }
}
