// src/parser.rs
use crate::http::{RequestHead, RequestKind, BROADCAST_PATH, MAX_URL_SIZE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The head is not terminated by a blank line yet.
    Incomplete,
    /// No `GET <target>` line and no broadcast POST in the head.
    MissingTarget,
    /// Request target longer than `MAX_URL_SIZE - 1` bytes.
    UrlTooLong,
    /// Request target is not valid UTF-8.
    InvalidUrl,
    /// `Content-Length` value is not a base-10 integer.
    BadContentLength,
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Offset of the first body byte if the head is complete.
pub fn headers_complete(buf: &[u8]) -> Option<usize> {
    find(buf, b"\r\n\r\n").map(|i| i + 4)
}

/// Parses a request head out of `buf`.
///
/// Scans the immutable slice without modifying it. Recognized lines:
/// a `GET` request line (the following whitespace-delimited token is the
/// target), a `POST /broadcast.service` request line, and once the latter
/// was seen, an exact-case `Content-Length: ` header. Scanning stops as
/// soon as a content length is captured; all other headers are ignored.
pub fn parse(buf: &[u8]) -> Result<RequestHead, ParseError> {
    let body_start = headers_complete(buf).ok_or(ParseError::Incomplete)?;
    let head = &buf[..body_start - 4];

    let mut url: Option<&[u8]> = None;
    let mut post = false;
    let mut content_length: usize = 0;

    let mut pos = 0;
    while pos < head.len() {
        let line_end = find(&head[pos..], b"\r\n").map(|i| pos + i).unwrap_or(head.len());
        let line = &head[pos..line_end];
        pos = line_end + 2;

        if line.starts_with(b"GET") {
            if line.len() <= 4 {
                return Err(ParseError::MissingTarget);
            }
            let rest = &line[4..];
            let end = find(rest, b" ").ok_or(ParseError::MissingTarget)?;
            url = Some(&rest[..end]);
        } else if line.starts_with(b"POST ") {
            let target = &line[5..];
            if target.starts_with(BROADCAST_PATH.as_bytes()) {
                post = true;
            }
        } else if post && line.starts_with(b"Content-Length: ") {
            let value = std::str::from_utf8(&line[16..])
                .map_err(|_| ParseError::BadContentLength)?
                .trim();
            content_length = value.parse().map_err(|_| ParseError::BadContentLength)?;
            break;
        }
    }

    if post {
        let kind = if content_length == 0 {
            RequestKind::ChatSubscribe
        } else {
            RequestKind::ChatPublish { content_length }
        };
        return Ok(RequestHead { kind, body_start });
    }

    let url = url.ok_or(ParseError::MissingTarget)?;
    if url.len() >= MAX_URL_SIZE {
        return Err(ParseError::UrlTooLong);
    }
    let url = std::str::from_utf8(url)
        .map_err(|_| ParseError::InvalidUrl)?
        .to_string();
    Ok(RequestHead {
        kind: RequestKind::FileGet { url },
        body_start,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_basic_get() {
        let req = b"GET /index.html HTTP/1.0\r\nHost: localhost\r\n\r\n";
        let head = parse(req).unwrap();
        assert_eq!(
            head.kind,
            RequestKind::FileGet {
                url: "/index.html".to_string()
            }
        );
        assert_eq!(head.body_start, req.len());
    }

    #[test]
    fn incomplete_heads_are_reported() {
        assert_eq!(
            parse(b"GET /index.html HTT"),
            Err(ParseError::Incomplete)
        );
        assert_eq!(
            parse(b"GET /index.html HTTP/1.0\r\nHost: x\r\n"),
            Err(ParseError::Incomplete)
        );
    }

    #[test]
    fn get_without_a_target_is_rejected() {
        assert_eq!(parse(b"GET\r\n\r\n"), Err(ParseError::MissingTarget));
        assert_eq!(parse(b"GET /nospace\r\n\r\n"), Err(ParseError::MissingTarget));
    }

    #[test]
    fn overlong_targets_are_rejected_not_truncated() {
        let long = "a".repeat(MAX_URL_SIZE);
        let req = format!("GET /{} HTTP/1.0\r\n\r\n", long);
        assert_eq!(parse(req.as_bytes()), Err(ParseError::UrlTooLong));

        // one under the limit still parses
        let ok = "a".repeat(MAX_URL_SIZE - 2);
        let req = format!("GET /{} HTTP/1.0\r\n\r\n", ok);
        assert!(parse(req.as_bytes()).is_ok());
    }

    #[test]
    fn broadcast_post_with_empty_body_subscribes() {
        let req = b"POST /broadcast.service HTTP/1.0\r\nContent-Length: 0\r\n\r\n";
        let head = parse(req).unwrap();
        assert_eq!(head.kind, RequestKind::ChatSubscribe);
    }

    #[test]
    fn broadcast_post_with_a_body_publishes() {
        let req = b"POST /broadcast.service HTTP/1.0\r\nContent-Length: 5\r\n\r\nhello";
        let head = parse(req).unwrap();
        assert_eq!(head.kind, RequestKind::ChatPublish { content_length: 5 });
        assert_eq!(&req[head.body_start..], b"hello");
    }

    #[test]
    fn missing_content_length_defaults_to_subscribe() {
        let req = b"POST /broadcast.service HTTP/1.0\r\n\r\n";
        assert_eq!(parse(req).unwrap().kind, RequestKind::ChatSubscribe);
    }

    #[test]
    fn content_length_needs_a_broadcast_post_first() {
        // Content-Length on a GET stays ignored
        let req = b"GET /x HTTP/1.0\r\nContent-Length: 9\r\n\r\n";
        let head = parse(req).unwrap();
        assert_eq!(
            head.kind,
            RequestKind::FileGet {
                url: "/x".to_string()
            }
        );
    }

    #[test]
    fn garbage_content_length_is_rejected() {
        let req = b"POST /broadcast.service HTTP/1.0\r\nContent-Length: five\r\n\r\n";
        assert_eq!(parse(req), Err(ParseError::BadContentLength));
    }

    #[test]
    fn head_ending_exactly_on_a_power_of_two_boundary_parses() {
        // pad the head so the terminator ends exactly at byte 1024
        let mut req = b"GET /index.html HTTP/1.0\r\nX-Pad: ".to_vec();
        let pad = 1024 - req.len() - 4;
        req.extend(std::iter::repeat(b'p').take(pad));
        req.extend_from_slice(b"\r\n\r\n");
        assert_eq!(req.len(), 1024);
        let head = parse(&req).unwrap();
        assert_eq!(head.body_start, 1024);
        assert_eq!(
            head.kind,
            RequestKind::FileGet {
                url: "/index.html".to_string()
            }
        );
    }
}
