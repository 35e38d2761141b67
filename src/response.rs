// src/response.rs
use crate::buffer::IoBuf;
use crate::error::ServerResult;
use chrono::Utc;

/// Status lines the server can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    BadRequest,
}

/// Writes the status line and mandatory headers into the connection's send
/// buffer at offset 0. Only the 200 response carries a `Date` header; the
/// connection close delimits every body, so there is no `Content-Length`.
pub fn format_into(buf: &mut IoBuf, status: Status) -> ServerResult<()> {
    let head = match status {
        Status::Ok => format!(
            "HTTP/1.0 200 OK\r\nDate: {}\r\n\r\n",
            Utc::now().format("%a, %d %b %Y %H:%M:%S GMT")
        ),
        Status::NotFound => "HTTP/1.0 404 Not Found\r\n\r\n".to_string(),
        Status::BadRequest => "HTTP/1.0 400 Bad Request\r\n\r\n".to_string(),
    };
    buf.set_contents(head.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_response_carries_an_rfc1123_date() {
        let mut buf = IoBuf::new();
        format_into(&mut buf, Status::Ok).unwrap();
        let text = std::str::from_utf8(buf.filled()).unwrap();

        assert!(text.starts_with("HTTP/1.0 200 OK\r\nDate: "));
        assert!(text.ends_with("GMT\r\n\r\n"));

        // `Date: Sat, 02 Aug 2026 13:45:01 GMT`
        let date = text
            .lines()
            .find(|l| l.starts_with("Date: "))
            .map(|l| &l[6..])
            .unwrap();
        assert_eq!(date.len(), "Sat, 02 Aug 2026 13:45:01 GMT".len());
        assert!(chrono::NaiveDateTime::parse_from_str(date, "%a, %d %b %Y %H:%M:%S GMT").is_ok());
    }

    #[test]
    fn error_responses_are_bare_status_lines() {
        let mut buf = IoBuf::new();
        format_into(&mut buf, Status::NotFound).unwrap();
        assert_eq!(buf.filled(), b"HTTP/1.0 404 Not Found\r\n\r\n");

        format_into(&mut buf, Status::BadRequest).unwrap();
        assert_eq!(buf.filled(), b"HTTP/1.0 400 Bad Request\r\n\r\n");
    }

    #[test]
    fn formatting_rewinds_the_cursor() {
        let mut buf = IoBuf::new();
        format_into(&mut buf, Status::NotFound).unwrap();
        buf.consume(5);
        format_into(&mut buf, Status::Ok).unwrap();
        assert_eq!(buf.cursor(), 0);
        assert_eq!(buf.unsent().len(), buf.len());
    }
}
