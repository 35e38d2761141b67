// src/http.rs

/// Longest accepted request target, including the leading slash.
pub const MAX_URL_SIZE: usize = 256;

/// Endpoint of the long-poll broadcast service.
pub const BROADCAST_PATH: &str = "/broadcast.service";

/// What a parsed request head asks the server to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Plain `GET <target>`: stream a file from the document root.
    FileGet { url: String },
    /// `POST /broadcast.service` with an empty body: park as a subscriber.
    ChatSubscribe,
    /// `POST /broadcast.service` with a body: publish to every subscriber.
    ChatPublish { content_length: usize },
}

/// Parsed request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub kind: RequestKind,
    /// Offset of the first body byte within the receive buffer.
    pub body_start: usize,
}
