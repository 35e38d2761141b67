// src/chat.rs
//! The broadcast service keeps no in-memory topic state: the chat log file
//! is canonical. A publish appends its body, then every parked subscriber
//! is armed with a fresh 200 head and a read handle replaying the whole
//! log, so a late subscriber always receives the full history.

use crate::conn::ConnState;
use crate::poll_table::PollTable;
use crate::response::{self, Status};
use crate::slab::ConnSlab;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Appends exactly `body` to the chat log. Open-append-close per message;
/// the replay below must observe the bytes through an independent handle.
pub fn append_message(path: &Path, body: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).create(true).open(path)?;
    file.write_all(body)?;
    file.flush()
}

/// Rearms every parked subscriber with a full replay of the chat log.
pub fn broadcast(conns: &mut ConnSlab, table: &mut PollTable, chat_log: &Path) {
    for handle in conns.handles() {
        let Some(conn) = conns.get_mut(handle) else {
            continue;
        };
        if conn.state != ConnState::ChatReceiver {
            continue;
        }
        if response::format_into(&mut conn.buf, Status::Ok).is_err() {
            // cannot happen with a >= 1 KiB buffer, but never park a
            // half-armed subscriber
            continue;
        }
        match File::open(chat_log) {
            Ok(file) => conn.file = Some(file),
            Err(e) => {
                tracing::error!("chat log replay open failed: {}", e);
                conn.file = None;
            }
        }
        conn.state = ConnState::Sending;
        table.set_events(conn.poll_index, libc::POLLOUT);
    }
}
