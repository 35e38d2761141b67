// src/server.rs
use crate::chat;
use crate::config::Config;
use crate::conn::{Conn, ConnState};
use crate::error::ServerResult;
use crate::http::RequestKind;
use crate::logfile::RequestLog;
use crate::parser::{self, ParseError};
use crate::poll_table::{PollTable, LISTENER_SLOT};
use crate::response::{self, Status};
use crate::slab::ConnSlab;
use crate::syscalls;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Readiness wait timeout; bounds how long a shutdown request can linger
/// before the loop notices the flag.
const POLL_TIMEOUT_MS: i32 = 500;

/// Conditions that dispose a connection regardless of its state.
const ERROR_EVENTS: i16 = libc::POLLERR | libc::POLLHUP | libc::POLLNVAL;

/// The whole server: listener, readiness table, connection slab, request
/// logs and the shutdown flag. Owned by the single event-loop thread; the
/// only cross-thread touch is the signal handler storing the flag.
pub struct Server {
    cfg: Config,
    listen_fd: RawFd,
    port: u16,
    table: PollTable,
    conns: ConnSlab,
    access_log: RequestLog,
    error_log: RequestLog,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Binds the listener and opens both request logs. Any failure here is
    /// a startup error; the caller exits non-zero.
    pub fn bind(cfg: Config) -> ServerResult<Self> {
        std::fs::create_dir_all(&cfg.logs_dir)?;
        let access_log = RequestLog::open(&cfg.access_log_path())?;
        let error_log = RequestLog::open(&cfg.error_log_path())?;

        let listen_fd = syscalls::create_listen_socket(cfg.port)?;
        let port = syscalls::local_port(listen_fd)?;
        let table = PollTable::new(listen_fd);

        Ok(Self {
            cfg,
            listen_fd,
            port,
            table,
            conns: ConnSlab::new(),
            access_log,
            error_log,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Port actually bound (differs from the configured one only for 0).
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Flag consulted between readiness waits; store `true` to stop.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// The event loop. Returns on shutdown; errors only on a failed
    /// readiness wait (EINTR excepted).
    pub fn run(&mut self) -> ServerResult<()> {
        info!("listening on port {}", self.port);
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }

            let ready = syscalls::poll_wait(self.table.polled_mut(), POLL_TIMEOUT_MS)?;
            if ready == 0 {
                continue;
            }

            if self.table.revents(LISTENER_SLOT) & libc::POLLIN != 0 {
                self.accept_one();
            }

            // Snapshot handle/revents pairs first: handlers dispose
            // connections, which shuffles table slots under an index walk.
            let events: Vec<(u64, i16)> = (1..self.table.populated())
                .map(|i| (self.table.handle(i), self.table.revents(i)))
                .collect();

            for (handle, revents) in events {
                if revents == 0 {
                    continue;
                }
                let Some(state) = self.conns.get(handle).map(|c| c.state) else {
                    // disposed earlier in this iteration
                    continue;
                };
                if revents & ERROR_EVENTS != 0 {
                    debug!("connection {} hung up", handle);
                    self.close_connection(handle);
                } else if revents & libc::POLLIN != 0
                    && matches!(state, ConnState::Receiving | ConnState::ChatSender)
                {
                    self.receive(handle);
                } else if revents & libc::POLLOUT != 0 && state == ConnState::Sending {
                    self.send(handle);
                }
            }
        }

        for handle in self.conns.handles() {
            self.close_connection(handle);
        }
        info!("server shut down");
        Ok(())
    }

    /// One accept per readiness signal; a level-triggered table re-reports
    /// the rest of the backlog on the next iteration.
    fn accept_one(&mut self) {
        match syscalls::accept_connection(self.listen_fd) {
            Ok(Some(fd)) => {
                let handle = self.conns.insert(Conn::new(fd, 0));
                let idx = self.table.push(fd, libc::POLLIN, handle);
                if let Some(conn) = self.conns.get_mut(handle) {
                    conn.poll_index = idx;
                }
                debug!("accepted fd {} as connection {}", fd, handle);
            }
            Ok(None) => {}
            Err(e) => warn!("accept failed: {}", e),
        }
    }

    /// Disposes a connection exactly once: slab removal, table swap-remove,
    /// and the displaced neighbor's index fix-up. Descriptors close when
    /// the connection drops.
    fn close_connection(&mut self, handle: u64) {
        let Some(conn) = self.conns.remove(handle) else {
            return;
        };
        let idx = conn.poll_index;
        if let Some(displaced) = self.table.swap_remove(idx) {
            if let Some(moved) = self.conns.get_mut(displaced) {
                moved.poll_index = idx;
            }
        }
    }

    fn receive(&mut self, handle: u64) {
        // make room first; a request that cannot fit is dropped whole
        let overflow = {
            let Some(conn) = self.conns.get_mut(handle) else {
                return;
            };
            conn.buf.is_full() && conn.buf.grow().is_err()
        };
        if overflow {
            self.error_log
                .append("request dropped: exceeded the 1 MiB buffer ceiling");
            self.close_connection(handle);
            return;
        }

        enum Outcome {
            Eof,
            Failed,
            Retry,
            Complete,
            Partial,
        }
        let outcome = {
            let Some(conn) = self.conns.get_mut(handle) else {
                return;
            };
            let fd = conn.fd;
            match syscalls::read_fd(fd, conn.buf.free_tail()) {
                Ok(0) => Outcome::Eof,
                Ok(n) => {
                    conn.buf.advance(n);
                    match conn.state {
                        ConnState::Receiving => {
                            if parser::headers_complete(conn.buf.filled()).is_some() {
                                Outcome::Complete
                            } else {
                                Outcome::Partial
                            }
                        }
                        ConnState::ChatSender => Outcome::Complete,
                        _ => Outcome::Partial,
                    }
                }
                Err(e)
                    if e.kind() == ErrorKind::WouldBlock
                        || e.kind() == ErrorKind::Interrupted =>
                {
                    Outcome::Retry
                }
                Err(e) => {
                    debug!("socket read failed on connection {}: {}", handle, e);
                    Outcome::Failed
                }
            }
        };

        match outcome {
            Outcome::Eof | Outcome::Failed => self.close_connection(handle),
            Outcome::Retry | Outcome::Partial => {}
            Outcome::Complete => {
                let state = match self.conns.get(handle) {
                    Some(c) => c.state,
                    None => return,
                };
                match state {
                    ConnState::Receiving => self.dispatch_request(handle),
                    ConnState::ChatSender => self.check_chat_complete(handle),
                    _ => {}
                }
            }
        }
    }

    /// Routes a complete request head to the file or chat path.
    fn dispatch_request(&mut self, handle: u64) {
        let parsed = {
            let Some(conn) = self.conns.get(handle) else {
                return;
            };
            parser::parse(conn.buf.filled())
        };
        match parsed {
            Ok(head) => match head.kind {
                RequestKind::FileGet { url } => self.serve_file(handle, &url),
                RequestKind::ChatSubscribe => self.park_subscriber(handle),
                RequestKind::ChatPublish { content_length } => {
                    if let Some(conn) = self.conns.get_mut(handle) {
                        conn.state = ConnState::ChatSender;
                        conn.body_start = head.body_start;
                        conn.content_length = content_length;
                    }
                    self.check_chat_complete(handle);
                }
            },
            Err(e) => self.reject(handle, e),
        }
    }

    fn serve_file(&mut self, handle: u64, url: &str) {
        if url.split('/').any(|segment| segment == "..") {
            self.error_log.append(&format!("GET {} 400 Bad Request", url));
            self.start_response(handle, Status::BadRequest, None);
            return;
        }

        let path = self.cfg.resolve_target(url);
        match File::open(&path) {
            Ok(file) => {
                self.access_log.append(&format!("GET {} 200 OK", url));
                self.start_response(handle, Status::Ok, Some(file));
            }
            Err(e) => {
                debug!("open {} failed: {}", path.display(), e);
                self.error_log.append(&format!("GET {} 404 Not Found", url));
                let body = File::open(self.cfg.not_found_page()).ok();
                self.start_response(handle, Status::NotFound, body);
            }
        }
    }

    /// Arms the connection to stream `status` headers followed by `file`
    /// (if any), then switches its interest to writability.
    fn start_response(&mut self, handle: u64, status: Status, file: Option<File>) {
        let armed = {
            let Some(conn) = self.conns.get_mut(handle) else {
                return;
            };
            match response::format_into(&mut conn.buf, status) {
                Ok(()) => {
                    conn.file = file;
                    conn.state = ConnState::Sending;
                    self.table.set_events(conn.poll_index, libc::POLLOUT);
                    true
                }
                Err(_) => false,
            }
        };
        if !armed {
            // unreachable with the >= 1 KiB capacity floor
            self.close_connection(handle);
        }
    }

    fn park_subscriber(&mut self, handle: u64) {
        let Some(conn) = self.conns.get_mut(handle) else {
            return;
        };
        conn.state = ConnState::ChatReceiver;
        self.table.set_events(conn.poll_index, 0);
        debug!("connection {} parked as chat subscriber", handle);
    }

    fn reject(&mut self, handle: u64, err: ParseError) {
        self.error_log
            .append(&format!("malformed request rejected ({:?})", err));
        self.start_response(handle, Status::BadRequest, None);
    }

    /// Publishes once the declared body is fully buffered: append to the
    /// chat log, dispose the sender, replay the log to every subscriber.
    fn check_chat_complete(&mut self, handle: u64) {
        let body: Vec<u8> = {
            let Some(conn) = self.conns.get(handle) else {
                return;
            };
            match conn.body_start.checked_add(conn.content_length) {
                Some(end) if end <= conn.buf.len() => {
                    conn.buf.filled()[conn.body_start..end].to_vec()
                }
                // body still in flight; stay read-armed
                _ => return,
            }
        };

        let chat_log = self.cfg.chat_log_path();
        if let Err(e) = chat::append_message(&chat_log, &body) {
            error!("chat append failed: {}", e);
            self.close_connection(handle);
            return;
        }
        debug!("published {} chat bytes", body.len());
        self.close_connection(handle);
        chat::broadcast(&mut self.conns, &mut self.table, &chat_log);
    }

    fn send(&mut self, handle: u64) {
        let mut close = false;
        {
            let Some(conn) = self.conns.get_mut(handle) else {
                return;
            };
            let fd = conn.fd;
            if !conn.buf.is_drained() {
                match syscalls::write_fd(fd, conn.buf.unsent()) {
                    Ok(0) => close = true,
                    Ok(n) => conn.buf.consume(n),
                    Err(e)
                        if e.kind() == ErrorKind::WouldBlock
                            || e.kind() == ErrorKind::Interrupted => {}
                    Err(e) => {
                        debug!("socket write failed on connection {}: {}", handle, e);
                        close = true;
                    }
                }
            }
            if !close && conn.buf.is_drained() {
                match conn.file.as_mut() {
                    // no backing file: the response is fully delivered
                    None => close = true,
                    Some(file) => match file.read(conn.buf.refill_target()) {
                        Ok(0) => close = true,
                        Ok(n) => conn.buf.refilled(n),
                        Err(e) => {
                            debug!("file read failed on connection {}: {}", handle, e);
                            close = true;
                        }
                    },
                }
            }
        }
        if close {
            self.close_connection(handle);
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        syscalls::close_fd(self.listen_fd);
    }
}
