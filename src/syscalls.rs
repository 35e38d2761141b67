// src/syscalls.rs
use crate::error::{ServerError, ServerResult};
use libc::{c_int, c_void, socklen_t};
use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::ptr;

// ---- Port resolution ----

/// Resolves a port argument to a TCP port number in network byte order,
/// ready for direct assignment into `sin_port`.
///
/// Accepts either a decimal port (1..=65535), byte-swapped here, or a
/// service name looked up in the system services database with protocol
/// "tcp", whose `s_port` already carries network order and passes through
/// unswapped. The bind site must not convert again.
pub fn resolve_port(service: &str) -> ServerResult<u16> {
    if let Ok(port) = service.parse::<u32>() {
        if (1..=65535).contains(&port) {
            return Ok((port as u16).to_be());
        }
        return Err(ServerError::PortResolution(format!(
            "port {} is out of the valid port range",
            port
        )));
    }

    let name = CString::new(service)
        .map_err(|_| ServerError::PortResolution(service.to_string()))?;
    unsafe {
        let entry = libc::getservbyname(name.as_ptr(), c"tcp".as_ptr());
        if entry.is_null() {
            return Err(ServerError::PortResolution(service.to_string()));
        }
        Ok((*entry).s_port as u16)
    }
}

// ---- Socket operations ----

/// Create a non-blocking TCP listener on all interfaces. `port` is already
/// in network byte order, as produced by [`resolve_port`].
pub fn create_listen_socket(port: u16) -> ServerResult<RawFd> {
    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0);
        if fd < 0 {
            return Err(io::Error::last_os_error().into());
        }

        // stop the socket from blocking the port after disconnecting
        let optval: c_int = 1;
        if libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &optval as *const _ as *const c_void,
            mem::size_of_val(&optval) as socklen_t,
        ) < 0
        {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err.into());
        }

        let sin = libc::sockaddr_in {
            sin_family: libc::AF_INET as libc::sa_family_t,
            sin_port: port,
            sin_addr: libc::in_addr {
                s_addr: libc::INADDR_ANY.to_be(),
            },
            sin_zero: [0; 8],
        };
        if libc::bind(
            fd,
            &sin as *const _ as *const libc::sockaddr,
            mem::size_of_val(&sin) as socklen_t,
        ) < 0
        {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err.into());
        }

        if libc::listen(fd, libc::SOMAXCONN) < 0 {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err.into());
        }

        if let Err(e) = set_nonblocking(fd) {
            libc::close(fd);
            return Err(e);
        }

        Ok(fd)
    }
}

/// Port the socket actually bound to, reported in host order (relevant
/// when asked for port 0).
pub fn local_port(fd: RawFd) -> ServerResult<u16> {
    unsafe {
        let mut addr: libc::sockaddr_in = mem::zeroed();
        let mut len = mem::size_of::<libc::sockaddr_in>() as socklen_t;
        if libc::getsockname(fd, &mut addr as *mut _ as *mut libc::sockaddr, &mut len) < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(u16::from_be(addr.sin_port))
    }
}

pub fn set_nonblocking(fd: RawFd) -> ServerResult<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error().into());
        }
    }
    Ok(())
}

/// Accept one pending connection. The peer address is never consulted, so
/// both address pointers stay null. Returns `None` on an empty backlog.
pub fn accept_connection(listen_fd: RawFd) -> ServerResult<Option<RawFd>> {
    unsafe {
        let fd = libc::accept(listen_fd, ptr::null_mut(), ptr::null_mut());
        if fd < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(None);
            }
            return Err(err.into());
        }
        if let Err(e) = set_nonblocking(fd) {
            libc::close(fd);
            return Err(e);
        }
        Ok(Some(fd))
    }
}

pub fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

// ---- Raw I/O ----

/// Read into `buf`. `Ok(0)` is a clean peer EOF; `WouldBlock` surfaces as an
/// error so the caller can keep the connection armed.
pub fn read_fd(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    unsafe {
        let res = libc::read(fd, buf.as_mut_ptr() as *mut c_void, buf.len());
        if res < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(res as usize)
        }
    }
}

pub fn write_fd(fd: RawFd, buf: &[u8]) -> io::Result<usize> {
    unsafe {
        let res = libc::write(fd, buf.as_ptr() as *const c_void, buf.len());
        if res < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(res as usize)
        }
    }
}

// ---- Readiness wait ----

/// Blocking `poll(2)` over the populated table prefix. EINTR reports as
/// zero ready descriptors so the event loop simply re-enters the wait.
pub fn poll_wait(slots: &mut [libc::pollfd], timeout_ms: i32) -> ServerResult<usize> {
    unsafe {
        let res = libc::poll(slots.as_mut_ptr(), slots.len() as libc::nfds_t, timeout_ms);
        if res < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                return Ok(0);
            }
            return Err(err.into());
        }
        Ok(res as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ports_resolve_to_network_order() {
        assert_eq!(resolve_port("80").unwrap(), 80u16.to_be());
        assert_eq!(resolve_port("65535").unwrap(), 65535u16.to_be());
    }

    #[test]
    fn out_of_range_ports_are_rejected() {
        assert!(resolve_port("65536").is_err());
        assert!(resolve_port("0").is_err());
    }

    #[test]
    fn unknown_service_names_are_rejected() {
        assert!(resolve_port("no-such-service-entry").is_err());
    }
}
