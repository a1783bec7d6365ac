//! Raw Descriptor Helpers
//!
//! Thin safe wrappers over the descriptor syscalls the redirection layer
//! needs. Errors carry the errno message.

use crate::io::RedirError;
use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;

fn errno_err(context: &str) -> RedirError {
    RedirError::Sys {
        context: context.to_string(),
        message: io::Error::last_os_error().to_string(),
    }
}

pub fn make_pipe() -> Result<(RawFd, RawFd), RedirError> {
    let mut fds = [0i32; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(errno_err("pipe"));
    }
    Ok((fds[0], fds[1]))
}

pub fn open_path(path: &str, flags: i32, mode: u32) -> Result<RawFd, RedirError> {
    let c_path = CString::new(path).map_err(|_| RedirError::Open {
        path: path.to_string(),
        message: "path contains NUL".to_string(),
    })?;
    let fd = unsafe { libc::open(c_path.as_ptr(), flags, mode as libc::c_uint) };
    if fd < 0 {
        return Err(RedirError::Open {
            path: path.to_string(),
            message: io::Error::last_os_error().to_string(),
        });
    }
    Ok(fd)
}

pub fn dup2(from: RawFd, to: RawFd) -> Result<(), RedirError> {
    if unsafe { libc::dup2(from, to) } < 0 {
        return Err(errno_err("dup2"));
    }
    Ok(())
}

/// Duplicate to a descriptor at or above `min` (used to stash descriptors
/// out of the way of user-visible fd numbers).
pub fn dup_above(fd: RawFd, min: RawFd) -> Result<RawFd, RedirError> {
    let new = unsafe { libc::fcntl(fd, libc::F_DUPFD, min) };
    if new < 0 {
        return Err(errno_err("fcntl(F_DUPFD)"));
    }
    Ok(new)
}

pub fn close(fd: RawFd) -> Result<(), RedirError> {
    if unsafe { libc::close(fd) } != 0 {
        return Err(errno_err("close"));
    }
    Ok(())
}

/// Close, ignoring errors (teardown paths).
pub fn close_quietly(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

/// Is this descriptor open? (`fcntl(F_GETFD)` probe.)
pub fn is_open(fd: RawFd) -> bool {
    (unsafe { libc::fcntl(fd, libc::F_GETFD) }) >= 0
}

pub fn write_all(fd: RawFd, mut data: &[u8]) -> Result<(), RedirError> {
    while !data.is_empty() {
        let n = unsafe { libc::write(fd, data.as_ptr() as *const libc::c_void, data.len()) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(errno_err("write"));
        }
        data = &data[n as usize..];
    }
    Ok(())
}

pub fn read_byte(fd: RawFd) -> Option<u8> {
    let mut byte = 0u8;
    loop {
        let n = unsafe { libc::read(fd, &mut byte as *mut u8 as *mut libc::c_void, 1) };
        if n == 1 {
            return Some(byte);
        }
        if n == 0 {
            return None;
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return None;
        }
    }
}

/// Read everything until EOF.
pub fn read_to_end(fd: RawFd) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n > 0 {
            out.extend_from_slice(&buf[..n as usize]);
        } else if n == 0 {
            return out;
        } else {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return out;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_round_trip() {
        let (r, w) = make_pipe().unwrap();
        write_all(w, b"ab").unwrap();
        close(w).unwrap();
        assert_eq!(read_byte(r), Some(b'a'));
        assert_eq!(read_byte(r), Some(b'b'));
        assert_eq!(read_byte(r), None);
        close(r).unwrap();
    }

    #[test]
    fn is_open_probe() {
        let (r, w) = make_pipe().unwrap();
        assert!(is_open(r));
        close(r).unwrap();
        close(w).unwrap();
        assert!(!is_open(r));
    }

    #[test]
    fn dup_above_lands_high() {
        let (r, w) = make_pipe().unwrap();
        let stash = dup_above(r, 10).unwrap();
        assert!(stash >= 10);
        close_quietly(r);
        close_quietly(w);
        close_quietly(stash);
    }
}
