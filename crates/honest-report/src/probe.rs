//! Fault-isolated reads of memory owned by instrumented code.
//!
//! Pointers reported by instrumented functions may dangle. Instead of
//! dereferencing them directly, every read is a kernel-mediated copy that
//! reports `EFAULT` for unmapped memory rather than raising `SIGSEGV`:
//! `process_vm_readv` against our own pid on Linux, and a per-thread pipe
//! (`write(2)` of the pointee, then read back) everywhere else or when the
//! syscall is unavailable.
//!
//! Freed heap memory that is still mapped reads successfully; only unmapped
//! addresses are detected.

use std::fmt;

const WORD: usize = std::mem::size_of::<usize>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub addr: usize,
    pub len: usize,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot read {} byte(s) at {:#x}", self.len, self.addr)
    }
}

impl std::error::Error for Fault {}

/// Copy `out.len()` bytes starting at `addr` into `out`.
pub fn read_into(addr: usize, out: &mut [u8]) -> Result<(), Fault> {
    let fault = Fault {
        addr,
        len: out.len(),
    };
    if addr == 0 || addr.checked_add(out.len()).is_none() {
        return Err(fault);
    }
    if out.is_empty() {
        return Ok(());
    }
    imp::read(addr, out).map_err(|()| fault)
}

pub fn read_bytes<const N: usize>(addr: usize) -> Result<[u8; N], Fault> {
    let mut out = [0u8; N];
    read_into(addr, &mut out)?;
    Ok(out)
}

/// Read one pointer-sized word, e.g. the next hop of an `i32**`.
pub fn read_usize(addr: usize) -> Result<usize, Fault> {
    read_bytes::<WORD>(addr).map(usize::from_ne_bytes)
}

#[cfg(unix)]
mod imp {
    use std::cell::RefCell;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    pub(super) fn read(addr: usize, out: &mut [u8]) -> Result<(), ()> {
        #[cfg(target_os = "linux")]
        {
            if let Some(res) = linux::read(addr, out) {
                return res;
            }
        }
        read_via_pipe(addr, out)
    }

    #[cfg(target_os = "linux")]
    mod linux {
        use std::sync::atomic::{AtomicBool, Ordering};

        static UNAVAILABLE: AtomicBool = AtomicBool::new(false);

        /// `None` when the syscall cannot be used at all.
        pub(super) fn read(addr: usize, out: &mut [u8]) -> Option<Result<(), ()>> {
            if UNAVAILABLE.load(Ordering::Relaxed) {
                return None;
            }
            let local = libc::iovec {
                iov_base: out.as_mut_ptr() as *mut libc::c_void,
                iov_len: out.len(),
            };
            let remote = libc::iovec {
                iov_base: addr as *mut libc::c_void,
                iov_len: out.len(),
            };
            let n = unsafe { libc::process_vm_readv(libc::getpid(), &local, 1, &remote, 1, 0) };
            if n < 0 {
                let err = std::io::Error::last_os_error();
                return match err.raw_os_error() {
                    Some(libc::ENOSYS) | Some(libc::EPERM) => {
                        tracing::debug!(
                            target: "honest_report",
                            error = %err,
                            "process_vm_readv unavailable; probing through a pipe"
                        );
                        UNAVAILABLE.store(true, Ordering::Relaxed);
                        None
                    }
                    _ => Some(Err(())),
                };
            }
            Some(if n as usize == out.len() {
                Ok(())
            } else {
                Err(())
            })
        }
    }

    struct Pipe {
        rd: OwnedFd,
        wr: OwnedFd,
    }

    thread_local! {
        static PIPE: RefCell<Option<Pipe>> = const { RefCell::new(None) };
    }

    fn open_pipe() -> Option<Pipe> {
        let mut fds = [0 as libc::c_int; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return None;
        }
        // SAFETY: pipe(2) just returned these descriptors and nothing else owns them.
        let (rd, wr) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
        for fd in [&rd, &wr] {
            unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) };
        }
        Some(Pipe { rd, wr })
    }

    pub(super) fn read_via_pipe(addr: usize, out: &mut [u8]) -> Result<(), ()> {
        // Reads here are a few bytes, far below PIPE_BUF, so each write is atomic.
        PIPE.try_with(|cell| {
            let mut slot = cell.borrow_mut();
            if slot.is_none() {
                *slot = open_pipe();
            }
            let (written, got) = {
                let pipe = slot.as_ref().ok_or(())?;
                let written = unsafe {
                    libc::write(
                        pipe.wr.as_raw_fd(),
                        addr as *const libc::c_void,
                        out.len(),
                    )
                };
                if written < 0 {
                    return Err(());
                }
                let got = unsafe {
                    libc::read(
                        pipe.rd.as_raw_fd(),
                        out.as_mut_ptr() as *mut libc::c_void,
                        written as usize,
                    )
                };
                (written as usize, got)
            };
            if got < 0 || got as usize != written {
                // The pipe may now hold stale bytes; start over with a fresh one.
                *slot = None;
                return Err(());
            }
            if written == out.len() {
                Ok(())
            } else {
                Err(())
            }
        })
        .unwrap_or(Err(()))
    }
}

#[cfg(not(unix))]
mod imp {
    pub(super) fn read(_addr: usize, _out: &mut [u8]) -> Result<(), ()> {
        Err(())
    }
}
