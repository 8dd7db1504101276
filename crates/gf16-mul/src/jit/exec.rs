//! Page-granular memory that flips between writable and executable

use crate::{Gf16Error, Result};
use std::io;

/// An anonymous mapping that is never writable and executable at once.
///
/// It starts out executable; [`ExecMemory::write`] drops to read/write for the
/// copy and restores read/execute before returning.
pub(crate) struct ExecMemory {
    ptr: *mut u8,
    len: usize,
}

// SAFETY: the mapping is owned exclusively and only mutated through &mut self
unsafe impl Send for ExecMemory {}

impl ExecMemory {
    /// Map at least `capacity` bytes and check the kernel lets them be executed
    pub(crate) fn new(capacity: usize) -> Result<Self> {
        let page = page_size();
        let len = (capacity.max(1) + page - 1) & !(page - 1);

        // SAFETY: fresh anonymous private mapping, result checked for MAP_FAILED
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(Gf16Error::ExecMemory(io::Error::last_os_error()));
        }

        let mem = Self { ptr: ptr.cast(), len };
        mem.protect(libc::PROT_READ | libc::PROT_EXEC)?;
        Ok(mem)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.len
    }

    /// Replace the start of the mapping with `code`
    pub(crate) fn write(&mut self, code: &[u8]) -> Result<()> {
        if code.len() > self.len {
            return Err(Gf16Error::CodeTooLarge { size: code.len(), capacity: self.len });
        }
        self.protect(libc::PROT_READ | libc::PROT_WRITE)?;
        // SAFETY: the mapping is writable and holds at least code.len() bytes
        unsafe { std::ptr::copy_nonoverlapping(code.as_ptr(), self.ptr, code.len()) };
        self.protect(libc::PROT_READ | libc::PROT_EXEC)
    }

    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    fn protect(&self, prot: libc::c_int) -> Result<()> {
        // SAFETY: ptr/len describe a mapping owned by self
        let ret = unsafe { libc::mprotect(self.ptr.cast(), self.len, prot) };
        if ret != 0 {
            return Err(Gf16Error::ExecMemory(io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl Drop for ExecMemory {
    fn drop(&mut self) {
        // SAFETY: unmapping the region created in new()
        unsafe {
            libc::munmap(self.ptr.cast(), self.len);
        }
    }
}

fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_rounds_to_page() {
        let mem = ExecMemory::new(100).unwrap();
        assert_eq!(mem.capacity(), page_size());
        assert!(!mem.as_ptr().is_null());
    }

    #[test]
    fn test_write_and_call() {
        let mut mem = ExecMemory::new(16).unwrap();
        // mov eax, 42; ret
        mem.write(&[0xB8, 42, 0, 0, 0, 0xC3]).unwrap();
        let f: extern "sysv64" fn() -> u32 = unsafe { std::mem::transmute(mem.as_ptr()) };
        assert_eq!(f(), 42);

        // rewriting replaces the code
        mem.write(&[0xB8, 7, 0, 0, 0, 0xC3]).unwrap();
        assert_eq!(f(), 7);
    }

    #[test]
    fn test_code_too_large() {
        let mut mem = ExecMemory::new(1).unwrap();
        let code = vec![0xC3; mem.capacity() + 1];
        assert!(matches!(
            mem.write(&code),
            Err(Gf16Error::CodeTooLarge { size, capacity }) if size == capacity + 1
        ));
    }
}
