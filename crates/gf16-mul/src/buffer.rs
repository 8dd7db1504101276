//! Heap buffers with caller-chosen alignment

use std::alloc::{self, Layout};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

/// Zero-initialised byte buffer whose start is aligned to `align` bytes.
///
/// Regions handed to the multiplier must honour the bound method's alignment;
/// this is the simplest way to get one.
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
}

// SAFETY: AlignedBuffer uniquely owns its allocation, like Vec<u8>.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
    /// # Panics
    /// If `align` is not a power of two.
    pub fn zeroed(len: usize, align: usize) -> Self {
        assert!(align.is_power_of_two(), "alignment {align} is not a power of two");
        let layout = Layout::from_size_align(len.max(1), align)
            .unwrap_or_else(|e| panic!("invalid buffer layout: {e}"));

        // SAFETY: layout has non-zero size
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(layout));

        Self { ptr, len, layout }
    }

    pub fn from_slice(data: &[u8], align: usize) -> Self {
        let mut buf = Self::zeroed(data.len(), align);
        buf.copy_from_slice(data);
        buf
    }

    pub fn align(&self) -> usize {
        self.layout.align()
    }

    /// View as native-endian `u16`s.
    ///
    /// # Panics
    /// If the length is odd or the buffer was allocated with alignment 1.
    pub fn as_u16(&self) -> &[u16] {
        bytemuck::cast_slice::<u8, u16>(self)
    }

    /// Mutable form of [`as_u16`](Self::as_u16), with the same panics
    pub fn as_u16_mut(&mut self) -> &mut [u16] {
        bytemuck::cast_slice_mut::<u8, u16>(self)
    }
}

impl Deref for AlignedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: ptr is valid for len initialised bytes
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for AlignedBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for len initialised bytes and uniquely borrowed
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Clone for AlignedBuffer {
    fn clone(&self) -> Self {
        Self::from_slice(self, self.align())
    }
}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("len", &self.len)
            .field("align", &self.align())
            .finish()
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated in `zeroed` with this layout
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_honoured() {
        for align in [2, 16, 32, 64, 4096] {
            let buf = AlignedBuffer::zeroed(100, align);
            assert_eq!(buf.as_ptr() as usize % align, 0);
            assert_eq!(buf.len(), 100);
            assert!(buf.iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_u16_view() {
        let mut buf = AlignedBuffer::from_slice(&[0x01, 0x00, 0x34, 0x12], 16);
        assert_eq!(buf.as_u16(), &[u16::from_le(1), u16::from_le(0x1234)]);
        buf.as_u16_mut()[0] = 0;
        assert_eq!(&buf[..2], &[0, 0]);
    }

    #[test]
    #[should_panic]
    fn test_u16_view_rejects_odd_length() {
        let buf = AlignedBuffer::zeroed(5, 16);
        let _ = buf.as_u16();
    }

    #[test]
    fn test_empty_and_clone() {
        let empty = AlignedBuffer::zeroed(0, 64);
        assert!(empty.is_empty());

        let buf = AlignedBuffer::from_slice(&[1, 2, 3], 32);
        let copy = buf.clone();
        assert_eq!(&copy[..], &buf[..]);
        assert_eq!(copy.align(), 32);
    }
}
