//! 内存映射 I/O
//!
//! 通过 `mmap` 把设备节点 (`/dev/uioN`、`/dev/mem`) 映射进进程地址空间，
//! 并提供按字节偏移的 32 位 volatile 寄存器访问。

use core::fmt;
use core::ptr::{NonNull, read_volatile, write_volatile};
use core::sync::atomic::{Ordering, fence};
use std::fs::OpenOptions;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::sync::Arc;

use linux_raw_sys::general::{MAP_SHARED, O_SYNC, PROT_READ, PROT_WRITE};
use syscalls::{Errno, Sysno, syscall};

/// 页大小
const PAGE_SIZE: usize = 0x1000;

/// 映射失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapError {
    /// 设备节点路径
    pub path: String,
    /// 底层错误码
    pub errno: Errno,
}

impl MapError {
    pub fn new(path: &str, errno: Errno) -> Self {
        Self {
            path: path.into(),
            errno,
        }
    }

    pub(crate) fn from_io(path: &str, err: std::io::Error) -> Self {
        let errno = err.raw_os_error().map_or(Errno::EIO, Errno::new);
        Self::new(path, errno)
    }

    /// 获取错误码 (Linux errno 风格，负值)
    pub fn as_errno(&self) -> i32 {
        -self.errno.into_raw()
    }
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} could not be mapped: {}", self.path, self.errno)
    }
}

/// 32 位寄存器读写接口
///
/// 偏移量以字节为单位，必须 4 字节对齐。
pub trait RegisterIo {
    /// 读取寄存器
    fn read(&self, offset: usize) -> u32;

    /// 写入寄存器
    fn write(&self, offset: usize, value: u32);
}

impl<T: RegisterIo + ?Sized> RegisterIo for Arc<T> {
    #[inline]
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    #[inline]
    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value)
    }
}

/// 一段 `mmap` 得到的设备内存窗口
///
/// Drop 时自动 `munmap`。
pub struct MmioMapping {
    ptr: NonNull<u8>,
    len: usize,
    path: String,
}

// SAFETY: 映射的是设备内存，指针本身可以在线程间传递；
// 对同一寄存器的并发访问需要在更高层同步
unsafe impl Send for MmioMapping {}
unsafe impl Sync for MmioMapping {}

impl MmioMapping {
    /// 以 `O_RDWR | O_SYNC` 打开设备节点并映射 `[offset, offset + len)`
    ///
    /// `O_SYNC` 使 `/dev/mem` 的映射为非缓存，对应内核里的 `ioremap_nocache`。
    pub fn open(path: &str, offset: usize, len: usize) -> Result<Self, MapError> {
        if len == 0 || offset % PAGE_SIZE != 0 {
            return Err(MapError::new(path, Errno::EINVAL));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(O_SYNC as i32)
            .open(path)
            .map_err(|e| MapError::from_io(path, e))?;

        let fd = file.as_raw_fd();
        let prot = PROT_READ | PROT_WRITE;

        // SAFETY: 参数均由本函数构造，失败时返回 errno
        #[cfg(target_arch = "arm")]
        let ret = unsafe {
            syscall!(Sysno::mmap2, 0, len, prot, MAP_SHARED, fd, offset / PAGE_SIZE)
        };
        #[cfg(not(target_arch = "arm"))]
        let ret = unsafe { syscall!(Sysno::mmap, 0, len, prot, MAP_SHARED, fd, offset) };
        let addr = ret.map_err(|errno| MapError::new(path, errno))?;

        let ptr =
            NonNull::new(addr as *mut u8).ok_or_else(|| MapError::new(path, Errno::ENOMEM))?;

        debug!("Mapped {} [{:#x}, {:#x}) at {:p}", path, offset, offset + len, ptr);

        Ok(Self {
            ptr,
            len,
            path: path.into(),
        })
    }

    /// 映射的虚拟基地址
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// 映射长度
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 设备节点路径
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl RegisterIo for MmioMapping {
    #[inline]
    fn read(&self, offset: usize) -> u32 {
        debug_assert!(offset % 4 == 0 && offset + 4 <= self.len);
        // SAFETY: offset 在映射范围内且 4 字节对齐
        unsafe { read_volatile(self.ptr.as_ptr().add(offset) as *const u32) }
    }

    #[inline]
    fn write(&self, offset: usize, value: u32) {
        debug_assert!(offset % 4 == 0 && offset + 4 <= self.len);
        // SAFETY: 同上
        unsafe { write_volatile(self.ptr.as_ptr().add(offset) as *mut u32, value) }
    }
}

impl Drop for MmioMapping {
    fn drop(&mut self) {
        // SAFETY: ptr/len 来自成功的 mmap，且之后不再被访问
        if let Err(errno) = unsafe { syscall!(Sysno::munmap, self.ptr.as_ptr(), self.len) } {
            error!("munmap {} failed: {}", self.path, errno);
        } else {
            debug!("Unmapped {}", self.path);
        }
    }
}

impl fmt::Debug for MmioMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MmioMapping")
            .field("path", &self.path)
            .field("ptr", &self.ptr)
            .field("len", &format_args!("{:#x}", self.len))
            .finish()
    }
}

/// 设备内存访问屏障
///
/// 保证之前的 volatile 访问在之后的访问 (包括启动 DMA 的寄存器写) 之前完成。
#[inline]
pub fn io_barrier() {
    cfg_if::cfg_if! {
        if #[cfg(any(target_arch = "arm", target_arch = "aarch64"))] {
            // SAFETY: 纯屏障指令
            unsafe { core::arch::asm!("dmb sy", options(nostack, preserves_flags)) };
        } else {
            fence(Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device() {
        let err = MmioMapping::open("/dev/nnaccel-does-not-exist", 0, PAGE_SIZE).unwrap_err();
        assert_eq!(err.errno, Errno::ENOENT);
        assert_eq!(err.as_errno(), -2);
        assert!(err.to_string().contains("/dev/nnaccel-does-not-exist"));
    }

    #[test]
    fn test_open_rejects_unaligned_offset() {
        let err = MmioMapping::open("/dev/null", 0x10, PAGE_SIZE).unwrap_err();
        assert_eq!(err.errno, Errno::EINVAL);
    }
}
