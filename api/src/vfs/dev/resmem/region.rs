//! 保留物理内存区域
//!
//! 真实平台上通过 `/dev/mem` (`O_SYNC`，非缓存) 映射；没有硬件时使用
//! 堆上的一段按字对齐的内存代替，物理地址只用于计算 DMA 地址。

use core::fmt;
use core::ptr::{read_volatile, write_volatile};

use memory_addr::{PhysAddr, PhysAddrRange};

use super::error::ResMemResult;
use crate::vfs::dev::mmio::{MmioMapping, io_barrier};

enum Backing {
    Mapped(MmioMapping),
    Heap(Box<[u32]>),
}

/// 一段 DMA 可见的保留内存
pub struct ReservedRegion {
    base: PhysAddr,
    size: usize,
    backing: Backing,
}

impl ReservedRegion {
    /// 从 `device` 映射 `[base, base + size)`
    pub fn map(device: &str, base: PhysAddr, size: usize) -> ResMemResult<Self> {
        let mapping = MmioMapping::open(device, base.as_usize(), size)?;
        info!(
            "Reserved memory mapped: phys {:#x}, size {:#x}",
            base.as_usize(),
            size
        );
        Ok(Self {
            base,
            size,
            backing: Backing::Mapped(mapping),
        })
    }

    /// 堆上分配的区域，内容初始为 0
    pub fn anonymous(base: PhysAddr, size: usize) -> Self {
        let words = size.div_ceil(4);
        Self {
            base,
            size,
            backing: Backing::Heap(vec![0u32; words].into_boxed_slice()),
        }
    }

    pub fn phys_base(&self) -> PhysAddr {
        self.base
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn phys_range(&self) -> PhysAddrRange {
        PhysAddrRange::from_start_size(self.base, self.size)
    }

    fn as_mut_ptr(&mut self) -> *mut u8 {
        match &mut self.backing {
            Backing::Mapped(m) => m.as_ptr(),
            Backing::Heap(words) => words.as_mut_ptr() as *mut u8,
        }
    }

    /// 把 `src` 复制到区域的 `offset` 字节处，调用者已检查边界
    pub(super) fn copy_in(&mut self, offset: usize, src: &[u8]) {
        debug_assert!(offset + src.len() <= self.size);
        // SAFETY: 目标范围在区域内，源为有效切片
        unsafe { copy_to_io(self.as_mut_ptr().add(offset), src.as_ptr(), src.len()) }
    }

    /// 从区域的 `offset` 字节处复制到 `dst`，调用者已检查边界
    pub(super) fn copy_out(&mut self, offset: usize, dst: &mut [u8]) {
        debug_assert!(offset + dst.len() <= self.size);
        // SAFETY: 源范围在区域内，目标为有效切片
        unsafe { copy_from_io(dst.as_mut_ptr(), self.as_mut_ptr().add(offset), dst.len()) }
    }
}

impl fmt::Debug for ReservedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.backing {
            Backing::Mapped(_) => "mapped",
            Backing::Heap(_) => "heap",
        };
        f.debug_struct("ReservedRegion")
            .field("base", &format_args!("{:#x}", self.base.as_usize()))
            .field("size", &format_args!("{:#x}", self.size))
            .field("backing", &kind)
            .finish()
    }
}

#[inline]
fn word_aligned(a: usize, b: usize) -> bool {
    (a | b) % 4 == 0
}

/// 普通内存 → 设备内存
///
/// 两端都 4 字节对齐时按字写入，否则按字节；结束后插入屏障。
unsafe fn copy_to_io(dst: *mut u8, src: *const u8, len: usize) {
    let mut done = 0;
    if word_aligned(dst as usize, src as usize) {
        while done + 4 <= len {
            // SAFETY: 调用者保证两端 len 字节有效，且已对齐
            unsafe {
                let word = (src.add(done) as *const u32).read();
                write_volatile(dst.add(done) as *mut u32, word);
            }
            done += 4;
        }
    }
    while done < len {
        // SAFETY: 同上
        unsafe { write_volatile(dst.add(done), src.add(done).read()) };
        done += 1;
    }
    io_barrier();
}

/// 设备内存 → 普通内存
unsafe fn copy_from_io(dst: *mut u8, src: *const u8, len: usize) {
    io_barrier();
    let mut done = 0;
    if word_aligned(dst as usize, src as usize) {
        while done + 4 <= len {
            // SAFETY: 调用者保证两端 len 字节有效，且已对齐
            unsafe {
                let word = read_volatile(src.add(done) as *const u32);
                (dst.add(done) as *mut u32).write(word);
            }
            done += 4;
        }
    }
    while done < len {
        // SAFETY: 同上
        unsafe { dst.add(done).write(read_volatile(src.add(done))) };
        done += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_region_is_zeroed() {
        let mut region = ReservedRegion::anonymous(PhysAddr::from(0x7000_0000), 0x103);
        assert_eq!(region.size(), 0x103);
        assert_eq!(region.phys_range().end.as_usize(), 0x7000_0103);
        let mut buf = [0xFFu8; 0x103];
        region.copy_out(0, &mut buf);
        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_aligned_and_unaligned_copies() {
        let mut region = ReservedRegion::anonymous(PhysAddr::from(0x7000_0000), 0x100);
        let data: Vec<u8> = (0..37u8).collect();

        // 字对齐
        region.copy_in(0x40, &data[..32]);
        // 源地址不对齐
        region.copy_in(0x80, &data[1..]);
        // 目标地址不对齐
        region.copy_in(0xC1, &data);

        let mut out = [0u8; 37];
        region.copy_out(0x40, &mut out[..32]);
        assert_eq!(&out[..32], &data[..32]);
        region.copy_out(0x80, &mut out[..36]);
        assert_eq!(&out[..36], &data[1..]);
        region.copy_out(0xC1, &mut out);
        assert_eq!(&out[..], &data[..]);

        let mut before = [0xAAu8; 1];
        region.copy_out(0xC0, &mut before);
        assert_eq!(before[0], 0);
    }

    #[test]
    fn test_map_missing_device() {
        let err = ReservedRegion::map("/dev/nnaccel-no-mem", PhysAddr::from(0x7000_0000), 0x1000)
            .unwrap_err();
        assert_eq!(err.as_errno(), -2);
    }
}
