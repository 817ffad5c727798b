//! 保留内存中介设备实现

use core::slice;

use memory_addr::{PhysAddr, PhysAddrRange};
use spin::{Mutex, MutexGuard};

use super::error::{ResMemError, ResMemResult};
use super::region::ReservedRegion;
use super::types::{BridgeRequest, span_fits};
use crate::config::PlatformConfig;

/// 保留内存中介设备
///
/// 区域只能在持有访问令牌时访问。令牌只尝试获取一次，被占用时立即返回
/// [`ResMemError::Busy`]，不排队也不阻塞。
pub struct ReservedMemDevice {
    base: PhysAddr,
    size: usize,
    region: Mutex<ReservedRegion>,
}

/// 持有中的访问令牌
///
/// Drop 时释放令牌。
pub struct ReservedMemGuard<'a> {
    region: MutexGuard<'a, ReservedRegion>,
}

impl ReservedMemDevice {
    /// 按平台配置映射保留内存
    pub fn open(config: &PlatformConfig) -> ResMemResult<Self> {
        let region = ReservedRegion::map(
            config.reserved_device,
            config.reserved_base,
            config.reserved_size,
        )?;
        Ok(Self::with_region(region))
    }

    pub fn with_region(region: ReservedRegion) -> Self {
        Self {
            base: region.phys_base(),
            size: region.size(),
            region: Mutex::new(region),
        }
    }

    /// 区域物理基地址
    pub fn phys_base(&self) -> PhysAddr {
        self.base
    }

    /// 区域大小 (字节)
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn phys_range(&self) -> PhysAddrRange {
        PhysAddrRange::from_start_size(self.base, self.size)
    }

    /// 尝试获取访问令牌
    pub fn lock(&self) -> ResMemResult<ReservedMemGuard<'_>> {
        match self.region.try_lock() {
            Some(region) => Ok(ReservedMemGuard { region }),
            None => {
                warn!("Reserved memory is busy");
                Err(ResMemError::Busy)
            }
        }
    }

    /// 把调用者缓冲区写入区域
    ///
    /// 返回写入的字节数。
    ///
    /// # Safety
    ///
    /// `req.caller_addr()` 必须指向至少 `req.length()` 字节可读内存。
    pub unsafe fn write_request(&self, req: &BridgeRequest) -> ResMemResult<usize> {
        let mut guard = self.lock()?;
        guard.check_request(req)?;
        let len = req.length() as usize;
        if len == 0 {
            return Ok(0);
        }
        let src = caller_ptr(req)?;
        // SAFETY: 由调用者保证
        let src = unsafe { slice::from_raw_parts(src as *const u8, len) };
        guard.region.copy_in(req.byte_offset() as usize, src);
        debug!(
            "Reserved memory write: {} bytes at word offset {:#x}",
            len,
            req.word_offset()
        );
        Ok(len)
    }

    /// 把区域内容读到调用者缓冲区
    ///
    /// 返回读出的字节数。
    ///
    /// # Safety
    ///
    /// `req.caller_addr()` 必须指向至少 `req.length()` 字节可写内存，且不与
    /// 其他引用重叠。
    pub unsafe fn read_request(&self, req: &BridgeRequest) -> ResMemResult<usize> {
        let mut guard = self.lock()?;
        guard.check_request(req)?;
        let len = req.length() as usize;
        if len == 0 {
            return Ok(0);
        }
        let dst = caller_ptr(req)?;
        // SAFETY: 由调用者保证
        let dst = unsafe { slice::from_raw_parts_mut(dst, len) };
        guard.region.copy_out(req.byte_offset() as usize, dst);
        debug!(
            "Reserved memory read: {} bytes at word offset {:#x}",
            len,
            req.word_offset()
        );
        Ok(len)
    }

    /// 字符设备 `write` 入口：`record` 为 16 字节请求记录
    ///
    /// # Safety
    ///
    /// 同 [`write_request`](Self::write_request)。
    pub unsafe fn write_at(&self, record: &[u8]) -> ResMemResult<usize> {
        let req = BridgeRequest::parse(record)?;
        // SAFETY: 由调用者保证
        unsafe { self.write_request(&req) }
    }

    /// 字符设备 `read` 入口：`record` 为 16 字节请求记录
    ///
    /// # Safety
    ///
    /// 同 [`read_request`](Self::read_request)。
    pub unsafe fn read_at(&self, record: &[u8]) -> ResMemResult<usize> {
        let req = BridgeRequest::parse(record)?;
        // SAFETY: 由调用者保证
        unsafe { self.read_request(&req) }
    }
}

impl ReservedMemGuard<'_> {
    fn check(&self, word_offset: u32, len: usize) -> ResMemResult<()> {
        if span_fits(word_offset, len as u64, self.region.size()) {
            return Ok(());
        }
        self.reject(word_offset, u32::try_from(len).unwrap_or(u32::MAX))
    }

    fn check_request(&self, req: &BridgeRequest) -> ResMemResult<()> {
        if req.fits(self.region.size()) {
            return Ok(());
        }
        self.reject(req.word_offset(), req.length())
    }

    fn reject(&self, word_offset: u32, length: u32) -> ResMemResult<()> {
        error!(
            "Reserved memory request out of bounds: word offset {:#x}, {} bytes, region {:#x}",
            word_offset,
            length,
            self.region.size()
        );
        Err(ResMemError::OutOfBounds {
            word_offset,
            length,
        })
    }

    /// 在已持有令牌时写入
    pub fn write(&mut self, word_offset: u32, src: &[u8]) -> ResMemResult<usize> {
        self.check(word_offset, src.len())?;
        self.region.copy_in(word_offset as usize * 4, src);
        Ok(src.len())
    }

    /// 在已持有令牌时读取
    pub fn read(&mut self, word_offset: u32, dst: &mut [u8]) -> ResMemResult<usize> {
        self.check(word_offset, dst.len())?;
        self.region.copy_out(word_offset as usize * 4, dst);
        Ok(dst.len())
    }
}

fn caller_ptr(req: &BridgeRequest) -> ResMemResult<*mut u8> {
    let addr = req.caller_addr();
    match usize::try_from(addr) {
        Ok(ptr) if ptr != 0 => Ok(ptr as *mut u8),
        _ => Err(ResMemError::BadCallerAddr(addr)),
    }
}
