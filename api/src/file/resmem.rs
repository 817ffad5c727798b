//! 保留内存客户端
//!
//! 调用者只提供切片和字偏移，请求记录中的缓冲区地址由本模块根据切片构造，
//! 因此整个接口都是安全的。
//!
//! 有两种后端：
//!
//! - 进程内中介：[`ReservedMemDevice`] 自己映射 `/dev/mem`
//! - 字符设备：把 16 字节请求记录通过 `write`/`read` 交给内核驱动
//!   (默认 [`RESERVED_MEM_BRIDGE_DEVICE`](crate::config::RESERVED_MEM_BRIDGE_DEVICE))，
//!   由内核完成复制

use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::sync::Arc;

use bytemuck::Pod;
use linux_raw_sys::general::O_NDELAY;
use memory_addr::{PhysAddr, PhysAddrRange};
use syscalls::{Errno, Sysno, syscall};

use crate::config::PlatformConfig;
use crate::vfs::dev::mmio::MapError;
use crate::vfs::dev::resmem::{
    BridgeRequest, RECORD_SIZE, ReservedMemDevice, ResMemError, ResMemResult, span_fits,
};

#[derive(Clone)]
enum Backend {
    Mediator(Arc<ReservedMemDevice>),
    CharDevice(Arc<BridgeNode>),
}

/// 保留内存客户端
#[derive(Clone)]
pub struct ReservedMem {
    backend: Backend,
    range: PhysAddrRange,
}

/// 已打开的字符设备节点
struct BridgeNode {
    file: File,
    path: String,
}

impl BridgeNode {
    /// `O_RDWR | O_NDELAY` 打开
    fn open(path: &str) -> ResMemResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(O_NDELAY as i32)
            .open(path)
            .map_err(|e| MapError::from_io(path, e))?;
        debug!("Opened reserved memory bridge {}", path);
        Ok(Self {
            file,
            path: path.into(),
        })
    }

    /// 提交一条请求记录
    ///
    /// 驱动的返回值不是字节数 (`write` 返回 `length * 4`，`read` 返回 1)，
    /// 只看是否成功。
    ///
    /// # Safety
    ///
    /// `req.caller_addr()` 必须指向至少 `req.length()` 字节内存；对
    /// `Sysno::read` 还必须可写。
    unsafe fn submit(&self, op: Sysno, req: &BridgeRequest) -> ResMemResult<()> {
        let mut record = req.to_bytes();
        let fd = self.file.as_raw_fd();
        // SAFETY: `record` 在调用期间有效，缓冲区由调用者保证
        let ret = unsafe { syscall!(op, fd, record.as_mut_ptr(), RECORD_SIZE) };
        ret.map(|_| ()).map_err(|errno| bridge_error(&self.path, errno, req))
    }
}

/// 把驱动返回的 errno 还原为 [`ResMemError`]
fn bridge_error(path: &str, errno: Errno, req: &BridgeRequest) -> ResMemError {
    match errno {
        Errno::EBUSY => {
            warn!("Reserved memory bridge {} is busy", path);
            ResMemError::Busy
        }
        Errno::EFAULT => ResMemError::OutOfBounds {
            word_offset: req.word_offset(),
            length: req.length(),
        },
        Errno::EINVAL => ResMemError::InvalidRecord(RECORD_SIZE),
        _ => ResMemError::Io(MapError::new(path, errno)),
    }
}

fn request_len(word_offset: u32, bytes: usize) -> ResMemResult<u32> {
    u32::try_from(bytes).map_err(|_| ResMemError::OutOfBounds {
        word_offset,
        length: u32::MAX,
    })
}

impl ReservedMem {
    /// 按平台配置打开保留内存
    ///
    /// 配置了 `reserved_bridge` 时走字符设备，否则在进程内映射。
    pub fn open(config: &PlatformConfig) -> ResMemResult<Self> {
        match config.reserved_bridge {
            Some(path) => Self::open_device(path, config),
            None => Ok(Self::new(Arc::new(ReservedMemDevice::open(config)?))),
        }
    }

    /// 通过内核字符设备访问保留内存
    ///
    /// 区域的物理范围取自 `config`，越界检查由驱动完成。
    pub fn open_device(path: &str, config: &PlatformConfig) -> ResMemResult<Self> {
        let node = BridgeNode::open(path)?;
        Ok(Self {
            backend: Backend::CharDevice(Arc::new(node)),
            range: config.reserved_range(),
        })
    }

    pub fn new(device: Arc<ReservedMemDevice>) -> Self {
        Self {
            range: device.phys_range(),
            backend: Backend::Mediator(device),
        }
    }

    /// 进程内中介设备；字符设备后端返回 `None`
    pub fn device(&self) -> Option<&Arc<ReservedMemDevice>> {
        match &self.backend {
            Backend::Mediator(device) => Some(device),
            Backend::CharDevice(_) => None,
        }
    }

    /// 把 `src` 写到区域的 `word_offset` 处，返回写入的字节数
    pub fn transfer<T: Pod>(&self, src: &[T], word_offset: u32) -> ResMemResult<usize> {
        let bytes: &[u8] = bytemuck::cast_slice(src);
        let len = request_len(word_offset, bytes.len())?;
        let req = BridgeRequest::new(word_offset, len, bytes.as_ptr() as usize as u64);
        match &self.backend {
            // SAFETY: 记录中的地址和长度来自 `bytes`
            Backend::Mediator(device) => unsafe { device.write_request(&req) },
            Backend::CharDevice(node) => {
                // SAFETY: 同上
                unsafe { node.submit(Sysno::write, &req)? };
                Ok(bytes.len())
            }
        }
    }

    /// 从区域的 `word_offset` 处读满 `dst`，返回读出的字节数
    pub fn gather<T: Pod>(&self, dst: &mut [T], word_offset: u32) -> ResMemResult<usize> {
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(dst);
        let len = request_len(word_offset, bytes.len())?;
        let req = BridgeRequest::new(word_offset, len, bytes.as_mut_ptr() as usize as u64);
        match &self.backend {
            // SAFETY: 记录中的地址和长度来自独占借用的 `bytes`
            Backend::Mediator(device) => unsafe { device.read_request(&req) },
            Backend::CharDevice(node) => {
                // SAFETY: 同上
                unsafe { node.submit(Sysno::read, &req)? };
                Ok(bytes.len())
            }
        }
    }

    /// 字偏移对应的 DMA 物理地址
    ///
    /// 偏移必须落在区域内 (可以等于区域末尾)。
    pub fn phys_addr(&self, word_offset: u32) -> ResMemResult<PhysAddr> {
        let out_of_bounds = ResMemError::OutOfBounds {
            word_offset,
            length: 0,
        };
        if !span_fits(word_offset, 0, self.size()) {
            return Err(out_of_bounds);
        }
        (self.range.start.as_usize() as u64)
            .checked_add(word_offset as u64 * 4)
            .and_then(|addr| usize::try_from(addr).ok())
            .map(PhysAddr::from)
            .ok_or(out_of_bounds)
    }

    /// 区域的物理地址范围
    pub fn phys_range(&self) -> PhysAddrRange {
        self.range
    }

    /// 区域大小 (字节)
    pub fn size(&self) -> usize {
        self.range.size()
    }
}
