//! 保留内存设备错误类型定义

use core::fmt;

use axerrno::AxError;

use crate::vfs::dev::mmio::MapError;

/// 保留内存设备错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResMemError {
    /// 保留区域映射失败
    Map(MapError),
    /// 访问令牌被占用，稍后重试
    Busy,
    /// 请求超出保留区域
    OutOfBounds { word_offset: u32, length: u32 },
    /// 请求记录不足 16 字节
    InvalidRecord(usize),
    /// 调用者缓冲区地址无效
    BadCallerAddr(u64),
    /// 字符设备返回了其他错误
    Io(MapError),
}

impl ResMemError {
    /// 获取错误码 (兼容 Linux errno 风格)
    pub fn as_errno(&self) -> i32 {
        match self {
            ResMemError::Map(e) => e.as_errno(),
            ResMemError::Busy => -16,                   // EBUSY
            ResMemError::OutOfBounds { .. } => -14,     // EFAULT
            ResMemError::InvalidRecord(_) => -22,       // EINVAL
            ResMemError::BadCallerAddr(_) => -14,
            ResMemError::Io(e) => e.as_errno(),
        }
    }
}

impl fmt::Display for ResMemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Map(e) => write!(f, "{}", e),
            Self::Busy => write!(f, "Reserved memory is busy"),
            Self::OutOfBounds {
                word_offset,
                length,
            } => write!(
                f,
                "Request of {} bytes at word offset {:#x} exceeds the reserved region",
                length, word_offset
            ),
            Self::InvalidRecord(len) => write!(f, "Invalid request record of {} bytes", len),
            Self::BadCallerAddr(addr) => write!(f, "Invalid caller buffer address {:#x}", addr),
            Self::Io(e) => write!(f, "{} request failed: {}", e.path, e.errno),
        }
    }
}

impl From<MapError> for ResMemError {
    fn from(err: MapError) -> Self {
        Self::Map(err)
    }
}

impl From<ResMemError> for AxError {
    fn from(err: ResMemError) -> Self {
        match err {
            ResMemError::Map(_) => AxError::NoMemory,
            ResMemError::Busy => AxError::ResourceBusy,
            ResMemError::OutOfBounds { .. } | ResMemError::BadCallerAddr(_) => AxError::BadAddress,
            ResMemError::InvalidRecord(_) => AxError::InvalidInput,
            ResMemError::Io(_) => AxError::Io,
        }
    }
}

pub type ResMemResult<T> = Result<T, ResMemError>;
