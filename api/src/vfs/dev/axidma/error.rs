//! AXI DMA 错误类型定义

use core::fmt;

use axerrno::AxError;

use super::regs::StatusFlags;
use super::types::ChannelKind;
use crate::vfs::dev::mmio::MapError;

/// AXI DMA 操作错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DmaError {
    /// 寄存器窗口映射失败
    Map(MapError),
    /// 传输期间状态寄存器报告错误位
    Transfer {
        channel: ChannelKind,
        flags: StatusFlags,
    },
    /// 轮询窗口内未观察到同步
    Timeout {
        channel: ChannelKind,
        flags: StatusFlags,
    },
    /// 传输长度为 0 或超出长度寄存器宽度
    InvalidLength(usize),
    /// 地址超出 32 位地址寄存器
    InvalidAddress(u64),
    /// 描述符不在保留内存范围内
    AddressOutOfRegion {
        channel: ChannelKind,
        addr: u64,
        len: u32,
    },
    /// 描述符方向与通道不一致
    ChannelMismatch {
        expected: ChannelKind,
        found: ChannelKind,
    },
}

impl DmaError {
    /// 获取错误码 (兼容 Linux errno 风格)
    pub fn as_errno(&self) -> i32 {
        match self {
            DmaError::Map(e) => e.as_errno(),
            DmaError::Transfer { .. } => -5,             // EIO
            DmaError::Timeout { .. } => -110,            // ETIMEDOUT
            DmaError::InvalidLength(_) => -22,           // EINVAL
            DmaError::InvalidAddress(_) => -22,
            DmaError::AddressOutOfRegion { .. } => -14,  // EFAULT
            DmaError::ChannelMismatch { .. } => -22,
        }
    }

    /// 重试前是否必须重新走一遍 reset → start
    pub fn needs_reset(&self) -> bool {
        matches!(self, DmaError::Transfer { .. } | DmaError::Timeout { .. })
    }
}

impl fmt::Display for DmaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Map(e) => write!(f, "{}", e),
            Self::Transfer { channel, flags } => {
                write!(f, "{} transfer error: {}", channel, flags)
            }
            Self::Timeout { channel, flags } => {
                write!(f, "{} not synced before timeout (status: {})", channel, flags)
            }
            Self::InvalidLength(len) => write!(f, "Invalid transfer length: {}", len),
            Self::InvalidAddress(addr) => write!(f, "Invalid DMA address: {:#x}", addr),
            Self::AddressOutOfRegion { channel, addr, len } => write!(
                f,
                "{} buffer [{:#x}, +{:#x}) is outside the reserved region",
                channel, addr, len
            ),
            Self::ChannelMismatch { expected, found } => {
                write!(f, "Descriptor for {} submitted to {}", found, expected)
            }
        }
    }
}

impl From<MapError> for DmaError {
    fn from(err: MapError) -> Self {
        Self::Map(err)
    }
}

impl From<DmaError> for AxError {
    fn from(err: DmaError) -> Self {
        match err {
            DmaError::Map(_) => AxError::NoMemory,
            DmaError::Transfer { .. } => AxError::Io,
            DmaError::Timeout { .. } => AxError::TimedOut,
            DmaError::InvalidLength(_)
            | DmaError::InvalidAddress(_)
            | DmaError::ChannelMismatch { .. } => AxError::InvalidInput,
            DmaError::AddressOutOfRegion { .. } => AxError::BadAddress,
        }
    }
}

pub type DmaResult<T> = Result<T, DmaError>;
