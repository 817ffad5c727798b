//! AXI DMA 数据结构定义

use core::fmt;

use memory_addr::{PhysAddr, PhysAddrRange};

use super::error::{DmaError, DmaResult};
use super::regs::{MAX_TRANSFER_LEN, MM2S_BASE, S2MM_BASE};

/// DMA 通道方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Memory-mapped to stream (host → device)
    Mm2s,
    /// Stream to memory-mapped (device → host)
    S2mm,
}

impl ChannelKind {
    /// 通道寄存器基地址
    pub const fn base(self) -> usize {
        match self {
            Self::Mm2s => MM2S_BASE,
            Self::S2mm => S2MM_BASE,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Mm2s => "MM2S",
            Self::S2mm => "S2MM",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 驱动观测到的通道状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// 寄存器窗口未映射
    Unmapped,
    /// 已映射，尚未复位，寄存器内容未知
    Mapped,
    /// 已复位/停止
    Halted,
    /// 已写入地址
    Configured,
    /// 运行中
    Running,
    /// 已同步 (IOC 或 IDLE)
    Synced,
    /// 状态寄存器报告了错误位
    Error,
}

/// 单个通道的一次传输请求
///
/// 创建后不可修改。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferDescriptor {
    channel: ChannelKind,
    addr: PhysAddr,
    len: u32,
}

impl TransferDescriptor {
    /// 创建传输描述符
    ///
    /// 长度必须在 `1..=MAX_TRANSFER_LEN` 内，且 `[addr, addr + len)` 必须落在
    /// 32 位地址寄存器可表示的范围内。
    pub fn new(channel: ChannelKind, addr: PhysAddr, len: usize) -> DmaResult<Self> {
        if len == 0 || len > MAX_TRANSFER_LEN as usize {
            return Err(DmaError::InvalidLength(len));
        }
        let end = addr.as_usize() as u64 + len as u64;
        if end > 1u64 << 32 {
            return Err(DmaError::InvalidAddress(addr.as_usize() as u64));
        }
        Ok(Self {
            channel,
            addr,
            len: len as u32,
        })
    }

    /// MM2S 方向：从 `addr` 读出 `len` 字节送往设备
    pub fn outbound(addr: PhysAddr, len: usize) -> DmaResult<Self> {
        Self::new(ChannelKind::Mm2s, addr, len)
    }

    /// S2MM 方向：把设备输出写入 `addr`，最多 `len` 字节
    pub fn inbound(addr: PhysAddr, len: usize) -> DmaResult<Self> {
        Self::new(ChannelKind::S2mm, addr, len)
    }

    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    pub fn addr(&self) -> PhysAddr {
        self.addr
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    /// 地址寄存器取值
    pub(crate) fn addr_reg(&self) -> u32 {
        self.addr.as_usize() as u32
    }

    /// 覆盖的物理地址范围
    pub fn range(&self) -> PhysAddrRange {
        PhysAddrRange::from_start_size(self.addr, self.len as usize)
    }
}
