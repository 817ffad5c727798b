//! 单通道 AXI DMA 驱动
//!
//! 每个实例独占一个通道 (MM2S 或 S2MM) 的寄存器组。寄存器写入不做任何
//! 校验，校验由 [`Transfer`](super::Transfer) 和保留内存设备负责。
//! 硬件错误不会以 `Err` 返回，只能通过 [`DmaChannel::status`] 观察到。

use syscalls::Errno;

use super::error::DmaResult;
use super::regs::{
    ADDR, ControlOp, DMACR, DMASR, LENGTH, REG_SPAN, StatusFlags, decode_status, encode_control,
};
use super::types::{ChannelKind, ChannelState};
use crate::vfs::dev::mmio::{MapError, MmioMapping, RegisterIo, io_barrier};

/// UIO 设备节点路径
pub fn uio_path(index: u32) -> String {
    format!("/dev/uio{}", index)
}

/// AXI DMA 通道驱动
pub struct DmaChannel<R = MmioMapping> {
    regs: R,
    kind: ChannelKind,
    state: ChannelState,
}

impl DmaChannel<MmioMapping> {
    /// 映射 `/dev/uio<index>` 的寄存器窗口并创建通道驱动
    ///
    /// 映射后通道处于 `Mapped` 状态，必须先 [`reset`](Self::reset)。
    pub fn open(uio_index: u32, window_size: usize, kind: ChannelKind) -> DmaResult<Self> {
        let path = uio_path(uio_index);
        if window_size < REG_SPAN {
            return Err(MapError::new(&path, Errno::EINVAL).into());
        }
        let regs = MmioMapping::open(&path, 0, window_size)?;
        info!("{} channel opened on {}", kind, path);
        Ok(Self::new(regs, kind))
    }
}

impl<R: RegisterIo> DmaChannel<R> {
    /// 在已映射的寄存器窗口上创建通道驱动
    pub fn new(regs: R, kind: ChannelKind) -> Self {
        Self {
            regs,
            kind,
            state: ChannelState::Mapped,
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// 最近一次观测到的状态
    pub fn state(&self) -> ChannelState {
        self.state
    }

    #[inline]
    fn read(&self, reg: usize) -> u32 {
        self.regs.read(self.kind.base() + reg)
    }

    #[inline]
    fn write(&self, reg: usize, value: u32) {
        self.regs.write(self.kind.base() + reg, value)
    }

    fn control(&mut self, op: ControlOp) {
        trace!("{} DMACR <- {:?}", self.kind, op);
        self.write(DMACR, encode_control(op));
    }

    /// 复位通道
    ///
    /// 不阻塞；复位位由硬件自清零，调用者需重新读取状态确认。
    pub fn reset(&mut self) {
        self.control(ControlOp::Reset);
        self.state = ChannelState::Halted;
        debug!("{} reset", self.kind);
    }

    /// 停止通道，可重复调用
    ///
    /// 未复位过的通道 (`Mapped`) 寄存器内容未知，停止后仍保持 `Mapped`。
    pub fn halt(&mut self) {
        self.control(ControlOp::Halt);
        if self.state != ChannelState::Mapped {
            self.state = ChannelState::Halted;
        }
    }

    /// 使能全部中断
    ///
    /// 中断仅作为可轮询的完成状态位使用，本层不等待任何中断。
    pub fn enable_interrupts(&mut self) {
        self.control(ControlOp::EnableAllIrq);
    }

    /// 写入源地址 (MM2S) 或目的地址 (S2MM)
    pub fn set_address(&mut self, addr: u32) {
        debug!("{} address <- {:#010x}", self.kind, addr);
        self.write(ADDR, addr);
        if self.state == ChannelState::Halted {
            self.state = ChannelState::Configured;
        }
    }

    /// 写入传输长度，运行状态下会立即启动搬运
    pub fn set_length(&mut self, len: u32) {
        io_barrier();
        debug!("{} length <- {}", self.kind, len);
        self.write(LENGTH, len);
    }

    /// 运行通道，只有写过地址的通道 (`Configured`) 进入 `Running`
    pub fn start(&mut self) {
        self.control(ControlOp::Run);
        if self.state == ChannelState::Configured {
            self.state = ChannelState::Running;
        }
    }

    /// 原始状态字
    pub fn status_word(&self) -> u32 {
        self.read(DMASR)
    }

    /// 读取状态寄存器 (每次都重新读取，不缓存)
    pub fn status(&mut self) -> StatusFlags {
        let flags = decode_status(self.status_word());
        if flags.has_error() {
            if self.state != ChannelState::Error {
                warn!("{} reported error: {}", self.kind, flags);
            }
            self.state = ChannelState::Error;
        } else if flags.is_synced() && self.state == ChannelState::Running {
            self.state = ChannelState::Synced;
        }
        flags
    }

    /// IOC 或 IDLE 任一置位即视为同步
    pub fn is_synced(&mut self) -> bool {
        self.status().is_synced()
    }

    /// 关闭通道并解除寄存器映射，任何状态下都可调用
    pub fn close(self) {
        debug!("{} closed in state {:?}", self.kind, self.state);
    }
}
