//! 双通道传输编排
//!
//! 一次传输固定使用一个 MM2S 描述符和一个 S2MM 描述符，按
//! reset → halt → 使能中断 → 地址 → run → 长度 → 轮询 的顺序推进。
//! 每一步消耗上一步的类型，长度寄存器只能在 [`Started`] 上写入。

use std::time::{Duration, Instant};

use memory_addr::PhysAddrRange;

use super::channel::DmaChannel;
use super::error::{DmaError, DmaResult};
use super::types::{ChannelKind, TransferDescriptor};
use crate::config::DEFAULT_TIMEOUT_MS;
use crate::vfs::dev::mmio::RegisterIo;

/// 单个通道的轮询结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPoll {
    /// 读取状态寄存器的次数
    pub polls: u32,
    /// 从开始轮询到同步的耗时
    pub elapsed: Duration,
}

/// 一次成功传输的统计
#[derive(Debug, Clone, Copy)]
pub struct TransferReport {
    pub outbound_len: u32,
    pub inbound_len: u32,
    pub mm2s: ChannelPoll,
    pub s2mm: ChannelPoll,
    /// 从 prepare 到两个通道均同步的总耗时
    pub elapsed: Duration,
}

/// 尚未写入任何寄存器的传输
pub struct Transfer<'a, R: RegisterIo> {
    mm2s: &'a mut DmaChannel<R>,
    s2mm: &'a mut DmaChannel<R>,
    outbound: TransferDescriptor,
    inbound: TransferDescriptor,
    timeout: Duration,
    region: Option<PhysAddrRange>,
}

fn check_kind(expected: ChannelKind, found: ChannelKind) -> DmaResult<()> {
    if expected != found {
        return Err(DmaError::ChannelMismatch { expected, found });
    }
    Ok(())
}

impl<'a, R: RegisterIo> Transfer<'a, R> {
    /// 组合两个通道驱动和两个描述符
    ///
    /// 通道与描述符方向不一致时返回 [`DmaError::ChannelMismatch`]。
    pub fn new(
        mm2s: &'a mut DmaChannel<R>,
        s2mm: &'a mut DmaChannel<R>,
        outbound: TransferDescriptor,
        inbound: TransferDescriptor,
    ) -> DmaResult<Self> {
        check_kind(ChannelKind::Mm2s, mm2s.kind())?;
        check_kind(ChannelKind::S2mm, s2mm.kind())?;
        check_kind(ChannelKind::Mm2s, outbound.channel())?;
        check_kind(ChannelKind::S2mm, inbound.channel())?;
        Ok(Self {
            mm2s,
            s2mm,
            outbound,
            inbound,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            region: None,
        })
    }

    /// 两个通道共用的轮询时限
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 要求两个描述符都落在给定物理区间内
    pub fn within(mut self, region: PhysAddrRange) -> Self {
        self.region = Some(region);
        self
    }

    fn check_region(&self) -> DmaResult<()> {
        let Some(region) = self.region else {
            return Ok(());
        };
        for desc in [&self.outbound, &self.inbound] {
            if !region.contains_range(desc.range()) {
                return Err(DmaError::AddressOutOfRegion {
                    channel: desc.channel(),
                    addr: desc.addr().as_usize() as u64,
                    len: desc.len(),
                });
            }
        }
        Ok(())
    }

    /// 复位、停止、使能中断并写入地址
    pub fn prepare(self) -> DmaResult<Prepared<'a, R>> {
        self.check_region()?;
        let started_at = Instant::now();
        info!(
            "DMA transfer: MM2S {} bytes @ {:#x}, S2MM {} bytes @ {:#x}",
            self.outbound.len(),
            self.outbound.addr().as_usize(),
            self.inbound.len(),
            self.inbound.addr().as_usize()
        );

        self.mm2s.reset();
        self.s2mm.reset();
        self.mm2s.halt();
        self.s2mm.halt();
        self.mm2s.enable_interrupts();
        self.s2mm.enable_interrupts();
        self.mm2s.set_address(self.outbound.addr_reg());
        self.s2mm.set_address(self.inbound.addr_reg());

        Ok(Prepared {
            inner: self,
            started_at,
        })
    }

    /// 完整执行一次传输
    pub fn run(self) -> DmaResult<TransferReport> {
        self.prepare()?.start().arm().wait()
    }
}

/// 地址已写入，通道仍处于停止状态
#[must_use]
pub struct Prepared<'a, R: RegisterIo> {
    inner: Transfer<'a, R>,
    started_at: Instant,
}

impl<'a, R: RegisterIo> Prepared<'a, R> {
    pub fn start(self) -> Started<'a, R> {
        self.inner.mm2s.start();
        self.inner.s2mm.start();
        Started(self)
    }
}

/// 两个通道均已运行，等待写入长度
#[must_use]
pub struct Started<'a, R: RegisterIo>(Prepared<'a, R>);

impl<'a, R: RegisterIo> Started<'a, R> {
    /// 写入长度寄存器，搬运随即开始
    pub fn arm(self) -> Armed<'a, R> {
        let Prepared { inner, started_at } = self.0;
        inner.mm2s.set_length(inner.outbound.len());
        inner.s2mm.set_length(inner.inbound.len());
        Armed { inner, started_at }
    }
}

/// 搬运已开始，只剩轮询
#[must_use]
pub struct Armed<'a, R: RegisterIo> {
    inner: Transfer<'a, R>,
    started_at: Instant,
}

impl<R: RegisterIo> Armed<'_, R> {
    /// 先轮询 MM2S 再轮询 S2MM，两者共用一个截止时间
    ///
    /// 任一次读取出现错误位立即失败，即使同一次读取也显示了同步。
    pub fn wait(self) -> DmaResult<TransferReport> {
        let Self { inner, started_at } = self;
        let deadline = Instant::now() + inner.timeout;
        let result = poll_until_synced(inner.mm2s, deadline).and_then(|mm2s| {
            poll_until_synced(inner.s2mm, deadline).map(|s2mm| (mm2s, s2mm))
        });
        match result {
            Ok((mm2s, s2mm)) => {
                let report = TransferReport {
                    outbound_len: inner.outbound.len(),
                    inbound_len: inner.inbound.len(),
                    mm2s,
                    s2mm,
                    elapsed: started_at.elapsed(),
                };
                info!(
                    "DMA transfer done in {:?} (MM2S {} polls, S2MM {} polls)",
                    report.elapsed, mm2s.polls, s2mm.polls
                );
                Ok(report)
            }
            Err(e) => {
                error!("DMA transfer failed: {}", e);
                Err(e)
            }
        }
    }
}

fn poll_until_synced<R: RegisterIo>(
    ch: &mut DmaChannel<R>,
    deadline: Instant,
) -> DmaResult<ChannelPoll> {
    let begin = Instant::now();
    let mut polls = 0u32;
    loop {
        let flags = ch.status();
        polls = polls.saturating_add(1);
        if flags.has_error() {
            return Err(DmaError::Transfer {
                channel: ch.kind(),
                flags,
            });
        }
        if flags.is_synced() {
            return Ok(ChannelPoll {
                polls,
                elapsed: begin.elapsed(),
            });
        }
        if Instant::now() >= deadline {
            return Err(DmaError::Timeout {
                channel: ch.kind(),
                flags,
            });
        }
        core::hint::spin_loop();
    }
}
