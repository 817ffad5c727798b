//! 测试用的 AXI DMA 寄存器模型
//!
//! 同时模拟 MM2S 与 S2MM 两组寄存器。长度寄存器在运行状态下被写入后，
//! 经过若干次状态读取才置位 IDLE | IOC (或注入的错误位)。

use spin::Mutex;

use super::regs::{ADDR, CTRL_RESET, CTRL_RUN, DMACR, DMASR, LENGTH, S2MM_BASE, StatusFlags};
use super::types::ChannelKind;
use crate::vfs::dev::mmio::RegisterIo;

type CompletionHook = Box<dyn Fn(ChannelKind, u32, u32) + Send + Sync>;

#[derive(Debug, Default, Clone, Copy)]
struct SimChannel {
    ctrl: u32,
    status: u32,
    addr: u32,
    length: u32,
    /// 距离完成还需的状态读取次数
    pending: Option<u32>,
    inject: u32,
    stalled: bool,
}

struct SimState {
    channels: [SimChannel; 2],
    latency: u32,
    writes: Vec<(usize, u32)>,
}

pub(crate) struct SimAxiDma {
    state: Mutex<SimState>,
    hook: Mutex<Option<CompletionHook>>,
}

fn split(offset: usize) -> (ChannelKind, usize) {
    if offset >= S2MM_BASE {
        (ChannelKind::S2mm, offset - S2MM_BASE)
    } else {
        (ChannelKind::Mm2s, offset)
    }
}

fn index(kind: ChannelKind) -> usize {
    match kind {
        ChannelKind::Mm2s => 0,
        ChannelKind::S2mm => 1,
    }
}

impl SimAxiDma {
    pub fn new() -> Self {
        let halted = SimChannel {
            status: StatusFlags::HALTED.bits(),
            ..Default::default()
        };
        Self {
            state: Mutex::new(SimState {
                channels: [halted; 2],
                latency: 2,
                writes: Vec::new(),
            }),
            hook: Mutex::new(None),
        }
    }

    /// 设置完成前需要的状态读取次数
    pub fn set_latency(&self, polls: u32) {
        self.state.lock().latency = polls;
    }

    /// 下一次传输以指定错误位结束
    pub fn inject_error(&self, kind: ChannelKind, flags: StatusFlags) {
        self.state.lock().channels[index(kind)].inject = flags.bits();
    }

    /// 通道永远不会完成
    pub fn stall(&self, kind: ChannelKind) {
        self.state.lock().channels[index(kind)].stalled = true;
    }

    /// 通道完成时回调 (kind, addr, len)
    pub fn set_completion_hook(
        &self,
        hook: impl Fn(ChannelKind, u32, u32) + Send + Sync + 'static,
    ) {
        *self.hook.lock() = Some(Box::new(hook));
    }

    /// 到目前为止的全部寄存器写入 (绝对偏移, 值)
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.state.lock().writes.clone()
    }
}

impl RegisterIo for SimAxiDma {
    fn read(&self, offset: usize) -> u32 {
        let (kind, reg) = split(offset);
        let mut completed = None;
        let value = {
            let mut state = self.state.lock();
            let ch = &mut state.channels[index(kind)];
            match reg {
                DMACR => ch.ctrl,
                ADDR => ch.addr,
                LENGTH => ch.length,
                DMASR => {
                    match ch.pending {
                        _ if ch.stalled => {}
                        Some(0) => {
                            ch.pending = None;
                            if ch.inject != 0 {
                                ch.status |= ch.inject | StatusFlags::ERR_IRQ.bits();
                                ch.inject = 0;
                            } else {
                                ch.status |= (StatusFlags::IDLE | StatusFlags::IOC_IRQ).bits();
                                completed = Some((kind, ch.addr, ch.length));
                            }
                        }
                        Some(n) => ch.pending = Some(n - 1),
                        None => {}
                    }
                    ch.status
                }
                _ => 0,
            }
        };
        if let Some((kind, addr, len)) = completed {
            if let Some(hook) = self.hook.lock().as_ref() {
                hook(kind, addr, len);
            }
        }
        value
    }

    fn write(&self, offset: usize, value: u32) {
        let (kind, reg) = split(offset);
        let mut state = self.state.lock();
        state.writes.push((offset, value));
        let latency = state.latency;
        let ch = &mut state.channels[index(kind)];
        match reg {
            DMACR => {
                if value & CTRL_RESET != 0 {
                    ch.ctrl = 0;
                    ch.status = StatusFlags::HALTED.bits();
                    ch.pending = None;
                } else {
                    ch.ctrl = value;
                    if value & CTRL_RUN != 0 {
                        ch.status &= !(StatusFlags::HALTED | StatusFlags::IDLE).bits();
                    } else {
                        ch.status |= StatusFlags::HALTED.bits();
                    }
                }
            }
            ADDR => ch.addr = value,
            LENGTH => {
                ch.length = value;
                if ch.ctrl & CTRL_RUN != 0 {
                    ch.status &= !(StatusFlags::IDLE | StatusFlags::IOC_IRQ).bits();
                    ch.pending = Some(latency);
                }
            }
            _ => {}
        }
    }
}
