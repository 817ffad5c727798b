//! 推理加速器
//!
//! FPGA 上的分类 IP 从 MM2S 数据流读入一帧归一化的 `f32` 样本 (帧尾由 DMA
//! 在 MM2S 长度结束处打上 last 标记)，从 S2MM 数据流输出一个 `i32` 类别号。
//! 网络本身在硬件里，这里只负责搬运。

use core::fmt;
use core::time::Duration;

use axerrno::AxError;
use bytemuck::Pod;

use crate::config::PlatformConfig;
use crate::file::resmem::ReservedMem;
use crate::vfs::dev::axidma::{
    ChannelKind, DmaChannel, DmaError, Transfer, TransferDescriptor, TransferReport,
};
use crate::vfs::dev::mmio::{MmioMapping, RegisterIo};
use crate::vfs::dev::resmem::ResMemError;

/// 输入图像宽度
pub const FRAME_WIDTH: usize = 20;
/// 输入图像高度
pub const FRAME_HEIGHT: usize = 15;
/// RGB 通道数
pub const FRAME_CHANNELS: usize = 3;
/// 一帧的样本数
pub const FRAME_SAMPLES: usize = FRAME_WIDTH * FRAME_HEIGHT * FRAME_CHANNELS;

/// 加速器错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccelError {
    /// DMA 传输失败
    Dma(DmaError),
    /// 保留内存访问失败
    ResMem(ResMemError),
    /// 输入帧大小不符
    FrameSize { expected: usize, found: usize },
}

impl fmt::Display for AccelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dma(e) => write!(f, "{}", e),
            Self::ResMem(e) => write!(f, "{}", e),
            Self::FrameSize { expected, found } => {
                write!(f, "Frame has {} samples, expected {}", found, expected)
            }
        }
    }
}

impl From<DmaError> for AccelError {
    fn from(err: DmaError) -> Self {
        Self::Dma(err)
    }
}

impl From<ResMemError> for AccelError {
    fn from(err: ResMemError) -> Self {
        Self::ResMem(err)
    }
}

impl From<AccelError> for AxError {
    fn from(err: AccelError) -> Self {
        match err {
            AccelError::Dma(e) => e.into(),
            AccelError::ResMem(e) => e.into(),
            AccelError::FrameSize { .. } => AxError::InvalidInput,
        }
    }
}

pub type AccelResult<T> = Result<T, AccelError>;

/// 一帧推理输入
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceFrame {
    samples: Vec<f32>,
}

impl InferenceFrame {
    /// 由 20×15 的 RGB888 像素构造，每个分量归一化为 `byte / 255.0`
    pub fn from_rgb(pixels: &[u8]) -> AccelResult<Self> {
        if pixels.len() != FRAME_SAMPLES {
            return Err(AccelError::FrameSize {
                expected: FRAME_SAMPLES,
                found: pixels.len(),
            });
        }
        Ok(Self {
            samples: pixels.iter().map(|&b| b as f32 / 255.0).collect(),
        })
    }

    /// 任意长度的已归一化样本
    pub fn from_samples(samples: Vec<f32>) -> AccelResult<Self> {
        if samples.is_empty() {
            return Err(AccelError::FrameSize {
                expected: FRAME_SAMPLES,
                found: 0,
            });
        }
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// 推理加速器：两个 DMA 通道加一块保留内存
pub struct Accelerator<R: RegisterIo = MmioMapping> {
    mm2s: DmaChannel<R>,
    s2mm: DmaChannel<R>,
    mem: ReservedMem,
    timeout: Duration,
    input_word: u32,
    output_word: u32,
}

impl Accelerator<MmioMapping> {
    /// 映射 UIO 寄存器窗口和保留内存
    pub fn open(config: &PlatformConfig) -> AccelResult<Self> {
        let mm2s = DmaChannel::open(config.uio_index, config.uio_size, ChannelKind::Mm2s)?;
        let s2mm = DmaChannel::open(config.uio_index, config.uio_size, ChannelKind::S2mm)?;
        let mem = ReservedMem::open(config)?;
        Ok(Self::new(mm2s, s2mm, mem, config))
    }
}

impl<R: RegisterIo> Accelerator<R> {
    pub fn new(
        mm2s: DmaChannel<R>,
        s2mm: DmaChannel<R>,
        mem: ReservedMem,
        config: &PlatformConfig,
    ) -> Self {
        Self {
            mm2s,
            s2mm,
            mem,
            timeout: config.poll_timeout,
            input_word: (config.input_offset / 4) as u32,
            output_word: (config.output_offset / 4) as u32,
        }
    }

    pub fn memory(&self) -> &ReservedMem {
        &self.mem
    }

    /// 写入 `input`，完成一次 MM2S + S2MM 传输，再把结果读入 `output`
    pub fn exchange<T: Pod, U: Pod>(
        &mut self,
        input: &[T],
        output: &mut [U],
    ) -> AccelResult<TransferReport> {
        let in_len = self.mem.transfer(input, self.input_word)?;
        let out_len = core::mem::size_of_val(output);

        let outbound = TransferDescriptor::outbound(self.mem.phys_addr(self.input_word)?, in_len)?;
        let inbound = TransferDescriptor::inbound(self.mem.phys_addr(self.output_word)?, out_len)?;
        let report = Transfer::new(&mut self.mm2s, &mut self.s2mm, outbound, inbound)?
            .with_timeout(self.timeout)
            .within(self.mem.phys_range())
            .run()?;

        self.mem.gather(output, self.output_word)?;
        Ok(report)
    }

    /// 对一帧做一次推理，返回类别号
    pub fn classify(&mut self, frame: &InferenceFrame) -> AccelResult<i32> {
        let mut label = [0i32; 1];
        let report = self.exchange(frame.samples(), &mut label)?;
        debug!(
            "Classified {} samples in {:?}: {}",
            frame.len(),
            report.elapsed,
            label[0]
        );
        Ok(label[0])
    }

    pub fn close(self) {
        self.mm2s.close();
        self.s2mm.close();
    }
}
