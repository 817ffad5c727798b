//! AXI DMA 寄存器定义与位域编解码
//!
//! 纯函数，不做任何 I/O。

use core::fmt;

use bitflags::bitflags;

// ============ 通道基地址 ============

/// MM2S (host → device) 通道寄存器基地址
pub const MM2S_BASE: usize = 0x00;
/// S2MM (device → host) 通道寄存器基地址
pub const S2MM_BASE: usize = 0x30;

// ============ 通道内寄存器偏移 ============

/// 控制寄存器 (DMACR)
pub const DMACR: usize = 0x00;
/// 状态寄存器 (DMASR)
pub const DMASR: usize = 0x04;
/// 源/目的地址寄存器 (MM2S_SA / S2MM_DA)
pub const ADDR: usize = 0x18;
/// 传输长度寄存器 (MM2S_LENGTH / S2MM_LENGTH)，写入即启动搬运
pub const LENGTH: usize = 0x28;

/// MM2S 源地址寄存器
pub const MM2S_SA: usize = MM2S_BASE + ADDR;
/// MM2S 传输长度寄存器
pub const MM2S_LENGTH: usize = MM2S_BASE + LENGTH;
/// S2MM 目的地址寄存器
pub const S2MM_DA: usize = S2MM_BASE + ADDR;
/// S2MM 缓冲区长度寄存器
pub const S2MM_LENGTH: usize = S2MM_BASE + LENGTH;

/// 两个通道寄存器覆盖的总字节数
pub const REG_SPAN: usize = S2MM_LENGTH + 4;

/// 长度寄存器可表示的最大传输字节数
pub const MAX_TRANSFER_LEN: u32 = (1 << 23) - 1;

// ============ 控制寄存器取值 ============

/// 停止
pub const CTRL_HALT: u32 = 0x0000_0000;
/// 运行
pub const CTRL_RUN: u32 = 0x0000_0001;
/// 复位 (硬件自清零)
pub const CTRL_RESET: u32 = 0x0000_0004;
/// 使能 IOC / Delay / Error 中断
pub const CTRL_ENABLE_ALL_IRQ: u32 = 0x0000_7000;

/// 控制操作
///
/// 每次写入完整替换控制寄存器，不做读-改-写。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    Halt,
    Run,
    Reset,
    EnableAllIrq,
}

/// 控制操作对应的寄存器取值
pub const fn encode_control(op: ControlOp) -> u32 {
    match op {
        ControlOp::Halt => CTRL_HALT,
        ControlOp::Run => CTRL_RUN,
        ControlOp::Reset => CTRL_RESET,
        ControlOp::EnableAllIrq => CTRL_ENABLE_ALL_IRQ,
    }
}

bitflags! {
    /// DMASR 状态位集合
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u32 {
        const HALTED = 0x0000_0001;
        const IDLE = 0x0000_0002;
        const SG_INCLUDED = 0x0000_0008;
        const DMA_INTERNAL_ERR = 0x0000_0010;
        const DMA_SLAVE_ERR = 0x0000_0020;
        const DMA_DECODE_ERR = 0x0000_0040;
        const SG_INTERNAL_ERR = 0x0000_0100;
        const SG_SLAVE_ERR = 0x0000_0200;
        const SG_DECODE_ERR = 0x0000_0400;
        const IOC_IRQ = 0x0000_1000;
        const DELAY_IRQ = 0x0000_2000;
        const ERR_IRQ = 0x0000_4000;
    }
}

/// (掩码, 诊断名) 表，顺序即显示顺序
pub const STATUS_FLAG_TABLE: [(StatusFlags, &str); 12] = [
    (StatusFlags::HALTED, "DMA_HALTED"),
    (StatusFlags::IDLE, "DMA_IDLE"),
    (StatusFlags::SG_INCLUDED, "DMA_SG_INCLDED"),
    (StatusFlags::DMA_INTERNAL_ERR, "DMA_INTERNAL_ERR"),
    (StatusFlags::DMA_SLAVE_ERR, "DMA_SLAVE_ERR"),
    (StatusFlags::DMA_DECODE_ERR, "DMA_DECODE_ERR"),
    (StatusFlags::SG_INTERNAL_ERR, "DMA_SG_INTERNAL_ERR"),
    (StatusFlags::SG_SLAVE_ERR, "DMA_SG_SLAVE_ERR"),
    (StatusFlags::SG_DECODE_ERR, "DMA_SG_DECODE_ERR"),
    (StatusFlags::IOC_IRQ, "DMA_IOC_IRQ"),
    (StatusFlags::DELAY_IRQ, "DMA_DELAY_IRQ"),
    (StatusFlags::ERR_IRQ, "DMA_ERR_IRQ"),
];

/// 解码状态字，未定义的位被忽略
pub fn decode_status(word: u32) -> StatusFlags {
    STATUS_FLAG_TABLE
        .iter()
        .filter(|(flag, _)| word & flag.bits() != 0)
        .fold(StatusFlags::empty(), |acc, (flag, _)| acc | *flag)
}

impl StatusFlags {
    /// 对当前传输致命的错误位
    pub const FATAL: Self = Self::from_bits_retain(
        Self::DMA_INTERNAL_ERR.bits()
            | Self::DMA_SLAVE_ERR.bits()
            | Self::DMA_DECODE_ERR.bits()
            | Self::SG_INTERNAL_ERR.bits()
            | Self::SG_SLAVE_ERR.bits()
            | Self::SG_DECODE_ERR.bits(),
    );

    /// 传输已同步：IOC 或 IDLE 任一置位
    pub fn is_synced(&self) -> bool {
        self.intersects(Self::IOC_IRQ | Self::IDLE)
    }

    /// 是否含有致命错误位
    pub fn has_error(&self) -> bool {
        self.intersects(Self::FATAL)
    }

    /// 仅保留错误位
    pub fn errors(&self) -> Self {
        *self & Self::FATAL
    }

    /// 各状态位的诊断名
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        STATUS_FLAG_TABLE
            .iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::SmallRng};

    const DEFINED_BITS: u32 = 0x0000_777B;

    fn reference_decode(word: u32) -> Vec<&'static str> {
        STATUS_FLAG_TABLE
            .iter()
            .filter(|(flag, _)| word & flag.bits() == flag.bits())
            .map(|(_, name)| *name)
            .collect()
    }

    #[test]
    fn test_table_is_one_bit_per_flag() {
        let mut seen = 0u32;
        for (flag, _) in STATUS_FLAG_TABLE {
            assert_eq!(flag.bits().count_ones(), 1);
            assert_eq!(seen & flag.bits(), 0);
            seen |= flag.bits();
        }
        assert_eq!(seen, DEFINED_BITS);
        assert_eq!(StatusFlags::all().bits(), DEFINED_BITS);
    }

    #[test]
    fn test_decode_single_bits() {
        for bit in 0..32 {
            let word = 1u32 << bit;
            let flags = decode_status(word);
            if word & DEFINED_BITS != 0 {
                assert_eq!(flags.bits(), word);
                assert_eq!(flags.names().count(), 1);
            } else {
                assert!(flags.is_empty(), "bit {} must be ignored", bit);
            }
        }
    }

    #[test]
    fn test_decode_all_defined_combinations() {
        let defined: Vec<u32> = STATUS_FLAG_TABLE.iter().map(|(f, _)| f.bits()).collect();
        for mask in 0u32..(1 << defined.len()) {
            let word = defined
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1u32 << *i) != 0)
                .fold(0u32, |acc, (_, bit)| acc | *bit);
            let flags = decode_status(word);
            assert_eq!(flags.bits(), word);
            assert_eq!(flags.names().collect::<Vec<_>>(), reference_decode(word));
        }
    }

    #[test]
    fn test_decode_random_words() {
        let mut rng = SmallRng::seed_from_u64(0xD3A5_0001);
        for _ in 0..100_000 {
            let word: u32 = rng.random();
            let flags = decode_status(word);
            assert_eq!(flags.bits(), word & DEFINED_BITS);
            assert_eq!(flags.names().collect::<Vec<_>>(), reference_decode(word));
        }
    }

    #[test]
    fn test_sync_and_error_predicates() {
        assert!(decode_status(0x1000).is_synced());
        assert!(decode_status(0x0002).is_synced());
        assert!(decode_status(0x1002).is_synced());
        assert!(!decode_status(0x0001).is_synced());
        assert!(!decode_status(0x0000).is_synced());

        assert!(decode_status(0x0010).has_error());
        assert!(decode_status(0x0400).has_error());
        assert!(!decode_status(0x4000).has_error());
        assert_eq!(decode_status(0x5021).errors(), StatusFlags::DMA_SLAVE_ERR);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(decode_status(0).to_string(), "NONE");
        assert_eq!(decode_status(0x1003).to_string(), "DMA_HALTED DMA_IDLE DMA_IOC_IRQ");
        assert_eq!(
            decode_status(0x4050).to_string(),
            "DMA_INTERNAL_ERR DMA_DECODE_ERR DMA_ERR_IRQ"
        );
    }

    #[test]
    fn test_encode_control() {
        assert_eq!(encode_control(ControlOp::Halt), 0x0);
        assert_eq!(encode_control(ControlOp::Run), 0x1);
        assert_eq!(encode_control(ControlOp::Reset), 0x4);
        assert_eq!(encode_control(ControlOp::EnableAllIrq), 0x7000);
    }

    #[test]
    fn test_absolute_register_layout() {
        assert_eq!(MM2S_SA, 0x18);
        assert_eq!(MM2S_LENGTH, 0x28);
        assert_eq!(S2MM_BASE + DMACR, 0x30);
        assert_eq!(S2MM_BASE + DMASR, 0x34);
        assert_eq!(S2MM_DA, 0x48);
        assert_eq!(S2MM_LENGTH, 0x58);
    }
}
