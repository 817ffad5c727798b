//! 平台配置
//!
//! 硬件布局在编译期固定，不做运行时探测。`PlatformConfig` 只是把这些常量
//! 打包起来，方便调用者在不同板卡上覆盖。

use core::time::Duration;

use memory_addr::{PhysAddr, PhysAddrRange};

/// 保留内存物理基地址
pub const RESERVED_MEM_PHYS_BASE: usize = 0x7000_0000;

/// 保留内存大小 (字节)
pub const RESERVED_MEM_SIZE: usize = 0x0100_0000;

/// 保留内存所在的设备节点
pub const RESERVED_MEM_DEVICE: &str = "/dev/mem";

/// 内核保留内存驱动导出的字符设备
pub const RESERVED_MEM_BRIDGE_DEVICE: &str = "/dev/reservedmemLKM";

/// AXI DMA 对应的 UIO 设备编号
pub const AXI_DMA_UIO_INDEX: u32 = 0;

/// UIO 寄存器窗口大小
pub const AXI_DMA_UIO_SIZE: usize = 0x10000;

/// 默认轮询超时时间 (毫秒)
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// 推理输入在保留内存中的字节偏移
pub const ACCEL_INPUT_OFFSET: usize = 0;

/// 推理输出在保留内存中的字节偏移
pub const ACCEL_OUTPUT_OFFSET: usize = 0x10_0000;

/// 平台配置
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// 保留内存物理基地址
    pub reserved_base: PhysAddr,
    /// 保留内存大小
    pub reserved_size: usize,
    /// 保留内存设备节点
    pub reserved_device: &'static str,
    /// 保留内存字符设备；为 `None` 时在进程内映射 `reserved_device`
    pub reserved_bridge: Option<&'static str>,
    /// UIO 设备编号
    pub uio_index: u32,
    /// UIO 寄存器窗口大小
    pub uio_size: usize,
    /// 单次传输的轮询超时
    pub poll_timeout: Duration,
    /// 推理输入的字节偏移 (4 字节对齐)
    pub input_offset: usize,
    /// 推理输出的字节偏移 (4 字节对齐)
    pub output_offset: usize,
}

impl PlatformConfig {
    /// 保留内存的物理地址范围
    pub fn reserved_range(&self) -> PhysAddrRange {
        PhysAddrRange::from_start_size(self.reserved_base, self.reserved_size)
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            reserved_base: PhysAddr::from(RESERVED_MEM_PHYS_BASE),
            reserved_size: RESERVED_MEM_SIZE,
            reserved_device: RESERVED_MEM_DEVICE,
            reserved_bridge: None,
            uio_index: AXI_DMA_UIO_INDEX,
            uio_size: AXI_DMA_UIO_SIZE,
            poll_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            input_offset: ACCEL_INPUT_OFFSET,
            output_offset: ACCEL_OUTPUT_OFFSET,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reserved_range() {
        let cfg = PlatformConfig::default();
        let range = cfg.reserved_range();
        assert_eq!(range.start.as_usize(), 0x7000_0000);
        assert_eq!(range.end.as_usize(), 0x7100_0000);
        assert!(cfg.output_offset < cfg.reserved_size);
        assert_eq!(cfg.input_offset % 4, 0);
        assert_eq!(cfg.output_offset % 4, 0);
    }
}
