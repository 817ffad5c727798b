//! nnaccel: 通过 AXI DMA 驱动 FPGA 推理 IP
//!
//! 默认对一帧合成图像做一次分类；启用 `loopback` feature 时改为搬运一段
//! 64 字节的测试数据并比对 S2MM 回传的内容。

#[macro_use]
extern crate log;

mod logger;

use std::process::ExitCode;
use std::time::Instant;

use axerrno::AxError;
use nnaccel_api::{AccelResult, Accelerator, PlatformConfig};

fn hexdump(data: &[u8], mut start_addr: usize) {
    const PRELAND_WIDTH: usize = 70;
    println!("{:-^1$}", " hexdump ", PRELAND_WIDTH);
    for offset in (0..data.len()).step_by(16) {
        print!("{:08x} ", start_addr);
        start_addr += 0x10;
        for i in 0..16 {
            match data.get(offset + i) {
                Some(b) => print!("{:02x} ", b),
                None => print!("   "),
            }
        }

        print!("{:>6}", ' ');

        for i in 0..16 {
            if let Some(&c) = data.get(offset + i) {
                if (0x20..=0x7e).contains(&c) {
                    print!("{}", c as char);
                } else {
                    print!(".");
                }
            }
        }

        println!();
    }
    println!("{:-^1$}", " hexdump end ", PRELAND_WIDTH);
}

cfg_if::cfg_if! {
    if #[cfg(feature = "loopback")] {
        /// 测试数据长度 (字节)
        const DATA_LENGTH: usize = 64;

        fn demo(accel: &mut Accelerator, config: &PlatformConfig) -> AccelResult<()> {
            let pattern: Vec<u32> = (0..(DATA_LENGTH / 4) as u32).collect();
            let mut echoed = vec![0u32; pattern.len()];
            let input_phys = config.reserved_base.as_usize() + config.input_offset;
            let output_phys = config.reserved_base.as_usize() + config.output_offset;

            println!("Source buffer before the transfer:");
            hexdump(bytemuck::cast_slice(&pattern), input_phys);

            let start = Instant::now();
            let report = accel.exchange(&pattern, &mut echoed)?;
            let total = start.elapsed();

            println!("Destination buffer after the transfer:");
            hexdump(bytemuck::cast_slice(&echoed), output_phys);

            println!(
                "MM2S synced after {} polls ({:?}), S2MM after {} polls ({:?})",
                report.mm2s.polls, report.mm2s.elapsed, report.s2mm.polls, report.s2mm.elapsed
            );
            println!(
                "DMA {:?}, total {:?} [{} bytes]",
                report.elapsed, total, DATA_LENGTH
            );

            if echoed == pattern {
                info!("Loopback data matches");
            } else {
                warn!("Loopback data differs from the source pattern");
            }
            Ok(())
        }
    } else {
        use nnaccel_api::InferenceFrame;
        use nnaccel_api::accel::FRAME_SAMPLES;

        fn demo(accel: &mut Accelerator, config: &PlatformConfig) -> AccelResult<()> {
            let pixels: Vec<u8> = (0..FRAME_SAMPLES)
                .map(|i| (i * 255 / FRAME_SAMPLES) as u8)
                .collect();
            let frame = InferenceFrame::from_rgb(&pixels)?;

            println!("First samples of the frame:");
            hexdump(
                bytemuck::cast_slice(&frame.samples()[..16]),
                config.reserved_base.as_usize() + config.input_offset,
            );

            let start = Instant::now();
            let label = accel.classify(&frame)?;
            println!("Predicted class {} in {:?}", label, start.elapsed());
            Ok(())
        }
    }
}

fn run() -> AccelResult<()> {
    let config = PlatformConfig::default();
    info!(
        "Reserved memory {:#x} + {:#x}, DMA on /dev/uio{}",
        config.reserved_base.as_usize(),
        config.reserved_size,
        config.uio_index
    );
    let mut accel = Accelerator::open(&config)?;
    let result = demo(&mut accel, &config);
    accel.close();
    result
}

fn main() -> ExitCode {
    logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            let err = AxError::from(e);
            eprintln!("nnaccel: {:?}", err);
            ExitCode::FAILURE
        }
    }
}
