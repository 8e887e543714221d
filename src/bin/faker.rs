//! EEG / NIRS Link Simulator -- synthetic protocol-correct frame generator
//!
//! Emits a steady stream of checksum-valid EEG frames (160 Hz) and NIRS
//! lines (1 Hz) onto two serial ports, so the acquisition pipeline can be
//! exercised without real hardware attached.
//!
//! Usage:
//!   cargo run --bin faker -- --eeg-port /dev/ttyUSB0 --nirs-port /dev/ttyUSB1
//!
//! Press Ctrl+C to stop.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use log::info;
use neoeeg_monitor::constants::eeg::{EEG_BAUD_RATE, EEG_HEADER, EEG_LSB_UV, EEG_SAMPLE_PERIOD_US};
use neoeeg_monitor::constants::nirs::{NIRS_BAUD_RATE, NIRS_CKSUM_FIELD};
use neoeeg_monitor::protocol::{crc16_ccitt, eeg_checksum};
use serialport::SerialPort;
use std::io::Write;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "neoeeg-faker")]
#[command(about = "Simulates the EEG and NIRS acquisition hardware")]
struct Args {
    /// Serial port to emit synthetic EEG frames on
    #[arg(long)]
    eeg_port: String,

    /// Serial port to emit synthetic NIRS lines on
    #[arg(long)]
    nirs_port: String,
}

/// Pulls `current` gently toward `baseline` and adds small random jitter,
/// so the generated signal wanders instead of free-running.
fn vary(current: f64, baseline: f64, max_change: f64) -> f64 {
    let pulled = current + (baseline - current) * 0.02;
    pulled + (rand::random::<f64>() - 0.5) * max_change
}

fn open_port(port_name: &str, baud: u32) -> Result<Box<dyn SerialPort>> {
    Ok(serialport::new(port_name, baud)
        .timeout(Duration::from_millis(100))
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .open()?)
}

fn build_eeg_frame(words: &[i16; 18]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(40);
    bytes.extend_from_slice(&EEG_HEADER);
    for w in words {
        bytes.extend_from_slice(&w.to_be_bytes());
    }
    let checksum = eeg_checksum(&bytes);
    bytes.extend_from_slice(&checksum.to_be_bytes());
    bytes
}

fn build_nirs_line(channels: [f64; 4], ts: chrono::DateTime<Utc>) -> Vec<u8> {
    let body = format!(
        "Ch1={:.0} Ch2={:.0} Ch3={:.0} Ch4={:.0} |{}|",
        channels[0],
        channels[1],
        channels[2],
        channels[3],
        ts.format("%Y-%m-%dT%H:%M:%S")
    );
    let crc_region = format!("{body}{NIRS_CKSUM_FIELD}");
    let crc = crc16_ccitt(crc_region.as_bytes());
    let mut line = format!("{crc_region}{crc:04X}").into_bytes();
    line.extend_from_slice(b"\r\n");
    line
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    info!("🧠 EEG/NIRS link simulator starting");
    let mut eeg_port = open_port(&args.eeg_port, EEG_BAUD_RATE)?;
    info!("✅ EEG port {} opened at {EEG_BAUD_RATE} baud", args.eeg_port);
    let mut nirs_port = open_port(&args.nirs_port, NIRS_BAUD_RATE)?;
    info!("✅ NIRS port {} opened at {NIRS_BAUD_RATE} baud", args.nirs_port);

    let mut ch1 = 0.0_f64;
    let mut ch2 = 0.0_f64;
    let mut ch3 = 0.0_f64;
    let mut gs_counter: u16 = 0;
    let mut nirs_channels = [75.0, 80.0, 78.0, 82.0];

    let start = std::time::Instant::now();
    let mut next_eeg_us: i64 = 0;
    let mut next_nirs_us: i64 = 0;

    loop {
        let now_us = start.elapsed().as_micros() as i64;

        if now_us >= next_eeg_us {
            ch1 = vary(ch1, 0.0, 20.0);
            ch2 = vary(ch2, 0.0, 20.0);
            ch3 = vary(ch3, 0.0, 20.0);

            let mut words = [0i16; 18];
            words[0] = (ch1 / EEG_LSB_UV) as i16;
            words[1] = (ch2 / EEG_LSB_UV) as i16;
            words[2] = (ch3 / EEG_LSB_UV) as i16;
            words[16] = gs_counter as i16;
            gs_counter = if gs_counter >= 229 { 0 } else { gs_counter + 1 };

            eeg_port.write_all(&build_eeg_frame(&words))?;
            next_eeg_us += EEG_SAMPLE_PERIOD_US;
        }

        if now_us >= next_nirs_us {
            for v in nirs_channels.iter_mut() {
                *v = vary(*v, 80.0, 2.0).clamp(0.0, 100.0);
            }
            nirs_port.write_all(&build_nirs_line(nirs_channels, Utc::now()))?;
            info!("🩸 NIRS: {nirs_channels:.1?}");
            next_nirs_us += 1_000_000;
        }

        thread::sleep(Duration::from_micros(500));
    }
}
