//! Serial Link Diagnostic Tool
//!
//! A verbose diagnostic tool to verify connectivity with the EEG and NIRS
//! acquisition hardware. Opens both links, logs every accepted and
//! rejected frame, and reports running counters.
//!
//! Usage:
//!   cargo run --bin diagnostic
//!
//! Press Ctrl+C to stop.

use anyhow::Result;
use neoeeg_monitor::device::{EegPort, NirsPort, select_port};
use neoeeg_monitor::protocol::{EegFrameParser, NirsFrameParser};
use neoeeg_monitor::timeline::{Clock, MonotonicClock};
use neoeeg_monitor::{MonitorError, ui};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║          EEG / NIRS Serial Link - DIAGNOSTIC MODE             ║");
    println!("║  Logs every accepted and rejected frame from both links       ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let eeg_port_name = select_port("EEG")?;
    let mut eeg_port = EegPort::open(&eeg_port_name)?;
    ui::success(&format!("EEG link opened on {eeg_port_name}"));

    let nirs_port_name = select_port("NIRS")?;
    let mut nirs_port = NirsPort::open(&nirs_port_name)?;
    ui::success(&format!("NIRS link opened on {nirs_port_name}"));

    println!();
    ui::info("Listening... Press Ctrl+C to stop");
    println!();

    let clock = MonotonicClock::new();
    let mut eeg_parser = EegFrameParser::new();
    let mut nirs_parser = NirsFrameParser::new();

    let mut eeg_buf = [0u8; 256];
    let mut nirs_buf = [0u8; 512];

    let mut eeg_accepted = 0u64;
    let mut eeg_rejected = 0u64;
    let mut nirs_accepted = 0u64;
    let mut nirs_rejected = 0u64;

    loop {
        let ts_us = clock.now_us();

        match eeg_port.read_available(&mut eeg_buf) {
            Ok(0) => {}
            Ok(n) => {
                for &byte in &eeg_buf[..n] {
                    match eeg_parser.process_byte(byte, ts_us) {
                        Ok(Some(frame)) => {
                            eeg_accepted += 1;
                            println!(
                                "🧠 EEG frame #{eeg_accepted}: CH1={:.2}uV CH2={:.2}uV CH3={:.2}uV CH4={:.2}uV gs={}",
                                frame.ch1_uv(),
                                frame.ch2_uv(),
                                frame.ch3_uv(),
                                frame.ch4_uv(),
                                frame.gs_counter()
                            );
                        }
                        Ok(None) => {}
                        Err(MonitorError::ChecksumError) => {
                            eeg_rejected += 1;
                            ui::error(&format!("EEG checksum mismatch (rejected #{eeg_rejected})"));
                        }
                        Err(e) => ui::error(&format!("EEG parse error: {e}")),
                    }
                }
            }
            Err(e) => ui::error(&format!("EEG read error: {e}")),
        }

        match nirs_port.read_available(&mut nirs_buf) {
            Ok(0) => {}
            Ok(n) => {
                let (samples, rejects) = nirs_parser.process_bytes(&nirs_buf[..n], ts_us);
                for sample in samples {
                    nirs_accepted += 1;
                    println!(
                        "🩸 NIRS sample #{nirs_accepted}: {:?}",
                        sample
                            .channels
                            .iter()
                            .map(|c| c.map(|v| format!("{v:.1}")).unwrap_or_else(|| "--".into()))
                            .collect::<Vec<_>>()
                    );
                }
                for reject in rejects {
                    nirs_rejected += 1;
                    ui::error(&format!(
                        "NIRS checksum mismatch (rejected #{nirs_rejected}, {} bytes)",
                        reject.bytes.len()
                    ));
                }
            }
            Err(e) => ui::error(&format!("NIRS read error: {e}")),
        }

        if (eeg_accepted + nirs_accepted) % 500 == 0 && eeg_accepted + nirs_accepted > 0 {
            println!();
            ui::success(&format!(
                "📊 counters: eeg_ok={eeg_accepted} eeg_bad={eeg_rejected} nirs_ok={nirs_accepted} nirs_bad={nirs_rejected}"
            ));
        }
    }
}
