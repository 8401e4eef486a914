use anyhow::Context;
use clap::Parser;
use crossbeam_channel as chan;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

mod audio;
mod driver;
mod meter;
mod scroll;
mod types;
mod ui;
mod video;

use audio::{
    check_device_index, list_input_devices, open_capture, pick, print_devices, prompt_device,
};
use driver::FrameDriver;
use scroll::ScrollBuffer;
use types::SharedLevels;
use ui::{DISPLAY_WIDTH, TerminalMeter};
use video::{Display, VIDEO_HEIGHT, VIDEO_WIDTH};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input device index; prompts on stdin when omitted
    #[arg(short, long, allow_negative_numbers = true)]
    device: Option<i32>,

    /// Only draw the terminal meter
    #[arg(long)]
    no_window: bool,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,

    /// Width of the terminal meter in columns
    #[arg(long, default_value_t = DISPLAY_WIDTH)]
    width: usize,
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let host = cpal::default_host();
    let devices = list_input_devices(&host)?;
    print_devices(&mut io::stdout(), devices.iter().map(|d| &d.info))?;
    if devices.is_empty() {
        println!("there are no devices connected");
        return Ok(());
    }

    let index = match cli.device {
        Some(index) => check_device_index(index, devices.len())?,
        None => prompt_device(&mut io::stdin().lock(), devices.len())?,
    };
    let selected = pick(devices, index)?;
    log::info!("Selected device {}: {}", index, selected.info.name);

    let levels = Arc::new(SharedLevels::new());
    let capture = open_capture(&selected.device, Arc::clone(&levels))?;

    let (tx_quit, rx_quit) = chan::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = tx_quit.try_send(());
    })
    .context("Error setting Ctrl-C handler")?;

    let terminal = TerminalMeter::stdout(cli.width)?;
    let mut frame_driver: FrameDriver<Stdout, Display> =
        FrameDriver::new(Arc::clone(&levels), terminal, rx_quit)
            .run_for(cli.duration.map(Duration::from_secs));

    if !cli.no_window {
        let display = Display::open("volscope", VIDEO_WIDTH, VIDEO_HEIGHT)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("failed to open display")?;
        let history = ScrollBuffer::new(VIDEO_WIDTH as usize, VIDEO_HEIGHT as usize);
        frame_driver = frame_driver.with_video(display, history);
    }

    let reason = frame_driver.run();
    log::info!("Display loop finished: {:?}", reason);

    capture.stop();
    Ok(())
}
