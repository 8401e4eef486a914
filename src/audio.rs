use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, FromSample, Host, InputCallbackInfo, Sample, SampleFormat, SampleRate,
    SizedSample, Stream, StreamConfig, StreamError,
};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use thiserror::Error;

use crate::meter;
use crate::types::SharedLevels;

pub const SAMPLE_RATE: u32 = 44100;
pub const CHANNEL_COUNT: u16 = 2;
pub const FRAMES_PER_BUFFER: u32 = 512;

#[derive(Error, Debug, PartialEq)]
pub enum SelectionError {
    #[error("incorrect device input")]
    NotANumber,

    #[error("selected device does not exist")]
    NoSuchDevice,

    #[error("selected device {0} is not available")]
    Unavailable(i32),
}

#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
    pub default_sample_rate: Option<u32>,
}

/// An enumerated device together with what was printed for it.
pub struct InputDevice {
    pub info: DeviceInfo,
    pub device: Device,
}

impl DeviceInfo {
    fn probe(index: usize, device: &Device) -> DeviceInfo {
        let max_input_channels = device
            .supported_input_configs()
            .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
            .unwrap_or(0);
        let max_output_channels = device
            .supported_output_configs()
            .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
            .unwrap_or(0);
        let default_sample_rate = device
            .default_input_config()
            .or_else(|_| device.default_output_config())
            .map(|c| c.sample_rate().0)
            .ok();

        DeviceInfo {
            index,
            name: device
                .name()
                .unwrap_or_else(|_| "Unknown Device".to_string()),
            max_input_channels,
            max_output_channels,
            default_sample_rate,
        }
    }
}

pub fn list_input_devices(host: &Host) -> Result<Vec<InputDevice>, anyhow::Error> {
    let devices = host
        .input_devices()
        .context("error getting device count")?;
    let listed: Vec<InputDevice> = devices
        .enumerate()
        .map(|(i, device)| InputDevice {
            info: DeviceInfo::probe(i, &device),
            device,
        })
        .collect();
    log::debug!("Enumerated {} input devices on {:?}", listed.len(), host.id());
    Ok(listed)
}

pub fn print_devices<'a>(
    out: &mut impl Write,
    devices: impl IntoIterator<Item = &'a DeviceInfo>,
) -> io::Result<()> {
    let devices: Vec<&DeviceInfo> = devices.into_iter().collect();
    writeln!(out, "number of devices: {}", devices.len())?;
    for d in devices {
        writeln!(out, "device {}:", d.index)?;
        writeln!(out, "name: {}", d.name)?;
        writeln!(out, "max input channels: {}", d.max_input_channels)?;
        writeln!(out, "max output channels: {}", d.max_output_channels)?;
        match d.default_sample_rate {
            Some(rate) => writeln!(out, "default sample rate: {}", rate)?,
            None => writeln!(out, "default sample rate: unknown")?,
        }
    }
    Ok(())
}

/// Parses a device index and rejects indices greater than the device count.
///
/// Only the upper bound is checked here; an index equal to the count or below
/// zero is left for the device lookup to reject.
pub fn parse_device_index(input: &str, count: usize) -> Result<i32, SelectionError> {
    let index: i32 = input
        .trim()
        .parse()
        .map_err(|_| SelectionError::NotANumber)?;
    check_device_index(index, count)
}

pub fn check_device_index(index: i32, count: usize) -> Result<i32, SelectionError> {
    if index > 0 && index as usize > count {
        return Err(SelectionError::NoSuchDevice);
    }
    Ok(index)
}

pub fn prompt_device(input: &mut impl BufRead, count: usize) -> Result<i32, anyhow::Error> {
    print!("select a device: ");
    io::stdout().flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(parse_device_index(&line, count)?)
}

/// Takes the item at `index`; negative or out-of-range indices are unavailable.
pub fn pick<T>(items: impl IntoIterator<Item = T>, index: i32) -> Result<T, SelectionError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| items.into_iter().nth(i))
        .ok_or(SelectionError::Unavailable(index))
}

/// Running capture stream. Dropping it closes the stream.
pub struct CaptureStream<S: StreamTrait = Stream> {
    stream: S,
}

impl<S: StreamTrait> CaptureStream<S> {
    /// Starts delivering blocks; a failure is logged and the stream is kept.
    pub fn start(&self) {
        match self.stream.play() {
            Ok(()) => log::info!("Capture stream started"),
            Err(e) => log::error!("failed to start capture stream: {}", e),
        }
    }

    pub fn stop(&self) {
        match self.stream.pause() {
            Ok(()) => log::info!("Capture stream stopped"),
            Err(e) => log::warn!("failed to stop capture stream: {}", e),
        }
    }
}

pub fn capture_config() -> StreamConfig {
    StreamConfig {
        channels: CHANNEL_COUNT,
        sample_rate: SampleRate(SAMPLE_RATE),
        buffer_size: BufferSize::Fixed(FRAMES_PER_BUFFER),
    }
}

pub fn build_capture_stream<T>(
    device: &Device,
    cfg: &StreamConfig,
    levels: Arc<SharedLevels>,
) -> Result<Stream, anyhow::Error>
where
    T: Sample + Send + 'static + SizedSample + std::fmt::Debug,
    f32: FromSample<T>,
{
    let err_callback = |err: StreamError| log::error!("an error occurred on stream: {}", err);

    let input_callback = move |data: &[T], _info: &InputCallbackInfo| {
        levels.store(meter::measure(data));
    };

    let stream = device.build_input_stream(cfg, input_callback, err_callback, None)?;
    Ok(stream)
}

pub fn open_capture(
    device: &Device,
    levels: Arc<SharedLevels>,
) -> Result<CaptureStream, anyhow::Error> {
    let sample_format = device
        .default_input_config()
        .context("failed to query input format")?
        .sample_format();
    let cfg = capture_config();

    log::info!(
        "Opening capture: {:?} @ {}Hz, {} channels, {} frames per buffer",
        sample_format,
        SAMPLE_RATE,
        CHANNEL_COUNT,
        FRAMES_PER_BUFFER
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_capture_stream::<f32>(device, &cfg, levels),
        SampleFormat::I16 => build_capture_stream::<i16>(device, &cfg, levels),
        SampleFormat::U16 => build_capture_stream::<u16>(device, &cfg, levels),
        other => anyhow::bail!("Unsupported sample format: {:?}", other),
    }
    .context("failed to open capture stream")?;

    let capture = CaptureStream { stream };
    capture.start();
    Ok(capture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::{PauseStreamError, PlayStreamError};
    use std::cell::Cell;

    fn sample_device() -> DeviceInfo {
        DeviceInfo {
            index: 0,
            name: "Built-in Microphone".to_string(),
            max_input_channels: 2,
            max_output_channels: 0,
            default_sample_rate: Some(48000),
        }
    }

    #[test]
    fn parses_valid_index() {
        assert_eq!(parse_device_index("1\n", 3), Ok(1));
        assert_eq!(parse_device_index("  0 ", 3), Ok(0));
    }

    #[test]
    fn rejects_non_numeric_input() {
        assert_eq!(parse_device_index("mic", 3), Err(SelectionError::NotANumber));
        assert_eq!(parse_device_index("", 3), Err(SelectionError::NotANumber));
    }

    #[test]
    fn rejects_index_above_count() {
        assert_eq!(parse_device_index("4", 3), Err(SelectionError::NoSuchDevice));
    }

    #[test]
    fn count_and_negative_indices_pass_bound_check() {
        assert_eq!(parse_device_index("3", 3), Ok(3));
        assert_eq!(parse_device_index("-1", 3), Ok(-1));
    }

    #[test]
    fn lookup_rejects_negative_and_count_indices() {
        let names = ["mic", "line in", "webcam"];
        assert_eq!(pick(names, 2), Ok("webcam"));
        assert_eq!(pick(names, 3), Err(SelectionError::Unavailable(3)));
        assert_eq!(pick(names, -1), Err(SelectionError::Unavailable(-1)));
    }

    #[test]
    fn boundary_indices_fail_at_lookup_not_at_parse() {
        let names = ["mic", "line in", "webcam"];
        for input in ["3", "-1"] {
            let index = parse_device_index(input, names.len()).unwrap();
            assert_eq!(pick(names, index), Err(SelectionError::Unavailable(index)));
        }
    }

    #[derive(Default)]
    struct FailingStream {
        play_calls: Cell<u32>,
        pause_calls: Cell<u32>,
    }

    impl StreamTrait for FailingStream {
        fn play(&self) -> Result<(), PlayStreamError> {
            self.play_calls.set(self.play_calls.get() + 1);
            Err(PlayStreamError::DeviceNotAvailable)
        }

        fn pause(&self) -> Result<(), PauseStreamError> {
            self.pause_calls.set(self.pause_calls.get() + 1);
            Err(PauseStreamError::DeviceNotAvailable)
        }
    }

    #[test]
    fn start_and_stop_failures_are_not_fatal() {
        let capture = CaptureStream {
            stream: FailingStream::default(),
        };
        capture.start();
        capture.stop();
        assert_eq!(capture.stream.play_calls.get(), 1);
        assert_eq!(capture.stream.pause_calls.get(), 1);
    }

    #[test]
    fn prompt_reads_one_line() {
        let mut input = io::Cursor::new("2\nignored\n");
        assert_eq!(prompt_device(&mut input, 5).unwrap(), 2);
    }

    #[test]
    fn prints_device_listing() {
        let mut out = Vec::new();
        print_devices(&mut out, &[sample_device()]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "number of devices: 1\n\
             device 0:\n\
             name: Built-in Microphone\n\
             max input channels: 2\n\
             max output channels: 0\n\
             default sample rate: 48000\n"
        );
    }

    #[test]
    fn capture_format_is_fixed() {
        let cfg = capture_config();
        assert_eq!(cfg.channels, 2);
        assert_eq!(cfg.sample_rate, SampleRate(44100));
        assert_eq!(cfg.buffer_size, BufferSize::Fixed(512));
    }
}
