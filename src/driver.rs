use crossbeam_channel::Receiver;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::scroll::ScrollBuffer;
use crate::types::SharedLevels;
use crate::ui::TerminalMeter;
use crate::video::VideoSink;

pub const TICK: Duration = Duration::from_millis(16);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    WindowClosed,
    Interrupted,
    Elapsed,
}

struct VideoOutput<V> {
    sink: V,
    history: ScrollBuffer,
    failing: bool,
}

/// Display loop: renders the latest levels once per tick until asked to stop.
pub struct FrameDriver<W: Write, V: VideoSink> {
    levels: Arc<SharedLevels>,
    terminal: TerminalMeter<W>,
    video: Option<VideoOutput<V>>,
    interrupt: Receiver<()>,
    run_for: Option<Duration>,
    tick: Duration,
    terminal_failing: bool,
}

impl<W: Write, V: VideoSink> FrameDriver<W, V> {
    pub fn new(
        levels: Arc<SharedLevels>,
        terminal: TerminalMeter<W>,
        interrupt: Receiver<()>,
    ) -> FrameDriver<W, V> {
        FrameDriver {
            levels,
            terminal,
            video: None,
            interrupt,
            run_for: None,
            tick: TICK,
            terminal_failing: false,
        }
    }

    /// Adds a window showing `history`; its size is the grid size.
    pub fn with_video(mut self, sink: V, history: ScrollBuffer) -> FrameDriver<W, V> {
        self.video = Some(VideoOutput {
            sink,
            history,
            failing: false,
        });
        self
    }

    pub fn run_for(mut self, limit: Option<Duration>) -> FrameDriver<W, V> {
        self.run_for = limit;
        self
    }

    pub fn tick_interval(mut self, tick: Duration) -> FrameDriver<W, V> {
        self.tick = tick;
        self
    }

    /// Renders one frame, then checks every quit source.
    pub fn tick(&mut self) -> Option<StopReason> {
        let levels = self.levels.load();

        match self.terminal.draw(levels) {
            Ok(()) => self.terminal_failing = false,
            Err(e) if !self.terminal_failing => {
                log::warn!("failed to draw terminal meter: {}", e);
                self.terminal_failing = true;
            }
            Err(_) => {}
        }

        if let Some(video) = self.video.as_mut() {
            video.history.push(levels);
            match video.sink.present(&video.history) {
                Ok(()) => video.failing = false,
                Err(e) if !video.failing => {
                    log::warn!("failed to present frame: {}", e);
                    video.failing = true;
                }
                Err(_) => {}
            }
            if video.sink.poll_quit() {
                return Some(StopReason::WindowClosed);
            }
        }

        if self.interrupt.try_recv().is_ok() {
            return Some(StopReason::Interrupted);
        }
        None
    }

    pub fn run(mut self) -> StopReason {
        let started = Instant::now();
        loop {
            if let Some(reason) = self.tick() {
                return reason;
            }
            if self.run_for.is_some_and(|limit| started.elapsed() >= limit) {
                return StopReason::Elapsed;
            }
            std::thread::sleep(self.tick);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scroll::BACKGROUND;
    use crate::types::LevelPair;
    use crate::video::DisplayError;
    use crossbeam_channel as chan;

    struct FakeWindow {
        presented: usize,
        close_after: Option<usize>,
        newest_drawn: Vec<bool>,
    }

    impl FakeWindow {
        fn new(close_after: Option<usize>) -> FakeWindow {
            FakeWindow {
                presented: 0,
                close_after,
                newest_drawn: Vec::new(),
            }
        }
    }

    impl VideoSink for &mut FakeWindow {
        fn poll_quit(&mut self) -> bool {
            self.close_after.is_some_and(|n| self.presented >= n)
        }

        fn present(&mut self, history: &ScrollBuffer) -> Result<(), DisplayError> {
            self.presented += 1;
            let newest = history.column(history.width() - 1);
            self.newest_drawn.push(newest.iter().any(|&p| p != BACKGROUND));
            Ok(())
        }
    }

    fn driver<'a>(
        levels: &Arc<SharedLevels>,
        rx: Receiver<()>,
    ) -> FrameDriver<Vec<u8>, &'a mut FakeWindow> {
        let terminal = TerminalMeter::new(Vec::new(), 10).unwrap();
        FrameDriver::new(Arc::clone(levels), terminal, rx).tick_interval(Duration::ZERO)
    }

    #[test]
    fn stops_when_window_closes() {
        let levels = Arc::new(SharedLevels::new());
        let (_tx, rx) = chan::bounded(1);
        let mut window = FakeWindow::new(Some(3));

        let reason = driver(&levels, rx)
            .with_video(&mut window, ScrollBuffer::new(4, 8))
            .run();

        assert_eq!(reason, StopReason::WindowClosed);
        assert_eq!(window.presented, 3);
    }

    #[test]
    fn stops_on_interrupt() {
        let levels = Arc::new(SharedLevels::new());
        let (tx, rx) = chan::bounded(1);
        tx.send(()).unwrap();

        let reason = driver(&levels, rx).run();
        assert_eq!(reason, StopReason::Interrupted);
    }

    #[test]
    fn stops_after_run_limit() {
        let levels = Arc::new(SharedLevels::new());
        let (_tx, rx) = chan::bounded(1);

        let reason = driver(&levels, rx).run_for(Some(Duration::ZERO)).run();
        assert_eq!(reason, StopReason::Elapsed);
    }

    #[test]
    fn each_tick_renders_latest_levels() {
        let levels = Arc::new(SharedLevels::new());
        let (_tx, rx) = chan::bounded(1);
        let mut window = FakeWindow::new(None);

        {
            let mut driver = driver(&levels, rx).with_video(&mut window, ScrollBuffer::new(4, 8));
            assert_eq!(driver.tick(), None);
            levels.store(LevelPair::new(0.5, 0.5));
            assert_eq!(driver.tick(), None);
        }

        assert_eq!(window.newest_drawn, vec![false, true]);
    }
}
