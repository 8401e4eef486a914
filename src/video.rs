use softbuffer::{Context, SoftBufferError, Surface};
use std::{num::NonZeroU32, rc::Rc, time::Duration};
use thiserror::Error;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    error::{EventLoopError, OsError},
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowId},
};

use crate::scroll::{ScrollBuffer, to_xrgb};

pub const VIDEO_WIDTH: u32 = 640;
pub const VIDEO_HEIGHT: u32 = 360;

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("failed to start the window event loop: {0}")]
    EventLoop(#[from] EventLoopError),

    #[error("failed to create window: {0}")]
    Window(#[from] OsError),

    #[error("window surface error: {0}")]
    Surface(#[from] SoftBufferError),

    #[error("window closed before it was ready")]
    Closed,
}

/// Something the frame driver can show the level history on.
pub trait VideoSink {
    /// Handles pending window events and reports whether the user asked to quit.
    fn poll_quit(&mut self) -> bool;

    fn present(&mut self, history: &ScrollBuffer) -> Result<(), DisplayError>;
}

struct WindowState {
    window: Rc<Window>,
    surface: Surface<Rc<Window>, Rc<Window>>,
    surface_size: PhysicalSize<u32>,
    _context: Context<Rc<Window>>,
}

impl WindowState {
    fn create(
        event_loop: &ActiveEventLoop,
        title: &str,
        size: PhysicalSize<u32>,
    ) -> Result<WindowState, DisplayError> {
        let attrs = Window::default_attributes()
            .with_title(title)
            .with_inner_size(size)
            .with_resizable(false);
        let window = Rc::new(event_loop.create_window(attrs)?);
        let context = Context::new(Rc::clone(&window))?;
        let surface = Surface::new(&context, Rc::clone(&window))?;

        Ok(WindowState {
            window,
            surface,
            surface_size: PhysicalSize::new(0, 0),
            _context: context,
        })
    }
}

struct VideoApp {
    title: String,
    size: PhysicalSize<u32>,
    state: Option<WindowState>,
    should_quit: bool,
    error: Option<DisplayError>,
}

impl ApplicationHandler for VideoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match WindowState::create(event_loop, &self.title, self.size) {
            Ok(state) => self.state = Some(state),
            Err(e) => {
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.should_quit = true,
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => self.should_quit = true,
            _ => {}
        }
    }
}

/// Window plus software surface, driven by pumping the event loop from the
/// display loop instead of handing the main thread to winit.
pub struct Display {
    app: VideoApp,
    event_loop: EventLoop<()>,
}

impl Display {
    pub fn open(title: &str, width: u32, height: u32) -> Result<Display, DisplayError> {
        let event_loop = EventLoop::new()?;
        let mut display = Display {
            app: VideoApp {
                title: title.to_string(),
                size: PhysicalSize::new(width, height),
                state: None,
                should_quit: false,
                error: None,
            },
            event_loop,
        };

        while display.app.state.is_none() {
            let status = display
                .event_loop
                .pump_app_events(Some(Duration::from_millis(10)), &mut display.app);
            if let Some(e) = display.app.error.take() {
                return Err(e);
            }
            if let PumpStatus::Exit(_) = status {
                return Err(DisplayError::Closed);
            }
        }

        log::info!("Opened {}x{} window", width, height);
        Ok(display)
    }
}

impl VideoSink for Display {
    fn poll_quit(&mut self) -> bool {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.app);
        matches!(status, PumpStatus::Exit(_)) || self.app.should_quit
    }

    fn present(&mut self, history: &ScrollBuffer) -> Result<(), DisplayError> {
        let Some(state) = self.app.state.as_mut() else {
            return Ok(());
        };

        let size = state.window.inner_size();
        let (Some(w), Some(h)) = (NonZeroU32::new(size.width), NonZeroU32::new(size.height))
        else {
            return Ok(());
        };
        if size != state.surface_size {
            state.surface.resize(w, h)?;
            state.surface_size = size;
        }

        let (sw, sh) = (size.width as usize, size.height as usize);
        let mut buffer = state.surface.buffer_mut()?;
        for y in 0..sh {
            let gy = y * history.height() / sh;
            let row = &mut buffer[y * sw..(y + 1) * sw];
            for (x, px) in row.iter_mut().enumerate() {
                *px = to_xrgb(history.pixel(x * history.width() / sw, gy));
            }
        }
        buffer.present()?;
        Ok(())
    }
}
