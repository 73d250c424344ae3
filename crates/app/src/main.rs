//! vkframe - Main Entry Point
//!
//! Opens a window and draws a textured quad through the frame driver. The
//! application owns the event loop and pumps it once per frame, so the loop
//! body reads top to bottom: events, input, draw, pacing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::WindowId;

use vkframe_core::{AppConfig, FramePacer, Timer, WindowConfig};
use vkframe_platform::{FramebufferSource, InputState, Window};
use vkframe_renderer::{FrameStatus, Renderer};
use vkframe_resources::ImageData;

/// How long a minimized window blocks on the event queue before re-checking its size.
const MINIMIZED_POLL: Duration = Duration::from_millis(100);

const CHECKERBOARD_SIZE: u32 = 256;
const CHECKERBOARD_CELL: u32 = 32;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file; defaults are used when it does not exist
    #[arg(long, default_value = "vkframe.toml")]
    config: PathBuf,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Number of frame slots
    #[arg(long)]
    frames_in_flight: Option<usize>,

    /// Frame rate cap, 0 disables pacing
    #[arg(long)]
    target_fps: Option<u32>,

    /// Disable the Vulkan validation layer
    #[arg(long)]
    no_validation: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(width) = self.width {
            config.window.width = width;
        }
        if let Some(height) = self.height {
            config.window.height = height;
        }
        if let Some(frames) = self.frames_in_flight {
            config.render.frames_in_flight = frames;
        }
        if let Some(fps) = self.target_fps {
            config.pacing.target_fps = fps;
        }
        if self.no_validation {
            config.render.validation = false;
        }
    }
}

/// Window-side state filled in by winit callbacks.
struct Shell {
    window_config: WindowConfig,
    window: Option<Window>,
    input: InputState,
    close_requested: bool,
    resized: bool,
    window_error: Option<String>,
}

impl Shell {
    fn new(window_config: WindowConfig) -> Self {
        Self {
            window_config,
            window: None,
            input: InputState::new(),
            close_requested: false,
            resized: false,
            window_error: None,
        }
    }
}

impl ApplicationHandler for Shell {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let cfg = &self.window_config;
        match Window::new(event_loop, cfg.width, cfg.height, &cfg.title) {
            Ok(window) => self.window = Some(window),
            Err(e) => {
                error!("Failed to create window: {}", e);
                self.window_error = Some(e.to_string());
                self.close_requested = true;
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.input.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                info!("Window resized to {}x{}", size.width, size.height);
                self.resized = true;
            }
            _ => {}
        }
    }
}

/// The window as seen by swapchain recreation: waiting pumps the event loop.
struct PumpedWindow<'a> {
    event_loop: &'a mut EventLoop<()>,
    shell: &'a mut Shell,
}

impl FramebufferSource for PumpedWindow<'_> {
    fn framebuffer_size(&self) -> (u32, u32) {
        self.shell
            .window
            .as_ref()
            .map_or((0, 0), |window| window.framebuffer_size())
    }

    fn close_requested(&self) -> bool {
        self.shell.close_requested
    }

    fn wait_events(&mut self) {
        if let PumpStatus::Exit(_) = self
            .event_loop
            .pump_app_events(Some(MINIMIZED_POLL), &mut *self.shell)
        {
            self.shell.close_requested = true;
        }
    }
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::load(&args.config)?;
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn load_texture(config: &AppConfig) -> Result<ImageData> {
    match &config.assets.texture {
        Some(path) => {
            info!("Loading texture {}", path.display());
            Ok(ImageData::load(path)?)
        }
        None => {
            info!("No texture configured, using a checkerboard");
            Ok(ImageData::checkerboard(CHECKERBOARD_SIZE, CHECKERBOARD_CELL)?)
        }
    }
}

fn run(config: &AppConfig) -> Result<()> {
    let texture = load_texture(config)?;

    let mut event_loop = EventLoop::new()?;
    let mut shell = Shell::new(config.window.clone());

    while shell.window.is_none() {
        let status = event_loop.pump_app_events(Some(Duration::from_millis(16)), &mut shell);
        if let Some(e) = shell.window_error.take() {
            return Err(anyhow!("failed to create window: {}", e));
        }
        if shell.close_requested || matches!(status, PumpStatus::Exit(_)) {
            return Ok(());
        }
    }

    let Some(window) = shell.window.as_ref() else {
        return Ok(());
    };
    let mut renderer = Renderer::new(window, config, &texture)
        .map_err(|e| anyhow!("failed to create renderer: {}", e))?;
    info!("Initialization complete, entering main loop");

    let mut timer = Timer::new();
    let mut pacer = FramePacer::new(config.pacing.target_frame_time());
    let mut frames: u64 = 0;

    loop {
        shell.input.begin_frame();
        if let PumpStatus::Exit(_) = event_loop.pump_app_events(Some(Duration::ZERO), &mut shell) {
            break;
        }
        if shell.close_requested {
            break;
        }
        if std::mem::take(&mut shell.resized) {
            renderer.notify_resized();
        }

        renderer.update(&shell.input, timer.delta_secs());

        let mut source = PumpedWindow {
            event_loop: &mut event_loop,
            shell: &mut shell,
        };
        match renderer
            .draw_frame(&mut source)
            .map_err(|e| anyhow!("frame loop stopped: {}", e))?
        {
            FrameStatus::Presented => frames += 1,
            FrameStatus::Closed => break,
            FrameStatus::SkippedOutOfDate | FrameStatus::Abandoned => {}
        }

        pacer.wait();
    }

    info!(
        "Presented {} of {} frames in {:.1}s ({:.1} iterations/s)",
        frames,
        timer.ticks(),
        timer.elapsed_secs(),
        timer.average_rate()
    );

    // The surface must go before the window it was created from.
    drop(renderer);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    vkframe_core::init_logging(&config.log.filter);
    info!("Starting vkframe");
    if !args.config.exists() {
        warn!("{} not found, using default configuration", args.config.display());
    }

    if let Err(e) = run(&config) {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "vkframe",
            "--width",
            "640",
            "--frames-in-flight",
            "3",
            "--target-fps",
            "0",
            "--no-validation",
        ]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.height, AppConfig::default().window.height);
        assert_eq!(config.render.frames_in_flight, 3);
        assert_eq!(config.pacing.target_fps, 0);
        assert!(!config.render.validation);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = Args::parse_from(["vkframe"]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config, AppConfig::default());
        assert_eq!(args.config, PathBuf::from("vkframe.toml"));
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let args = Args::parse_from(["vkframe", "--config", "does/not/exist.toml"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
