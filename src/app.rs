//! Windowed entry point: owns the winit event loop and drives a [`Renderer`] on a
//! [`GpuContext`].

use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::config::RendererConfig;
use crate::gpu::GpuContext;
use crate::input::Input;
use crate::pipeline::Renderer;

/// Open a window and render the demo scene until it is closed.
///
/// # Example
/// ```no_run
/// use stratum::{RendererConfig, run};
///
/// run(RendererConfig::new().title("Layers").size(1280, 720)).unwrap();
/// ```
pub fn run(config: RendererConfig) -> Result<(), winit::error::EventLoopError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = StratumApp::Pending { config };
    event_loop.run_app(&mut app)
}

enum StratumApp {
    Pending {
        config: RendererConfig,
    },
    Running {
        window: Arc<Window>,
        renderer: Renderer<GpuContext, Input>,
    },
    Exited,
}

impl StratumApp {
    fn start(
        config: &RendererConfig,
        event_loop: &ActiveEventLoop,
    ) -> Result<(Arc<Window>, Renderer<GpuContext, Input>), String> {
        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .map_err(|e| format!("failed to create window: {e}"))?,
        );
        let gpu = GpuContext::new(window.clone()).map_err(|e| e.to_string())?;

        let mut renderer = Renderer::new(config.clone(), Input::new());
        renderer.init(gpu).map_err(|e| e.to_string())?;
        Ok((window, renderer))
    }
}

impl ApplicationHandler for StratumApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let StratumApp::Pending { config } = self else {
            return;
        };

        match Self::start(config, event_loop) {
            Ok((window, renderer)) => {
                window.request_redraw();
                *self = StratumApp::Running { window, renderer };
            }
            Err(e) => {
                log::error!("Startup failed: {e}");
                *self = StratumApp::Exited;
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let StratumApp::Running { window, renderer } = self else {
            return;
        };

        renderer.input_mut().handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                if let Err(e) = renderer.shutdown() {
                    log::error!("Shutdown failed: {e}");
                }
                *self = StratumApp::Exited;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Err(e) = renderer.resize(size.width, size.height) {
                    log::warn!("Resize failed: {e}");
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = renderer.render() {
                    if !e.is_transient() {
                        log::error!("Render failed: {e}");
                        event_loop.exit();
                        return;
                    }
                }
                window.request_redraw();
            }
            _ => {}
        }
    }
}
