//! Logging setup, and (with the `winit` feature) window and GPU setup
//! for programs that just want to draw.

#[cfg(feature = "winit")]
use crate::{Canvas, CanvasConfig, WGPU};
#[cfg(feature = "winit")]
use std::sync::Arc;

/// Install the platform's logger: `env_logger` natively (filtered by
/// `RUST_LOG`, `warn` otherwise), `console_log` plus a panic hook on the
/// web.  Calling it again does nothing.
pub fn init_logging() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or("warn"),
            )
            .try_init();
        }
        #[cfg(target_arch = "wasm32")]
        {
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            let _ = console_log::init_with_level(log::Level::Warn);
        }
    });
}

/// Initialize shaderfood with default settings for the current target
/// architecture: logging, a window, a GPU and a [`Canvas`] filling the window.
#[cfg(all(not(target_arch = "wasm32"), feature = "winit"))]
pub fn with_default_runtime(
    builder: winit::window::WindowBuilder,
    config: CanvasConfig,
    callback: impl FnOnce(winit::event_loop::EventLoop<()>, Arc<winit::window::Window>, Canvas),
) -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let event_loop = winit::event_loop::EventLoop::new()?;
    let window = Arc::new(builder.build(&event_loop)?);
    let wsz = window.inner_size();
    let instance = Arc::new(wgpu::Instance::default());
    let surface = instance.create_surface(window.clone())?;
    let gpu = pollster::block_on(WGPU::new(instance, Some(&surface)))?;
    callback(
        event_loop,
        window,
        Canvas::new(gpu, surface, wsz.width, wsz.height, &config),
    );
    Ok(())
}

/// On the web this also appends a `<canvas>` element to the page body.
/// GPU setup is asynchronous there, so `callback` runs later.
#[cfg(all(target_arch = "wasm32", feature = "winit"))]
pub fn with_default_runtime(
    builder: winit::window::WindowBuilder,
    config: CanvasConfig,
    callback: impl FnOnce(winit::event_loop::EventLoop<()>, Arc<winit::window::Window>, Canvas)
        + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    use wasm_bindgen_futures::wasm_bindgen::JsCast;
    use winit::platform::web::WindowBuilderExtWebSys;
    init_logging();
    let event_loop = winit::event_loop::EventLoop::new()?;
    let canvas = web_sys::window()
        .and_then(|win| win.document())
        .and_then(|doc| {
            let canvas = doc.create_element("canvas").ok()?;
            doc.body()?.append_child(&canvas).ok()?;
            Some(canvas)
        })
        .and_then(|elt| elt.dyn_into::<web_sys::HtmlCanvasElement>().ok())
        .ok_or_else(|| crate::CanvasError::ElementNotFound("document body".to_string()))?;
    let window = Arc::new(builder.with_canvas(Some(canvas)).build(&event_loop)?);
    let wsz = window.inner_size();
    let instance = Arc::new(wgpu::Instance::default());
    let surface = instance.create_surface(window.clone())?;
    wasm_bindgen_futures::spawn_local(async move {
        match WGPU::new(instance, Some(&surface)).await {
            Ok(gpu) => callback(
                event_loop,
                window,
                Canvas::new(gpu, surface, wsz.width, wsz.height, &config),
            ),
            Err(e) => log::error!("{e}"),
        }
    });
    Ok(())
}
