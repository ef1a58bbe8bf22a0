//! The shared GPU handles every other part of shaderfood draws through.

use crate::error::CanvasError;
use std::sync::Arc;

/// Instance, adapter, device and queue, reference counted so a host
/// program can keep using them alongside shaderfood.
pub struct WGPU {
    instance: Arc<wgpu::Instance>,
    adapter: Arc<wgpu::Adapter>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl WGPU {
    /// Wrap GPU resources the caller has already set up.
    pub fn with_resources(
        instance: Arc<wgpu::Instance>,
        adapter: Arc<wgpu::Adapter>,
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
    ) -> Self {
        Self {
            instance,
            adapter,
            device,
            queue,
        }
    }
    /// Pick an adapter able to present to `surface` and open a device on
    /// it.  WebGL2 gets its own (lower) limits.
    pub async fn new(
        instance: Arc<wgpu::Instance>,
        surface: Option<&wgpu::Surface<'static>>,
    ) -> Result<Self, CanvasError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: surface,
            })
            .await
            .ok_or(CanvasError::NoUsableAdapter)?;
        let info = adapter.get_info();
        log::debug!("adapter: {} ({:?})", info.name, info.backend);
        let webgl = cfg!(target_arch = "wasm32") && info.backend == wgpu::Backend::Gl;
        let limits = if webgl {
            wgpu::Limits::downlevel_webgl2_defaults()
        } else {
            wgpu::Limits::downlevel_defaults()
        };
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("shaderfood device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.using_resolution(adapter.limits()),
                },
                None,
            )
            .await?;
        Ok(Self::with_resources(
            instance,
            Arc::new(adapter),
            Arc::new(device),
            Arc::new(queue),
        ))
    }
    /// True on a GL backend (including WebGL2).
    pub fn is_gl(&self) -> bool {
        self.adapter.get_info().backend == wgpu::Backend::Gl
    }
    /// True when running in a browser.
    pub fn is_web(&self) -> bool {
        cfg!(target_arch = "wasm32")
    }
    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }
    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}
