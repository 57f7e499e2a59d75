use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::error::RendererError;
use crate::surface::{SurfaceEvent, SurfaceEventSender};
use crate::types::GpuPowerPreference;

/// Presentation surface of a windowed canvas.
pub(crate) struct SurfaceBinding {
    pub window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
}

impl SurfaceBinding {
    /// Matches the swapchain to the window's current physical size.
    ///
    /// The swapchain follows the window's full physical size; the pixel
    /// ratio cap applies to the grading uniforms and captures only.
    pub fn reconfigure(&mut self, device: &wgpu::Device) {
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(device, &self.config);
    }
}

/// Shared between the context and the device-lost callback it installs.
#[derive(Clone, Default)]
pub(crate) struct LossSignal {
    lost: Arc<AtomicBool>,
    events: Arc<Mutex<Option<SurfaceEventSender>>>,
}

impl LossSignal {
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }

    pub fn attach(&self, sender: SurfaceEventSender) {
        if let Ok(mut slot) = self.events.lock() {
            *slot = Some(sender);
        }
    }

    pub fn detach(&self) {
        if let Ok(mut slot) = self.events.lock() {
            *slot = None;
        }
    }

    fn raise(&self, reason: String) {
        self.lost.store(true, Ordering::SeqCst);
        if let Ok(slot) = self.events.lock() {
            if let Some(sender) = slot.as_ref() {
                sender.send(SurfaceEvent::ContextLost { reason });
            }
        }
    }

    fn clear(&self) {
        self.lost.store(false, Ordering::SeqCst);
    }
}

pub(crate) struct GpuContext {
    instance: wgpu::Instance,
    power_preference: wgpu::PowerPreference,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: Option<SurfaceBinding>,
    pub loss: LossSignal,
}

impl GpuContext {
    pub(crate) fn new(
        window: Option<Arc<Window>>,
        power: GpuPowerPreference,
    ) -> Result<Self, RendererError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let surface = match window.as_ref() {
            Some(window) => Some(
                instance
                    .create_surface(Arc::clone(window))
                    .map_err(|err| {
                        RendererError::Unavailable(format!("failed to create surface: {err}"))
                    })?,
            ),
            None => None,
        };

        let power_preference = match power {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        };
        let loss = LossSignal::default();
        let (adapter, device, queue) =
            request_device(&instance, power_preference, surface.as_ref(), &loss)?;

        let surface = match (window, surface) {
            (Some(window), Some(surface)) => {
                Some(configure_surface(&adapter, &device, window, surface)?)
            }
            _ => None,
        };

        Ok(Self {
            instance,
            power_preference,
            device,
            queue,
            surface,
            loss,
        })
    }

    /// Requests a fresh adapter and device after the previous one was lost.
    pub(crate) fn reacquire(&mut self) -> Result<(), RendererError> {
        let surface = self.surface.as_ref().map(|binding| &binding.surface);
        let (adapter, device, queue) =
            request_device(&self.instance, self.power_preference, surface, &self.loss)?;
        if let Some(binding) = self.surface.as_mut() {
            let caps = binding.surface.get_capabilities(&adapter);
            if !caps.formats.contains(&binding.config.format) {
                return Err(RendererError::Unavailable(format!(
                    "restored adapter cannot present {:?}",
                    binding.config.format
                )));
            }
            binding.reconfigure(&device);
        }
        self.device = device;
        self.queue = queue;
        self.loss.clear();
        Ok(())
    }

    pub(crate) fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

fn request_device(
    instance: &wgpu::Instance,
    power_preference: wgpu::PowerPreference,
    surface: Option<&wgpu::Surface<'static>>,
    loss: &LossSignal,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue), RendererError> {
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference,
        compatible_surface: surface,
        force_fallback_adapter: false,
    }))
    .map_err(|err| RendererError::Unavailable(format!("no suitable GPU adapter: {err}")))?;

    let info = adapter.get_info();
    tracing::debug!(
        name = %info.name,
        backend = ?info.backend,
        device_type = ?info.device_type,
        "selected GPU adapter"
    );

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("grading device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::default(),
    }))
    .map_err(|err| RendererError::Unavailable(format!("failed to create GPU device: {err}")))?;

    let signal = loss.clone();
    device.set_device_lost_callback(move |reason, message| {
        if matches!(reason, wgpu::DeviceLostReason::Destroyed) {
            return;
        }
        tracing::warn!(?reason, %message, "GPU device lost");
        signal.raise(message);
    });

    Ok((adapter, device, queue))
}

fn configure_surface(
    adapter: &wgpu::Adapter,
    device: &wgpu::Device,
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
) -> Result<SurfaceBinding, RendererError> {
    let caps = surface.get_capabilities(adapter);
    let format = caps
        .formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .or_else(|| caps.formats.first().copied())
        .ok_or_else(|| {
            RendererError::Unavailable("surface is incompatible with the adapter".to_string())
        })?;
    if format.is_srgb() {
        tracing::warn!(
            ?format,
            "no non-sRGB surface format available; output will be re-encoded"
        );
    }

    let present_mode = if caps.present_modes.contains(&wgpu::PresentMode::Fifo) {
        wgpu::PresentMode::Fifo
    } else {
        caps.present_modes
            .first()
            .copied()
            .unwrap_or(wgpu::PresentMode::Fifo)
    };
    let alpha_mode = caps
        .alpha_modes
        .first()
        .copied()
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);

    let size: PhysicalSize<u32> = window.inner_size();
    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode,
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(device, &config);
    tracing::debug!(
        ?format,
        ?present_mode,
        width = config.width,
        height = config.height,
        "configured surface"
    );

    Ok(SurfaceBinding {
        window,
        surface,
        config,
    })
}
