//! GPU-backed [`ImageProcessor`].
//!
//! Only `blend` runs on the device (one compute dispatch per layer, with readback). Everything
//! else delegates to the CPU processor, so both strategies share mask and blur code. An
//! unavailable adapter is an error, never a silent CPU fallback.

use std::time::Duration;

#[cfg(feature = "gpu")]
pub use imp::GpuImageProcessor;

#[cfg(not(feature = "gpu"))]
pub use disabled::GpuImageProcessor;

/// Default budget for one device round-trip.
pub const DEFAULT_GPU_TIMEOUT: Duration = Duration::from_secs(10);

#[cfg(feature = "gpu")]
mod imp {
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    use wgpu::util::DeviceExt as _;

    use crate::foundation::core::{Affine, Point, Rect, Rgba8Premul, Vec2};
    use crate::foundation::error::{LayercastError, LayercastResult};
    use crate::raster::blend::opacity_u8;
    use crate::raster::buffer::{AlphaMask, Raster};
    use crate::raster::cpu::CpuImageProcessor;
    use crate::raster::processor::{ImageProcessor, Padded, ShapeStyle};

    const BLEND_WGSL: &str = r#"
struct Params {
    dst_w: u32,
    dst_h: u32,
    src_w: u32,
    src_h: u32,
    inv_a: f32,
    inv_b: f32,
    inv_c: f32,
    inv_d: f32,
    inv_e: f32,
    inv_f: f32,
    opacity: u32,
    _pad: u32,
};

@group(0) @binding(0) var<storage, read_write> dst: array<u32>;
@group(0) @binding(1) var<storage, read> src: array<u32>;
@group(0) @binding(2) var<uniform> params: Params;

fn mul_div255(x: u32, y: u32) -> u32 {
    return (x * y + 127u) / 255u;
}

fn over(d: u32, s: u32, op: u32) -> u32 {
    let sa = mul_div255((s >> 24u) & 255u, op);
    if (sa == 0u) {
        return d;
    }
    let inv = 255u - sa;
    var out = min(sa + mul_div255((d >> 24u) & 255u, inv), 255u) << 24u;
    for (var i = 0u; i < 3u; i = i + 1u) {
        let sh = i * 8u;
        let sc = mul_div255((s >> sh) & 255u, op);
        let dc = mul_div255((d >> sh) & 255u, inv);
        out = out | (min(sc + dc, 255u) << sh);
    }
    return out;
}

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.dst_w || gid.y >= params.dst_h) {
        return;
    }
    let px = f32(gid.x) + 0.5;
    let py = f32(gid.y) + 0.5;
    let sxf = floor(params.inv_a * px + params.inv_c * py + params.inv_e);
    let syf = floor(params.inv_b * px + params.inv_d * py + params.inv_f);
    if (sxf < 0.0 || syf < 0.0 || sxf >= f32(params.src_w) || syf >= f32(params.src_h)) {
        return;
    }
    let s = src[u32(syf) * params.src_w + u32(sxf)];
    if (((s >> 24u) & 255u) == 0u) {
        return;
    }
    let di = gid.y * params.dst_w + gid.x;
    dst[di] = over(dst[di], s, params.opacity);
}
"#;

    type Acquired = (wgpu::Device, wgpu::Queue, String);

    fn request_device() -> LayercastResult<Acquired> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| LayercastError::gpu_unavailable(format!("no gpu adapter: {e:?}")))?;
        let adapter_name = adapter.get_info().name;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("layercast_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| {
            LayercastError::gpu_unavailable(format!("wgpu request_device failed: {e:?}"))
        })?;
        Ok((device, queue, adapter_name))
    }

    /// Runs device setup on a helper thread and waits at most `timeout` for it. On timeout the
    /// helper is left detached.
    fn acquire_device(timeout: Duration) -> LayercastResult<Acquired> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        std::thread::Builder::new()
            .name("layercast-gpu-init".to_string())
            .spawn(move || {
                let _ = tx.send(request_device());
            })
            .map_err(|e| {
                LayercastError::gpu_unavailable(format!("failed to spawn gpu setup: {e}"))
            })?;
        match rx.recv_timeout(timeout) {
            Ok(acquired) => acquired,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Err(LayercastError::timeout(
                format!("gpu device setup exceeded {timeout:?}"),
            )),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(
                LayercastError::gpu_unavailable("gpu setup thread exited without a device"),
            ),
        }
    }

    /// Compute-shader compositor on the first available high-performance adapter.
    pub struct GpuImageProcessor {
        cpu: CpuImageProcessor,
        device: wgpu::Device,
        queue: wgpu::Queue,
        pipeline: wgpu::ComputePipeline,
        layout: wgpu::BindGroupLayout,
        timeout: Duration,
        adapter_name: String,
    }

    impl GpuImageProcessor {
        /// Acquire an adapter and device; fails with `GpuUnavailable` when none exists and
        /// with `Timeout` when the driver does not answer within `timeout`.
        pub fn new(timeout: Duration) -> LayercastResult<Self> {
            let (device, queue, adapter_name) = acquire_device(timeout)?;

            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("layercast_blend"),
                source: wgpu::ShaderSource::Wgsl(BLEND_WGSL.into()),
            });

            let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            };
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("layercast_blend_layout"),
                entries: &[
                    storage(0, false),
                    storage(1, true),
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("layercast_blend_pipeline_layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("layercast_blend_pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

            tracing::debug!(adapter = %adapter_name, "gpu processor ready");
            Ok(Self {
                cpu: CpuImageProcessor::new(),
                device,
                queue,
                pipeline,
                layout,
                timeout,
                adapter_name,
            })
        }

        pub fn adapter_name(&self) -> &str {
            &self.adapter_name
        }

        fn params_bytes(dst: &Raster, src: &Raster, inv: Affine, op: u16) -> Vec<u8> {
            let [a, b, c, d, e, f] = inv.as_coeffs();
            let mut out = Vec::with_capacity(48);
            for v in [dst.width, dst.height, src.width, src.height] {
                out.extend_from_slice(&v.to_le_bytes());
            }
            for v in [a, b, c, d, e, f] {
                out.extend_from_slice(&(v as f32).to_le_bytes());
            }
            out.extend_from_slice(&u32::from(op).to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out
        }

        fn wait_for_map(
            &self,
            rx: &mpsc::Receiver<Result<(), wgpu::BufferAsyncError>>,
        ) -> LayercastResult<()> {
            let deadline = Instant::now() + self.timeout;
            loop {
                self.device
                    .poll(wgpu::PollType::Poll)
                    .map_err(|e| {
                        LayercastError::gpu_unavailable(format!("wgpu poll failed: {e:?}"))
                    })?;
                match rx.try_recv() {
                    Ok(res) => {
                        return res.map_err(|e| {
                            LayercastError::gpu_unavailable(format!("readback map failed: {e:?}"))
                        });
                    }
                    Err(mpsc::TryRecvError::Empty) => {
                        if Instant::now() >= deadline {
                            return Err(LayercastError::timeout(format!(
                                "gpu readback exceeded {:?}",
                                self.timeout
                            )));
                        }
                        std::thread::sleep(Duration::from_micros(200));
                    }
                    Err(mpsc::TryRecvError::Disconnected) => {
                        return Err(LayercastError::gpu_unavailable("readback channel closed"));
                    }
                }
            }
        }
    }

    impl ImageProcessor for GpuImageProcessor {
        fn name(&self) -> &'static str {
            "gpu"
        }

        fn new_canvas(&self, width: u32, height: u32, fill: Rgba8Premul) -> Raster {
            self.cpu.new_canvas(width, height, fill)
        }

        fn premultiply(&self, src: &Raster) -> Raster {
            self.cpu.premultiply(src)
        }

        fn apply_opacity(&self, img: &mut Raster, opacity: f32) {
            self.cpu.apply_opacity(img, opacity);
        }

        fn apply_mask(&self, img: &mut Raster, mask: &AlphaMask) -> LayercastResult<()> {
            self.cpu.apply_mask(img, mask)
        }

        fn gaussian_blur(&self, img: &Raster, sigma: f32) -> LayercastResult<Raster> {
            self.cpu.gaussian_blur(img, sigma)
        }

        fn motion_blur(&self, img: &Raster, velocity: Vec2) -> LayercastResult<Padded> {
            self.cpu.motion_blur(img, velocity)
        }

        fn draw_ellipse(
            &self,
            img: &mut Raster,
            center: Point,
            radius: f64,
            color: Rgba8Premul,
            style: ShapeStyle,
        ) {
            self.cpu.draw_ellipse(img, center, radius, color, style);
        }

        fn draw_rect(&self, img: &mut Raster, rect: Rect, color: Rgba8Premul, style: ShapeStyle) {
            self.cpu.draw_rect(img, rect, color, style);
        }

        fn blend(
            &self,
            dst: &mut Raster,
            src: &Raster,
            placement: Affine,
            opacity: f32,
        ) -> LayercastResult<()> {
            if !dst.premultiplied || !src.premultiplied {
                return Err(LayercastError::validation(
                    "gpu blend expects premultiplied rasters",
                ));
            }
            let op = opacity_u8(opacity);
            let det = placement.determinant();
            if op == 0
                || dst.data.is_empty()
                || src.data.is_empty()
                || !det.is_finite()
                || det.abs() < 1e-12
            {
                return Ok(());
            }
            let limit = u64::from(self.device.limits().max_storage_buffer_binding_size);
            if dst.data.len() as u64 > limit || src.data.len() as u64 > limit {
                return Err(LayercastError::gpu_unavailable(
                    "raster exceeds the device storage buffer limit",
                ));
            }

            let dst_buf = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("layercast_dst"),
                    contents: &dst.data,
                    usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                });
            let src_buf = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("layercast_src"),
                    contents: &src.data,
                    usage: wgpu::BufferUsages::STORAGE,
                });
            let params = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("layercast_blend_params"),
                    contents: &Self::params_bytes(dst, src, placement.inverse(), op),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
            let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("layercast_readback"),
                size: dst.data.len() as u64,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("layercast_blend_bind_group"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: dst_buf.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: src_buf.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: params.as_entire_binding(),
                    },
                ],
            });

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("layercast_blend_encoder"),
                });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("layercast_blend_pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(dst.width.div_ceil(8), dst.height.div_ceil(8), 1);
            }
            encoder.copy_buffer_to_buffer(&dst_buf, 0, &readback, 0, dst.data.len() as u64);
            self.queue.submit(Some(encoder.finish()));

            let slice = readback.slice(..);
            let (tx, rx) = mpsc::channel();
            slice.map_async(wgpu::MapMode::Read, move |res| {
                let _ = tx.send(res);
            });
            self.wait_for_map(&rx)?;
            {
                let mapped = slice.get_mapped_range();
                dst.data.copy_from_slice(&mapped);
            }
            readback.unmap();
            Ok(())
        }
    }
}

#[cfg(not(feature = "gpu"))]
mod disabled {
    use std::convert::Infallible;
    use std::time::Duration;

    use crate::foundation::core::{Affine, Point, Rect, Rgba8Premul, Vec2};
    use crate::foundation::error::{LayercastError, LayercastResult};
    use crate::raster::buffer::{AlphaMask, Raster};
    use crate::raster::processor::{ImageProcessor, Padded, ShapeStyle};

    /// Placeholder when built without the `gpu` feature; it cannot be constructed.
    pub struct GpuImageProcessor {
        never: Infallible,
    }

    impl GpuImageProcessor {
        pub fn new(_timeout: Duration) -> LayercastResult<Self> {
            Err(LayercastError::gpu_unavailable(
                "layercast was built without the `gpu` feature",
            ))
        }

        pub fn adapter_name(&self) -> &str {
            match self.never {}
        }
    }

    impl ImageProcessor for GpuImageProcessor {
        fn name(&self) -> &'static str {
            match self.never {}
        }

        fn new_canvas(&self, _width: u32, _height: u32, _fill: Rgba8Premul) -> Raster {
            match self.never {}
        }

        fn premultiply(&self, _src: &Raster) -> Raster {
            match self.never {}
        }

        fn apply_opacity(&self, _img: &mut Raster, _opacity: f32) {
            match self.never {}
        }

        fn apply_mask(&self, _img: &mut Raster, _mask: &AlphaMask) -> LayercastResult<()> {
            match self.never {}
        }

        fn gaussian_blur(&self, _img: &Raster, _sigma: f32) -> LayercastResult<Raster> {
            match self.never {}
        }

        fn motion_blur(&self, _img: &Raster, _velocity: Vec2) -> LayercastResult<Padded> {
            match self.never {}
        }

        fn draw_ellipse(
            &self,
            _img: &mut Raster,
            _center: Point,
            _radius: f64,
            _color: Rgba8Premul,
            _style: ShapeStyle,
        ) {
            match self.never {}
        }

        fn draw_rect(
            &self,
            _img: &mut Raster,
            _rect: Rect,
            _color: Rgba8Premul,
            _style: ShapeStyle,
        ) {
            match self.never {}
        }

        fn blend(
            &self,
            _dst: &mut Raster,
            _src: &Raster,
            _placement: Affine,
            _opacity: f32,
        ) -> LayercastResult<()> {
            match self.never {}
        }
    }
}
