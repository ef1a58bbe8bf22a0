use clap::Parser;
use shaderfood::mesh::{self, bin};
use shaderfood::{Camera, Canvas, CanvasConfig, Capability, ClearParams, Params, Scene, Shader};
use std::error::Error;
use std::sync::Arc;
use ultraviolet::{Mat4, Vec3};
use winit::event::{Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::window::Window;

/// View a mesh file with Phong lighting, or convert it to the binary chunk format.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Mesh to load (.obj, .ply, .bin or .msh)
    mesh: String,
    /// Write the mesh to this file in binary chunk format and exit
    #[arg(long)]
    convert: Option<std::path::PathBuf>,
    /// Distance from the camera to the center of the mesh
    #[arg(long, default_value_t = 2.5)]
    distance: f32,
    /// Turns per second
    #[arg(long, default_value_t = 0.1)]
    spin: f32,
    /// Skip back-facing triangles
    #[arg(long)]
    cull: bool,
}

/// Scale and offset that fit every model into a unit-radius box at the origin.
fn fit_transform(scene: &Scene) -> Mat4 {
    let mut lo = Vec3::broadcast(f32::INFINITY);
    let mut hi = Vec3::broadcast(f32::NEG_INFINITY);
    for model in scene.iter() {
        let Some(pos) = model.attribute("pos") else {
            continue;
        };
        for p in pos.as_slice().chunks_exact(3) {
            let p = Vec3::new(p[0], p[1], p[2]);
            lo = lo.min_by_component(p);
            hi = hi.max_by_component(p);
        }
    }
    if lo.x > hi.x {
        return Mat4::identity();
    }
    let extent = (hi - lo).component_max();
    let scale = if extent > 0.0 { 2.0 / extent } else { 1.0 };
    Mat4::from_scale(scale) * Mat4::from_translation(-(lo + hi) * 0.5)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    shaderfood::init_logging();
    let scene = pollster::block_on(mesh::load(&args.mesh))?;
    log::info!(
        "{}: {} models ({})",
        args.mesh,
        scene.len(),
        scene.names().collect::<Vec<_>>().join(", ")
    );
    if let Some(out) = &args.convert {
        std::fs::write(out, bin::write_scene(&scene))?;
        log::info!("wrote {}", out.display());
        return Ok(());
    }

    let fit = fit_transform(&scene);
    let models: Vec<Params> = scene
        .into_params()
        .into_iter()
        .map(|(_, mut params)| {
            if args.cull {
                params.enables.push(Capability::CullFace);
            }
            params
        })
        .collect();
    let builder = winit::window::WindowBuilder::new().with_title(format!("meshview: {}", args.mesh));
    shaderfood::with_default_runtime(
        builder,
        CanvasConfig::default(),
        move |event_loop, window, canvas| {
            if let Err(e) = run(&args, fit, models, event_loop, window, canvas) {
                log::error!("{e}");
            }
        },
    )
}

fn run(
    args: &Args,
    fit: Mat4,
    mut models: Vec<Params>,
    event_loop: EventLoop<()>,
    window: Arc<Window>,
    mut canvas: Canvas,
) -> Result<(), Box<dyn Error>> {
    let mut shader = Shader::phong(&canvas)?;
    let mut camera = Camera::for_canvas(&canvas);
    camera.translate(Vec3::new(0.0, 0.0, args.distance));
    let clear = ClearParams::default();
    let spin = args.spin * std::f32::consts::TAU;
    let start = std::time::Instant::now();

    event_loop.run(move |event, target| match event {
        Event::WindowEvent {
            event: WindowEvent::CloseRequested,
            ..
        } => target.exit(),
        Event::WindowEvent {
            event: WindowEvent::Resized(size),
            ..
        } => {
            canvas.resize(size.width, size.height);
            camera.aspect = canvas.aspect();
            window.request_redraw();
        }
        Event::WindowEvent {
            event: WindowEvent::RedrawRequested,
            ..
        } => {
            let frame = match canvas.clear(&clear) {
                Ok(frame) => frame,
                Err(e) => {
                    log::error!("{e}");
                    target.exit();
                    return;
                }
            };
            let model_to_world = Mat4::from_rotation_y(start.elapsed().as_secs_f32() * spin) * fit;
            for params in models.iter_mut() {
                params.set("model_to_world", model_to_world);
                camera.set_params(params);
                if let Err(e) = shader.draw(&mut canvas, &frame, params) {
                    log::error!("{e}");
                    target.exit();
                }
            }
            canvas.present(frame);
            window.request_redraw();
        }
        _ => {}
    })?;
    Ok(())
}
