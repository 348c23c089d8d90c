//! Two simulations stepped on their own threads, each sampling its cameras
//! through the software backend.
//!
//! ```text
//! cargo run -p simview --example headless_cameras [config.toml]
//! RUST_LOG=debug cargo run -p simview --example headless_cameras
//! ```

use std::sync::Arc;

use simview::{ClientOutputs, SimContext, SimError};
use simview_core::{BallisticOracle, SensorKind, SimulationModel, SimviewConfig};
use simview_render::SoftwareBackend;

fn model(name: &str, height: f64) -> Result<Arc<SimulationModel>, SimError> {
    let model = SimulationModel::builder(name)
        .timestep(0.002)
        .body("ball", [0.0, 0.0, height], 0.15, [0.9, 0.4, 0.1, 1.0])
        .static_geom("floor", [0.0, 0.0, -2.0], 2.0, [0.3, 0.3, 0.35, 1.0])
        .actuator("thrust", 0, [0.0, 0.0, 1.0], 12.0)
        .sensor("ball_pos", SensorKind::BodyPosition(0))
        .sensor("thrust_force", SensorKind::ActuatorForce(0))
        .camera("front", [0.0, -4.0, 1.0], [0.0, 0.0, 0.5], 45.0)
        .camera("top", [0.0, 0.0, 6.0], [0.0, 0.0, 0.0], 60.0)
        .build()?;
    Ok(Arc::new(model))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match std::env::args().nth(1) {
        Some(path) => SimviewConfig::load(path)?,
        None => SimviewConfig::default(),
    };

    let ctx = SimContext::new(SoftwareBackend::new(), config.context.clone())?;

    // Every client registers before any of them ticks.
    let mut clients = Vec::new();
    for (index, height) in [1.0, 2.5].into_iter().enumerate() {
        let model = model(&format!("drop{index}"), height)?;
        let interface = ctx.discover_interface(&model, &config.client);
        tracing::info!(
            "{}: {} controls, {} sensor scalars, {} rgb bytes ({})",
            model.name(),
            interface.controls.count,
            interface.sensors.scalar_count,
            interface.cameras.rgb_len,
            interface.cameras.layout_key()
        );

        let client = ctx.register_client(model, Box::new(BallisticOracle::new()), &config.client)?;
        clients.push((client, interface));
    }

    let mut threads = Vec::new();
    for (mut client, interface) in clients {
        threads.push(std::thread::spawn(move || -> Result<(), SimError> {
            let mut out = ClientOutputs::new(&interface);
            let mut frames = 0;
            for step in 0..1000 {
                let thrust = if step % 200 < 50 { 1.0 } else { 0.0 };
                client.update(&[thrust])?;
                if client.outputs(&mut out)? {
                    frames += 1;
                }
            }
            tracing::info!(
                "{} finished at t={:.3}s: z={:.3}, {} camera frames",
                client.instance().id(),
                client.time(),
                out.sensors[2],
                frames
            );
            if let Some(report) = client.terminate() {
                tracing::info!(
                    "run torn down: {} surfaces released, {} init errors",
                    report.surfaces_released,
                    report.render_init_errors.len()
                );
            }
            Ok(())
        }));
    }

    for thread in threads {
        match thread.join() {
            Ok(result) => result?,
            Err(_) => tracing::error!("simulation thread panicked"),
        }
    }
    Ok(())
}
