//! Registration, teardown and failure isolation.

mod common;

use simview::{ClientOutputs, SimContext, SimError};
use simview_core::{BallisticOracle, ContextConfig, RenderMode, Resolution};
use simview_render::{SoftwareBackend, SoftwareConfig, SurfaceError};

use common::{ball_model, settings, small_backend};

#[test]
fn test_shutdown_releases_every_surface_once() {
    let backend = small_backend();
    let ctx = SimContext::new(backend.clone(), ContextConfig::default()).unwrap();
    let mut a = ctx
        .register_client(ball_model("a", 2), Box::new(BallisticOracle::new()), &settings(RenderMode::Local))
        .unwrap();
    let mut b = ctx
        .register_client(ball_model("b", 1), Box::new(BallisticOracle::new()), &settings(RenderMode::Global))
        .unwrap();

    for _ in 0..30 {
        a.update(&[0.0]).unwrap();
        b.update(&[0.0]).unwrap();
    }
    assert!(ctx.is_running());

    assert!(a.terminate().is_none());
    assert!(ctx.is_running());
    let report = b.terminate().unwrap();
    assert!(report.coordinator_ran);
    assert!(report.render_init_errors.is_empty());
    // Three cameras and two windows.
    assert_eq!(report.surfaces_released, 5);
    assert!(!ctx.is_running());

    let stats = backend.stats();
    assert_eq!(stats.windows_created, 2);
    assert_eq!(stats.offscreen_created, 3);
    assert_eq!(stats.contexts_destroyed, 5);
    assert_eq!(stats.terminations, 1);

    assert!(b.terminate().is_none());
    assert_eq!(backend.stats().terminations, 1);
}

#[test]
fn test_registration_after_first_tick_is_rejected() {
    let ctx = SimContext::new(small_backend(), ContextConfig::default()).unwrap();
    let mut first = ctx
        .register_client(ball_model("a", 1), Box::new(BallisticOracle::new()), &settings(RenderMode::None))
        .unwrap();
    first.update(&[0.0]).unwrap();

    let late = ctx.register_client(ball_model("b", 1), Box::new(BallisticOracle::new()), &settings(RenderMode::None));
    assert!(matches!(late, Err(SimError::RegistrySealed)));
    assert_eq!(ctx.active_clients(), 1);
    first.terminate();
}

#[test]
fn test_context_is_reusable_after_teardown() {
    let backend = small_backend();
    let ctx = SimContext::new(backend.clone(), ContextConfig::default()).unwrap();
    for run in 1..=2 {
        let mut client = ctx
            .register_client(ball_model("a", 1), Box::new(BallisticOracle::new()), &settings(RenderMode::None))
            .unwrap();
        let mut out = ClientOutputs::new(&client.interface());
        let mut frames = 0;
        for _ in 0..20 {
            client.update(&[0.0]).unwrap();
            frames += usize::from(client.outputs(&mut out).unwrap());
        }
        assert_eq!(frames, 2);
        assert_eq!(client.instance().id().index(), 0);
        let report = client.terminate().unwrap();
        assert_eq!(report.surfaces_released, 1);
        assert_eq!(backend.stats().inits, run);
        assert_eq!(backend.stats().terminations, run);
    }
}

#[test]
fn test_teardown_before_any_tick() {
    let backend = small_backend();
    let ctx = SimContext::new(backend.clone(), ContextConfig::default()).unwrap();
    let model = ball_model("a", 1);
    let _ = ctx.discover_interface(&model, &settings(RenderMode::None));
    let mut client = ctx
        .register_client(model, Box::new(BallisticOracle::new()), &settings(RenderMode::Local))
        .unwrap();

    let report = client.terminate().unwrap();
    assert!(!report.coordinator_ran);
    assert_eq!(report.surfaces_released, 0);
    // Discovery brought the backend up; teardown still pairs it.
    assert_eq!(backend.stats().inits, 1);
    assert_eq!(backend.stats().terminations, 1);
    assert_eq!(backend.stats().live_contexts(), 0);
}

#[test]
fn test_surface_failures_never_reach_physics() {
    let backend = SoftwareBackend::with_config(SoftwareConfig {
        offscreen_supported: false,
        fail_windows: true,
        ..SoftwareConfig::default()
    });
    let ctx = SimContext::new(backend.clone(), ContextConfig::default()).unwrap();
    let mut client = ctx
        .register_client(ball_model("a", 2), Box::new(BallisticOracle::new()), &settings(RenderMode::Local))
        .unwrap();
    let mut out = ClientOutputs::new(&client.interface());

    for _ in 0..50 {
        client.update(&[1.0]).unwrap();
        assert!(!client.outputs(&mut out).unwrap());
    }
    assert!((client.time() - 0.1).abs() < 1e-9);
    assert_eq!(client.interface().cameras.sizes, vec![Resolution::default(); 2]);
    assert!(client.instance().camera_surfaces().iter().all(|s| s.is_exited()));
    assert!(client.window().unwrap().is_exited());

    let report = client.terminate().unwrap();
    let mut codes: Vec<i32> = report.render_init_errors.iter().map(|e| e.code()).collect();
    codes.sort_unstable();
    assert_eq!(codes, vec![2, 3, 3]);
    assert_eq!(report.surfaces_released, 0);
    assert_eq!(backend.stats().live_contexts(), 0);
}

#[test]
fn test_backend_init_failure_is_reported_per_surface() {
    let backend = SoftwareBackend::with_config(SoftwareConfig {
        fail_init: true,
        ..SoftwareConfig::default()
    });
    let ctx = SimContext::new(backend.clone(), ContextConfig::default()).unwrap();
    let mut client = ctx
        .register_client(ball_model("a", 1), Box::new(BallisticOracle::new()), &settings(RenderMode::Global))
        .unwrap();
    for _ in 0..20 {
        client.update(&[0.0]).unwrap();
    }

    let report = client.terminate().unwrap();
    assert_eq!(report.render_init_errors.len(), 2);
    assert!(report
        .render_init_errors
        .iter()
        .all(|e| matches!(e.error, SurfaceError::BackendInit(_))));
    assert_eq!(backend.stats().terminations, 0);
}

#[test]
fn test_invalid_settings_rejected() {
    let ctx = SimContext::new(small_backend(), ContextConfig::default()).unwrap();
    let bad = simview_core::ClientSettings {
        visual_fps: 0.0,
        ..settings(RenderMode::Local)
    };
    let result = ctx.register_client(ball_model("a", 0), Box::new(BallisticOracle::new()), &bad);
    assert!(matches!(result, Err(SimError::Config(_))));
    assert_eq!(ctx.active_clients(), 0);
}
