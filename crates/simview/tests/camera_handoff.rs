//! Camera rendezvous between driving threads and the render coordinator.

mod common;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use simview::{ClientOutputs, SimContext};
use simview_core::{BallisticOracle, ClientSettings, ContextConfig, RenderMode, Resolution};

use common::{ball_model, settings, small_backend};

#[test]
fn test_frame_never_older_than_request() {
    let ctx = SimContext::new(small_backend(), ContextConfig::default()).unwrap();
    let mut client = ctx
        .register_client(ball_model("drop", 1), Box::new(BallisticOracle::new()), &settings(RenderMode::None))
        .unwrap();
    let mut out = ClientOutputs::new(&client.interface());
    let mut rng = StdRng::seed_from_u64(7);

    let mut frames = 0;
    for _ in 0..400 {
        client.update(&[rng.gen_range(-1.0..1.0)]).unwrap();
        let requested_at = client.time();
        if client.outputs(&mut out).unwrap() {
            let frame_time = client.instance().camera_frame_time(0).unwrap();
            assert!(frame_time >= requested_at - 1e-12);
            frames += 1;
        }
    }
    assert_eq!(frames, 40);
    client.terminate();
}

#[test]
fn test_parallel_clients_each_get_their_frames() {
    let ctx = SimContext::new(small_backend(), ContextConfig::default()).unwrap();
    let clients: Vec<_> = (0..3)
        .map(|i| {
            ctx.register_client(
                ball_model(&format!("sim{i}"), 1),
                Box::new(BallisticOracle::new()),
                &settings(RenderMode::None),
            )
            .unwrap()
        })
        .collect();

    let handles: Vec<_> = clients
        .into_iter()
        .enumerate()
        .map(|(seed, mut client)| {
            std::thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed as u64);
                let mut out = ClientOutputs::new(&client.interface());
                let mut frames = 0;
                for _ in 0..200 {
                    client.update(&[rng.gen_range(0.0..2.0)]).unwrap();
                    let now = client.time();
                    if client.outputs(&mut out).unwrap() {
                        assert!(client.instance().camera_frame_time(0).unwrap() >= now - 1e-12);
                        frames += 1;
                    }
                    if rng.gen_bool(0.05) {
                        std::thread::yield_now();
                    }
                }
                (frames, client)
            })
        })
        .collect();

    let mut finished = Vec::new();
    for handle in handles {
        let (frames, client) = handle.join().unwrap();
        assert_eq!(frames, 20);
        finished.push(client);
    }
    let reports: Vec<_> = finished.iter_mut().filter_map(|c| c.terminate()).collect();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].surfaces_released, 3);
}

#[test]
fn test_rgb_copy_is_concatenated_in_camera_order() {
    let ctx = SimContext::new(small_backend(), ContextConfig::default()).unwrap();
    let model = ball_model("multi", 2);
    let discovered = ctx.discover_interface(&model, &ClientSettings::default());
    assert_eq!(discovered.cameras.sizes, vec![Resolution::new(32, 24); 2]);

    let mut client = ctx
        .register_client(Arc::clone(&model), Box::new(BallisticOracle::new()), &settings(RenderMode::None))
        .unwrap();
    let mut out = ClientOutputs::new(&discovered);
    assert_eq!(out.rgb.len(), 2 * 3 * 32 * 24);
    assert_eq!(out.depth.len(), 2 * 32 * 24);

    let mut copied = false;
    for _ in 0..10 {
        client.update(&[0.0]).unwrap();
        copied |= client.outputs(&mut out).unwrap();
    }
    assert!(copied);
    assert_eq!(client.interface(), discovered);

    let per_camera = 3 * 32 * 24;
    for (index, surface) in client.instance().camera_surfaces().iter().enumerate() {
        let expected = surface.with_frame(|frame| frame.rgb().to_vec());
        assert_eq!(&out.rgb[index * per_camera..(index + 1) * per_camera], expected.as_slice());
    }
    // The cameras look from different sides, so the images differ.
    assert_ne!(&out.rgb[..per_camera], &out.rgb[per_camera..]);
    client.terminate();
}

#[test]
fn test_unchanged_frame_is_not_copied_twice() {
    let ctx = SimContext::new(small_backend(), ContextConfig::default()).unwrap();
    let mut client = ctx
        .register_client(ball_model("drop", 1), Box::new(BallisticOracle::new()), &settings(RenderMode::None))
        .unwrap();
    let mut out = ClientOutputs::new(&client.interface());
    for _ in 0..10 {
        client.update(&[0.0]).unwrap();
    }
    assert!(client.outputs(&mut out).unwrap());
    assert!(!client.outputs(&mut out).unwrap());
    client.terminate();
}

#[test]
fn test_sensors_track_physics_without_cameras() {
    let ctx = SimContext::new(small_backend(), ContextConfig::default()).unwrap();
    let no_cameras = ClientSettings {
        cameras: false,
        ..ClientSettings::default()
    };
    let mut client = ctx
        .register_client(ball_model("drop", 2), Box::new(BallisticOracle::free_fall()), &no_cameras)
        .unwrap();
    let mut out = ClientOutputs::new(&client.interface());
    assert!(out.rgb.is_empty());

    for _ in 0..50 {
        client.update(&[0.0]).unwrap();
        assert!(!client.outputs(&mut out).unwrap());
    }
    assert!(out.sensors[2] < 1.0);
    assert!((out.sensors[3] - client.time()).abs() < 1e-12);
    assert_eq!(client.read_sensors(1).unwrap(), vec![client.time()]);
    assert!(!ctx.is_running());
}
