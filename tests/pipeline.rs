use std::time::Duration;

use glam::Vec3A;

use chromalive::camera::{Camera, CameraSettings, RenderMode};
use chromalive::frame::{FrameState, META_MISS};
use chromalive::integrator::{self, ChannelOrder};
use chromalive::material::MaterialData;
use chromalive::random::SeedSource;
use chromalive::renderer::{RenderHandle, RenderSettings, Renderer};
use chromalive::scene::ScenePacker;
use chromalive::scene_file::SceneDescription;
use chromalive::sphere::Sphere;

fn lit_sphere_scene() -> ScenePacker {
    let mut packer = ScenePacker::new();
    let white = packer.add_material(MaterialData::diffuse(Vec3A::splat(0.8)));
    let light = packer.add_material(MaterialData::light(Vec3A::ONE));
    packer.add_sphere(Sphere::new(Vec3A::ZERO, 1.0, white)).unwrap();
    packer
        .add_sphere(Sphere::new(Vec3A::new(0.0, 0.0, 100.0), 2.0, light))
        .unwrap();
    packer
}

fn looking_at_origin(width: u32, height: u32) -> Camera {
    Camera::new(CameraSettings {
        origin: Vec3A::new(0.0, 0.0, 5.0),
        look_at: Vec3A::ZERO,
        width,
        height,
        max_color_bounces: 1,
        ..Default::default()
    })
}

#[test]
fn center_pixel_sees_the_lit_sphere() {
    let scene = lit_sphere_scene().packed_scene();
    let camera = looking_at_origin(32, 32);
    let mut state = FrameState::new(32, 32, SeedSource::Fixed(1234)).unwrap();
    let mut bytes = vec![0u8; 32 * 32 * 4];

    integrator::render_frame(&scene, &camera, &mut state, &mut bytes, ChannelOrder::Rgba);

    let center = 16 * 32 + 16;
    assert_ne!(state.metadata[center], META_MISS);
    assert_eq!(state.metadata[center], 1);
    assert!((state.depth[center] - 4.0).abs() < 0.1);
    assert!(state.output[center].max_element() > 0.0);
    assert!(bytes[center * 4..center * 4 + 3].iter().any(|&b| b > 0));
}

#[test]
fn empty_scene_shows_background_everywhere() {
    let scene = ScenePacker::new().packed_scene();
    let camera = Camera::new(CameraSettings {
        width: 16,
        height: 9,
        ..Default::default()
    });
    let background = camera.settings().no_hit_color;
    let mut state = FrameState::new(16, 9, SeedSource::Fixed(3)).unwrap();
    let mut bytes = vec![0u8; 16 * 9 * 4];

    integrator::render_frame(&scene, &camera, &mut state, &mut bytes, ChannelOrder::Rgba);

    assert!(state.metadata.iter().all(|&m| m == META_MISS));
    assert!(state.output.iter().all(|&c| c == background));
    let expected = [
        integrator::to_byte(background.x),
        integrator::to_byte(background.y),
        integrator::to_byte(background.z),
        255,
    ];
    assert!(bytes.chunks_exact(4).all(|p| p == expected));
}

#[test]
fn every_mode_renders_the_empty_scene_as_background() {
    for mode in [RenderMode::Combined, RenderMode::GlobalIllumination, RenderMode::DirectLighting] {
        let camera = Camera::default().with_resolution(4, 4).with_mode(mode);
        let mut renderer = Renderer::new(ScenePacker::new(), SeedSource::Fixed(0));
        let frame = renderer.render_frame(&camera).unwrap().unwrap();
        assert!(frame.linear.iter().all(|&c| c == camera.settings().no_hit_color));
    }
}

#[test]
fn packed_arrays_round_trip() {
    let mut packer = ScenePacker::new();
    let mut hosts = Vec::new();
    for i in 0..8 {
        let material = if i % 3 == 0 {
            MaterialData::light(Vec3A::splat(i as f32 / 8.0))
        } else {
            MaterialData::glass(Vec3A::ONE, 1.0 + i as f32 / 10.0)
        };
        let m = packer.add_material(material);
        let sphere = Sphere::new(Vec3A::new(i as f32, 0.0, -3.0), 0.5 + i as f32, m);
        packer.add_sphere(sphere).unwrap();
        hosts.push((sphere, material));
    }

    let scene = packer.packed_scene();
    assert_eq!(scene.spheres.len(), hosts.len() + 1);
    assert_eq!(scene.materials.len(), hosts.len() + 1);
    for (i, (sphere, material)) in hosts.iter().enumerate() {
        let packed = &scene.spheres[i + 1];
        assert_eq!(packed.center(), sphere.center);
        assert_eq!(packed.radius, sphere.radius);
        assert_eq!(packed.radius_squared, sphere.radius * sphere.radius);
        assert_eq!(packed.material_index as usize, sphere.material_index);
        assert_eq!(scene.materials[sphere.material_index], material.to_device());
    }
    assert_eq!(scene.light_ids(), &[1, 4, 7]);
}

#[test]
fn temporal_accumulation_restarts_after_a_move() {
    let mut renderer = Renderer::new(lit_sphere_scene(), SeedSource::Fixed(8));
    let camera = looking_at_origin(8, 8);
    for _ in 0..5 {
        renderer.render_frame(&camera).unwrap();
    }
    assert_eq!(renderer.frame_state().unwrap().ticks_since_movement, 5);

    let moved = camera.moved(Vec3A::new(0.5, 0.0, 0.0), Vec3A::ZERO);
    renderer.reset_accumulation();
    let frame = renderer.render_frame(&moved).unwrap().unwrap();
    let state = renderer.frame_state().unwrap();
    assert_eq!(frame.linear, state.output);
    assert_eq!(state.ticks_since_movement, 1);
}

#[test]
fn render_thread_lifecycle() {
    let mut scene = SceneDescription::new(CameraSettings {
        origin: Vec3A::new(0.0, 0.0, 5.0),
        look_at: Vec3A::ZERO,
        width: 12,
        height: 8,
        ..Default::default()
    });
    scene.add_sphere_and_material(Vec3A::ZERO, 1.0, MaterialData::diffuse(Vec3A::ONE));
    scene.add_sphere_and_material(Vec3A::new(0.0, 10.0, 10.0), 1.0, MaterialData::light(Vec3A::ONE));

    let handle = RenderHandle::spawn(
        scene.clone(),
        RenderSettings {
            fps: 0.0,
            seed: SeedSource::Fixed(1),
            order: ChannelOrder::Rgba,
            max_frames: None,
        },
    )
    .unwrap();

    let frame = handle.next_frame(Duration::from_secs(10)).expect("first frame");
    assert_eq!((frame.width, frame.height), (12, 8));
    assert_eq!(frame.pixels.len(), 12 * 8 * 4);

    handle.set_mode(1).unwrap();
    assert!(handle.set_mode(7).is_err());
    handle.resize(6, 4);
    assert_eq!(handle.camera().width(), 6);

    let resized = (0..200)
        .filter_map(|_| handle.next_frame(Duration::from_secs(10)))
        .find(|f| f.width == 6)
        .expect("resized frame");
    assert_eq!(resized.pixels.len(), 6 * 4 * 4);

    handle.move_camera(Vec3A::new(0.0, 1.0, 0.0), Vec3A::ZERO);
    let returned = handle.join().unwrap();
    assert_eq!(returned.objects, scene.objects);
    assert_eq!(returned.camera.width, 6);
    assert_eq!(returned.camera.mode, RenderMode::GlobalIllumination);
    assert_eq!(returned.camera.origin, Vec3A::new(0.0, 1.0, 5.0));
}

#[test]
fn bounded_run_delivers_its_last_frame() {
    let scene = SceneDescription::new(CameraSettings {
        width: 4,
        height: 4,
        ..Default::default()
    });
    let handle = RenderHandle::spawn(
        scene,
        RenderSettings {
            fps: 0.0,
            seed: SeedSource::Fixed(2),
            order: ChannelOrder::Bgra,
            max_frames: Some(3),
        },
    )
    .unwrap();

    let frames: Vec<_> = handle.frames().iter().collect();
    assert!(frames.last().is_some_and(|f| f.index == 2));
    handle.join().unwrap();
}
