use std::io::Write;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use head_tracker::config::TrackerConfig;
use head_tracker::{
    CameraFacing, OrientationTransform, PerformanceMode, Rotation, ScaleMode, ViewGeometry,
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "HEADTRACKER_CONFIG",
        "HEADTRACKER_BACKEND",
        "HEADTRACKER_CAMERA_FACING",
        "HEADTRACKER_DEVICE_ROTATION",
        "HEADTRACKER_VIEW_SIZE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "camera": {
            "facing": "front",
            "sensor_orientation": 270,
            "width": 800,
            "height": 600,
            "target_fps": 24
        },
        "detector": {
            "backend": "STUB",
            "performance_mode": "accurate",
            "min_face_size": 0.2,
            "tracking": true
        },
        "marker": {
            "radius_fraction": 0.05,
            "color": [0, 255, 0]
        },
        "view": { "width": 720, "height": 1280 }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("HEADTRACKER_CONFIG", file.path());
    std::env::set_var("HEADTRACKER_DEVICE_ROTATION", "90");
    std::env::set_var("HEADTRACKER_VIEW_SIZE", "1280x720");

    let cfg = TrackerConfig::load().expect("load config");

    assert_eq!(cfg.camera.facing, CameraFacing::Front);
    assert_eq!(cfg.camera.sensor_orientation, Rotation::Deg270);
    assert_eq!(cfg.camera.device_rotation, Rotation::Deg90);
    assert_eq!(cfg.camera.width, 800);
    assert_eq!(cfg.camera.height, 600);
    assert_eq!(cfg.camera.target_fps, 24);
    assert_eq!(cfg.frame_rotation(), Rotation::Deg0);
    assert_eq!(cfg.detector.backend, "stub");
    assert_eq!(cfg.detector.options.performance_mode, PerformanceMode::Accurate);
    assert_eq!(cfg.detector.options.min_face_size, 0.2);
    assert!(cfg.detector.options.tracking);
    assert_eq!(cfg.marker.radius_fraction, 0.05);
    assert_eq!(cfg.marker.color, [0, 255, 0]);
    assert_eq!(cfg.view, ViewGeometry::new(1280, 720));
    assert_eq!(
        cfg.orientation_transform(),
        OrientationTransform {
            swap_axes: false,
            mirror_x: true,
            mirror_y: false
        }
    );

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
        [camera]
        sensor_orientation = 0

        [mapping]
        scale_mode = "fit"

        [mapping.transform]
        swap_axes = true
        mirror_y = true
    "#;
    file.write_all(toml.as_bytes()).expect("write config");
    std::env::set_var("HEADTRACKER_CONFIG", file.path());
    std::env::set_var("HEADTRACKER_BACKEND", "cpu");

    let cfg = TrackerConfig::load().expect("load config");

    assert_eq!(cfg.frame_rotation(), Rotation::Deg0);
    assert_eq!(cfg.mapping.scale_mode, ScaleMode::Fit);
    let mapper = cfg.mapper();
    assert_eq!(mapper.scale_mode, ScaleMode::Fit);
    assert_eq!(
        mapper.transform_for(cfg.frame_rotation()),
        OrientationTransform {
            swap_axes: true,
            mirror_x: false,
            mirror_y: true
        }
    );
    assert_eq!(cfg.detector.backend, "cpu");

    clear_env();
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = TrackerConfig::load().expect("load config");
    assert_eq!(cfg.camera.facing, CameraFacing::Back);
    assert_eq!(cfg.camera.width, 640);
    assert_eq!(cfg.camera.height, 480);
    assert_eq!(cfg.frame_rotation(), Rotation::Deg90);
    assert_eq!(cfg.view, ViewGeometry::new(1080, 1920));
    assert_eq!(cfg.mapping.scale_mode, ScaleMode::Fill);
    assert!(!cfg.detector.options.tracking);

    clear_env();
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("HEADTRACKER_DEVICE_ROTATION", "45");
    assert!(TrackerConfig::load().is_err());
    clear_env();

    std::env::set_var("HEADTRACKER_CAMERA_FACING", "sideways");
    assert!(TrackerConfig::load().is_err());
    clear_env();

    std::env::set_var("HEADTRACKER_VIEW_SIZE", "0x720");
    assert!(TrackerConfig::load().is_err());
    clear_env();
}

#[test]
fn rejects_malformed_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(b"{ \"camera\": ").expect("write config");
    std::env::set_var("HEADTRACKER_CONFIG", file.path());
    assert!(TrackerConfig::load().is_err());

    clear_env();
}
