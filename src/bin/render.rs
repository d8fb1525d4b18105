//! softras-render: Render a vertex-colored demo mesh to PNG
//!
//! Usage:
//!   softras-render --out render.png
//!   softras-render --config render.json --camera-json camera.json --out render.png

use nalgebra::{Vector2, Vector3};
use softras_rs::core::{Meshes, PerspectiveCamera, PerspectiveCameras};
use softras_rs::render::{interpolate_vertex_colors, MeshRenderer};
use softras_rs::{MeshBlend, RenderConfig};
use std::error::Error;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();
    println!("softras-render v{}", softras_rs::VERSION);

    // Parse command-line arguments
    let mut args = std::env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut camera_json: Option<PathBuf> = None;
    let mut out_path = PathBuf::from("render.png");
    let mut blend_override: Option<MeshBlend> = None;
    let mut size_override: Option<usize> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = Some(PathBuf::from(required(&mut args, "--config"))),
            "--camera-json" => {
                camera_json = Some(PathBuf::from(required(&mut args, "--camera-json")))
            }
            "--out" => out_path = PathBuf::from(required(&mut args, "--out")),
            "--blend" => {
                let mode = required(&mut args, "--blend");
                let json = format!(r#"{{"mode": "{mode}"}}"#);
                match serde_json::from_str(&json) {
                    Ok(blend) => blend_override = Some(blend),
                    Err(_) => {
                        eprintln!("Error: --blend must be one of hard, sigmoid_alpha, softmax");
                        std::process::exit(1);
                    }
                }
            }
            "--size" => match required(&mut args, "--size").parse() {
                Ok(size) => size_override = Some(size),
                Err(_) => {
                    eprintln!("Error: --size must be a positive integer");
                    std::process::exit(1);
                }
            },
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                std::process::exit(1);
            }
        }
    }

    let mut config = match &config_path {
        Some(path) => {
            println!("Loading config from {:?}...", path);
            RenderConfig::load(path)?
        }
        None => RenderConfig::default(),
    };
    if let Some(blend) = blend_override {
        config.blend_mode = blend;
    }
    if let Some(size) = size_override {
        config.raster.image_size = size;
    }

    let camera = match &camera_json {
        Some(path) => {
            println!("Loading camera from {:?}...", path);
            serde_json::from_str::<PerspectiveCamera>(&std::fs::read_to_string(path)?)?
        }
        None => PerspectiveCamera::new(
            Vector2::new(1.5, 1.5),
            Vector2::zeros(),
            nalgebra::Matrix3::identity(),
            Vector3::new(0.0, 0.0, 3.0),
        ),
    };

    let (meshes, colors) = demo_scene();
    println!(
        "Rendering {}x{} ({:?}, K = {})...",
        config.raster.image_size,
        config.raster.image_size,
        config.blend_mode,
        config.raster.faces_per_pixel
    );

    let renderer = MeshRenderer::from_config(Some(PerspectiveCameras::single(camera)), &config)?;
    let image = renderer.render(&meshes, |frags, meshes| {
        interpolate_vertex_colors(frags, meshes, &colors)
    })?;

    println!("Saving to {:?}...", out_path);
    image.to_rgba8(0).save(&out_path)?;
    println!("Done!");
    Ok(())
}

fn required(args: &mut impl Iterator<Item = String>, flag: &str) -> String {
    match args.next() {
        Some(value) => value,
        None => {
            eprintln!("Error: missing value for {flag}");
            std::process::exit(1);
        }
    }
}

/// Two overlapping triangles at different depths with RGB vertex colors.
fn demo_scene() -> (Meshes, Vec<Vec<Vector3<f32>>>) {
    let verts = vec![
        // Near triangle
        Vector3::new(-0.8, -0.6, 0.0),
        Vector3::new(0.6, -0.6, 0.0),
        Vector3::new(-0.1, 0.8, 0.0),
        // Far triangle, shifted so both stay visible
        Vector3::new(-0.4, -0.9, 1.0),
        Vector3::new(1.2, -0.3, 1.0),
        Vector3::new(0.5, 1.1, 1.0),
    ];
    let colors = vec![
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(0.0, 0.0, 1.0),
        Vector3::new(1.0, 1.0, 0.0),
        Vector3::new(0.0, 1.0, 1.0),
        Vector3::new(1.0, 0.0, 1.0),
    ];
    (
        Meshes::single(verts, vec![[0, 1, 2], [3, 4, 5]]),
        vec![colors],
    )
}

fn print_help() {
    println!(
        r#"softras-render: Render a vertex-colored demo mesh

USAGE:
    softras-render [OPTIONS]

OPTIONS:
    --config PATH            Render config JSON (raster, blend, blend_mode)
    --camera-json PATH       Perspective camera as JSON [default: 3 units back, f = 1.5]
    --blend MODE             hard | sigmoid_alpha | softmax (overrides config)
    --size N                 Image size in pixels (overrides config)
    --out PATH               Output image path [default: render.png]
    --help, -h               Print this help message"#
    );
}
