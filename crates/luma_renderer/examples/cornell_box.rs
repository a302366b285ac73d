//! Cornell box example.
//!
//! Renders the classic Cornell box with a glass tall block and writes the
//! image to the configured output path.
//!
//! Usage: `cargo run --release --example cornell_box [config.json]`

use std::sync::Arc;

use anyhow::Context;
use luma_renderer::{
    Color, Fresnel, Material, MaterialKind, Mesh, RenderConfig, Renderer, Scene, Sphere, Vec3,
};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => RenderConfig::load(&path)
            .with_context(|| format!("failed to load render config {}", path))?,
        None => RenderConfig::default(),
    };
    config.validate()?;

    let start = std::time::Instant::now();
    let scene = build_scene(&config)?;
    log::info!("Scene built in {:?}", start.elapsed());

    let renderer = Renderer::from_config(config.clone());
    let start = std::time::Instant::now();
    renderer
        .render_to_file(&scene, config.multi_thread, config.multisampling, &config.output)
        .context("render failed")?;
    log::info!("Rendered in {:?}", start.elapsed());

    Ok(())
}

fn v(x: f32, y: f32, z: f32) -> Vec3 {
    Vec3::new(x, y, z)
}

fn build_scene(config: &RenderConfig) -> anyhow::Result<Scene> {
    let mut scene = Scene::from_config(config);
    let split = config.split_method;

    let red = Arc::new(Material::diffuse(Color::new(0.63, 0.065, 0.05)));
    let green = Arc::new(Material::diffuse(Color::new(0.14, 0.45, 0.091)));
    let white = Arc::new(Material::diffuse(Color::new(0.725, 0.71, 0.68)));
    let orange = Arc::new(Material::diffuse(Color::new(1.0, 0.64, 0.0)));
    let purple = Arc::new(Material::diffuse(Color::new(0.137, 0.0, 0.4509)));
    let light = Arc::new(Material::emissive(
        Color::splat(0.65),
        8.0 * Color::new(0.747 + 0.058, 0.747 + 0.258, 0.747)
            + 15.6 * Color::new(0.740 + 0.287, 0.740 + 0.160, 0.740)
            + 18.4 * Color::new(0.737 + 0.642, 0.737 + 0.159, 0.737),
    ));
    let glass = Arc::new(
        Material::new(MaterialKind::FresnelSpecular)
            .with_ior(Color::splat(2.1))
            .with_fresnel(Fresnel::Dielectric { eta: 2.1 }),
    );

    // Floor, ceiling and back wall
    scene.add(Mesh::from_quads(
        &[
            [
                v(552.8, 0.0, 0.0),
                v(0.0, 0.0, 0.0),
                v(0.0, 0.0, 559.2),
                v(549.6, 0.0, 559.2),
            ],
            [
                v(556.0, 548.8, 0.0),
                v(556.0, 548.8, 559.2),
                v(0.0, 548.8, 559.2),
                v(0.0, 548.8, 0.0),
            ],
            [
                v(549.6, 0.0, 559.2),
                v(0.0, 0.0, 559.2),
                v(0.0, 548.8, 559.2),
                v(556.0, 548.8, 559.2),
            ],
        ],
        white,
        split,
    ));
    scene.add(Mesh::quad(
        v(552.8, 0.0, 0.0),
        v(549.6, 0.0, 559.2),
        v(556.0, 548.8, 559.2),
        v(556.0, 548.8, 0.0),
        red,
    ));
    scene.add(Mesh::quad(
        v(0.0, 0.0, 559.2),
        v(0.0, 0.0, 0.0),
        v(0.0, 548.8, 0.0),
        v(0.0, 548.8, 559.2),
        green,
    ));
    scene.add(Mesh::quad(
        v(343.0, 548.7, 227.0),
        v(343.0, 548.7, 332.0),
        v(213.0, 548.7, 332.0),
        v(213.0, 548.7, 227.0),
        light,
    ));

    scene.add(Mesh::from_quads(
        &[
            [
                v(130.0, 165.0, 65.0),
                v(82.0, 165.0, 225.0),
                v(240.0, 165.0, 272.0),
                v(290.0, 165.0, 114.0),
            ],
            [
                v(290.0, 0.0, 114.0),
                v(290.0, 165.0, 114.0),
                v(240.0, 165.0, 272.0),
                v(240.0, 0.0, 272.0),
            ],
            [
                v(130.0, 0.0, 65.0),
                v(130.0, 165.0, 65.0),
                v(290.0, 165.0, 114.0),
                v(290.0, 0.0, 114.0),
            ],
            [
                v(82.0, 0.0, 225.0),
                v(82.0, 165.0, 225.0),
                v(130.0, 165.0, 65.0),
                v(130.0, 0.0, 65.0),
            ],
            [
                v(240.0, 0.0, 272.0),
                v(240.0, 165.0, 272.0),
                v(82.0, 165.0, 225.0),
                v(82.0, 0.0, 225.0),
            ],
        ],
        orange,
        split,
    ));
    scene.add(Mesh::from_quads(
        &[
            [
                v(423.0, 330.0, 247.0),
                v(265.0, 330.0, 296.0),
                v(314.0, 330.0, 456.0),
                v(472.0, 330.0, 406.0),
            ],
            [
                v(423.0, 0.0, 247.0),
                v(423.0, 330.0, 247.0),
                v(472.0, 330.0, 406.0),
                v(472.0, 0.0, 406.0),
            ],
            [
                v(472.0, 0.0, 406.0),
                v(472.0, 330.0, 406.0),
                v(314.0, 330.0, 456.0),
                v(314.0, 0.0, 456.0),
            ],
            [
                v(314.0, 0.0, 456.0),
                v(314.0, 330.0, 456.0),
                v(265.0, 330.0, 296.0),
                v(265.0, 0.0, 296.0),
            ],
            [
                v(265.0, 0.0, 296.0),
                v(265.0, 330.0, 296.0),
                v(423.0, 330.0, 247.0),
                v(423.0, 0.0, 247.0),
            ],
        ],
        glass,
        split,
    ));

    scene.add(Sphere::new(v(400.0, 25.0, 140.0), 25.0, purple));

    scene.build_bvh()?;
    log::info!(
        "Cornell box: {} primitives, {} emitters",
        scene.len(),
        scene.emitter_count()
    );
    Ok(scene)
}
