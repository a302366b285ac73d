//! Multi-pass renderer.
//!
//! Every sample per pixel is a full, independent pass over the image with its
//! own seeded generator. Passes run on a rayon pool in batches of the pool
//! size; the final image is the mean of all pass framebuffers.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use luma_math::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::config::check_russian_roulette;
use crate::{
    Camera, Color, PathIntegrator, ProgressBoard, RenderConfig, RenderError, RenderResult, Scene,
};

/// Framebuffer of linear radiance values.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl ImageBuffer {
    /// Create a new image buffer filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::ZERO; width as usize * height as usize],
        }
    }

    /// Get the pixel at (x, y).
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[self.index(x, y)]
    }

    /// Set the pixel at (x, y).
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        let index = self.index(x, y);
        self.pixels[index] = color;
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Gamma-encoded 8-bit RGB, row-major from the top-left corner.
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|color| color_to_rgb8(*color))
            .collect()
    }

    /// Write a binary PPM (P6).
    pub fn write_ppm<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write!(writer, "P6\n{} {}\n255\n", self.width, self.height)?;
        writer.write_all(&self.to_rgb8())?;
        writer.flush()
    }

    pub fn save_ppm<P: AsRef<Path>>(&self, path: P) -> RenderResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_ppm(&mut writer)?;
        Ok(())
    }

    /// Save to `path`; `.ppm` is written directly, other extensions go
    /// through the `image` crate.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> RenderResult<()> {
        let path = path.as_ref();
        let is_ppm = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("ppm"));

        if is_ppm {
            self.save_ppm(path)?;
        } else {
            let image = image::RgbImage::from_raw(self.width, self.height, self.to_rgb8())
                .ok_or_else(|| {
                    RenderError::InvalidConfig(format!(
                        "pixel buffer does not match {}x{}",
                        self.width, self.height
                    ))
                })?;
            image.save(path)?;
        }
        log::info!("Wrote {}", path.display());
        Ok(())
    }
}

/// Gamma curve applied to clamped radiance before quantization.
#[inline]
pub fn encode_channel(x: f32) -> u8 {
    (255.0 * x.clamp(0.0, 1.0).powf(0.6)) as u8
}

pub fn color_to_rgb8(color: Color) -> [u8; 3] {
    [
        encode_channel(color.x),
        encode_channel(color.y),
        encode_channel(color.z),
    ]
}

/// Zero out channels that are negative or not finite.
#[inline]
fn sanitize(color: Color) -> Color {
    Color::from_array(color.to_array().map(|c| if c.is_finite() && c > 0.0 { c } else { 0.0 }))
}

/// Pixels of one finished pass.
struct PassResult {
    pass: u32,
    pixels: Vec<Color>,
}

/// Renders a built scene into an averaged image.
#[derive(Debug, Clone)]
pub struct Renderer {
    config: RenderConfig,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::from_config(RenderConfig::default())
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn set_samples_per_pixel(&mut self, spp: u32) {
        self.config.samples_per_pixel = spp;
    }

    pub fn set_eye_position(&mut self, eye: Vec3) {
        self.config.eye = eye;
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.config.seed = Some(seed);
    }

    pub fn set_threads(&mut self, threads: usize) {
        self.config.threads = Some(threads);
    }

    /// Render `scene` and return the mean of all passes.
    ///
    /// Fails if the BVH has not been built, the settings are unusable, or a
    /// material cannot be evaluated.
    pub fn render(
        &self,
        scene: &Scene,
        use_multi_thread: bool,
        enable_multisampling: bool,
    ) -> RenderResult<ImageBuffer> {
        scene.ensure_built()?;
        let spp = self.config.samples_per_pixel;
        if spp == 0 {
            return Err(RenderError::InvalidConfig(
                "samples_per_pixel must be at least 1".to_string(),
            ));
        }
        check_russian_roulette(scene.russian_roulette)?;
        if scene.width == 0 || scene.height == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "resolution must be positive, got {}x{}",
                scene.width, scene.height
            )));
        }

        let camera = Camera::new(scene.width, scene.height)
            .with_fov(scene.fov)
            .with_eye(self.config.eye);
        let integrator = PathIntegrator::for_scene(scene);
        let base_seed = self.config.seed.unwrap_or_else(rand::random);
        let board = ProgressBoard::new(spp as usize);
        let job = PassJob {
            scene,
            camera,
            integrator,
            base_seed,
            multisampling: enable_multisampling,
            board: &board,
        };

        let threads = if use_multi_thread { self.thread_count() } else { 1 };
        log::info!(
            "Rendering {}x{} at {} spp (multisampling: {}, threads: {}, seed: {})",
            scene.width,
            scene.height,
            spp,
            enable_multisampling,
            threads,
            base_seed
        );

        let start = Instant::now();
        let mut sum = vec![Color::ZERO; scene.width as usize * scene.height as usize];
        let passes: Vec<u32> = (0..spp).collect();

        if use_multi_thread {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?;

            for (index, batch) in passes.chunks(threads).enumerate() {
                log::info!("Starting batch {} ({} passes)", index + 1, batch.len());
                let results: Vec<RenderResult<PassResult>> =
                    pool.install(|| batch.par_iter().map(|&pass| job.run(pass)).collect());
                for result in results {
                    accumulate(&mut sum, result?);
                }
            }
        } else {
            for &pass in &passes {
                accumulate(&mut sum, job.run(pass)?);
            }
        }

        let mut image = ImageBuffer::new(scene.width, scene.height);
        let scale = 1.0 / spp as f32;
        let rows = scene.height as usize;
        for (row, chunk) in sum.chunks(scene.width as usize).enumerate() {
            let offset = row * scene.width as usize;
            for (i, value) in chunk.iter().enumerate() {
                image.pixels[offset + i] = *value * scale;
            }
            board.update_combine((row + 1) as f32 / rows as f32);
        }

        log::info!(
            "Combined {} passes in {:.2}s",
            spp,
            start.elapsed().as_secs_f64()
        );
        Ok(image)
    }

    /// Render and write the image to `path`.
    pub fn render_to_file<P: AsRef<Path>>(
        &self,
        scene: &Scene,
        use_multi_thread: bool,
        enable_multisampling: bool,
        path: P,
    ) -> RenderResult<ImageBuffer> {
        let image = self.render(scene, use_multi_thread, enable_multisampling)?;
        image.save(path)?;
        Ok(image)
    }

    /// Worker count: the configured override or the detected parallelism.
    fn thread_count(&self) -> usize {
        self.config
            .threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

fn accumulate(sum: &mut [Color], result: PassResult) {
    for (total, value) in sum.iter_mut().zip(&result.pixels) {
        *total += *value;
    }
    log::debug!("Accumulated pass {}", result.pass);
}

/// Everything a pass needs, shared read-only by all workers.
struct PassJob<'a> {
    scene: &'a Scene,
    camera: Camera,
    integrator: PathIntegrator,
    base_seed: u64,
    multisampling: bool,
    board: &'a ProgressBoard,
}

impl PassJob<'_> {
    /// Render one full image with one estimate per pixel.
    fn run(&self, pass: u32) -> RenderResult<PassResult> {
        let mut rng = StdRng::seed_from_u64(self.base_seed.wrapping_add(pass as u64));
        let (width, height) = (self.camera.width, self.camera.height);
        let offsets = Camera::pixel_offsets(self.multisampling);
        let weight = 1.0 / offsets.len() as f32;

        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for j in 0..height {
            for i in 0..width {
                let mut color = Color::ZERO;
                for &offset in offsets {
                    let ray = self.camera.get_ray(i, j, offset);
                    let radiance = self.integrator.radiance(self.scene, &ray, &mut rng)?;
                    color += sanitize(radiance);
                }
                pixels.push(color * weight);
            }
            self.board
                .update_pass(pass as usize, (j + 1) as f32 / height as f32);
        }

        log::info!("Pass {} done", pass + 1);
        Ok(PassResult { pass, pixels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Material, Sphere};
    use std::sync::Arc;

    /// Camera enclosed by a black emitter: every path sees exactly `glow`.
    fn glowing_shell(glow: Color) -> Scene {
        let mut scene = Scene::new(6, 4);
        let shell = Arc::new(Material::emissive(Color::ZERO, glow));
        scene.add(Sphere::new(RenderConfig::default().eye, 50.0, shell));
        scene.build_bvh().unwrap();
        scene
    }

    fn renderer(spp: u32) -> Renderer {
        let config = RenderConfig::default().with_samples(spp).with_seed(42);
        Renderer::from_config(config)
    }

    #[test]
    fn test_encode_channel() {
        assert_eq!(encode_channel(-1.0), 0);
        assert_eq!(encode_channel(0.0), 0);
        assert_eq!(encode_channel(1.0), 255);
        assert_eq!(encode_channel(7.0), 255);
        // 0.5^0.6 = 0.6598
        assert_eq!(encode_channel(0.5), 168);
    }

    #[test]
    fn test_sanitize() {
        let color = sanitize(Color::new(f32::NAN, -2.0, 0.5));
        assert_eq!(color, Color::new(0.0, 0.0, 0.5));
        assert_eq!(sanitize(Color::splat(f32::INFINITY)), Color::ZERO);
    }

    #[test]
    fn test_constant_scene_averages_exactly() {
        let glow = Color::new(0.2, 0.4, 0.7);
        let scene = glowing_shell(glow);

        for spp in [1, 3, 8] {
            for (multi, msaa) in [(false, false), (true, false), (true, true)] {
                let image = renderer(spp).render(&scene, multi, msaa).unwrap();
                assert_eq!(image.pixels.len(), 24);
                for pixel in &image.pixels {
                    assert!((*pixel - glow).abs().max_element() < 1e-6, "{:?}", pixel);
                }
            }
        }
    }

    #[test]
    fn test_seeded_render_is_reproducible() {
        let mut scene = Scene::new(8, 8);
        let light = Arc::new(Material::emissive(Color::ONE, Color::splat(4.0)));
        let grey = Arc::new(Material::diffuse(Color::splat(0.5)));
        let eye = RenderConfig::default().eye;
        scene.add(Sphere::new(eye + Vec3::new(0.0, 0.0, 20.0), 5.0, grey));
        scene.add(Sphere::new(eye + Vec3::new(0.0, 15.0, 10.0), 3.0, light));
        scene.build_bvh().unwrap();

        let mut renderer = renderer(4);
        renderer.set_threads(2);
        let threaded = renderer.render(&scene, true, false).unwrap();
        let serial = renderer.render(&scene, false, false).unwrap();
        assert_eq!(threaded, serial);
        assert!(threaded.pixels.iter().any(|p| p.x > 0.0));
    }

    #[test]
    fn test_unbuilt_scene_is_rejected() {
        let mut scene = Scene::new(4, 4);
        scene.add(Sphere::new(Vec3::ZERO, 1.0, Arc::new(Material::diffuse(Color::ONE))));
        let err = renderer(1).render(&scene, false, false).unwrap_err();
        assert!(matches!(err, RenderError::BvhNotBuilt));
    }

    #[test]
    fn test_zero_samples_is_rejected() {
        let scene = glowing_shell(Color::ONE);
        let err = renderer(0).render(&scene, false, false).unwrap_err();
        assert!(matches!(err, RenderError::InvalidConfig(_)));
    }

    #[test]
    fn test_scene_without_path_termination_is_rejected() {
        // Camera inside a closed diffuse room lit by a tiny bulb: with a
        // continuation probability of 1 no path would ever end
        let mut scene = Scene::new(4, 4);
        let eye = RenderConfig::default().eye;
        let wall = Arc::new(Material::diffuse(Color::splat(0.7)));
        let bulb = Arc::new(Material::emissive(Color::ZERO, Color::ONE));
        scene.add(Sphere::new(eye, 10.0, wall));
        scene.add(Sphere::new(eye + Vec3::Y, 1e-3, bulb));
        scene.build_bvh().unwrap();

        for probability in [1.0, 5.0, 0.0, f32::NAN] {
            scene.russian_roulette = probability;
            let err = renderer(1).render(&scene, false, false).unwrap_err();
            assert!(matches!(err, RenderError::InvalidConfig(_)), "{}", probability);
        }

        scene.russian_roulette = 0.8;
        assert!(renderer(1).render(&scene, false, false).is_ok());
    }

    #[test]
    fn test_ppm_layout() {
        let mut image = ImageBuffer::new(2, 1);
        image.set(0, 0, Color::new(1.0, 0.0, 0.5));
        image.set(1, 0, Color::ONE);

        let mut bytes = Vec::new();
        image.write_ppm(&mut bytes).unwrap();
        let header = b"P6\n2 1\n255\n";
        assert_eq!(&bytes[..header.len()], header);
        assert_eq!(&bytes[header.len()..], &[255, 0, 168, 255, 255, 255]);
    }

    #[test]
    fn test_render_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let scene = glowing_shell(Color::splat(0.5));

        let ppm = dir.path().join("out.ppm");
        renderer(1).render_to_file(&scene, false, false, &ppm).unwrap();
        let bytes = std::fs::read(&ppm).unwrap();
        assert!(bytes.starts_with(b"P6\n6 4\n255\n"));
        assert_eq!(bytes.len(), b"P6\n6 4\n255\n".len() + 6 * 4 * 3);

        let png = dir.path().join("out.png");
        renderer(1).render_to_file(&scene, false, false, &png).unwrap();
        let decoded = image::open(&png).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (6, 4));
        assert_eq!(decoded.get_pixel(0, 0).0, [168, 168, 168]);
    }
}
