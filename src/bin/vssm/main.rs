//! vssm CLI - render the soft-shadow demo scene offscreen.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use glam::Vec3;
use tracing_subscriber::prelude::*;

use vssm::camera::CameraParams;
use vssm::light::Light;
use vssm::renderer::{FrameContext, GpuContext, Renderer, RendererConfig, FINAL_SAT_INDEX};
use vssm::scene::Scene;
use vssm::settings::Settings;
use vssm::shadow::{brute_force_sum, ShadowMode, SummedAreaTable, TexelRect};

/// Largest accepted GPU/CPU SAT disagreement, relative to the entry magnitude
const SAT_TOLERANCE: f32 = 1e-4;

/// Parsed command-line options shared by all commands
#[derive(Debug, Default)]
struct Options {
    config: Option<PathBuf>,
    mode: Option<ShadowMode>,
    light_width: Option<f32>,
    light_kind: Option<String>,
    light_pos: Option<Vec3>,
    size: Option<(u32, u32)>,
    map_size: Option<u32>,
    out: Option<PathBuf>,
    no_overlay: bool,
    no_marker: bool,
    save: bool,
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    // Global flags
    let mut level = log::LevelFilter::Info;
    let mut rest: Vec<&str> = Vec::new();
    for arg in &args {
        match arg.as_str() {
            "-v" | "--verbose" => level = log::LevelFilter::Debug,
            "-vv" | "--trace" => level = log::LevelFilter::Trace,
            "-q" | "--quiet" => level = log::LevelFilter::Error,
            _ => rest.push(arg),
        }
    }

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
    let _trace_guard = init_tracing();

    if rest.is_empty() {
        print_help();
        return;
    }

    if let Err(e) = run(&rest) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &[&str]) -> Result<()> {
    let (command, tail) = (args[0], &args[1..]);
    match command {
        "r" | "render" => cmd_render(&parse_options(tail)?),
        "cmp" | "compare" => cmd_compare(&parse_options(tail)?),
        "m" | "moments" => cmd_moments(&parse_options(tail)?),
        "verify" => cmd_verify(&parse_options(tail)?),
        "c" | "config" => cmd_config(&parse_options(tail)?),
        "h" | "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        "-V" | "--version" => {
            print_version();
            Ok(())
        }
        other => {
            print_help();
            bail!("unknown command '{}'", other)
        }
    }
}

fn parse_options(args: &[&str]) -> Result<Options> {
    let mut opts = Options::default();
    let mut iter = args.iter();
    while let Some(&arg) = iter.next() {
        let mut value = || {
            iter.next()
                .copied()
                .with_context(|| format!("missing value for {}", arg))
        };
        match arg {
            "--config" => opts.config = Some(PathBuf::from(value()?)),
            "--mode" => opts.mode = Some(value()?.parse()?),
            "--light-width" => {
                let v = value()?;
                opts.light_width = Some(v.parse().with_context(|| format!("bad light width '{}'", v))?);
            }
            "--light" => opts.light_kind = Some(value()?.to_ascii_lowercase()),
            "--light-pos" => opts.light_pos = Some(parse_vec3(value()?)?),
            "--size" => opts.size = Some(parse_size(value()?)?),
            "--map-size" => {
                let v = value()?;
                opts.map_size = Some(v.parse().with_context(|| format!("bad map size '{}'", v))?);
            }
            "-o" | "--out" => opts.out = Some(PathBuf::from(value()?)),
            "--no-overlay" => opts.no_overlay = true,
            "--no-marker" => opts.no_marker = true,
            "--save" => opts.save = true,
            other => bail!("unknown option '{}'", other),
        }
    }
    Ok(opts)
}

fn parse_size(s: &str) -> Result<(u32, u32)> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .with_context(|| format!("size '{}' is not WIDTHxHEIGHT", s))?;
    Ok((
        w.trim().parse().with_context(|| format!("bad width in '{}'", s))?,
        h.trim().parse().with_context(|| format!("bad height in '{}'", s))?,
    ))
}

fn parse_vec3(s: &str) -> Result<Vec3> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("bad number in '{}'", s))?;
    match parts[..] {
        [x, y, z] => Ok(Vec3::new(x, y, z)),
        _ => bail!("position '{}' is not X,Y,Z", s),
    }
}

/// Settings file (or defaults) with command-line overrides applied.
fn effective_settings(opts: &Options) -> Result<Settings> {
    let mut settings = match &opts.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load(),
    };

    if let Some(mode) = opts.mode {
        settings.mode = mode;
    }
    if let Some(kind) = &opts.light_kind {
        let base = settings.light;
        let position = base.position().unwrap_or(Vec3::new(3.0, 2.5, 3.0));
        settings.light = match kind.as_str() {
            "point" => Light::point(position),
            "directional" | "dir" => Light::directional(Vec3::new(-1.0, -1.0, -1.0)),
            "spot" => Light::spot(position, settings.light_target - position),
            other => bail!("unknown light kind '{}' (point, directional, spot)", other),
        };
        settings.light.color = base.color;
        settings.light.width = base.width;
    }
    if let Some(position) = opts.light_pos {
        if settings.light.position().is_none() {
            log::warn!("--light-pos ignored: directional lights have no position");
        }
        settings.light.set_position(position);
    }
    if let Some(width) = opts.light_width {
        settings.light.width = width;
    }
    if let Some((w, h)) = opts.size {
        settings.width = w;
        settings.height = h;
    }
    if let Some(map_size) = opts.map_size {
        settings.shadow.map_size = map_size;
    }
    if opts.no_overlay {
        settings.show_debug_overlay = false;
    }
    if opts.no_marker {
        settings.show_light_marker = false;
    }

    settings.validate()?;
    Ok(settings)
}

/// GPU renderer loaded with the demo scene, plus the frame to render.
fn setup(settings: &Settings) -> Result<(Renderer, FrameContext)> {
    let ctx = GpuContext::headless().context("GPU initialisation failed")?;
    let config = RendererConfig {
        shadow: settings.shadow,
        light_frustum: settings.light_frustum,
        ..Default::default()
    };
    let mut renderer = Renderer::new(&ctx, config)?;
    renderer.show_debug_overlay = settings.show_debug_overlay;
    renderer.show_light_marker = settings.show_light_marker;
    renderer.clear_color = settings.clear_color;

    let mut scene = Scene::demo();
    scene.light = settings.light;
    scene.light_target = settings.light_target;
    renderer.load_scene(&scene);

    let aspect = settings.width as f32 / settings.height as f32;
    let frame = FrameContext::for_scene(&scene, CameraParams::demo(aspect), settings.mode);
    Ok((renderer, frame))
}

fn save_png(image: &image::RgbaImage, path: &Path) -> Result<()> {
    image
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("Wrote {} ({}x{})", path.display(), image.width(), image.height());
    Ok(())
}

fn cmd_render(opts: &Options) -> Result<()> {
    let settings = effective_settings(opts)?;
    let (mut renderer, frame) = setup(&settings)?;

    let start = Instant::now();
    let image = renderer.render_offscreen(&frame, settings.width, settings.height)?;
    log::info!(
        "Rendered {} light, mode {} in {:.1} ms",
        frame.light.kind.name(),
        frame.mode,
        start.elapsed().as_secs_f64() * 1000.0
    );

    let out = opts.out.clone().unwrap_or_else(|| PathBuf::from("vssm.png"));
    save_png(&image, &out)
}

/// All four modes in a 2x2 grid: basic, pcf / pcss, vssm.
fn cmd_compare(opts: &Options) -> Result<()> {
    let settings = effective_settings(opts)?;
    let (mut renderer, frame) = setup(&settings)?;

    let tile_w = (settings.width / 2).max(1);
    let tile_h = (settings.height / 2).max(1);
    let mut canvas = image::RgbaImage::new(tile_w * 2, tile_h * 2);

    for (i, mode) in ShadowMode::ALL.into_iter().enumerate() {
        let mode_frame = FrameContext {
            mode,
            frame_index: i as u64,
            ..frame
        };
        let tile = renderer.render_offscreen(&mode_frame, tile_w, tile_h)?;
        let x = (i as u32 % 2) * tile_w;
        let y = (i as u32 / 2) * tile_h;
        image::imageops::replace(&mut canvas, &tile, x as i64, y as i64);
        log::info!("Rendered tile {} ({})", i, mode);
    }

    let out = opts.out.clone().unwrap_or_else(|| PathBuf::from("compare.png"));
    save_png(&canvas, &out)
}

fn cmd_moments(opts: &Options) -> Result<()> {
    let settings = effective_settings(opts)?;
    let (mut renderer, frame) = setup(&settings)?;
    renderer.show_debug_overlay = false;
    renderer.render_offscreen(&frame, settings.width, settings.height)?;

    let moments = renderer.read_moments()?;
    let size = moments.size();
    let gray = image::GrayImage::from_raw(size, size, moments.depth_bytes())
        .context("moment map size mismatch")?;

    let out = opts.out.clone().unwrap_or_else(|| PathBuf::from("moments.png"));
    gray.save(&out)
        .with_context(|| format!("failed to write {}", out.display()))?;
    log::info!("Wrote {} ({}x{} depth channel)", out.display(), size, size);
    Ok(())
}

/// Check the GPU table against a CPU rebuild and brute-force window sums.
fn cmd_verify(opts: &Options) -> Result<()> {
    let settings = effective_settings(opts)?;
    let (mut renderer, frame) = setup(&settings)?;
    let (w, h) = (settings.width.min(800), settings.height.min(600));

    renderer.render_offscreen(&frame, w, h)?;
    let moments = renderer.read_moments()?;
    let gpu_sat = renderer.read_sat(FINAL_SAT_INDEX)?;
    let cpu_sat = SummedAreaTable::build_centred(&moments, gpu_sat.offset());

    let diff = gpu_sat
        .max_relative_difference(&cpu_sat)
        .context("GPU and CPU tables differ in size")?;
    println!("GPU vs CPU table:   max relative difference {:.3e}", diff);

    let size = moments.size() as i32;
    let mut worst_window = 0.0f64;
    for &(cx, cy, half) in &[(0, 0, 3), (size / 2, size / 2, 8), (size - 1, size - 1, 5), (size / 3, size / 4, 20)] {
        let Some(rect) = TexelRect::around((cx, cy), half, moments.size()) else {
            continue;
        };
        let expected = brute_force_sum(&moments, rect);
        let got = gpu_sat.rect_sum(rect);
        let err = (got[0] as f64 - expected[0]).abs() / (rect.area() as f64);
        worst_window = worst_window.max(err);
    }
    println!("Window means:       max error {:.3e}", worst_window);

    renderer.render_offscreen(&frame, w, h)?;
    let again = renderer.read_sat(FINAL_SAT_INDEX)?;
    let repeatable = again == gpu_sat;
    println!("Repeat frame:       {}", if repeatable { "identical" } else { "DIFFERENT" });

    if diff > SAT_TOLERANCE || worst_window > 1e-3 || !repeatable {
        bail!("summed-area table verification failed");
    }
    println!("OK");
    Ok(())
}

fn cmd_config(opts: &Options) -> Result<()> {
    let settings = effective_settings(opts)?;
    match Settings::path() {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no config directory"),
    }
    println!("{}", serde_json::to_string_pretty(&settings)?);
    if opts.save {
        settings.save()?;
        log::info!("Settings saved");
    }
    Ok(())
}

fn init_tracing() -> Option<tracing_chrome::FlushGuard> {
    if env::var("VSSM_TRACE").ok().as_deref() != Some("1") {
        return None;
    }

    let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .file("trace.json")
        .build();

    let subscriber = tracing_subscriber::registry().with(chrome_layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }

    Some(guard)
}

fn print_version() {
    let date = option_env!("VSSM_BUILD_DATE").unwrap_or("unknown");
    let time = option_env!("VSSM_BUILD_TIME").unwrap_or("unknown");
    println!("vssm {} (built {} {})", env!("CARGO_PKG_VERSION"), date, time);
}

fn print_help() {
    println!("vssm - variance soft shadow mapping demo");
    println!();
    println!("USAGE:");
    println!("    vssm [FLAGS] <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    r, render       Render the demo scene to PNG");
    println!("    cmp, compare    Render all four shadow modes in a 2x2 grid");
    println!("    m, moments      Dump the light's depth moments as a grayscale PNG");
    println!("    verify          Check the GPU summed-area table against the CPU");
    println!("    c, config       Print the effective settings (--save to persist)");
    println!("    h, help         Show this help");
    println!();
    println!("OPTIONS:");
    println!("    --mode <m>           basic, pcf, pcss, vssm (or 0-3)");
    println!("    --light <kind>       point, directional, spot");
    println!("    --light-pos <x,y,z>  Point or spot light position");
    println!("    --light-width <w>    Light size in shadow-map texels");
    println!("    --size <WxH>         Output size (default 1600x1200)");
    println!("    --map-size <n>       Shadow map edge, power of two");
    println!("    -o, --out <file>     Output path");
    println!("    --config <file>      Load settings from file");
    println!("    --no-overlay         Hide the moment-map overlay");
    println!("    --no-marker          Hide the light marker");
    println!();
    println!("FLAGS:");
    println!("    -v, --verbose    Debug logging");
    println!("    -vv, --trace     Trace logging");
    println!("    -q, --quiet      Errors only");
    println!("    -V, --version    Print version");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG         Overrides the log filter");
    println!("    VSSM_TRACE=1     Write a Chrome trace to trace.json");
    println!();
    println!("EXAMPLES:");
    println!("    vssm render --mode vssm --light-width 80");
    println!("    vssm compare --size 1600x1200 -o modes.png");
    println!("    vssm verify --map-size 512");
}

#[cfg(test)]
mod tests {
    use super::*;
    use vssm::light::LightKind;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1600x1200").unwrap(), (1600, 1200));
        assert_eq!(parse_size("64X32").unwrap(), (64, 32));
        assert!(parse_size("1600").is_err());
        assert!(parse_size("ax2").is_err());
    }

    #[test]
    fn test_parse_options() {
        let opts = parse_options(&["--mode", "pcss", "--light-width", "20", "--no-overlay"]).unwrap();
        assert_eq!(opts.mode, Some(ShadowMode::Pcss));
        assert_eq!(opts.light_width, Some(20.0));
        assert!(opts.no_overlay);

        assert!(parse_options(&["--mode"]).is_err());
        assert!(parse_options(&["--bogus"]).is_err());
        assert!(parse_options(&["--mode", "soft"]).is_err());
    }

    #[test]
    fn test_parse_vec3() {
        assert_eq!(parse_vec3("1, 2.5,-3").unwrap(), Vec3::new(1.0, 2.5, -3.0));
        assert!(parse_vec3("1,2").is_err());
        assert!(parse_vec3("1,2,z").is_err());
    }

    #[test]
    fn test_light_position_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        Settings::default().save_to(&path).unwrap();

        let opts = parse_options(&["--config", path.to_str().unwrap(), "--light-pos", "0,6,1"]).unwrap();
        let settings = effective_settings(&opts).unwrap();
        assert_eq!(settings.light.position(), Some(Vec3::new(0.0, 6.0, 1.0)));
    }

    #[test]
    fn test_light_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        Settings::default().save_to(&path).unwrap();

        let opts = Options {
            config: Some(path),
            light_kind: Some("spot".into()),
            light_width: Some(12.0),
            ..Default::default()
        };
        let settings = effective_settings(&opts).unwrap();
        assert!(matches!(settings.light.kind, LightKind::Spot { .. }));
        assert_eq!(settings.light.width, 12.0);
    }
}
