use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{info, warn};

use voxel_mesher::config::{CompileMode, MeshConfig, WorldConfig};
use voxel_mesher::voxel::asset::VoxelAsset;
use voxel_mesher::voxel::object::VoxelObject;
use voxel_mesher::voxel::procedural::IslandGenerator;
use voxel_mesher::voxel::reveal::RevealController;
use voxel_mesher::worker::MeshWorker;

// Number of reveal steps the demo walks through
const REVEAL_STEPS: usize = 8;

struct Options {
    seed: u32,
    radius: i32,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
}

impl Options {
    // voxel_mesher [seed] [radius] [--load PATH] [--save PATH]; VOXEL_SEED sets the default seed
    fn from_args() -> Result<Self> {
        let seed = match env::var("VOXEL_SEED") {
            Ok(value) => value.parse().context("VOXEL_SEED must be an unsigned integer")?,
            Err(_) => 12345,
        };

        let mut options = Self {
            seed,
            radius: 24,
            input: None,
            output: None,
        };

        let mut positional = 0;
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--load" => options.input = Some(args.next().context("--load needs a path")?.into()),
                "--save" => options.output = Some(args.next().context("--save needs a path")?.into()),
                value => {
                    match positional {
                        0 => options.seed = value.parse().context("seed must be an unsigned integer")?,
                        1 => options.radius = value.parse().context("radius must be an integer")?,
                        _ => warn!("Ignoring extra argument {}", value),
                    }
                    positional += 1;
                }
            }
        }

        Ok(options)
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let options = Options::from_args()?;

    let asset = match &options.input {
        Some(path) => VoxelAsset::load(path)?,
        None => {
            let start = Instant::now();
            let asset = IslandGenerator::new(options.seed).generate(options.radius, options.radius / 2);
            info!(
                "Generated island with {} voxels (seed {}) in {:?}",
                asset.voxels.len(),
                options.seed,
                start.elapsed()
            );
            asset
        }
    };

    if let Some(path) = &options.output {
        asset.save(path)?;
    }

    let mesh_config = MeshConfig::default().with_compile_mode(CompileMode::auto());
    info!("Compile mode: {}", mesh_config.compile_mode.as_str());

    // Full mesh in one go
    let mut full = VoxelObject::new(mesh_config, WorldConfig::default());
    full.load_asset(&asset, false);
    let start = Instant::now();
    if let Some(mesh) = full.generate_mesh() {
        info!(
            "Full mesh: {} vertices, {} triangles, {} submeshes, {:?} indices in {:?}",
            mesh.vertex_count(),
            mesh.index_count() / 3,
            mesh.submesh_count(),
            mesh.index_format,
            start.elapsed()
        );
    }

    // Progressive reveal, with the full mesh hidden once the reveal catches up
    let mut revealing = VoxelObject::new(mesh_config, WorldConfig::default()).with_only_active(true);
    revealing.load_asset(&asset, false);
    let mut controller = RevealController::new(revealing).with_companion(full, true);

    let total = controller.total();
    let step = (total / REVEAL_STEPS).max(1) as i64;
    while !controller.is_complete() {
        let start = Instant::now();
        controller.increment(step);
        let vertices = controller.object().mesh().map(|m| m.vertex_count()).unwrap_or(0);
        info!(
            "Revealed {}/{} voxels: {} vertices in {:?}",
            controller.current(),
            total,
            vertices,
            start.elapsed()
        );
    }
    info!(
        "Reveal complete, companion enabled: {}",
        controller.companion().map(|c| c.is_enabled()).unwrap_or(false)
    );

    // Same compile off the calling thread
    if let Some(map) = controller.object().map() {
        let mut worker = MeshWorker::new(controller.object().compiler().clone());
        let snapshot = Arc::new(map.clone());
        if let Some(id) = worker.submit(snapshot, Some(total / 2)) {
            match worker.recv_timeout(Duration::from_secs(30)) {
                Some(result) => info!(
                    "Background compile {} finished with {} vertices",
                    id,
                    result.mesh.vertex_count()
                ),
                None => warn!("Background compile {} did not finish", id),
            }
        }
    }

    Ok(())
}
