use glam::IVec3;
use noise::{NoiseFn, Perlin, Fbm, MultiFractal};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::voxel::VoxelMap;
use crate::voxel::asset::VoxelAsset;
use crate::voxel::palette::{MaterialType, Palette};
use crate::voxel::types::Voxel;

// Palette slots used by generated islands
pub const COLOR_STONE: u8 = 1;
pub const COLOR_DIRT: u8 = 2;
pub const COLOR_GRASS: u8 = 3;
pub const COLOR_SAND: u8 = 4;
pub const COLOR_WOOD: u8 = 6;
pub const COLOR_LEAVES: u8 = 7;

// Mesh groups: terrain, foliage
const GROUP_TERRAIN: u8 = 0;
const GROUP_FOLIAGE: u8 = 1;

/// Generates small island models for demos and benchmarks.
pub struct IslandGenerator {
    seed: u32,
    height_noise: Fbm<Perlin>,
    detail_noise: Perlin,
}

impl IslandGenerator {
    pub fn new(seed: u32) -> Self {
        let height_noise = Fbm::<Perlin>::new(seed)
            .set_octaves(4)
            .set_frequency(0.08)
            .set_persistence(0.5)
            .set_lacunarity(2.0);

        let detail_noise = Perlin::new(seed.wrapping_add(456));

        Self {
            seed,
            height_noise,
            detail_noise,
        }
    }

    pub fn palette() -> Palette {
        let mut palette = Palette::grayscale();
        palette.set_color(COLOR_STONE, [128, 128, 128, 255]);
        palette.set_color(COLOR_DIRT, [153, 76, 25, 255]);
        palette.set_color(COLOR_GRASS, [76, 178, 51, 255]);
        palette.set_color(COLOR_SAND, [230, 204, 153, 255]);
        palette.set_color(COLOR_WOOD, [128, 76, 25, 255]);
        palette.set_color(COLOR_LEAVES, [51, 128, 25, 230]);
        palette.set_material(COLOR_LEAVES, MaterialType::Glass);
        palette
    }

    pub fn generate(&self, radius: i32, max_height: i32) -> VoxelAsset {
        let mut voxels = Vec::new();
        let mut rng = Pcg32::seed_from_u64(self.seed as u64);

        for x in -radius..=radius {
            for z in -radius..=radius {
                let height = self.column_height(x, z, radius, max_height);
                if height < 0 {
                    continue;
                }

                for y in 0..=height {
                    voxels.push(Voxel::new(IVec3::new(x, y, z), self.column_color(y, height)));
                }

                // Occasional tree on grass
                if height > 1 && rng.gen::<f32>() < 0.03 {
                    self.generate_tree(IVec3::new(x, height + 1, z), &mut voxels);
                }
            }
        }

        // Trees may overlap terrain or each other; the map keeps one voxel per position
        let map = VoxelMap::from_voxels(voxels);
        VoxelAsset::from_map(&map, Some(Self::palette()))
    }

    // Height falls off towards the rim so the model stays an island
    fn column_height(&self, x: i32, z: i32, radius: i32, max_height: i32) -> i32 {
        let distance = ((x * x + z * z) as f64).sqrt() / radius.max(1) as f64;
        let falloff = 1.0 - distance;
        let noise = (self.height_noise.get([x as f64, z as f64]) + 1.0) * 0.5;
        let detail = self.detail_noise.get([x as f64 * 0.3, z as f64 * 0.3]) * 0.1;

        ((noise + detail) * falloff * max_height as f64).floor() as i32
    }

    fn column_color(&self, y: i32, height: i32) -> u8 {
        if y == height {
            if height <= 1 {
                COLOR_SAND
            } else {
                COLOR_GRASS
            }
        } else if y > height - 3 {
            COLOR_DIRT
        } else {
            COLOR_STONE
        }
    }

    fn generate_tree(&self, base: IVec3, voxels: &mut Vec<Voxel>) {
        let trunk_height = 3 + (self.detail_noise.get([base.x as f64 * 0.1, base.z as f64 * 0.1]).abs() * 3.0) as i32;

        for y in 0..trunk_height {
            voxels.push(Voxel::new(base + IVec3::new(0, y, 0), COLOR_WOOD).with_mesh_group(GROUP_TERRAIN));
        }

        let leaf_radius = 2;
        let top = base.y + trunk_height;
        for y in -1..=leaf_radius {
            for x in -leaf_radius..=leaf_radius {
                for z in -leaf_radius..=leaf_radius {
                    if x == 0 && z == 0 && y < 0 {
                        continue;
                    }
                    if x * x + y * y + z * z <= leaf_radius * leaf_radius {
                        let position = IVec3::new(base.x + x, top + y, base.z + z);
                        voxels.push(Voxel::new(position, COLOR_LEAVES).with_mesh_group(GROUP_FOLIAGE));
                    }
                }
            }
        }
    }
}
