use std::fs;
use std::path::Path;
use anyhow::{bail, ensure, Context, Result};
use glam::IVec3;
use log::{debug, info};
use lz4::block::{compress, decompress};
use serde::{Serialize, Deserialize};

use crate::voxel::VoxelMap;
use crate::voxel::palette::Palette;
use crate::voxel::types::Voxel;

const ASSET_MAGIC: &[u8; 4] = b"VXA1";

// Serialized voxel list used to bulk-populate a voxel object
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VoxelAsset {
    pub size: IVec3,
    pub voxels: Vec<Voxel>,
    pub palette: Option<Palette>,
}

impl VoxelAsset {
    pub fn new(size: IVec3, voxels: Vec<Voxel>, palette: Option<Palette>) -> Self {
        Self { size, voxels, palette }
    }

    // Snapshot of a map; size covers the map's bounds measured from the origin
    pub fn from_map(map: &VoxelMap, palette: Option<Palette>) -> Self {
        let mut voxels: Vec<Voxel> = map.iter().copied().collect();
        voxels.sort_unstable_by_key(|v| Voxel::reveal_key(v.position));

        let size = map
            .bounds()
            .map(|(_, max)| (max + IVec3::ONE).max(IVec3::ZERO))
            .unwrap_or(IVec3::ZERO);

        Self { size, voxels, palette }
    }

    pub fn to_voxel_map(&self) -> VoxelMap {
        VoxelMap::from_voxels(self.voxels.iter().copied())
    }

    // Colour at a position, 0 when empty
    pub fn color_at(&self, position: IVec3) -> u8 {
        self.voxels
            .iter()
            .find(|v| v.position == position)
            .map_or(0, |v| v.color_index)
    }

    /// Dense colour grid indexed `x + y * size.x + z * size.x * size.y`.
    /// Voxels outside `size` are dropped.
    pub fn to_grid(&self) -> Vec<u8> {
        let size = self.size.max(IVec3::ZERO);
        let mut grid = vec![0u8; (size.x * size.y * size.z) as usize];

        for voxel in &self.voxels {
            let p = voxel.position;
            if p.cmplt(IVec3::ZERO).any() || p.cmpge(size).any() {
                continue;
            }
            let index = (p.x + p.y * size.x + p.z * size.x * size.y) as usize;
            grid[index] = voxel.color_index;
        }

        grid
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let encoded = bincode::serialize(self).context("failed to encode voxel asset")?;
        let compressed = compress(&encoded, None, true).context("failed to compress voxel asset")?;

        let mut bytes = Vec::with_capacity(ASSET_MAGIC.len() + compressed.len());
        bytes.extend_from_slice(ASSET_MAGIC);
        bytes.extend_from_slice(&compressed);

        debug!("Encoded {} voxels into {} bytes", self.voxels.len(), bytes.len());
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(bytes.len() >= ASSET_MAGIC.len(), "voxel asset is truncated");
        if &bytes[..ASSET_MAGIC.len()] != ASSET_MAGIC {
            bail!("not a voxel asset (bad header)");
        }

        let decompressed = decompress(&bytes[ASSET_MAGIC.len()..], None)
            .context("failed to decompress voxel asset")?;
        let asset: VoxelAsset = bincode::deserialize(&decompressed).context("failed to decode voxel asset")?;
        Ok(asset)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
        info!("Saved voxel asset with {} voxels to {}", self.voxels.len(), path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let asset = Self::from_bytes(&bytes).with_context(|| format!("invalid voxel asset {}", path.display()))?;
        info!("Loaded voxel asset with {} voxels from {}", asset.voxels.len(), path.display());
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_asset() -> VoxelAsset {
        let mut palette = Palette::grayscale();
        palette.set_color(7, [255, 0, 0, 255]);
        VoxelAsset::new(
            IVec3::new(2, 2, 1),
            vec![
                Voxel::new(IVec3::new(0, 0, 0), 7),
                Voxel::new(IVec3::new(1, 0, 0), 3).with_mesh_group(2),
                Voxel::new(IVec3::new(1, 1, 0), 5).with_active(false),
            ],
            Some(palette),
        )
    }

    #[test]
    fn test_bytes_round_trip() {
        let asset = sample_asset();
        let bytes = asset.to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"VXA1");
        assert_eq!(VoxelAsset::from_bytes(&bytes).unwrap(), asset);
    }

    #[test]
    fn test_corrupt_bytes_are_rejected() {
        assert!(VoxelAsset::from_bytes(b"VX").is_err());
        assert!(VoxelAsset::from_bytes(b"NOPE1234").is_err());

        let mut bytes = sample_asset().to_bytes().unwrap();
        bytes.truncate(bytes.len() / 2);
        assert!(VoxelAsset::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("voxel_asset_test_{}.vxa", std::process::id()));
        let asset = sample_asset();
        asset.save(&path).unwrap();
        let loaded = VoxelAsset::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, asset);
        assert!(VoxelAsset::load(&path).is_err());
    }

    #[test]
    fn test_map_conversion_and_grid() {
        let asset = sample_asset();
        let map = asset.to_voxel_map();
        assert_eq!(map.len(), 3);
        assert_eq!(map.active_count(), 2);

        let again = VoxelAsset::from_map(&map, None);
        assert_eq!(again.size, IVec3::new(2, 2, 1));
        assert_eq!(again.voxels.len(), 3);

        assert_eq!(asset.color_at(IVec3::new(1, 0, 0)), 3);
        assert_eq!(asset.color_at(IVec3::new(5, 5, 5)), 0);
        assert_eq!(asset.to_grid(), vec![7, 3, 0, 5]);
    }
}
