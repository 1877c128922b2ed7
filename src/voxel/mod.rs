use glam::IVec3;
use hashbrown::HashMap;
use log::{debug, warn};

pub mod types;
pub mod mesh;
pub mod palette;
pub mod asset;
pub mod object;
pub mod reveal;
pub mod procedural;

use types::Voxel;

// Sparse voxel storage keyed by grid position.
// The key of every entry always equals the voxel's own position.
#[derive(Clone, Debug, Default)]
pub struct VoxelMap {
    voxels: HashMap<IVec3, Voxel>,
}

impl VoxelMap {
    pub fn new() -> Self {
        Self {
            voxels: HashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            voxels: HashMap::with_capacity(capacity),
        }
    }

    // Bulk population; a position that is already taken keeps its first voxel
    pub fn from_voxels<I>(voxels: I) -> Self
    where
        I: IntoIterator<Item = Voxel>,
    {
        let iter = voxels.into_iter();
        let mut map = Self::with_capacity(iter.size_hint().0);
        let mut duplicates = 0usize;

        for voxel in iter {
            if !map.insert(voxel) {
                duplicates += 1;
            }
        }

        if duplicates > 0 {
            warn!("Ignored {} voxels with duplicate positions", duplicates);
        }
        debug!("Built voxel map with {} voxels", map.len());

        map
    }

    /// Adds a voxel. Returns false and leaves the map unchanged when the
    /// position is already occupied.
    pub fn insert(&mut self, voxel: Voxel) -> bool {
        if self.voxels.contains_key(&voxel.position) {
            return false;
        }
        self.voxels.insert(voxel.position, voxel);
        true
    }

    pub fn remove(&mut self, position: IVec3) -> Option<Voxel> {
        self.voxels.remove(&position)
    }

    pub fn get(&self, position: IVec3) -> Option<&Voxel> {
        self.voxels.get(&position)
    }

    pub fn contains(&self, position: IVec3) -> bool {
        self.voxels.contains_key(&position)
    }

    pub fn is_active(&self, position: IVec3) -> bool {
        self.voxels.get(&position).map_or(false, |v| v.active)
    }

    pub fn set_active(&mut self, position: IVec3, active: bool) -> bool {
        match self.voxels.get_mut(&position) {
            Some(voxel) => {
                voxel.active = active;
                true
            }
            None => false,
        }
    }

    pub fn set_color(&mut self, position: IVec3, color_index: u8) -> bool {
        match self.voxels.get_mut(&position) {
            Some(voxel) => {
                voxel.color_index = color_index;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.voxels.values().filter(|v| v.active).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Voxel> {
        self.voxels.values()
    }

    // Inclusive bounds of all stored positions
    pub fn bounds(&self) -> Option<(IVec3, IVec3)> {
        let mut positions = self.voxels.keys();
        let first = *positions.next()?;
        Some(positions.fold((first, first), |(min, max), pos| (min.min(*pos), max.max(*pos))))
    }
}
