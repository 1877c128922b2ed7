use std::sync::Arc;
use glam::{IVec3, Vec3};
use log::{debug, info, warn};

use crate::config::{MeshConfig, WorldConfig};
use crate::rendering::MeshHandle;
use crate::voxel::VoxelMap;
use crate::voxel::asset::VoxelAsset;
use crate::voxel::mesh::{active_limit, MeshCompiler};
use crate::voxel::palette::{Palette, VoxelColoring};
use crate::voxel::types::Voxel;
use crate::utils::world_to_grid;

// Grid cells derived from a raycast hit against the object's surface
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BuildTarget {
    // Existing voxel behind the hit surface
    pub hit: Option<IVec3>,
    // Empty cell in front of the hit surface
    pub place: IVec3,
}

/// A voxel map placed in the world together with its compiled mesh.
pub struct VoxelObject {
    map: Option<VoxelMap>,
    palette: Option<Arc<Palette>>,
    compiler: MeshCompiler,
    world: WorldConfig,
    use_palette_colors: bool,
    only_active: bool,
    requested_active: i64,
    mesh: Option<MeshHandle>,
    enabled: bool,
}

impl VoxelObject {
    pub fn new(mesh_config: MeshConfig, world: WorldConfig) -> Self {
        let mut object = Self {
            map: None,
            palette: None,
            compiler: MeshCompiler::new(mesh_config, VoxelColoring::Grayscale),
            world,
            use_palette_colors: true,
            only_active: false,
            requested_active: -1,
            mesh: None,
            enabled: true,
        };
        object.refresh_coloring();
        object
    }

    pub fn with_palette_colors(mut self, use_palette_colors: bool) -> Self {
        self.use_palette_colors = use_palette_colors;
        self.refresh_coloring();
        self
    }

    // Limit compilation to the first `requested_active` voxels in reveal order
    pub fn with_only_active(mut self, only_active: bool) -> Self {
        self.only_active = only_active;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.map.is_some()
    }

    pub fn map(&self) -> Option<&VoxelMap> {
        self.map.as_ref()
    }

    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_deref()
    }

    pub fn mesh(&self) -> Option<&MeshHandle> {
        self.mesh.as_ref()
    }

    pub fn world(&self) -> &WorldConfig {
        &self.world
    }

    pub fn compiler(&self) -> &MeshCompiler {
        &self.compiler
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn only_active(&self) -> bool {
        self.only_active
    }

    pub fn requested_active(&self) -> i64 {
        self.requested_active
    }

    pub fn set_requested_active(&mut self, requested: i64) {
        self.requested_active = requested;
    }

    pub fn total_voxels(&self) -> usize {
        self.map.as_ref().map_or(0, |m| m.len())
    }

    pub fn total_active(&self) -> usize {
        self.map.as_ref().map_or(0, |m| m.active_count())
    }

    pub fn load_map(&mut self, map: VoxelMap) {
        self.map = Some(map);
        self.mesh = None;
        self.refresh_coloring();
    }

    pub fn load_asset(&mut self, asset: &VoxelAsset, generate_mesh: bool) {
        self.palette = asset.palette.clone().map(Arc::new);
        self.map = Some(asset.to_voxel_map());
        self.mesh = None;
        self.refresh_coloring();

        info!(
            "Loaded voxel object: {} voxels, palette: {}",
            self.total_voxels(),
            self.palette.is_some()
        );

        if generate_mesh {
            self.generate_mesh();
        }
    }

    pub fn unload(&mut self) {
        self.map = None;
        self.mesh = None;
    }

    pub fn set_palette(&mut self, palette: Option<Palette>) {
        self.palette = palette.map(Arc::new);
        self.refresh_coloring();
    }

    fn refresh_coloring(&mut self) {
        let coloring = match (&self.palette, self.use_palette_colors) {
            (_, false) => VoxelColoring::Grayscale,
            (Some(palette), true) => VoxelColoring::Palette(Arc::clone(palette)),
            (None, true) => {
                if self.map.is_some() {
                    warn!("Palette colors requested but no palette is assigned; using grayscale palette");
                }
                VoxelColoring::palette_default()
            }
        };
        self.compiler.set_coloring(coloring);
    }

    pub fn voxel_color(&self, voxel: &Voxel) -> [u8; 4] {
        self.compiler.coloring().color(voxel)
    }

    /// Recompiles the mesh. Does nothing while no map is loaded.
    pub fn generate_mesh(&mut self) -> Option<&MeshHandle> {
        let map = self.map.as_ref()?;

        let limit = if self.only_active {
            active_limit(self.requested_active)
        } else {
            None
        };

        let buffers = self.compiler.compile(map, limit);
        self.mesh = Some(MeshHandle::assemble(buffers));

        self.mesh.as_ref()
    }

    // World-space centre of a grid cell
    pub fn voxel_center(&self, position: IVec3) -> Vec3 {
        self.world.origin + (position.as_vec3() + Vec3::splat(0.5)) * self.world.scale
    }

    fn to_local(&self, world_point: Vec3) -> Vec3 {
        (world_point - self.world.origin) / self.world.scale
    }

    /// Offsets are applied along the normal in world units before the point
    /// is converted to grid cells.
    pub fn target_from_hit(&self, hit_point: Vec3, hit_normal: Vec3) -> BuildTarget {
        let behind = world_to_grid(self.to_local(hit_point - hit_normal * self.world.hit_adjustment));
        let hit = self
            .map
            .as_ref()
            .filter(|map| map.contains(behind))
            .map(|_| behind);

        let place = world_to_grid(self.to_local(hit_point + hit_normal * 0.5));

        BuildTarget { hit, place }
    }

    /// Places a voxel at an empty cell and regenerates the mesh. An object
    /// without a map starts an empty one.
    pub fn add_voxel(&mut self, voxel: Voxel) -> bool {
        let map = self.map.get_or_insert_with(VoxelMap::new);
        if !map.insert(voxel) {
            return false;
        }
        debug!("Added voxel at {:?}", voxel.position);
        self.generate_mesh();
        true
    }

    pub fn remove_voxel(&mut self, position: IVec3) -> Option<Voxel> {
        let removed = self.map.as_mut()?.remove(position)?;
        debug!("Removed voxel at {:?}", position);
        self.generate_mesh();
        Some(removed)
    }

    pub fn set_voxel_active(&mut self, position: IVec3, active: bool) -> bool {
        let changed = self.map.as_mut().map_or(false, |m| m.set_active(position, active));
        if changed {
            self.generate_mesh();
        }
        changed
    }

    pub fn set_voxel_color(&mut self, position: IVec3, color_index: u8) -> bool {
        let changed = self.map.as_mut().map_or(false, |m| m.set_color(position, color_index));
        if changed {
            self.generate_mesh();
        }
        changed
    }

    // Adds a voxel in front of the surface that was hit
    pub fn add_at_hit(&mut self, hit_point: Vec3, hit_normal: Vec3, color_index: u8) -> Option<IVec3> {
        let target = self.target_from_hit(hit_point, hit_normal);
        self.add_voxel(Voxel::new(target.place, color_index))
            .then_some(target.place)
    }

    pub fn remove_at_hit(&mut self, hit_point: Vec3, hit_normal: Vec3) -> Option<Voxel> {
        let target = self.target_from_hit(hit_point, hit_normal);
        self.remove_voxel(target.hit?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_object() -> VoxelObject {
        let mut object = VoxelObject::new(MeshConfig::default(), WorldConfig::default());
        object.load_map(VoxelMap::from_voxels([Voxel::new(IVec3::ZERO, 3)]));
        object
    }

    #[test]
    fn test_generate_mesh_requires_map() {
        let mut object = VoxelObject::new(MeshConfig::default(), WorldConfig::default());
        assert!(object.generate_mesh().is_none());
        assert!(object.mesh().is_none());

        let mut object = loaded_object();
        assert_eq!(object.generate_mesh().map(|m| m.vertex_count()), Some(24));
    }

    #[test]
    fn test_hit_on_top_face_targets() {
        let object = loaded_object();
        let target = object.target_from_hit(Vec3::new(0.5, 1.0, 0.5), Vec3::Y);
        assert_eq!(target.hit, Some(IVec3::ZERO));
        assert_eq!(target.place, IVec3::Y);

        let miss = object.target_from_hit(Vec3::new(3.5, 1.0, 0.5), Vec3::Y);
        assert_eq!(miss.hit, None);
        assert_eq!(miss.place, IVec3::new(3, 1, 0));
    }

    #[test]
    fn test_scaled_world_targets() {
        let world = WorldConfig {
            scale: 0.25,
            ..WorldConfig::default()
        };
        let mut object = VoxelObject::new(MeshConfig::default(), world);
        object.load_map(VoxelMap::from_voxels([Voxel::new(IVec3::ZERO, 3)]));

        // Top face of voxel (0,0,0) sits at world y = 0.25; offsets are world units
        let target = object.target_from_hit(Vec3::new(0.125, 0.25, 0.125), Vec3::Y);
        assert_eq!(target.hit, None);
        assert_eq!(target.place, IVec3::new(0, 3, 0));
    }

    #[test]
    fn test_scaled_world_targets_with_matching_adjustment() {
        let world = WorldConfig {
            scale: 0.25,
            origin: Vec3::new(10.0, 0.0, 0.0),
            hit_adjustment: 0.125,
        };
        let mut object = VoxelObject::new(MeshConfig::default(), world);
        object.load_map(VoxelMap::from_voxels([Voxel::new(IVec3::new(1, 0, 0), 3)]));

        // Side face of voxel (1,0,0) facing -X sits at world x = 10.25
        let target = object.target_from_hit(Vec3::new(10.25, 0.1, 0.1), -Vec3::X);
        assert_eq!(target.hit, Some(IVec3::new(1, 0, 0)));
        assert_eq!(target.place, IVec3::new(-1, 0, 0));
        assert_eq!(object.voxel_center(IVec3::new(1, 0, 0)), Vec3::new(10.375, 0.125, 0.125));
    }

    #[test]
    fn test_add_and_remove_at_hit_regenerates() {
        let mut object = loaded_object();

        assert_eq!(object.add_at_hit(Vec3::new(0.5, 1.0, 0.5), Vec3::Y, 9), Some(IVec3::Y));
        assert_eq!(object.mesh().map(|m| m.vertex_count()), Some(40));
        // Occupied cell
        assert!(!object.add_voxel(Voxel::new(IVec3::Y, 1)));

        let removed = object.remove_at_hit(Vec3::new(0.5, 2.0, 0.5), Vec3::Y);
        assert_eq!(removed.map(|v| v.color_index), Some(9));
        assert_eq!(object.mesh().map(|m| m.vertex_count()), Some(24));
    }

    #[test]
    fn test_missing_palette_falls_back_to_default() {
        let mut object = VoxelObject::new(MeshConfig::default(), WorldConfig::default());
        object.load_asset(&VoxelAsset::new(IVec3::ONE, vec![Voxel::new(IVec3::ZERO, 3)], None), true);
        assert!(object.compiler().coloring().samples_palette());
        assert_eq!(object.voxel_color(&Voxel::new(IVec3::ZERO, 3)), [3, 3, 3, 255]);

        let flat = VoxelObject::new(MeshConfig::default(), WorldConfig::default()).with_palette_colors(false);
        assert!(!flat.compiler().coloring().samples_palette());
    }

    #[test]
    fn test_only_active_limits_compilation() {
        let mut object = VoxelObject::new(MeshConfig::default(), WorldConfig::default()).with_only_active(true);
        object.load_map(VoxelMap::from_voxels([
            Voxel::new(IVec3::ZERO, 1),
            Voxel::new(IVec3::new(0, 5, 0), 1),
        ]));
        object.set_requested_active(1);
        assert_eq!(object.generate_mesh().map(|m| m.vertex_count()), Some(24));
        object.set_requested_active(-1);
        assert_eq!(object.generate_mesh().map(|m| m.vertex_count()), Some(48));
    }
}
