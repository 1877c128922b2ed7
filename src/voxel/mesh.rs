use glam::{IVec3, Vec2, Vec3};
use hashbrown::HashSet;
use log::{debug, warn};
use rayon::prelude::*;

use crate::config::{CompileMode, MeshConfig, SubmeshMode};
use crate::rendering::resources::{index_format_for_vertex_count, IndexFormat};
use crate::voxel::VoxelMap;
use crate::voxel::palette::VoxelColoring;
use crate::voxel::types::{Direction, MeshGroup, Voxel, MESH_GROUP_COUNT};

// Face corner offsets inside the unit cube, indexed by Direction::index().
// Combined with FACE_TRIANGLES each face winds counter-clockwise seen from outside.
pub const FACE_VERTICES: [[Vec3; 4]; 6] = [
    // Up (+Y)
    [
        Vec3::new(0.0, 1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
    ],
    // Down (-Y)
    [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
        Vec3::new(1.0, 0.0, 1.0),
    ],
    // Left (-X)
    [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.0, 1.0, 1.0),
    ],
    // Right (+X)
    [
        Vec3::new(1.0, 0.0, 1.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(1.0, 1.0, 0.0),
    ],
    // Forward (+Z)
    [
        Vec3::new(0.0, 0.0, 1.0),
        Vec3::new(1.0, 0.0, 1.0),
        Vec3::new(0.0, 1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
    ],
    // Back (-Z)
    [
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
    ],
];

// Two triangles per face, relative to the face's first vertex
pub const FACE_TRIANGLES: [u32; 6] = [0, 1, 2, 2, 1, 3];

// Per-corner UVs used when not sampling the palette texture
pub const CORNER_UVS: [Vec2; 4] = [
    Vec2::new(1.0, 0.0),
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 1.0),
];

pub const PALETTE_WIDTH: usize = 256;

pub fn face_vertex_offset(direction: Direction, vertex_index: usize) -> Vec3 {
    FACE_VERTICES[direction.index()]
        .get(vertex_index)
        .copied()
        .unwrap_or(Vec3::ZERO)
}

/// Samples the centre of palette column `color_index` in a 256x1 texture.
pub fn palette_uv(color_index: u8) -> Vec2 {
    Vec2::new((color_index as f32 + 0.5) / PALETTE_WIDTH as f32, 0.5)
}

pub fn corner_uv(vertex_index: usize) -> Vec2 {
    CORNER_UVS.get(vertex_index).copied().unwrap_or(Vec2::ZERO)
}

/// Negative requests mean "every active voxel".
pub fn active_limit(requested: i64) -> Option<usize> {
    usize::try_from(requested).ok()
}

// Positions eligible for face emission in one compilation, in reveal order
#[derive(Clone, Debug, Default)]
pub struct ActiveSet {
    order: Vec<IVec3>,
    members: HashSet<IVec3>,
}

impl ActiveSet {
    pub fn select(map: &VoxelMap, limit: Option<usize>) -> Self {
        let mut order: Vec<IVec3> = map
            .iter()
            .filter(|voxel| voxel.active)
            .map(|voxel| voxel.position)
            .collect();

        // The key is a total order over unique positions, so an unstable sort is deterministic
        order.sort_unstable_by_key(|position| Voxel::reveal_key(*position));

        if let Some(limit) = limit {
            order.truncate(limit);
        }

        let members = order.iter().copied().collect();

        Self { order, members }
    }

    pub fn positions(&self) -> &[IVec3] {
        &self.order
    }

    pub fn contains(&self, position: IVec3) -> bool {
        self.members.contains(&position)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // A face is exposed unless an active neighbour covers it
    pub fn is_face_visible(&self, position: IVec3, direction: Direction) -> bool {
        !self.members.contains(&(position + direction.offset()))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubmeshIndices {
    // None when every face shares one list
    pub group: Option<MeshGroup>,
    pub indices: Vec<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Face {
    pub corners: [Vec3; 4],
    pub normal: Vec3,
}

// Output of one compilation. Scratch data: built fresh, assembled, then dropped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffers {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub submeshes: Vec<SubmeshIndices>,
}

impl MeshBuffers {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.vertices.len() / 4
    }

    pub fn index_count(&self) -> usize {
        self.submeshes.iter().map(|s| s.indices.len()).sum()
    }

    pub fn submesh_count(&self) -> usize {
        self.submeshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn index_format(&self) -> IndexFormat {
        index_format_for_vertex_count(self.vertices.len())
    }

    pub fn faces(&self) -> impl Iterator<Item = Face> + '_ {
        self.vertices
            .chunks_exact(4)
            .zip(self.normals.chunks_exact(4))
            .map(|(corners, normals)| Face {
                corners: [corners[0], corners[1], corners[2], corners[3]],
                normal: normals[0],
            })
    }
}

// Growable buffers a single worker appends faces to
struct FaceWriter {
    vertices: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    indices: [Vec<u32>; MESH_GROUP_COUNT],
    malformed: usize,
}

impl FaceWriter {
    fn with_capacity(faces: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(faces * 4),
            normals: Vec::with_capacity(faces * 4),
            uvs: Vec::with_capacity(faces * 4),
            indices: Default::default(),
            malformed: 0,
        }
    }

    fn push_face(&mut self, slot: usize, corners: [Vec3; 4], normal: Vec3, uvs: [Vec2; 4]) {
        let base_index = self.vertices.len() as u32;

        self.vertices.extend_from_slice(&corners);
        self.normals.extend_from_slice(&[normal; 4]);
        self.uvs.extend_from_slice(&uvs);

        self.indices[slot].extend(FACE_TRIANGLES.iter().map(|index| base_index + index));
    }

    // Appends another writer's output, rebasing its indices past our vertices
    fn append(&mut self, other: FaceWriter) {
        let base_index = self.vertices.len() as u32;

        self.vertices.extend(other.vertices);
        self.normals.extend(other.normals);
        self.uvs.extend(other.uvs);

        for (ours, theirs) in self.indices.iter_mut().zip(other.indices) {
            ours.extend(theirs.into_iter().map(|index| base_index + index));
        }

        self.malformed += other.malformed;
    }

    fn finish(self, mode: SubmeshMode) -> MeshBuffers {
        let submeshes = match mode {
            SubmeshMode::Single => {
                let indices: Vec<u32> = self.indices.into_iter().flatten().collect();
                if indices.is_empty() {
                    Vec::new()
                } else {
                    vec![SubmeshIndices { group: None, indices }]
                }
            }
            SubmeshMode::ByMeshGroup => self
                .indices
                .into_iter()
                .enumerate()
                .filter(|(_, indices)| !indices.is_empty())
                .map(|(slot, indices)| SubmeshIndices {
                    group: MeshGroup::new(slot as u8),
                    indices,
                })
                .collect(),
        };

        MeshBuffers {
            vertices: self.vertices,
            normals: self.normals,
            uvs: self.uvs,
            submeshes,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MeshCompiler {
    config: MeshConfig,
    coloring: VoxelColoring,
}

impl MeshCompiler {
    pub fn new(config: MeshConfig, coloring: VoxelColoring) -> Self {
        Self { config, coloring }
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub fn coloring(&self) -> &VoxelColoring {
        &self.coloring
    }

    pub fn set_coloring(&mut self, coloring: VoxelColoring) {
        self.coloring = coloring;
    }

    /// Compiles the visible surface of the first `limit` active voxels
    /// (all of them when `None`).
    pub fn compile(&self, map: &VoxelMap, limit: Option<usize>) -> MeshBuffers {
        let active = ActiveSet::select(map, limit);
        self.compile_active(map, &active)
    }

    pub fn compile_active(&self, map: &VoxelMap, active: &ActiveSet) -> MeshBuffers {
        let writer = match self.config.compile_mode {
            CompileMode::Parallel { min_voxels_per_task }
                if active.len() > min_voxels_per_task.max(1) =>
            {
                self.emit_parallel(map, active, min_voxels_per_task.max(1))
            }
            _ => {
                let mut writer = FaceWriter::with_capacity(active.len() * 6);
                self.emit_range(map, active, active.positions(), &mut writer);
                writer
            }
        };

        if writer.malformed > 0 {
            warn!("Skipped {} voxels with an invalid mesh group", writer.malformed);
        }

        let buffers = writer.finish(self.config.submesh_mode);

        debug!(
            "Compiled {} active voxels into {} faces, {} vertices, {} submeshes ({})",
            active.len(),
            buffers.face_count(),
            buffers.vertex_count(),
            buffers.submesh_count(),
            self.config.compile_mode.as_str(),
        );

        buffers
    }

    // Each task owns a private writer for a contiguous slice of the active order;
    // partials are joined in slice order so the result matches the sequential path.
    fn emit_parallel(&self, map: &VoxelMap, active: &ActiveSet, min_voxels_per_task: usize) -> FaceWriter {
        let task_size = (active.len() / rayon::current_num_threads().max(1)).max(min_voxels_per_task);

        let partials: Vec<FaceWriter> = active
            .positions()
            .par_chunks(task_size)
            .map(|slice| {
                let mut writer = FaceWriter::with_capacity(slice.len() * 6);
                self.emit_range(map, active, slice, &mut writer);
                writer
            })
            .collect();

        let total_faces = partials.iter().map(|p| p.vertices.len() / 4).sum();
        let mut merged = FaceWriter::with_capacity(total_faces);
        for partial in partials {
            merged.append(partial);
        }

        merged
    }

    fn emit_range(&self, map: &VoxelMap, active: &ActiveSet, positions: &[IVec3], writer: &mut FaceWriter) {
        for &position in positions {
            // Stale key: nothing to emit
            let Some(voxel) = map.get(position) else {
                continue;
            };

            let Some(group) = voxel.group() else {
                writer.malformed += 1;
                continue;
            };

            let slot = match self.config.submesh_mode {
                SubmeshMode::Single => 0,
                SubmeshMode::ByMeshGroup => group.index(),
            };

            let uvs = self.face_uvs(voxel);

            for direction in Direction::ALL {
                if !active.is_face_visible(position, direction) {
                    continue;
                }

                writer.push_face(slot, self.face_corners(position, direction), direction.normal(), uvs);
            }
        }
    }

    fn face_corners(&self, position: IVec3, direction: Direction) -> [Vec3; 4] {
        let origin = position.as_vec3() - self.config.pivot;
        FACE_VERTICES[direction.index()].map(|offset| (origin + offset) * self.config.scale)
    }

    fn face_uvs(&self, voxel: &Voxel) -> [Vec2; 4] {
        if self.coloring.samples_palette() {
            [palette_uv(voxel.color_index); 4]
        } else {
            CORNER_UVS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler() -> MeshCompiler {
        MeshCompiler::new(MeshConfig::default(), VoxelColoring::Grayscale)
    }

    fn map_of(positions: &[IVec3]) -> VoxelMap {
        VoxelMap::from_voxels(positions.iter().map(|p| Voxel::new(*p, 1)))
    }

    fn sorted_corners(face: &Face) -> Vec<[i32; 3]> {
        let mut corners: Vec<[i32; 3]> = face
            .corners
            .iter()
            .map(|c| [c.x.round() as i32, c.y.round() as i32, c.z.round() as i32])
            .collect();
        corners.sort();
        corners
    }

    #[test]
    fn test_isolated_voxel_has_all_faces() {
        let buffers = compiler().compile(&map_of(&[IVec3::ZERO]), None);

        assert_eq!(buffers.vertex_count(), 24);
        assert_eq!(buffers.normals.len(), 24);
        assert_eq!(buffers.uvs.len(), 24);
        assert_eq!(buffers.index_count(), 36);
        assert_eq!(buffers.submesh_count(), 1);
        assert_eq!(buffers.index_format(), IndexFormat::Uint16);
    }

    #[test]
    fn test_adjacent_voxels_cull_shared_faces() {
        for dir in Direction::ALL {
            let buffers = compiler().compile(&map_of(&[IVec3::ZERO, dir.offset()]), None);
            assert_eq!(buffers.face_count(), 10, "axis {}", dir.as_str());
            assert_eq!(buffers.index_count(), 60);
        }
    }

    #[test]
    fn test_inactive_neighbor_does_not_occlude() {
        let map = VoxelMap::from_voxels([
            Voxel::new(IVec3::ZERO, 1),
            Voxel::new(IVec3::X, 1).with_active(false),
        ]);
        let buffers = compiler().compile(&map, None);

        assert_eq!(buffers.face_count(), 6);
        assert!(buffers.faces().any(|f| f.normal == Vec3::X));
    }

    #[test]
    fn test_truncated_neighbor_does_not_occlude() {
        let buffers = compiler().compile(&map_of(&[IVec3::ZERO, IVec3::Y]), Some(1));
        assert_eq!(buffers.face_count(), 6);
        assert!(buffers.faces().all(|f| f.corners.iter().all(|c| c.y <= 1.0)));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let positions: Vec<IVec3> = (0..4)
            .flat_map(|x| (0..3).flat_map(move |y| (0..4).map(move |z| IVec3::new(x, y, z))))
            .filter(|p| (p.x + p.y + p.z) % 3 != 0)
            .collect();
        let map = map_of(&positions);

        let first = compiler().compile(&map, Some(17));
        let second = compiler().compile(&map, Some(17));
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_reveal_of_separated_voxels_only_appends() {
        let map = map_of(&[
            IVec3::new(0, 0, 0),
            IVec3::new(2, 0, 0),
            IVec3::new(0, 0, 2),
            IVec3::new(4, 2, 0),
        ]);
        let compiler = compiler();

        for k in 0..4 {
            let smaller = compiler.compile(&map, Some(k));
            let larger = compiler.compile(&map, Some(k + 1));

            let n = smaller.vertex_count();
            assert_eq!(larger.vertex_count(), n + 24);
            assert_eq!(&larger.vertices[..n], &smaller.vertices[..]);
            assert_eq!(&larger.uvs[..n], &smaller.uvs[..]);

            let small_indices = smaller.submeshes.first().map(|s| s.indices.clone()).unwrap_or_default();
            let large_indices = &larger.submeshes[0].indices;
            assert_eq!(&large_indices[..small_indices.len()], &small_indices[..]);
        }
    }

    #[test]
    fn test_reveal_of_touching_voxel_culls_only_facing_side() {
        let map = map_of(&[IVec3::ZERO, IVec3::X]);
        let compiler = compiler();

        let one = compiler.compile(&map, Some(1));
        let two = compiler.compile(&map, Some(2));

        let kept: Vec<Face> = one.faces().filter(|f| f.normal != Vec3::X).collect();
        let prefix: Vec<Face> = two.faces().take(kept.len()).collect();
        assert_eq!(kept, prefix);
        assert_eq!(two.face_count(), 10);
    }

    #[test]
    fn test_triangles_wind_outward() {
        let buffers = compiler().compile(&map_of(&[IVec3::new(3, -1, 2)]), None);
        let indices = &buffers.submeshes[0].indices;

        for tri in indices.chunks_exact(3) {
            let a = buffers.vertices[tri[0] as usize];
            let b = buffers.vertices[tri[1] as usize];
            let c = buffers.vertices[tri[2] as usize];
            let geometric = (b - a).cross(c - a).normalize();
            let normal = buffers.normals[tri[0] as usize];
            assert!(geometric.abs_diff_eq(normal, 1e-5), "{:?} vs {:?}", geometric, normal);
        }
    }

    #[test]
    fn test_neighboring_faces_share_corners() {
        for dir in Direction::ALL {
            let here = Face {
                corners: FACE_VERTICES[dir.index()],
                normal: dir.normal(),
            };
            let neighbor_offset = dir.offset().as_vec3();
            let there = Face {
                corners: FACE_VERTICES[dir.opposite().index()].map(|c| c + neighbor_offset),
                normal: dir.opposite().normal(),
            };
            assert_eq!(sorted_corners(&here), sorted_corners(&there), "{}", dir.as_str());
        }
    }

    #[test]
    fn test_face_vertex_offset_lookup() {
        assert_eq!(face_vertex_offset(Direction::Up, 0), Vec3::new(0.0, 1.0, 1.0));
        assert_eq!(face_vertex_offset(Direction::Back, 3), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(face_vertex_offset(Direction::Left, 7), Vec3::ZERO);
    }

    #[test]
    fn test_uv_modes() {
        assert_eq!(palette_uv(0), Vec2::new(0.5 / 256.0, 0.5));
        assert_eq!(palette_uv(255), Vec2::new(255.5 / 256.0, 0.5));
        assert_eq!(corner_uv(2), Vec2::new(1.0, 1.0));

        let map = VoxelMap::from_voxels([Voxel::new(IVec3::ZERO, 9)]);
        let palette = MeshCompiler::new(MeshConfig::default(), VoxelColoring::palette_default());
        let buffers = palette.compile(&map, None);
        assert!(buffers.uvs.iter().all(|uv| *uv == palette_uv(9)));

        let flat = compiler().compile(&map, None);
        assert_eq!(&flat.uvs[..4], &CORNER_UVS[..]);
    }

    #[test]
    fn test_submeshes_follow_mesh_groups() {
        let map = VoxelMap::from_voxels([
            Voxel::new(IVec3::ZERO, 1).with_mesh_group(2),
            Voxel::new(IVec3::new(5, 0, 0), 1),
        ]);

        let grouped = compiler().compile(&map, None);
        let groups: Vec<Option<usize>> = grouped.submeshes.iter().map(|s| s.group.map(|g| g.index())).collect();
        assert_eq!(groups, vec![Some(0), Some(2)]);
        assert!(grouped.submeshes.iter().all(|s| s.indices.len() == 36));

        let single = MeshCompiler::new(
            MeshConfig::default().with_submesh_mode(SubmeshMode::Single),
            VoxelColoring::Grayscale,
        )
        .compile(&map, None);
        assert_eq!(single.submesh_count(), 1);
        assert_eq!(single.submeshes[0].group, None);
        assert_eq!(single.index_count(), 72);
    }

    #[test]
    fn test_empty_active_set_yields_empty_mesh() {
        let map = VoxelMap::from_voxels([Voxel::new(IVec3::ZERO, 1).with_active(false)]);
        let buffers = compiler().compile(&map, None);
        assert!(buffers.is_empty());
        assert_eq!(buffers.submesh_count(), 0);

        let truncated = compiler().compile(&map_of(&[IVec3::ZERO]), Some(0));
        assert!(truncated.is_empty());
        assert_eq!(truncated.submesh_count(), 0);
    }

    #[test]
    fn test_invalid_mesh_group_emits_nothing() {
        let map = VoxelMap::from_voxels([
            Voxel::new(IVec3::ZERO, 1).with_mesh_group(9),
            Voxel::new(IVec3::X, 1),
        ]);
        let buffers = compiler().compile(&map, None);

        // The malformed voxel is still active, so it occludes but draws nothing
        assert_eq!(buffers.face_count(), 5);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let positions: Vec<IVec3> = (0..10)
            .flat_map(|x| (0..4).flat_map(move |y| (0..10).map(move |z| IVec3::new(x, y, z))))
            .filter(|p| (p.x * 7 + p.z * 3 + p.y) % 5 != 0)
            .collect();
        let map = VoxelMap::from_voxels(
            positions.iter().map(|p| Voxel::new(*p, (p.x * 10 + p.z) as u8).with_mesh_group((p.y % 4) as u8)),
        );

        let sequential = MeshCompiler::new(MeshConfig::default(), VoxelColoring::palette_default());
        let parallel = MeshCompiler::new(
            MeshConfig::default().with_compile_mode(CompileMode::Parallel { min_voxels_per_task: 8 }),
            VoxelColoring::palette_default(),
        );

        assert_eq!(sequential.compile(&map, None), parallel.compile(&map, None));
        assert_eq!(sequential.compile(&map, Some(123)), parallel.compile(&map, Some(123)));
    }

    #[test]
    fn test_scale_and_pivot_apply_to_vertices() {
        let config = MeshConfig {
            scale: 2.0,
            pivot: Vec3::splat(0.5),
            ..MeshConfig::default()
        };
        let buffers = MeshCompiler::new(config, VoxelColoring::Grayscale).compile(&map_of(&[IVec3::ZERO]), None);

        let min = buffers.vertices.iter().fold(Vec3::splat(f32::MAX), |a, v| a.min(*v));
        let max = buffers.vertices.iter().fold(Vec3::splat(f32::MIN), |a, v| a.max(*v));
        assert_eq!(min, Vec3::splat(-1.0));
        assert_eq!(max, Vec3::splat(1.0));
    }

    #[test]
    fn test_active_limit() {
        assert_eq!(active_limit(-1), None);
        assert_eq!(active_limit(0), Some(0));
        assert_eq!(active_limit(12), Some(12));
    }
}
