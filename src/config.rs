use glam::Vec3;
use serde::{Serialize, Deserialize};

// How face indices are split across sub-meshes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmeshMode {
    // One index list per mesh group, unused groups omitted
    ByMeshGroup,
    // Every face in a single index list
    Single,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompileMode {
    Sequential,
    // Split the active set across rayon workers; falls back to sequential for small sets
    Parallel { min_voxels_per_task: usize },
}

impl CompileMode {
    pub fn parallel() -> Self {
        Self::Parallel { min_voxels_per_task: 256 }
    }

    // Parallel only when more than one core is available
    pub fn auto() -> Self {
        if num_cpus::get() > 1 {
            Self::parallel()
        } else {
            Self::Sequential
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "Sequential",
            Self::Parallel { .. } => "Parallel",
        }
    }
}

/// Settings consumed by the mesh compiler.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshConfig {
    pub scale: f32,
    pub pivot: Vec3,
    pub submesh_mode: SubmeshMode,
    pub compile_mode: CompileMode,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            pivot: Vec3::ZERO,
            submesh_mode: SubmeshMode::ByMeshGroup,
            compile_mode: CompileMode::Sequential,
        }
    }
}

impl MeshConfig {
    pub fn with_submesh_mode(mut self, mode: SubmeshMode) -> Self {
        self.submesh_mode = mode;
        self
    }

    pub fn with_compile_mode(mut self, mode: CompileMode) -> Self {
        self.compile_mode = mode;
        self
    }
}

/// Placement of a voxel object in world space. Replaces a process-wide
/// world scale with a value handed to each object.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    pub scale: f32,
    pub origin: Vec3,
    // How far behind a hit surface to probe for the voxel that was hit
    pub hit_adjustment: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            origin: Vec3::ZERO,
            hit_adjustment: 0.5,
        }
    }
}
