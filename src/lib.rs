pub mod config;
pub mod rendering;
pub mod utils;
pub mod voxel;
pub mod worker;

pub use config::{CompileMode, MeshConfig, SubmeshMode, WorldConfig};
pub use rendering::{MeshHandle, Vertex};
pub use voxel::VoxelMap;
pub use voxel::mesh::{MeshBuffers, MeshCompiler};
pub use voxel::object::VoxelObject;
pub use voxel::reveal::RevealController;
pub use voxel::types::{Direction, MeshGroup, Voxel};
