// Mesh assembly and GPU upload
pub mod resources;
pub use resources::{GpuMesh, IndexData, IndexFormat, MeshHandle, Submesh, Vertex};
