use bytemuck::{Pod, Zeroable};
use half::f16;
use log::debug;
use wgpu::util::DeviceExt;

pub use wgpu::IndexFormat;

use crate::utils::AABB;
use crate::voxel::mesh::MeshBuffers;
use crate::voxel::types::MeshGroup;

// Largest vertex count addressable with 16-bit indices
pub const NARROW_INDEX_LIMIT: usize = u16::MAX as usize;

pub fn index_format_for_vertex_count(vertex_count: usize) -> IndexFormat {
    if vertex_count > NARROW_INDEX_LIMIT {
        IndexFormat::Uint32
    } else {
        IndexFormat::Uint16
    }
}

// Interleaved vertex handed to the renderer: position, normal, texcoord0
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f16; 2],
}

impl Vertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float16x2,
                },
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum IndexData {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexData {
    fn from_indices(indices: Vec<u32>, format: IndexFormat) -> Self {
        match format {
            // Every index is below the vertex count, so narrowing is lossless here
            IndexFormat::Uint16 => IndexData::U16(indices.into_iter().map(|i| i as u16).collect()),
            IndexFormat::Uint32 => IndexData::U32(indices),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexData::U16(indices) => indices.len(),
            IndexData::U32(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Option<u32> {
        match self {
            IndexData::U16(indices) => indices.get(i).map(|&index| index as u32),
            IndexData::U32(indices) => indices.get(i).copied(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            IndexData::U16(indices) => bytemuck::cast_slice(indices),
            IndexData::U32(indices) => bytemuck::cast_slice(indices),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Submesh {
    pub group: Option<MeshGroup>,
    pub indices: IndexData,
}

// Final mesh representation consumed by rendering and collision backends
#[derive(Clone, Debug, PartialEq)]
pub struct MeshHandle {
    pub vertices: Vec<Vertex>,
    pub submeshes: Vec<Submesh>,
    pub index_format: IndexFormat,
}

impl MeshHandle {
    pub fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            submeshes: Vec::new(),
            index_format: IndexFormat::Uint16,
        }
    }

    /// Converts compiled buffers, choosing the index width from the final
    /// vertex count.
    pub fn assemble(buffers: MeshBuffers) -> Self {
        let index_format = buffers.index_format();

        let vertices = buffers
            .vertices
            .iter()
            .zip(&buffers.normals)
            .zip(&buffers.uvs)
            .map(|((position, normal), uv)| Vertex {
                position: position.to_array(),
                normal: normal.to_array(),
                tex_coords: [f16::from_f32(uv.x), f16::from_f32(uv.y)],
            })
            .collect();

        let submeshes = buffers
            .submeshes
            .into_iter()
            .map(|submesh| Submesh {
                group: submesh.group,
                indices: IndexData::from_indices(submesh.indices, index_format),
            })
            .collect();

        Self {
            vertices,
            submeshes,
            index_format,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn submesh_count(&self) -> usize {
        self.submeshes.len()
    }

    pub fn index_count(&self) -> usize {
        self.submeshes.iter().map(|s| s.indices.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn bounds(&self) -> Option<AABB> {
        AABB::from_points(self.vertices.iter().map(|v| glam::Vec3::from_array(v.position)))
    }

    // All triangles across submeshes, for collision shapes
    pub fn triangles(&self) -> Vec<[u32; 3]> {
        let mut triangles = Vec::with_capacity(self.index_count() / 3);
        for submesh in &self.submeshes {
            let indices = &submesh.indices;
            for t in 0..indices.len() / 3 {
                if let (Some(a), Some(b), Some(c)) = (indices.get(t * 3), indices.get(t * 3 + 1), indices.get(t * 3 + 2)) {
                    triangles.push([a, b, c]);
                }
            }
        }
        triangles
    }
}

pub struct GpuSubmesh {
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub submeshes: Vec<GpuSubmesh>,
    pub index_format: IndexFormat,
}

impl GpuMesh {
    pub fn upload(device: &wgpu::Device, mesh: &MeshHandle) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Voxel Vertex Buffer"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let submeshes = mesh
            .submeshes
            .iter()
            .map(|submesh| GpuSubmesh {
                index_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Voxel Index Buffer"),
                    contents: submesh.indices.as_bytes(),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                index_count: submesh.indices.len() as u32,
            })
            .collect();

        debug!(
            "Uploaded voxel mesh: {} vertices, {} submeshes, {:?}",
            mesh.vertex_count(),
            mesh.submesh_count(),
            mesh.index_format
        );

        Self {
            vertex_buffer,
            submeshes,
            index_format: mesh.index_format,
        }
    }
}
