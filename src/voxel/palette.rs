use std::sync::Arc;
use anyhow::{ensure, Result};
use image::{Rgba, RgbaImage};
use serde::{Serialize, Deserialize};

use crate::voxel::mesh::PALETTE_WIDTH;
use crate::voxel::types::Voxel;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MaterialType {
    #[default]
    Diffuse,
    Metal,
    Glass,
    Emit,
}

// 256 RGBA colours addressed by a voxel's colour index.
// Both tables always hold PALETTE_WIDTH entries; deserialization validates them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PaletteData")]
pub struct Palette {
    colors: Vec<[u8; 4]>,
    materials: Vec<MaterialType>,
}

// Unvalidated wire form of a palette
#[derive(Deserialize)]
struct PaletteData {
    colors: Vec<[u8; 4]>,
    materials: Vec<MaterialType>,
}

impl TryFrom<PaletteData> for Palette {
    type Error = anyhow::Error;

    fn try_from(data: PaletteData) -> Result<Self> {
        Self::new(data.colors, data.materials)
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::grayscale()
    }
}

impl Palette {
    pub fn new(colors: Vec<[u8; 4]>, materials: Vec<MaterialType>) -> Result<Self> {
        let palette = Self { colors, materials };
        palette.validate()?;
        Ok(palette)
    }

    // Index i maps to (i, i, i)
    pub fn grayscale() -> Self {
        Self {
            colors: (0..PALETTE_WIDTH).map(|i| [i as u8, i as u8, i as u8, 255]).collect(),
            materials: vec![MaterialType::Diffuse; PALETTE_WIDTH],
        }
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.colors.len() == PALETTE_WIDTH,
            "palette must have {} colors, found {}",
            PALETTE_WIDTH,
            self.colors.len()
        );
        ensure!(
            self.materials.len() == PALETTE_WIDTH,
            "palette must have {} material entries, found {}",
            PALETTE_WIDTH,
            self.materials.len()
        );
        Ok(())
    }

    pub fn color(&self, index: u8) -> [u8; 4] {
        self.colors[index as usize]
    }

    pub fn material(&self, index: u8) -> MaterialType {
        self.materials[index as usize]
    }

    pub fn set_color(&mut self, index: u8, color: [u8; 4]) {
        self.colors[index as usize] = color;
    }

    pub fn set_material(&mut self, index: u8, material: MaterialType) {
        self.materials[index as usize] = material;
    }

    // 256x1 texture sampled through palette UVs
    pub fn texture(&self) -> RgbaImage {
        RgbaImage::from_fn(PALETTE_WIDTH as u32, 1, |x, _| Rgba(self.colors[x as usize]))
    }

    // Palette columns must not bleed into each other
    pub fn sampler_descriptor() -> wgpu::SamplerDescriptor<'static> {
        wgpu::SamplerDescriptor {
            label: Some("Palette Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        }
    }
}

/// How voxel colours are resolved. Palette colouring samples the palette
/// texture through per-voxel UVs; grayscale uses flat per-corner UVs.
#[derive(Clone, Debug, PartialEq)]
pub enum VoxelColoring {
    Grayscale,
    Palette(Arc<Palette>),
}

impl VoxelColoring {
    pub fn palette(palette: Palette) -> Self {
        Self::Palette(Arc::new(palette))
    }

    pub fn palette_default() -> Self {
        Self::palette(Palette::grayscale())
    }

    pub fn samples_palette(&self) -> bool {
        matches!(self, Self::Palette(_))
    }

    pub fn color(&self, voxel: &Voxel) -> [u8; 4] {
        match self {
            Self::Grayscale => [voxel.color_index, voxel.color_index, voxel.color_index, 255],
            Self::Palette(palette) => palette.color(voxel.color_index),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grayscale => "Grayscale",
            Self::Palette(_) => "Palette",
        }
    }
}
