use serde::{Serialize, Deserialize};
use glam::{IVec3, Vec3};

// Number of material partitions a mesh can be split into
pub const MESH_GROUP_COUNT: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeshGroup(u8);

impl MeshGroup {
    pub const DEFAULT: MeshGroup = MeshGroup(0);

    /// Returns `None` for indices outside `0..MESH_GROUP_COUNT`.
    pub fn new(index: u8) -> Option<Self> {
        if (index as usize) < MESH_GROUP_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voxel {
    pub position: IVec3,
    pub color_index: u8,
    pub mesh_group: u8,
    pub active: bool,
}

impl Voxel {
    pub fn new(position: IVec3, color_index: u8) -> Self {
        Self {
            position,
            color_index,
            mesh_group: 0,
            active: true,
        }
    }

    pub fn with_mesh_group(mut self, mesh_group: u8) -> Self {
        self.mesh_group = mesh_group;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn group(&self) -> Option<MeshGroup> {
        MeshGroup::new(self.mesh_group)
    }

    // Sort key used for progressive reveal: layers bottom-up, then diagonally across each layer.
    // The trailing (x, z) makes it a total order over unique positions.
    pub fn reveal_key(position: IVec3) -> (i32, i32, i32, i32) {
        (position.y, position.x + position.z, position.x, position.z)
    }
}

// The six face directions in emission order
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Forward,
    Back,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
        Direction::Forward,
        Direction::Back,
    ];

    pub fn index(&self) -> usize {
        match self {
            Self::Up => 0,
            Self::Down => 1,
            Self::Left => 2,
            Self::Right => 3,
            Self::Forward => 4,
            Self::Back => 5,
        }
    }

    pub fn offset(&self) -> IVec3 {
        match self {
            Self::Up => IVec3::new(0, 1, 0),
            Self::Down => IVec3::new(0, -1, 0),
            Self::Left => IVec3::new(-1, 0, 0),
            Self::Right => IVec3::new(1, 0, 0),
            Self::Forward => IVec3::new(0, 0, 1),
            Self::Back => IVec3::new(0, 0, -1),
        }
    }

    pub fn normal(&self) -> Vec3 {
        self.offset().as_vec3()
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::Forward => Self::Back,
            Self::Back => Self::Forward,
        }
    }

    /// Maps a unit axis offset back to its direction. Zero-length and
    /// diagonal offsets have no face.
    pub fn from_offset(offset: IVec3) -> Option<Direction> {
        Self::ALL.iter().copied().find(|dir| dir.offset() == offset)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "Up",
            Self::Down => "Down",
            Self::Left => "Left",
            Self::Right => "Right",
            Self::Forward => "Forward",
            Self::Back => "Back",
        }
    }
}
