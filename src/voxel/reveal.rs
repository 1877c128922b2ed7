use log::{debug, warn};

use crate::voxel::object::VoxelObject;

// Companion object showing the fully detailed model while the reveal is in progress
struct Companion {
    object: VoxelObject,
    disable_when_complete: bool,
}

/// Drives a progressive reveal: grows or shrinks the number of active
/// voxels that an object compiles, recompiling only when that number changes.
pub struct RevealController {
    object: VoxelObject,
    last_compiled: Option<usize>,
    companion: Option<Companion>,
}

impl RevealController {
    pub fn new(object: VoxelObject) -> Self {
        if !object.only_active() {
            warn!("Reveal controller wraps an object that compiles every voxel; enabling only-active mode");
        }

        Self {
            object: object.with_only_active(true),
            last_compiled: None,
            companion: None,
        }
    }

    pub fn with_companion(mut self, companion: VoxelObject, disable_when_complete: bool) -> Self {
        self.companion = Some(Companion {
            object: companion,
            disable_when_complete,
        });
        self
    }

    pub fn object(&self) -> &VoxelObject {
        &self.object
    }

    pub fn object_mut(&mut self) -> &mut VoxelObject {
        &mut self.object
    }

    pub fn companion(&self) -> Option<&VoxelObject> {
        self.companion.as_ref().map(|c| &c.object)
    }

    pub fn total(&self) -> usize {
        self.object.total_active()
    }

    // Count used by the most recent compilation
    pub fn current(&self) -> usize {
        self.last_compiled.unwrap_or(0)
    }

    pub fn is_complete(&self) -> bool {
        self.object.is_loaded() && self.current() >= self.total()
    }

    /// Clamps `count` to `[0, total]` and recompiles if it differs from the
    /// last compiled count. Returns whether a recompilation happened; an
    /// object with no active voxels is left alone.
    pub fn set_active_count(&mut self, count: i64) -> bool {
        if !self.object.is_loaded() {
            return false;
        }

        // Nothing to reveal
        let total = self.total();
        if total == 0 {
            return false;
        }

        let clamped = count.clamp(0, total as i64) as usize;

        let recompiled = if self.last_compiled != Some(clamped) {
            self.object.set_requested_active(clamped as i64);
            self.object.generate_mesh();
            self.last_compiled = Some(clamped);
            debug!("Reveal count {} of {}", clamped, total);
            true
        } else {
            false
        };

        self.update_companion(clamped >= total);

        recompiled
    }

    pub fn increment(&mut self, by: i64) -> bool {
        self.set_active_count(self.current() as i64 + by)
    }

    // Forget the last compiled count so the next call always recompiles
    pub fn reset(&mut self) {
        self.last_compiled = None;
    }

    fn update_companion(&mut self, complete: bool) {
        if let Some(companion) = self.companion.as_mut() {
            if companion.disable_when_complete {
                companion.object.set_enabled(!complete);
            }
        }
    }
}
