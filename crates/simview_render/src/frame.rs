//! Offscreen pixel storage.

use simview_core::Resolution;

use crate::error::{SurfaceError, SurfaceResult};

/// RGB and depth planes of one offscreen surface.
///
/// Sized once to the surface's maximum viewport. Rows run top to bottom.
/// The owning surface keeps this behind its own buffer mutex, separate from
/// any simulation state, so copying pixels out never blocks stepping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameBuffer {
    resolution: Resolution,
    rgb: Vec<u8>,
    depth: Vec<f32>,
    /// Simulation time of the state these pixels show.
    sim_time: f64,
}

impl FrameBuffer {
    /// Allocates zeroed planes, reporting allocation failure instead of
    /// aborting.
    pub fn allocate(resolution: Resolution) -> SurfaceResult<Self> {
        let pixels = (resolution.width as usize)
            .checked_mul(resolution.height as usize)
            .ok_or(SurfaceError::BufferAlloc { bytes: usize::MAX })?;
        let rgb_len = pixels
            .checked_mul(3)
            .ok_or(SurfaceError::BufferAlloc { bytes: usize::MAX })?;
        let bytes = pixels.saturating_mul(3 + std::mem::size_of::<f32>());

        let mut rgb = Vec::new();
        rgb.try_reserve_exact(rgb_len)
            .map_err(|_| SurfaceError::BufferAlloc { bytes })?;
        rgb.resize(rgb_len, 0);

        let mut depth = Vec::new();
        depth
            .try_reserve_exact(pixels)
            .map_err(|_| SurfaceError::BufferAlloc { bytes })?;
        depth.resize(pixels, 1.0);

        Ok(Self {
            resolution,
            rgb,
            depth,
            sim_time: 0.0,
        })
    }

    /// Plane dimensions.
    #[inline]
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// RGB bytes, `3 * width * height`.
    #[must_use]
    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }

    /// Depth values in `[0, 1]`, `width * height`.
    #[must_use]
    pub fn depth(&self) -> &[f32] {
        &self.depth
    }

    /// Depth plane as raw native-endian bytes.
    #[must_use]
    pub fn depth_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.depth)
    }

    /// Simulation time the current pixels were rendered at.
    #[inline]
    #[must_use]
    pub const fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub(crate) fn planes_mut(&mut self) -> (&mut [u8], &mut [f32]) {
        (&mut self.rgb, &mut self.depth)
    }

    pub(crate) fn set_sim_time(&mut self, time: f64) {
        self.sim_time = time;
    }
}
