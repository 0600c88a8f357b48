//! Rasterization backend seam
//!
//! The actual GPU (or software) rasterizer is an external collaborator. The
//! cache only needs three primitives from it: upload a vertex buffer, draw a
//! triangle strip, and render into / composite from an off-screen target.

use thiserror::Error;

/// Errors surfaced by a rasterization backend
///
/// Target allocation failure means the cache can no longer be maintained;
/// there is no degraded rendering path, callers propagate it as fatal.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("render target allocation failed: {0}")]
    TargetExhausted(String),

    #[error("vertex buffer upload failed: {0}")]
    Upload(String),
}

/// Uniform-scale affine transform applied at draw time
///
/// Maps source coordinates through `scale` then offsets by `(dx, dy)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasTransform {
    pub scale: f32,
    pub dx: f32,
    pub dy: f32,
}

impl CanvasTransform {
    pub const IDENTITY: CanvasTransform = CanvasTransform {
        scale: 1.0,
        dx: 0.0,
        dy: 0.0,
    };

    pub const fn new(scale: f32, dx: f32, dy: f32) -> Self {
        Self { scale, dx, dy }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale + self.dx, y * self.scale + self.dy)
    }
}

/// The rasterizer primitives the render cache drives
pub trait RenderBackend {
    type Buffer: Copy + Eq;
    type Target: Copy + Eq;

    /// Upload a flat interleaved position+RGBA vertex array
    fn create_buffer(&mut self, data: &[f32]) -> Result<Self::Buffer, RenderError>;

    /// Replace a buffer's contents
    fn update_buffer(&mut self, buffer: Self::Buffer, data: &[f32]) -> Result<(), RenderError>;

    fn release_buffer(&mut self, buffer: Self::Buffer);

    /// Allocate an off-screen render target in device pixels
    fn create_target(&mut self, width_px: u32, height_px: u32)
        -> Result<Self::Target, RenderError>;

    fn release_target(&mut self, target: Self::Target);

    fn clear_target(&mut self, target: Self::Target);

    /// Draw a strip-topology buffer, into `target` or the frame when `None`
    fn draw_strip(
        &mut self,
        buffer: Self::Buffer,
        transform: CanvasTransform,
        target: Option<Self::Target>,
    );

    /// Composite a cached target onto the frame
    fn draw_target(&mut self, target: Self::Target, transform: CanvasTransform);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_apply() {
        let t = CanvasTransform::new(2.0, 10.0, -5.0);
        assert_eq!(t.apply(3.0, 4.0), (16.0, 3.0));
        assert_eq!(CanvasTransform::IDENTITY.apply(3.0, 4.0), (3.0, 4.0));
    }
}
