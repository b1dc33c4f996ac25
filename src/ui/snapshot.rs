use crate::anim::AnimationClock;
use crate::app::{ChatView, Screen};
use crate::camera::CameraDevice;
use crate::keyboard::EntryView;
use crate::layout::Metrics;
use crate::models::ModelDirectory;
use crate::pipeline::PipelinePhase;
use crate::store::{ImageArena, ImageId, SessionStore, Settings};
use crate::wrap::WrapWidths;
use image::RgbaImage;

/// Read-only state for one rendered frame.
pub struct Snapshot<'a> {
    pub frame: u64,
    pub fps: u32,
    pub screen: &'a Screen,
    pub view: ChatView,
    pub store: &'a SessionStore,
    pub images: &'a ImageArena,
    pub directory: &'a ModelDirectory,
    pub settings: &'a Settings,
    pub clock: AnimationClock,
    /// Overlay alpha the camera fades towards
    pub overlay_target: u8,
    /// Hold-to-exit progress in `[0, 1]`
    pub hold: f32,
    pub entry: Option<EntryView>,
    pub camera_frame: Option<&'a RgbaImage>,
    pub camera_device: CameraDevice,
    pub staged_photo: Option<ImageId>,
    pub pipeline: PipelinePhase,
    pub connect_failed: bool,
    pub metrics: Metrics,
    pub widths: WrapWidths,
}

impl Snapshot<'_> {
    /// Spinner/shimmer phase, advancing about twelve steps a second.
    pub fn anim_step(&self) -> usize {
        let per_step = (self.fps / 12).max(1) as u64;
        (self.frame / per_step) as usize
    }

    /// Seconds of animation time elapsed.
    pub fn seconds(&self) -> f32 {
        self.frame as f32 / self.fps.max(1) as f32
    }
}
