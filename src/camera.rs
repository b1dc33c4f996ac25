//! Camera device seam.
//!
//! The shipped [`StillCamera`] serves frames from a directory of images
//! (or a generated test card), which keeps capture usable on a desktop
//! terminal and deterministic in tests.

use crate::store::images::load_image;
use crate::{PadchatError, Result};
use image::{Rgba, RgbaImage};
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraDevice {
    Front,
    Back,
}

impl CameraDevice {
    pub fn toggled(self) -> Self {
        match self {
            CameraDevice::Front => CameraDevice::Back,
            CameraDevice::Back => CameraDevice::Front,
        }
    }
}

pub trait Camera {
    /// Start streaming from the current device.
    fn open(&mut self) -> Result<()>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Latest live frame, if the device is streaming.
    fn frame(&self) -> Option<&RgbaImage>;

    /// Copy of the latest frame.
    fn capture(&mut self) -> Option<RgbaImage> {
        self.frame().cloned()
    }

    /// Switch between the front and back device, reopening if streaming.
    fn toggle_device(&mut self);

    fn device(&self) -> CameraDevice;
}

const TEST_CARD_SIZE: (u32, u32) = (320, 240);

/// Serves still images as camera frames.
///
/// With a directory, the front device shows the first image (by file
/// name) and the back device the second, when present.
#[derive(Debug)]
pub struct StillCamera {
    dir: Option<PathBuf>,
    device: CameraDevice,
    current: Option<RgbaImage>,
}

impl StillCamera {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            device: CameraDevice::Front,
            current: None,
        }
    }

    fn load_frame(&self) -> Result<RgbaImage> {
        let Some(dir) = &self.dir else {
            return Ok(test_card(self.device));
        };

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
            })
            .collect();
        files.sort();

        let index = match self.device {
            CameraDevice::Front => 0,
            CameraDevice::Back => 1.min(files.len().saturating_sub(1)),
        };
        let path = files
            .get(index)
            .ok_or_else(|| PadchatError::Config(format!("no camera frames in {}", dir.display())))?;
        debug!("Camera frame from {:?}", path);
        load_image(path)
    }
}

impl Camera for StillCamera {
    fn open(&mut self) -> Result<()> {
        let frame = self.load_frame()?;
        info!(
            "Camera opened ({:?}, {}x{})",
            self.device,
            frame.width(),
            frame.height()
        );
        self.current = Some(frame);
        Ok(())
    }

    fn close(&mut self) {
        if self.current.take().is_some() {
            debug!("Camera closed");
        }
    }

    fn is_open(&self) -> bool {
        self.current.is_some()
    }

    fn frame(&self) -> Option<&RgbaImage> {
        self.current.as_ref()
    }

    fn toggle_device(&mut self) {
        self.device = self.device.toggled();
        if self.is_open() {
            if let Err(e) = self.open() {
                warn!("Failed to reopen camera after switching device: {}", e);
                self.current = None;
            }
        }
    }

    fn device(&self) -> CameraDevice {
        self.device
    }
}

/// Diagonal gradient, tinted per device.
fn test_card(device: CameraDevice) -> RgbaImage {
    let (w, h) = TEST_CARD_SIZE;
    RgbaImage::from_fn(w, h, |x, y| {
        let r = (x * 255 / w) as u8;
        let g = (y * 255 / h) as u8;
        let b = match device {
            CameraDevice::Front => 160,
            CameraDevice::Back => 40,
        };
        Rgba([r, g, b, 255])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_test_card_camera() {
        let mut camera = StillCamera::new(None);
        assert!(camera.frame().is_none());
        camera.open().unwrap();
        let front = camera.capture().unwrap();
        assert_eq!(front.dimensions(), TEST_CARD_SIZE);

        camera.toggle_device();
        assert_eq!(camera.device(), CameraDevice::Back);
        assert_ne!(camera.capture().unwrap(), front);

        camera.close();
        assert!(!camera.is_open());
        assert!(camera.capture().is_none());
    }

    #[test]
    fn test_directory_camera() {
        let dir = TempDir::new().unwrap();
        RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]))
            .save(dir.path().join("a.png"))
            .unwrap();
        RgbaImage::from_pixel(6, 2, Rgba([9, 9, 9, 255]))
            .save(dir.path().join("b.png"))
            .unwrap();

        let mut camera = StillCamera::new(Some(dir.path().to_path_buf()));
        camera.open().unwrap();
        assert_eq!(camera.frame().map(|f| f.width()), Some(4));
        camera.toggle_device();
        assert_eq!(camera.frame().map(|f| f.width()), Some(6));
    }

    #[test]
    fn test_empty_directory_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let mut camera = StillCamera::new(Some(dir.path().to_path_buf()));
        assert!(camera.open().is_err());
        assert!(!camera.is_open());
    }
}
