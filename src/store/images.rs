//! Photo storage: a generation-checked handle table plus PNG helpers.
//!
//! An [`ImageHandle`] is the single owning reference to an image. It is not
//! `Clone`, so staging a photo and then attaching it to a message is a move.
//! Drawing code only ever holds an [`ImageId`], which goes stale instead of
//! dangling once the slot is reclaimed.
//!
//! Releasing an image does not free it immediately: the slot is stamped with
//! the current frame and reclaimed at the start of a later frame, after any
//! draw issued during the releasing frame has completed.

use crate::Result;
use base64::Engine as _;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Weak, copyable reference used for drawing and lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId {
    index: u32,
    generation: u32,
}

/// Owning reference to an image in the arena.
#[derive(Debug, PartialEq, Eq)]
pub struct ImageHandle(ImageId);

impl ImageHandle {
    pub fn id(&self) -> ImageId {
        self.0
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    image: Option<RgbaImage>,
    released_at: Option<u64>,
}

#[derive(Debug, Default)]
pub struct ImageArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    frame: u64,
}

impl ImageArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an image and return its owning handle.
    pub fn insert(&mut self, image: RgbaImage) -> ImageHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.image = Some(image);
            slot.released_at = None;
            return ImageHandle(ImageId {
                index,
                generation: slot.generation,
            });
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            image: Some(image),
            released_at: None,
        });
        ImageHandle(ImageId {
            index,
            generation: 0,
        })
    }

    /// Resolve an id. Released images stay readable until reclaimed.
    pub fn get(&self, id: ImageId) -> Option<&RgbaImage> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.image.as_ref())
    }

    /// Whether `id` refers to an image that has not been released.
    pub fn is_live(&self, id: ImageId) -> bool {
        self.slots
            .get(id.index as usize)
            .is_some_and(|s| s.generation == id.generation && s.image.is_some() && s.released_at.is_none())
    }

    /// Give up ownership. The pixels are reclaimed on a later frame.
    pub fn release(&mut self, handle: ImageHandle) {
        let id = handle.0;
        if let Some(slot) = self.slots.get_mut(id.index as usize) {
            if slot.generation == id.generation && slot.released_at.is_none() {
                slot.released_at = Some(self.frame);
            }
        }
    }

    /// Advance to `frame`, reclaiming everything released before it.
    /// Returns the number of slots reclaimed.
    pub fn begin_frame(&mut self, frame: u64) -> usize {
        self.frame = frame;
        let mut reclaimed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if matches!(slot.released_at, Some(at) if at < frame) {
                slot.image = None;
                slot.released_at = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                reclaimed += 1;
            }
        }
        if reclaimed > 0 {
            debug!("Reclaimed {} image slot(s) at frame {}", reclaimed, frame);
        }
        reclaimed
    }

    /// Number of images currently owned (not released).
    pub fn live_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.image.is_some() && s.released_at.is_none())
            .count()
    }
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

/// Inline `data:` URL for encoded PNG bytes.
pub fn png_data_url(png: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    )
}

/// Write encoded PNG bytes to `path`, creating parent directories.
pub async fn save_png(png: &[u8], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, png).await?;
    Ok(())
}

/// Decode any supported image file into RGBA.
pub fn load_image(path: &Path) -> Result<RgbaImage> {
    Ok(image::open(path)?.to_rgba8())
}

/// File name for the photo attached to message `message` of session `session`.
pub fn image_path(images_dir: &Path, session: usize, message: usize) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    images_dir.join(format!("session_{session}_msg_{message}_{stamp}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255]))
    }

    #[test]
    fn test_release_is_deferred_one_frame() {
        let mut arena = ImageArena::new();
        arena.begin_frame(1);
        let handle = arena.insert(pixel(2, 2));
        let id = handle.id();

        arena.release(handle);
        // Still readable during the frame it was released in
        assert!(arena.get(id).is_some());
        assert!(!arena.is_live(id));
        assert_eq!(arena.begin_frame(1), 0);

        assert_eq!(arena.begin_frame(2), 1);
        assert!(arena.get(id).is_none());
    }

    #[test]
    fn test_stale_id_after_slot_reuse() {
        let mut arena = ImageArena::new();
        let first = arena.insert(pixel(1, 1));
        let stale = first.id();
        arena.release(first);
        arena.begin_frame(1);

        let second = arena.insert(pixel(3, 3));
        assert!(arena.get(stale).is_none());
        assert_eq!(arena.get(second.id()).map(|i| i.width()), Some(3));
        assert_eq!(arena.live_count(), 1);
    }

    #[test]
    fn test_data_url_prefix() {
        let url = png_data_url(&encode_png(&pixel(4, 4)).unwrap());
        assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = image_path(&dir.path().join("images"), 0, 1);
        let png = encode_png(&pixel(5, 3)).unwrap();
        save_png(&png, &path).await.unwrap();
        let loaded = load_image(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (5, 3));
        assert_eq!(loaded.get_pixel(0, 0), &image::Rgba([10, 20, 30, 255]));
    }
}
