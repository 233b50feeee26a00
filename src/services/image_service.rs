use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use tracing::{debug, warn};

/// Extensions accepted for idea thumbnails, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "png", "jpeg"];

/// Bounding box (in pixels) stored images are shrunk to fit.
pub const MAX_DIMENSION: u32 = 400;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Solo se permiten imágenes (JPG, PNG, JPEG)!")]
    DisallowedExtension,
    #[error("Invalid image filename: {0}")]
    InvalidFilename(String),
    #[error("La imagen no se pudo procesar: {0}")]
    Processing(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Image task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Stores uploaded thumbnails in a flat directory under random names.
#[derive(Debug, Clone)]
pub struct ImageManager {
    dir: PathBuf,
}

impl ImageManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Extension of `original_name` if it is one of [`ALLOWED_EXTENSIONS`].
    /// The original casing is kept.
    pub fn allowed_extension(original_name: &str) -> Option<&str> {
        let ext = Path::new(original_name).extension()?.to_str()?;
        ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            .then_some(ext)
    }

    /// Decodes `bytes`, shrinks the image into the bounding box and writes it
    /// under a fresh `<16 hex chars>.<ext>` name, which is returned.
    pub async fn save(&self, original_name: &str, bytes: Vec<u8>) -> Result<String, ImageError> {
        let ext = Self::allowed_extension(original_name).ok_or(ImageError::DisallowedExtension)?;
        let format = ImageFormat::from_extension(ext.to_ascii_lowercase())
            .ok_or(ImageError::DisallowedExtension)?;

        let token: [u8; 8] = rand::random();
        let filename = format!("{}.{}", hex::encode(token), ext);
        let path = self.dir.join(&filename);

        // Decode and encode in memory; only the write below touches the disk,
        // so an I/O failure is never mistaken for a bad upload.
        let (encoded, width, height) = tokio::task::spawn_blocking(move || -> Result<_, ImageError> {
            let img = fit_within(image::load_from_memory(&bytes)?, MAX_DIMENSION);
            let (width, height) = (img.width(), img.height());
            let img = match format {
                // JPEG has no alpha channel
                ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
                _ => img,
            };
            let mut buf = Cursor::new(Vec::new());
            img.write_to(&mut buf, format)?;
            Ok((buf.into_inner(), width, height))
        })
        .await??;

        if let Err(e) = tokio::fs::write(&path, encoded).await {
            if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %cleanup, "Failed to remove partial image.");
                }
            }
            return Err(e.into());
        }

        debug!(%filename, width, height, "Stored uploaded image.");
        Ok(filename)
    }

    /// Removes `filename`. A file that is already gone is not an error.
    pub async fn delete(&self, filename: &str) -> Result<(), ImageError> {
        let path = self.path_for(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(%filename, "Removed stored image.");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, filename: &str) -> bool {
        match self.path_for(filename) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    fn path_for(&self, filename: &str) -> Result<PathBuf, ImageError> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == filename => Ok(self.dir.join(filename)),
            _ => Err(ImageError::InvalidFilename(filename.to_string())),
        }
    }
}

/// Shrinks `img` so neither side exceeds `max`, keeping the aspect ratio.
/// Images already inside the box are returned untouched.
pub fn fit_within(img: DynamicImage, max: u32) -> DynamicImage {
    if img.width() <= max && img.height() <= max {
        img
    } else {
        img.thumbnail(max, max)
    }
}
