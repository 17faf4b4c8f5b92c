use std::path::{Path, PathBuf};

pub const MAX_IMAGES_PER_ISSUE: usize = 3;

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// A file received with a report, before it is accepted or dropped.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// Lowercased extension if this upload may be stored.
    pub fn accepted_extension(&self) -> Option<String> {
        if self.bytes.is_empty() {
            return None;
        }
        allowed_extension(&self.file_name)
    }
}

pub fn allowed_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Image bytes on disk. Only the generated file name goes in the database.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write the bytes under a fresh name and return that name.
    pub fn save(&self, extension: &str, bytes: &[u8]) -> std::io::Result<String> {
        std::fs::create_dir_all(&self.root)?;
        let name = format!("{}.{}", uuid::Uuid::now_v7(), extension);
        std::fs::write(self.root.join(&name), bytes)?;
        Ok(name)
    }

    pub fn remove(&self, name: &str) {
        if let Some(path) = self.resolve(name) {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }

    /// Path of a stored file. Names with path separators are refused.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let plain = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\'])
            && !name.contains("..");
        plain.then(|| self.root.join(name))
    }
}
