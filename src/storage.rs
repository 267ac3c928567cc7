use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::errors::AppError;

/// Extensions accepted by the post image upload.
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Prefix under which stored objects are served by the router.
pub const PUBLIC_PREFIX: &str = "/storage";

/// StorageService
///
/// The contract for persisting uploaded files. Handlers decide the object key;
/// the implementation decides where the bytes live and which URL serves them.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Prepares the backing store (e.g. creates the root directory). Called once at startup.
    async fn ensure_ready(&self) -> Result<(), AppError>;

    /// Writes `bytes` under `key` and returns the public URL of the stored object.
    ///
    /// # Arguments
    /// * `key`: Relative object path, e.g. `posts/<uuid>.png`. Traversal
    ///   segments are stripped before use.
    async fn put_object(&self, key: &str, bytes: &[u8]) -> Result<String, AppError>;

    /// Removes the object under `key`. A missing object is not an error.
    async fn delete_object(&self, key: &str) -> Result<(), AppError>;
}

/// LocalDiskStorage
///
/// Stores objects below `root` on the local filesystem. The router serves the same
/// directory under `/storage`, so the returned URLs are relative to the API host.
#[derive(Clone, Debug)]
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl StorageService for LocalDiskStorage {
    async fn ensure_ready(&self) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    async fn put_object(&self, key: &str, bytes: &[u8]) -> Result<String, AppError> {
        let key = sanitize_key(key);
        if key.is_empty() {
            return Err(AppError::Storage("empty object key".to_string()));
        }

        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(path = %path.display(), size = bytes.len(), "stored object");
        Ok(format!("{PUBLIC_PREFIX}/{key}"))
    }

    async fn delete_object(&self, key: &str) -> Result<(), AppError> {
        let key = sanitize_key(key);
        if key.is_empty() {
            return Ok(());
        }
        match tokio::fs::remove_file(self.root.join(&key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// sanitize_key
///
/// Drops empty, `.` and `..` segments so a key can never leave the storage root.
pub fn sanitize_key(key: &str) -> String {
    key.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// image_extension
///
/// Resolves the stored extension for an uploaded image from its file name, falling
/// back to the declared content type. `None` means the upload is not an accepted image.
pub fn image_extension(file_name: Option<&str>, content_type: Option<&str>) -> Option<&'static str> {
    let from_name = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .and_then(|ext| {
            ALLOWED_IMAGE_EXTENSIONS
                .iter()
                .copied()
                .find(|allowed| *allowed == ext)
        });

    from_name.or_else(|| match content_type? {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    })
}

/// MockStorageService
///
/// In-memory stand-in for tests: no bytes are kept, only the keys, and the URL
/// is deterministic.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    /// Puts fail once this many objects are held.
    pub capacity: Option<usize>,
    keys: Arc<Mutex<Vec<String>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Keys currently held, in insertion order.
    pub fn stored_keys(&self) -> Vec<String> {
        self.keys.lock().map(|keys| keys.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_ready(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn put_object(&self, key: &str, _bytes: &[u8]) -> Result<String, AppError> {
        let mut keys = self
            .keys
            .lock()
            .map_err(|_| AppError::Storage("mock storage lock poisoned".to_string()))?;
        let full = self.capacity.is_some_and(|capacity| keys.len() >= capacity);
        if self.should_fail || full {
            return Err(AppError::Storage(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }

        let key = sanitize_key(key);
        keys.push(key.clone());
        Ok(format!("{PUBLIC_PREFIX}/{key}"))
    }

    async fn delete_object(&self, key: &str) -> Result<(), AppError> {
        let key = sanitize_key(key);
        let mut keys = self
            .keys
            .lock()
            .map_err(|_| AppError::Storage("mock storage lock poisoned".to_string()))?;
        keys.retain(|held| *held != key);
        Ok(())
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;
