//! Common test utilities for pipeline tests.

use async_trait::async_trait;
use bytes::Bytes;
use encore_assets::AssetPipeline;
use encore_core::config::AssetConfig;
use encore_core::{ImageId, UserId};
use encore_metadata::{ImageRepo, ImageRow, SqliteStore};
use encore_storage::{
    CopyOptions, FilesystemBackend, ObjectMeta, ObjectStore, PutOptions, StorageError,
    StorageResult,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

/// A storage mutation observed by [`RecordingStore`].
#[allow(dead_code)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    Put(String),
    Copy { from: String, to: String },
    Delete(String),
}

/// Wraps a backend and records every mutating call. Can also pretend keys
/// under a prefix are not visible yet.
pub struct RecordingStore {
    inner: Arc<dyn ObjectStore>,
    mutations: Mutex<Vec<Mutation>>,
    hidden_prefix: Mutex<Option<String>>,
}

#[allow(dead_code)]
impl RecordingStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            mutations: Mutex::new(Vec::new()),
            hidden_prefix: Mutex::new(None),
        }
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.mutations.lock().unwrap().clear();
    }

    /// Make `head` and `exists` report keys under `prefix` as absent.
    pub fn hide(&self, prefix: &str) {
        *self.hidden_prefix.lock().unwrap() = Some(prefix.to_string());
    }

    fn record(&self, mutation: Mutation) {
        self.mutations.lock().unwrap().push(mutation);
    }

    fn is_hidden(&self, key: &str) -> bool {
        self.hidden_prefix
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|prefix| key.starts_with(prefix))
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        if self.is_hidden(key) {
            return Ok(false);
        }
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        if self.is_hidden(key) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes, options: PutOptions) -> StorageResult<()> {
        self.record(Mutation::Put(key.to_string()));
        self.inner.put(key, data, options).await
    }

    async fn copy(&self, from: &str, to: &str, options: CopyOptions) -> StorageResult<()> {
        self.record(Mutation::Copy {
            from: from.to_string(),
            to: to.to_string(),
        });
        self.inner.copy(from, to, options).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.record(Mutation::Delete(key.to_string()));
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// A full pipeline over a temporary filesystem store and SQLite file.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestEnv {
    /// The raw backend; writes here are not recorded.
    pub backend: Arc<dyn ObjectStore>,
    pub recorder: Arc<RecordingStore>,
    pub metadata: Arc<SqliteStore>,
    pub pipeline: AssetPipeline,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestEnv {
    pub async fn new() -> Self {
        Self::with_store(|recorder, _| recorder as Arc<dyn ObjectStore>).await
    }

    /// Like [`TestEnv::new`], but the pipeline talks to whatever `wrap`
    /// builds around the recorder.
    pub async fn with_store<F>(wrap: F) -> Self
    where
        F: FnOnce(Arc<RecordingStore>, Arc<SqliteStore>) -> Arc<dyn ObjectStore>,
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let backend: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(temp_dir.path().join("objects"))
                .await
                .expect("filesystem backend"),
        );
        let recorder = Arc::new(RecordingStore::new(backend.clone()));
        let metadata = Arc::new(
            SqliteStore::new(temp_dir.path().join("metadata.db"), 5)
                .await
                .expect("sqlite store"),
        );
        let store = wrap(recorder.clone(), metadata.clone());
        let pipeline =
            AssetPipeline::new(store, metadata.clone(), &config()).expect("pipeline");

        Self {
            backend,
            recorder,
            metadata,
            pipeline,
            _temp_dir: temp_dir,
        }
    }

    /// Write an object directly to the backend, bypassing the recorder.
    pub async fn seed(&self, key: &str, data: Vec<u8>) {
        self.backend
            .put(key, Bytes::from(data), PutOptions::default())
            .await
            .expect("seed object");
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.backend.exists(key).await.expect("exists")
    }

    pub async fn image(&self, image_id: ImageId) -> ImageRow {
        let mut conn = self.metadata.acquire().await.expect("connection");
        conn.find_image(image_id)
            .await
            .expect("find image")
            .expect("image row")
    }

    pub async fn find_image(&self, image_id: ImageId) -> Option<ImageRow> {
        let mut conn = self.metadata.acquire().await.expect("connection");
        conn.find_image(image_id).await.expect("find image")
    }

    /// Decoded dimensions of a stored image.
    pub async fn dimensions(&self, key: &str) -> (u32, u32) {
        let bytes = self.backend.get(key).await.expect("get object");
        let img = image::load_from_memory(&bytes).expect("decode stored image");
        (img.width(), img.height())
    }
}

pub fn config() -> AssetConfig {
    AssetConfig {
        public_base_url: "https://cdn.test/{key}".to_string(),
        existence_wait_attempts: 2,
        existence_wait_step_ms: 1,
        ..AssetConfig::default()
    }
}

#[allow(dead_code)]
pub fn user() -> UserId {
    UserId::from_uuid(Uuid::new_v4())
}

fn patterned(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

#[allow(dead_code)]
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(patterned(width, height))
        .write_to(&mut out, ImageFormat::Jpeg)
        .expect("encode jpeg fixture");
    out.into_inner()
}

#[allow(dead_code)]
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(patterned(width, height))
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png fixture");
    out.into_inner()
}

/// JPEG fixture whose EXIF Orientation tag is `orientation`.
#[allow(dead_code)]
pub fn jpeg_with_orientation(width: u32, height: u32, orientation: u8) -> Vec<u8> {
    let jpeg = jpeg_bytes(width, height);
    let mut app1 = vec![0xFF, 0xE1, 0x00, 0x22];
    app1.extend_from_slice(b"Exif\0\0");
    app1.extend_from_slice(&[b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]);
    app1.extend_from_slice(&[0x00, 0x01, 0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    app1.extend_from_slice(&[0x00, orientation, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[2..]);
    out
}
