//! Payload delivery
//!
//! The assembled recording is handed to a delivery collaborator together with
//! a suggested filename. The recorder itself never touches the filesystem;
//! `DirectoryDelivery` is provided for hosts that simply want a file on disk.

use crate::recorder::sink::ContainerPayload;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Receives finished recordings
#[async_trait]
pub trait PayloadDelivery: Send + Sync {
    async fn deliver(&self, filename: &str, payload: &ContainerPayload) -> anyhow::Result<()>;
}

/// Writes recordings into a directory without overwriting existing files
pub struct DirectoryDelivery {
    dir: PathBuf,
    written: Mutex<Vec<PathBuf>>,
}

impl DirectoryDelivery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Mutex::new(Vec::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files written so far, in order
    pub fn written(&self) -> Vec<PathBuf> {
        self.written.lock().clone()
    }

    /// Candidate paths in order: `name.ext`, then `name-1.ext`, `name-2.ext`, ...
    fn candidate(&self, filename: &str, n: u32) -> PathBuf {
        if n == 0 {
            return self.dir.join(filename);
        }
        let path = Path::new(filename);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| filename.to_string());
        match path.extension() {
            Some(ext) => self.dir.join(format!("{}-{}.{}", stem, n, ext.to_string_lossy())),
            None => self.dir.join(format!("{}-{}", stem, n)),
        }
    }

    /// Create the first candidate that does not exist yet.
    ///
    /// Creation is exclusive, so concurrent deliveries never share a path.
    async fn create_free(&self, filename: &str) -> io::Result<(PathBuf, fs::File)> {
        let mut n = 0u32;
        loop {
            let path = self.candidate(filename, n);
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl PayloadDelivery for DirectoryDelivery {
    async fn deliver(&self, filename: &str, payload: &ContainerPayload) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let (path, mut file) = self.create_free(filename).await?;
        file.write_all(&payload.data).await?;
        file.flush().await?;

        tracing::info!("Wrote {} bytes to {:?}", payload.len(), path);
        self.written.lock().push(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn payload(data: &[u8]) -> ContainerPayload {
        ContainerPayload {
            mime_type: "video/webm".to_string(),
            data: data.to_vec(),
            chunks: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_writes_payload() {
        let dir = tempdir().unwrap();
        let delivery = DirectoryDelivery::new(dir.path().join("downloads"));

        delivery
            .deliver("recorded-video.webm", &payload(b"webm-bytes"))
            .await
            .unwrap();

        let path = dir.path().join("downloads").join("recorded-video.webm");
        assert_eq!(std::fs::read(&path).unwrap(), b"webm-bytes");
        assert_eq!(delivery.written(), vec![path]);
    }

    #[tokio::test]
    async fn test_never_overwrites() {
        let dir = tempdir().unwrap();
        let delivery = DirectoryDelivery::new(dir.path());

        delivery.deliver("recorded-video.webm", &payload(b"one")).await.unwrap();
        delivery.deliver("recorded-video.webm", &payload(b"two")).await.unwrap();
        delivery.deliver("recorded-video.webm", &payload(b"three")).await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("recorded-video.webm")).unwrap(), b"one");
        assert_eq!(std::fs::read(dir.path().join("recorded-video-1.webm")).unwrap(), b"two");
        assert_eq!(std::fs::read(dir.path().join("recorded-video-2.webm")).unwrap(), b"three");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_deliveries_keep_both_files() {
        let dir = tempdir().unwrap();
        let delivery = DirectoryDelivery::new(dir.path());

        for _ in 0..20 {
            let first = payload(b"first");
            let second = payload(b"second");
            let (a, b) = tokio::join!(
                delivery.deliver("recorded-video.webm", &first),
                delivery.deliver("recorded-video.webm", &second),
            );
            a.unwrap();
            b.unwrap();
        }

        let mut contents: Vec<Vec<u8>> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| std::fs::read(entry.unwrap().path()).unwrap())
            .collect();
        assert_eq!(contents.len(), 40);
        assert_eq!(contents.iter().filter(|c| c.as_slice() == b"first").count(), 20);
        assert_eq!(contents.iter().filter(|c| c.as_slice() == b"second").count(), 20);
        assert_eq!(delivery.written().len(), 40);
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let delivery = DirectoryDelivery::new(&blocker);
        assert!(delivery.deliver("recorded-video.webm", &payload(b"x")).await.is_err());
        assert!(delivery.written().is_empty());
    }
}
