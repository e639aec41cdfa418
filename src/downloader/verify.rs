// Artifact verification

use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncReadExt;

/// Bytes read back to prove the file is readable
const PROBE_BYTES: usize = 100;

/// Confirms a finished download is a real, non-empty, readable file.
#[derive(Debug, Clone)]
pub struct ArtifactVerifier {
    /// Pause before the single check, so the filesystem can catch up with
    /// the final flush/rename done by the extractor.
    grace: Duration,
}

impl ArtifactVerifier {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Wait out the grace period, then check once.
    pub async fn verify(&self, path: &Path) -> bool {
        if !self.grace.is_zero() {
            tokio::time::sleep(self.grace).await;
        }
        match read_head(path).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "artifact verification failed");
                false
            }
        }
    }

    /// Cheap existence check used when handing the artifact out later.
    pub fn still_present(path: &Path) -> bool {
        path.is_file()
    }
}

impl Default for ArtifactVerifier {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

async fn read_head(path: &Path) -> std::io::Result<()> {
    let meta = tokio::fs::metadata(path).await?;
    if !meta.is_file() {
        return Err(std::io::Error::new(std::io::ErrorKind::Other, "not a regular file"));
    }
    if meta.len() == 0 {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "file is empty"));
    }
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = [0u8; PROBE_BYTES];
    let read = file.read(&mut buf).await?;
    tracing::trace!(path = %path.display(), bytes = read, "artifact head read");
    Ok(())
}
