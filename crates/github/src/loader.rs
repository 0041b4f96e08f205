use crate::avatar::{AvatarImage, ImageLoadError};
use crate::client::GithubClient;
use std::io::Read;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Upper bound on a single avatar download.
const MAX_AVATAR_BYTES: u64 = 8 * 1024 * 1024;

/// Anything that can fetch raw avatar image bytes.
pub trait AvatarSource: Send + Sync {
    fn fetch_avatar(&self, url: &str) -> Result<Vec<u8>, ImageLoadError>;
}

impl AvatarSource for GithubClient {
    fn fetch_avatar(&self, url: &str) -> Result<Vec<u8>, ImageLoadError> {
        let response = self.agent().get(url).call().map_err(|e| match e {
            ureq::Error::Status(status, _) => ImageLoadError::Fetch(format!("HTTP {status}")),
            ureq::Error::Transport(t) => ImageLoadError::Fetch(t.to_string()),
        })?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_AVATAR_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| ImageLoadError::Fetch(e.to_string()))?;
        Ok(bytes)
    }
}

/// Fetch and composite one avatar. Failures resolve to `None` instead of an error.
pub fn load_avatar(source: &dyn AvatarSource, url: &str) -> Option<AvatarImage> {
    match source
        .fetch_avatar(url)
        .and_then(|bytes| AvatarImage::from_bytes(&bytes))
    {
        Ok(avatar) => Some(avatar),
        Err(e) => {
            tracing::debug!(%url, "avatar unavailable: {e}");
            None
        }
    }
}

/// One avatar to load, tagged with the pet it belongs to.
#[derive(Debug, Clone)]
pub struct AvatarJob {
    pub index: usize,
    pub url: String,
}

/// Result of one avatar load. `avatar` is `None` when the load failed.
#[derive(Debug)]
pub struct LoadedAvatar {
    pub index: usize,
    pub avatar: Option<AvatarImage>,
}

/// A worker that never started still owes its job a result.
fn report_spawn_failure(
    tx: &Sender<LoadedAvatar>,
    index: usize,
    spawned: std::io::Result<JoinHandle<()>>,
) {
    if let Err(e) = spawned {
        tracing::warn!(index, "could not start avatar worker: {e}");
        let _ = tx.send(LoadedAvatar {
            index,
            avatar: None,
        });
    }
}

/// Loads avatars on worker threads and hands results back as they finish.
///
/// Every job produces exactly one [`LoadedAvatar`], so a failing URL never
/// holds up the others.
pub struct AvatarLoader {
    rx: Receiver<LoadedAvatar>,
    pending: usize,
}

impl AvatarLoader {
    /// Start one worker per job.
    pub fn spawn(source: Arc<dyn AvatarSource>, jobs: Vec<AvatarJob>) -> Self {
        let (tx, rx) = mpsc::channel();
        let pending = jobs.len();

        for job in jobs {
            let worker_tx = tx.clone();
            let source = Arc::clone(&source);
            let index = job.index;
            let spawned = thread::Builder::new()
                .name(format!("avatar-{index}"))
                .spawn(move || {
                    let avatar = load_avatar(source.as_ref(), &job.url);
                    // Receiver gone means the app is shutting down.
                    let _ = worker_tx.send(LoadedAvatar {
                        index: job.index,
                        avatar,
                    });
                });
            report_spawn_failure(&tx, index, spawned);
        }

        Self { rx, pending }
    }

    /// Results that have arrived since the last call. Never blocks.
    pub fn poll(&mut self) -> Vec<LoadedAvatar> {
        let ready: Vec<LoadedAvatar> = self.rx.try_iter().collect();
        self.pending = self.pending.saturating_sub(ready.len());
        ready
    }

    /// Wait up to `timeout` for the next result.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<LoadedAvatar> {
        match self.rx.recv_timeout(timeout) {
            Ok(loaded) => {
                self.pending = self.pending.saturating_sub(1);
                Some(loaded)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of jobs whose result has not been collected yet.
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn is_done(&self) -> bool {
        self.pending == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    struct Fake {
        png: Vec<u8>,
    }

    impl Fake {
        fn new() -> Self {
            let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([9, 9, 9, 255])));
            let mut cursor = std::io::Cursor::new(Vec::new());
            img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
            Self {
                png: cursor.into_inner(),
            }
        }
    }

    impl AvatarSource for Fake {
        fn fetch_avatar(&self, url: &str) -> Result<Vec<u8>, ImageLoadError> {
            match url {
                "ok" => Ok(self.png.clone()),
                "garbage" => Ok(b"nope".to_vec()),
                _ => Err(ImageLoadError::Fetch("HTTP 404".into())),
            }
        }
    }

    #[test]
    fn load_avatar_swallows_errors() {
        let fake = Fake::new();
        assert!(load_avatar(&fake, "ok").is_some());
        assert!(load_avatar(&fake, "missing").is_none());
        assert!(load_avatar(&fake, "garbage").is_none());
    }

    #[test]
    fn one_failure_does_not_block_the_rest() {
        let urls = ["ok", "missing", "ok", "garbage", "ok"];
        let jobs = urls
            .iter()
            .enumerate()
            .map(|(index, url)| AvatarJob {
                index,
                url: url.to_string(),
            })
            .collect();
        let mut loader = AvatarLoader::spawn(Arc::new(Fake::new()), jobs);

        let mut results = Vec::new();
        while let Some(loaded) = loader.recv_timeout(Duration::from_secs(5)) {
            results.push(loaded);
            if loader.is_done() {
                break;
            }
        }
        results.sort_by_key(|l| l.index);

        assert_eq!(results.len(), urls.len());
        let loaded: Vec<bool> = results.iter().map(|l| l.avatar.is_some()).collect();
        assert_eq!(loaded, vec![true, false, true, false, true]);
        assert!(loader.poll().is_empty());
    }

    #[test]
    fn empty_loader_is_done() {
        let mut loader = AvatarLoader::spawn(Arc::new(Fake::new()), Vec::new());
        assert!(loader.is_done());
        assert!(loader.poll().is_empty());
    }

    #[test]
    fn failed_worker_start_still_settles_its_job() {
        let (tx, rx) = mpsc::channel();
        let mut loader = AvatarLoader { rx, pending: 2 };

        let started = thread::spawn(|| {});
        report_spawn_failure(&tx, 0, Ok(started));
        report_spawn_failure(&tx, 1, Err(std::io::Error::other("no threads left")));

        let results = loader.poll();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].index, 1);
        assert!(results[0].avatar.is_none());
        assert_eq!(loader.pending(), 1);

        tx.send(LoadedAvatar {
            index: 0,
            avatar: None,
        })
        .unwrap();
        assert_eq!(loader.poll().len(), 1);
        assert_eq!(loader.pending(), 0);
        assert!(loader.is_done());
    }
}
