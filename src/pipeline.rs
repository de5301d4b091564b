use std::{
    fs,
    path::PathBuf,
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
};

use crate::{
    catalog::{CatalogApi, CatalogError},
    config::Credentials,
};

pub const WRITE_FAILED: &str = "Write failed";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub credentials: Option<Credentials>,
    pub query: String,
    pub audio_path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMeta {
    pub title: String,
    pub artist: String,
    pub album: String,
}

/// Result of the startup fetch. The error slots are display strings, empty
/// when unset; the chain stops at the first one that gets filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewOutcome {
    pub track: TrackMeta,
    pub preview_url: String,
    pub audio_path: Option<PathBuf>,
    pub cover: Option<Vec<u8>>,
    pub token_err: String,
    pub search_err: String,
    pub download_err: String,
    pub cover_err: String,
}

impl PreviewOutcome {
    pub fn first_error(&self) -> Option<&str> {
        [&self.token_err, &self.search_err, &self.download_err]
            .into_iter()
            .find(|e| !e.is_empty())
            .map(String::as_str)
    }

    pub fn no_preview(&self) -> bool {
        self.first_error().is_none() && self.preview_url.is_empty()
    }
}

/// Token, search, download: each step runs only if the previous one worked.
pub fn run_pipeline<A: CatalogApi + ?Sized>(api: &A, config: &PipelineConfig) -> PreviewOutcome {
    let mut outcome = PreviewOutcome::default();

    let token = match &config.credentials {
        None => Err(CatalogError::MissingCredentials),
        Some(credentials) => api.fetch_token(credentials),
    };
    let token = match token {
        Ok(token) => token,
        Err(err) => {
            tracing::warn!(error = %err, "token exchange failed");
            outcome.token_err = format!("Token error: {err}");
            return outcome;
        }
    };
    tracing::debug!("token acquired");

    let track = match api.search_first(&token, &config.query) {
        Ok(track) => track,
        Err(err) => {
            tracing::warn!(query = %config.query, error = %err, "search failed");
            outcome.search_err = format!("Search error: {err}");
            return outcome;
        }
    };
    tracing::info!(
        title = %track.title,
        artist = %track.artist,
        duration_ms = track.duration_ms,
        has_preview = !track.preview_url.is_empty(),
        "search hit"
    );

    outcome.track = TrackMeta {
        title: track.title,
        artist: track.artist,
        album: track.album,
    };
    outcome.preview_url = track.preview_url;

    if !outcome.preview_url.is_empty() {
        match api.download(&outcome.preview_url) {
            Ok(bytes) => match fs::write(&config.audio_path, &bytes) {
                Ok(()) => {
                    tracing::info!(
                        path = %config.audio_path.display(),
                        bytes = bytes.len(),
                        "preview saved"
                    );
                    outcome.audio_path = Some(config.audio_path.clone());
                }
                Err(err) => {
                    tracing::warn!(path = %config.audio_path.display(), error = %err, "preview write failed");
                    outcome.download_err = WRITE_FAILED.to_string();
                }
            },
            Err(err) => {
                tracing::warn!(url = %outcome.preview_url, error = %err, "preview download failed");
                outcome.download_err = format!("Download error: {err}");
            }
        }
    }

    if let Some(url) = track.cover_url.as_deref() {
        match api.fetch_cover(url) {
            Ok(bytes) => outcome.cover = Some(bytes),
            Err(err) => {
                tracing::debug!(error = %err, "cover fetch failed");
                outcome.cover_err = format!("Cover error: {err}");
            }
        }
    }

    outcome
}

/// The pipeline running on a worker thread; the render loop polls it.
pub struct PreviewTask {
    rx: Option<Receiver<PreviewOutcome>>,
}

impl PreviewTask {
    pub fn spawn<A>(api: A, config: PipelineConfig) -> Self
    where
        A: CatalogApi + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let outcome = run_pipeline(&api, &config);
            let _ = tx.send(outcome);
        });
        Self { rx: Some(rx) }
    }

    /// Already-known outcome, used when there is nothing to fetch.
    pub fn ready(outcome: PreviewOutcome) -> Self {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(outcome);
        Self { rx: Some(rx) }
    }

    pub fn is_pending(&self) -> bool {
        self.rx.is_some()
    }

    /// Non-blocking. Yields the outcome exactly once.
    pub fn poll(&mut self) -> Option<PreviewOutcome> {
        let rx = self.rx.as_ref()?;
        match rx.try_recv() {
            Ok(outcome) => {
                self.rx = None;
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.rx = None;
                Some(PreviewOutcome {
                    token_err: "Preview worker stopped unexpectedly".to_string(),
                    ..Default::default()
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TrackInfo;
    use std::{cell::Cell, time::Duration};

    #[derive(Default)]
    struct StubCatalog {
        fail_token: bool,
        fail_search: bool,
        fail_download: bool,
        track: TrackInfo,
        audio: Vec<u8>,
        token_calls: Cell<usize>,
        search_calls: Cell<usize>,
        download_calls: Cell<usize>,
        cover_calls: Cell<usize>,
    }

    impl StubCatalog {
        fn with_track(title: &str, artist: &str, preview_url: &str) -> Self {
            Self {
                track: TrackInfo {
                    title: title.into(),
                    artist: artist.into(),
                    preview_url: preview_url.into(),
                    ..Default::default()
                },
                ..Default::default()
            }
        }
    }

    fn bump(cell: &Cell<usize>) {
        cell.set(cell.get() + 1);
    }

    fn refused() -> CatalogError {
        CatalogError::Status {
            status: 503,
            body: "unavailable".into(),
        }
    }

    impl CatalogApi for StubCatalog {
        fn fetch_token(&self, _credentials: &Credentials) -> Result<String, CatalogError> {
            bump(&self.token_calls);
            if self.fail_token {
                return Err(CatalogError::Status {
                    status: 401,
                    body: "invalid_client".into(),
                });
            }
            Ok("token".into())
        }

        fn search_first(&self, token: &str, _query: &str) -> Result<TrackInfo, CatalogError> {
            bump(&self.search_calls);
            assert_eq!(token, "token");
            if self.fail_search {
                return Err(refused());
            }
            Ok(self.track.clone())
        }

        fn download(&self, _url: &str) -> Result<Vec<u8>, CatalogError> {
            bump(&self.download_calls);
            if self.fail_download {
                return Err(refused());
            }
            Ok(self.audio.clone())
        }

        fn fetch_cover(&self, _url: &str) -> Result<Vec<u8>, CatalogError> {
            bump(&self.cover_calls);
            Err(refused())
        }
    }

    fn config_in(dir: &tempfile::TempDir) -> PipelineConfig {
        PipelineConfig {
            credentials: Some(Credentials {
                client_id: "id".into(),
                client_secret: "secret".into(),
            }),
            query: "anything".into(),
            audio_path: dir.path().join("preview.mp3"),
        }
    }

    #[test]
    fn token_failure_stops_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let api = StubCatalog {
            fail_token: true,
            ..StubCatalog::with_track("a", "b", "http://example/preview.mp3")
        };

        let outcome = run_pipeline(&api, &config_in(&dir));

        assert!(outcome.token_err.contains("401"));
        assert!(outcome.search_err.is_empty());
        assert!(outcome.download_err.is_empty());
        assert_eq!(api.search_calls.get(), 0);
        assert_eq!(api.download_calls.get(), 0);
        assert_eq!(api.cover_calls.get(), 0);
    }

    #[test]
    fn missing_credentials_skip_the_network() {
        let dir = tempfile::tempdir().unwrap();
        let api = StubCatalog::default();
        let config = PipelineConfig {
            credentials: None,
            ..config_in(&dir)
        };

        let outcome = run_pipeline(&api, &config);

        assert!(outcome.token_err.contains("not configured"));
        assert_eq!(api.token_calls.get(), 0);
        assert_eq!(api.search_calls.get(), 0);
    }

    #[test]
    fn search_failure_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let api = StubCatalog {
            fail_search: true,
            ..Default::default()
        };

        let outcome = run_pipeline(&api, &config_in(&dir));

        assert!(outcome.token_err.is_empty());
        assert!(outcome.search_err.starts_with("Search error"));
        assert_eq!(api.download_calls.get(), 0);
        assert_eq!(outcome.first_error(), Some(outcome.search_err.as_str()));
    }

    #[test]
    fn empty_preview_url_means_no_download() {
        let dir = tempfile::tempdir().unwrap();
        let api = StubCatalog::with_track("Quiet", "Nobody", "");

        let outcome = run_pipeline(&api, &config_in(&dir));

        assert_eq!(api.download_calls.get(), 0);
        assert!(outcome.download_err.is_empty());
        assert!(outcome.audio_path.is_none());
        assert!(outcome.no_preview());
        assert_eq!(outcome.track.title, "Quiet");
    }

    #[test]
    fn end_to_end_writes_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let audio: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let api = StubCatalog {
            audio: audio.clone(),
            ..StubCatalog::with_track("Test Song", "Test Artist", "http://example/preview.mp3")
        };
        let config = config_in(&dir);
        fs::write(&config.audio_path, b"stale content from a previous run").unwrap();

        let outcome = run_pipeline(&api, &config);

        assert_eq!(outcome.first_error(), None);
        assert_eq!(outcome.track.title, "Test Song");
        assert_eq!(outcome.track.artist, "Test Artist");
        assert_eq!(outcome.audio_path.as_deref(), Some(config.audio_path.as_path()));
        assert_eq!(fs::read(&config.audio_path).unwrap(), audio);
        assert_eq!(api.download_calls.get(), 1);
    }

    #[test]
    fn download_failure_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let api = StubCatalog {
            fail_download: true,
            ..StubCatalog::with_track("a", "b", "http://example/preview.mp3")
        };

        let outcome = run_pipeline(&api, &config_in(&dir));

        assert!(outcome.download_err.contains("503"));
        assert!(outcome.audio_path.is_none());
        assert_eq!(outcome.track.title, "a");
    }

    #[test]
    fn unwritable_path_reports_write_failed() {
        let dir = tempfile::tempdir().unwrap();
        let api = StubCatalog {
            audio: vec![1, 2, 3],
            ..StubCatalog::with_track("a", "b", "http://example/preview.mp3")
        };
        let config = PipelineConfig {
            audio_path: dir.path().join("missing").join("preview.mp3"),
            ..config_in(&dir)
        };

        let outcome = run_pipeline(&api, &config);

        assert_eq!(outcome.download_err, WRITE_FAILED);
        assert!(outcome.audio_path.is_none());
    }

    #[test]
    fn cover_failure_does_not_touch_audio_slots() {
        let dir = tempfile::tempdir().unwrap();
        let mut api = StubCatalog::with_track("a", "b", "");
        api.track.cover_url = Some("http://img/640".into());

        let outcome = run_pipeline(&api, &config_in(&dir));

        assert_eq!(api.cover_calls.get(), 1);
        assert!(!outcome.cover_err.is_empty());
        assert_eq!(outcome.first_error(), None);
    }

    #[test]
    fn task_delivers_outcome_once() {
        let outcome = PreviewOutcome {
            preview_url: "http://example/preview.mp3".into(),
            ..Default::default()
        };
        let mut task = PreviewTask::ready(outcome.clone());
        assert!(task.is_pending());
        assert_eq!(task.poll(), Some(outcome));
        assert!(!task.is_pending());
        assert_eq!(task.poll(), None);
    }

    #[test]
    fn spawned_task_finishes() {
        struct SendStub;
        impl CatalogApi for SendStub {
            fn fetch_token(&self, _: &Credentials) -> Result<String, CatalogError> {
                Err(CatalogError::MissingCredentials)
            }
            fn search_first(&self, _: &str, _: &str) -> Result<TrackInfo, CatalogError> {
                unreachable!("search must not run after a token failure")
            }
            fn download(&self, _: &str) -> Result<Vec<u8>, CatalogError> {
                unreachable!()
            }
            fn fetch_cover(&self, _: &str) -> Result<Vec<u8>, CatalogError> {
                unreachable!()
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut task = PreviewTask::spawn(SendStub, config_in(&dir));
        let mut outcome = None;
        for _ in 0..200 {
            outcome = task.poll();
            if outcome.is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        let outcome = outcome.expect("worker should answer within two seconds");
        assert!(!outcome.token_err.is_empty());
    }
}
