mod audio;
mod catalog;
mod config;
mod input;
mod pipeline;
mod render;
mod state;
mod theme;
mod watch;

use crate::{
    audio::{apply_commands, track_finished, RodioTransport, Transport},
    catalog::SpotifyClient,
    config::Config,
    pipeline::{PipelineConfig, PreviewOutcome, PreviewTask},
    render::{
        decode_cover_image, diagnostic_line, draw_frame, CardView, Progress, SCREEN_HEIGHT,
        SCREEN_WIDTH,
    },
    state::{reduce, CardState, FrameInput, TransportCommand},
    watch::ConfigWatcher,
};
use anyhow::anyhow;
use clap::Parser;
use eframe::egui::{self, LayerId, TextureHandle, TextureOptions, ViewportBuilder};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Longest frame delta fed to the reducer, so a stalled frame cannot
/// swallow an overlay before it was ever drawn.
const MAX_FRAME_DT: f32 = 0.25;

#[derive(Parser)]
#[command(name = "swipe_sonic")]
#[command(about = "Swipe through a track preview: like, skip, play")]
struct Args {
    /// Config file to use instead of the default search locations
    #[arg(long)]
    config: Option<PathBuf>,
    /// Search query for the startup track
    #[arg(long)]
    query: Option<String>,
    /// Reload theme and overlay timing when the config file changes
    #[arg(long)]
    watch: bool,
    /// Debug logging regardless of RUST_LOG
    #[arg(long, short)]
    verbose: bool,
}

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,swipe_sonic=debug"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!("Failed to install logger: {e}"))
}

struct App {
    config: Config,
    state: CardState,
    preview: PreviewTask,
    outcome: Option<PreviewOutcome>,
    transport: Option<Box<dyn Transport>>,
    audio_err: Option<String>,
    cover_texture: Option<TextureHandle>,
    watcher: Option<ConfigWatcher>,
}

impl App {
    fn new(config: Config) -> Self {
        let pipeline_config = PipelineConfig {
            credentials: config.spotify.credentials(),
            query: config.preview.query.clone(),
            audio_path: config.preview.audio_path.clone(),
        };
        if pipeline_config.credentials.is_none() {
            tracing::warn!("Spotify credentials missing; starting without a preview");
        }

        let preview = match SpotifyClient::new(&config.spotify, config.preview.timeout) {
            Ok(client) => PreviewTask::spawn(client, pipeline_config),
            Err(err) => {
                tracing::error!(error = %err, "HTTP client setup failed");
                PreviewTask::ready(PreviewOutcome {
                    token_err: format!("Token error: {err}"),
                    ..Default::default()
                })
            }
        };

        let watcher = if config.ui.watch_config {
            match config.source.as_deref().map(ConfigWatcher::new) {
                Some(Ok(watcher)) => Some(watcher),
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "config hot reload disabled");
                    None
                }
                None => {
                    tracing::warn!("config hot reload requested but no config file was loaded");
                    None
                }
            }
        } else {
            None
        };

        Self {
            config,
            state: CardState::default(),
            preview,
            outcome: None,
            transport: None,
            audio_err: None,
            cover_texture: None,
            watcher,
        }
    }

    fn poll_preview(&mut self, ctx: &egui::Context) {
        let Some(mut outcome) = self.preview.poll() else {
            return;
        };

        if let Some(path) = &outcome.audio_path {
            match RodioTransport::open(path) {
                Ok(transport) => self.install_transport(Box::new(transport)),
                Err(err) => {
                    tracing::warn!(error = %format!("{err:#}"), "audio unavailable");
                    self.audio_err = Some(format!("{err:#}"));
                }
            }
        }

        if let Some(bytes) = outcome.cover.take() {
            match decode_cover_image(&bytes) {
                Ok(image) => {
                    self.cover_texture =
                        Some(ctx.load_texture("swipe_sonic.cover", image, TextureOptions::LINEAR));
                }
                Err(err) => {
                    tracing::debug!(error = %err, "cover decode failed");
                    outcome.cover_err = err;
                }
            }
        }

        tracing::debug!(
            error = outcome.first_error().unwrap_or(""),
            cover_error = %outcome.cover_err,
            has_audio = self.transport.is_some(),
            "preview outcome applied"
        );
        self.outcome = Some(outcome);
    }

    /// A toggle pressed while the fetch was in flight already shows
    /// "Playing"; the audio catches up here.
    fn install_transport(&mut self, mut transport: Box<dyn Transport>) {
        if self.state.playing && !self.state.started {
            tracing::debug!("audio arrived while playing; starting it");
            self.state.started = true;
            if let Some(err) = apply_commands(transport.as_mut(), &[TransportCommand::Start]) {
                self.audio_err = Some(err);
            }
        }
        self.transport = Some(transport);
    }

    fn poll_config_reload(&mut self) {
        let Some(watcher) = &self.watcher else {
            return;
        };
        if !watcher.poll_changed() {
            return;
        }
        match self.config.reload_live() {
            Ok(()) => {
                tracing::info!("config reloaded");
                for warning in &self.config.warnings {
                    tracing::warn!("{warning}");
                }
            }
            Err(err) => tracing::warn!(error = %format!("{err:#}"), "config reload failed"),
        }
    }

    fn transport_finished(&self) -> bool {
        if !(self.state.playing && self.state.started) {
            return false;
        }
        self.transport
            .as_deref()
            .map(|t| track_finished(t.position(), t.length(), t.is_empty()))
            .unwrap_or(false)
    }

    fn step(&mut self, input: &FrameInput, dt: f32) {
        let step = reduce(&self.state, input, dt, self.config.ui.overlay_seconds());
        self.state = step.state;
        if let Some(transport) = self.transport.as_deref_mut() {
            if let Some(err) = apply_commands(transport, &step.commands) {
                self.audio_err = Some(err);
            }
        }
    }

    fn progress(&self) -> Option<Progress> {
        self.transport.as_deref().map(|t| Progress {
            position: t.position(),
            length: t.length(),
        })
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_preview(ctx);
        self.poll_config_reload();

        let dt = ctx.input(|i| i.stable_dt).clamp(0.0, MAX_FRAME_DT);
        let input =
            FrameInput::from_keys(ctx, self.transport.is_some(), self.transport_finished());
        self.step(&input, dt);

        let (title, artist, context) = CardView::metadata(self.outcome.as_ref());
        let view = CardView {
            state: &self.state,
            palette: &self.config.palette,
            title,
            artist,
            context,
            query: &self.config.preview.query,
            cover: self.cover_texture.as_ref(),
            progress: self.progress(),
            diagnostic: diagnostic_line(
                self.preview.is_pending(),
                self.outcome.as_ref(),
                self.audio_err.as_deref(),
            ),
        };
        let painter = ctx.layer_painter(LayerId::background());
        draw_frame(&painter, ctx.screen_rect(), &view);

        ctx.request_repaint();
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.stop();
            tracing::debug!("audio transport released");
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(query) = args.query {
        config.preview.query = query;
    }
    if args.watch {
        config.ui.watch_config = true;
    }
    for warning in &config.warnings {
        tracing::warn!("{warning}");
    }
    tracing::info!(
        source = ?config.source,
        query = %config.preview.query,
        "starting"
    );

    let native_options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_title("Swipe Sonic")
            .with_inner_size([SCREEN_WIDTH, SCREEN_HEIGHT])
            .with_resizable(false),
        vsync: true,
        ..Default::default()
    };
    eframe::run_native(
        "Swipe Sonic",
        native_options,
        Box::new(
            |_cc| -> std::result::Result<
                Box<dyn eframe::App>,
                Box<dyn std::error::Error + Send + Sync>,
            > { Ok(Box::new(App::new(config))) },
        ),
    )
    .map_err(|e| anyhow!("Window failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tests::FakeTransport;
    use std::time::Duration;

    fn app_with(transport: Option<FakeTransport>, outcome: Option<PreviewOutcome>) -> App {
        App {
            config: Config::default(),
            state: CardState::default(),
            preview: PreviewTask::ready(outcome.unwrap_or_default()),
            outcome: None,
            transport: transport.map(|t| Box::new(t) as Box<dyn Transport>),
            audio_err: None,
            cover_texture: None,
            watcher: None,
        }
    }

    fn toggle() -> FrameInput {
        FrameInput {
            toggle: true,
            audio_ready: true,
            ..Default::default()
        }
    }

    #[test]
    fn outcome_is_picked_up_on_the_next_frame() {
        let ctx = egui::Context::default();
        let outcome = PreviewOutcome {
            search_err: "Search error: offline".into(),
            ..Default::default()
        };
        let mut app = app_with(None, Some(outcome));

        app.poll_preview(&ctx);

        assert!(!app.preview.is_pending());
        assert_eq!(
            app.outcome.as_ref().map(|o| o.search_err.as_str()),
            Some("Search error: offline")
        );
        assert!(app.transport.is_none());
    }

    #[test]
    fn missing_audio_file_degrades_instead_of_failing() {
        let ctx = egui::Context::default();
        let dir = tempfile::tempdir().unwrap();
        let outcome = PreviewOutcome {
            preview_url: "http://example/preview.mp3".into(),
            audio_path: Some(dir.path().join("absent.mp3")),
            ..Default::default()
        };
        let mut app = app_with(None, Some(outcome));

        app.poll_preview(&ctx);

        assert!(app.transport.is_none());
        assert!(app.audio_err.is_some());
    }

    #[test]
    fn commands_reach_the_transport() {
        let mut app = app_with(Some(FakeTransport::default()), None);
        app.step(&toggle(), 0.016);
        app.step(&toggle(), 0.016);
        assert!(!app.state.playing);
        assert!(app.progress().is_some());
    }

    #[test]
    fn natural_end_pauses_playback() {
        let transport = FakeTransport {
            length: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        let mut app = app_with(Some(transport), None);
        app.step(&toggle(), 0.016);
        assert!(app.state.playing);
        assert!(!app.transport_finished());

        // Simulate the clip reaching its end.
        app.transport = Some(Box::new(FakeTransport {
            length: Some(Duration::from_secs(30)),
            position: Duration::from_secs(30),
            loaded: true,
            ..Default::default()
        }));
        assert!(app.transport_finished());

        let finished = FrameInput {
            track_finished: app.transport_finished(),
            audio_ready: true,
            ..Default::default()
        };
        app.step(&finished, 0.016);
        assert!(!app.state.playing);
        assert!(!app.state.started);
    }

    #[test]
    fn toggle_before_audio_arrives_starts_playback_once_loaded() {
        let mut app = app_with(None, None);
        let early_toggle = FrameInput {
            toggle: true,
            ..Default::default()
        };
        app.step(&early_toggle, 0.016);
        assert!(app.state.playing);
        assert!(!app.state.started);

        app.install_transport(Box::new(FakeTransport {
            length: Some(Duration::from_secs(30)),
            ..Default::default()
        }));
        for _ in 0..120 {
            let idle = FrameInput {
                track_finished: app.transport_finished(),
                audio_ready: true,
                ..Default::default()
            };
            app.step(&idle, 0.016);
        }

        assert!(app.state.playing);
        assert!(app.state.started);
        assert!(!app.transport.as_deref().unwrap().is_empty());

        // The next toggle pauses the running clip instead of starting it again.
        app.step(&toggle(), 0.016);
        assert!(!app.state.playing);
    }

    #[test]
    fn audio_arriving_while_paused_stays_silent() {
        let mut app = app_with(None, None);
        app.install_transport(Box::new(FakeTransport::default()));
        assert!(!app.state.started);
        assert!(app.transport.as_deref().unwrap().is_empty());
    }

    #[test]
    fn transport_failure_is_shown() {
        let transport = FakeTransport {
            fail_start: true,
            ..Default::default()
        };
        let mut app = app_with(Some(transport), None);
        app.step(&toggle(), 0.016);
        assert_eq!(app.audio_err.as_deref(), Some("device unplugged"));
    }
}
