//! Card state and the per-frame reducer.
//!
//! The reducer is pure: it takes the previous snapshot, the sampled input
//! and the frame delta, and returns the next snapshot plus whatever the
//! audio transport has to do. The render loop owns the only copy.

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CardState {
    pub playing: bool,
    pub show_like: bool,
    pub show_skip: bool,
    /// Seconds left on the like/skip overlay.
    pub overlay_timer: f32,
    /// Playback has been started at least once since load or last finish.
    pub started: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    Liked,
    Skipped,
}

impl Overlay {
    pub fn label(self) -> &'static str {
        match self {
            Overlay::Liked => "LIKED",
            Overlay::Skipped => "SKIPPED",
        }
    }
}

impl CardState {
    pub fn overlay(&self) -> Option<Overlay> {
        if self.overlay_timer <= 0.0 {
            return None;
        }
        if self.show_like {
            Some(Overlay::Liked)
        } else if self.show_skip {
            Some(Overlay::Skipped)
        } else {
            None
        }
    }

    pub fn status_label(&self) -> &'static str {
        if self.playing {
            "Playing"
        } else {
            "Paused"
        }
    }
}

/// Everything the reducer needs to know about one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInput {
    pub toggle: bool,
    pub like: bool,
    pub skip: bool,
    pub restart: bool,
    pub track_finished: bool,
    pub audio_ready: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    Start,
    Pause,
    Resume,
    Stop,
    Restart,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub state: CardState,
    pub commands: Vec<TransportCommand>,
}

pub fn reduce(prev: &CardState, input: &FrameInput, dt: f32, overlay_secs: f32) -> Step {
    let mut state = *prev;
    let mut commands = Vec::new();

    if input.toggle {
        state.playing = !state.playing;
        if input.audio_ready {
            if state.playing {
                if state.started {
                    commands.push(TransportCommand::Resume);
                } else {
                    commands.push(TransportCommand::Start);
                    state.started = true;
                }
            } else {
                commands.push(TransportCommand::Pause);
            }
        }
    }

    if input.like {
        state.show_like = true;
        state.show_skip = false;
        state.overlay_timer = overlay_secs;
    }
    if input.skip {
        state.show_skip = true;
        state.show_like = false;
        state.overlay_timer = overlay_secs;
    }

    if input.restart {
        state.playing = true;
        if input.audio_ready {
            commands.push(TransportCommand::Restart);
            state.started = true;
        }
    } else if input.track_finished && state.playing {
        state.playing = false;
        state.started = false;
        if input.audio_ready {
            commands.push(TransportCommand::Stop);
        }
    }

    if state.overlay_timer > 0.0 {
        state.overlay_timer -= dt.max(0.0);
        if state.overlay_timer <= 0.0 {
            state.overlay_timer = 0.0;
            state.show_like = false;
            state.show_skip = false;
        }
    }

    Step { state, commands }
}
