use eframe::egui::{self, Key};

use crate::state::FrameInput;

pub const HOTKEY_HINT: &str = "← skip   → like   SPACE play/pause   R restart";

impl FrameInput {
    /// Samples this frame's key presses from egui.
    pub fn from_keys(ctx: &egui::Context, audio_ready: bool, track_finished: bool) -> Self {
        ctx.input(|i| FrameInput {
            toggle: i.key_pressed(Key::Space),
            like: i.key_pressed(Key::ArrowRight) || i.key_pressed(Key::D),
            skip: i.key_pressed(Key::ArrowLeft) || i.key_pressed(Key::A),
            restart: i.key_pressed(Key::R),
            track_finished,
            audio_ready,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::{Event, Modifiers, RawInput};

    fn sample(keys: &[Key]) -> FrameInput {
        let ctx = egui::Context::default();
        let raw = RawInput {
            events: keys
                .iter()
                .map(|&key| Event::Key {
                    key,
                    physical_key: None,
                    pressed: true,
                    repeat: false,
                    modifiers: Modifiers::NONE,
                })
                .collect(),
            ..Default::default()
        };
        let mut sampled = FrameInput::default();
        let _ = ctx.run(raw, |ctx| {
            sampled = FrameInput::from_keys(ctx, true, false);
        });
        sampled
    }

    #[test]
    fn bindings_map_to_actions() {
        assert!(sample(&[Key::Space]).toggle);
        assert!(sample(&[Key::ArrowRight]).like);
        assert!(sample(&[Key::D]).like);
        assert!(sample(&[Key::ArrowLeft]).skip);
        assert!(sample(&[Key::A]).skip);
        assert!(sample(&[Key::R]).restart);
    }

    #[test]
    fn no_keys_means_no_actions() {
        let input = sample(&[]);
        assert_eq!(
            input,
            FrameInput {
                audio_ready: true,
                ..Default::default()
            }
        );
    }

    #[test]
    fn unrelated_key_does_nothing() {
        let input = sample(&[Key::Q]);
        assert!(!(input.toggle || input.like || input.skip || input.restart));
    }
}
