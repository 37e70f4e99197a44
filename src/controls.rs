// src/controls.rs
//
// Command sink: turns the engine's command list into the emulator's
// 9-button mask.
//
// Button layout (index → button):
//   0 B (FIRE)   1 unused   2 SELECT   3 START
//   4 UP         5 DOWN     6 LEFT     7 RIGHT   8 A (ACTION)
//
// Timing:
//   - every submit replaces the whole mask
//   - pulsed buttons are released on the next tick
//   - held buttons stay down until no command has arrived for
//     `release_after_ms`, so a steady stream of moves keeps them pressed

use crate::types::{Command, CommandToken, PressMode};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const BUTTON_COUNT: usize = 9;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Held buttons are released after this long without new input.
    pub release_after_ms: f64,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            release_after_ms: 50.0,
        }
    }
}

/// Anything that can act on the engine's commands.
pub trait CommandSink {
    /// Apply this frame's commands. An empty list leaves held buttons alone.
    fn submit(&mut self, commands: &[Command], now_ms: f64);
    /// Advance the sink's clock (release pulses and stale holds).
    fn tick(&mut self, now_ms: f64);
}

pub fn button_index(token: CommandToken) -> usize {
    match token {
        CommandToken::Fire => 0,
        CommandToken::Select => 2,
        CommandToken::Start => 3,
        CommandToken::Up => 4,
        CommandToken::Down => 5,
        CommandToken::Left => 6,
        CommandToken::Right => 7,
        CommandToken::Action => 8,
    }
}

#[derive(Debug, Clone)]
pub struct ButtonMask {
    config: ControlsConfig,
    buttons: [bool; BUTTON_COUNT],
    pulsed: [bool; BUTTON_COUNT],
    last_input_ms: f64,
}

impl ButtonMask {
    pub fn new(config: ControlsConfig) -> Self {
        Self {
            config,
            buttons: [false; BUTTON_COUNT],
            pulsed: [false; BUTTON_COUNT],
            last_input_ms: 0.0,
        }
    }

    pub fn buttons(&self) -> [u8; BUTTON_COUNT] {
        self.buttons.map(u8::from)
    }

    pub fn is_pressed(&self, token: CommandToken) -> bool {
        self.buttons[button_index(token)]
    }

    pub fn clear(&mut self) {
        self.buttons = [false; BUTTON_COUNT];
        self.pulsed = [false; BUTTON_COUNT];
    }
}

impl CommandSink for ButtonMask {
    fn submit(&mut self, commands: &[Command], now_ms: f64) {
        if commands.is_empty() {
            return;
        }
        self.clear();
        for command in commands {
            let idx = button_index(command.token);
            self.buttons[idx] = true;
            self.pulsed[idx] = command.mode == PressMode::Pulse;
        }
        self.last_input_ms = now_ms;
        debug!("🎮 buttons {:?}", self.buttons());
    }

    fn tick(&mut self, now_ms: f64) {
        if now_ms - self.last_input_ms > self.config.release_after_ms {
            self.clear();
            return;
        }
        for (button, pulsed) in self.buttons.iter_mut().zip(self.pulsed.iter_mut()) {
            if *pulsed {
                *button = false;
                *pulsed = false;
            }
        }
    }
}
