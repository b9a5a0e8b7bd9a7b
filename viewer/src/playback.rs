//! Playback state machine: RUNNING ↔ PAUSED, with a terminal STOPPED.
//!
//! Keys come in as raw `wait_key` codes (negative when nothing was
//! pressed); everything except the two bound keys is ignored.

const QUIT_KEY: u8 = b'q';
const PAUSE_KEY: u8 = b'p';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    Running,
    Paused,
    Stopped,
}

impl Playback {
    /// Apply one polled key code. Stopped is terminal.
    pub fn handle_key(self, key: i32) -> Self {
        if key < 0 || self == Playback::Stopped {
            return self;
        }
        match (key & 0xff) as u8 {
            QUIT_KEY => Playback::Stopped,
            PAUSE_KEY => match self {
                Playback::Running => Playback::Paused,
                Playback::Paused => Playback::Running,
                Playback::Stopped => Playback::Stopped,
            },
            _ => self,
        }
    }

    pub fn is_paused(self) -> bool {
        self == Playback::Paused
    }

    pub fn is_stopped(self) -> bool {
        self == Playback::Stopped
    }
}
