use log::debug;

use crate::error::Error;

pub const KEYS: usize = 16;

/// Progress of a pending `FX0A`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyWait {
    Idle,
    /// `FX0A` was executed, no key came in yet
    Waiting { x: u8 },
    /// A key came in, it lands in VX on the next tick
    Captured { x: u8, key: u8 },
}

/// State of the 4x4 hexadecimal keypad
#[derive(Debug, Clone)]
pub struct Keypad {
    keys: [bool; KEYS],
    wait: KeyWait,
}

impl Keypad {
    pub fn new() -> Self {
        Self {
            keys: [false; KEYS],
            wait: KeyWait::Idle,
        }
    }

    pub fn is_pressed(&self, key: u16) -> bool {
        self.keys[(key & 0x000F) as usize]
    }

    pub fn keys(&self) -> &[bool; KEYS] {
        &self.keys
    }

    pub fn wait(&self) -> KeyWait {
        self.wait
    }

    /// Record a key event, a press completes a pending wait
    pub fn set(&mut self, key: u8, pressed: bool) -> Result<(), Error> {
        let slot = self
            .keys
            .get_mut(key as usize)
            .ok_or(Error::InvalidKey { key })?;
        *slot = pressed;
        if let (KeyWait::Waiting { x }, true) = (self.wait, pressed) {
            debug!("key {:X} captured for V{:X}", key, x);
            self.wait = KeyWait::Captured { x, key };
        }
        Ok(())
    }

    pub(crate) fn start_waiting(&mut self, x: u8) {
        debug!("waiting for key into V{:X}", x);
        self.wait = KeyWait::Waiting { x };
    }

    pub(crate) fn finish_waiting(&mut self) {
        self.wait = KeyWait::Idle;
    }
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_reset_keys() {
        let mut keypad = Keypad::new();
        keypad.set(0x01, true).unwrap();
        keypad.set(0x0F, true).unwrap();
        assert_eq!(keypad.keys().iter().filter(|&&k| k).count(), 2);
        assert!(keypad.is_pressed(0x01));
        assert!(keypad.is_pressed(0x0F));

        keypad.set(0x0F, false).unwrap();
        assert_eq!(keypad.keys().iter().filter(|&&k| k).count(), 1);
        assert!(!keypad.is_pressed(0x0F));
        assert_eq!(keypad.wait(), KeyWait::Idle);
    }

    #[test]
    fn key_outside_pad_is_rejected() {
        let mut keypad = Keypad::new();
        assert_eq!(keypad.set(0x10, true), Err(Error::InvalidKey { key: 0x10 }));
        assert!(keypad.keys().iter().all(|&k| !k));
    }

    #[test]
    fn only_presses_complete_a_wait() {
        let mut keypad = Keypad::new();
        keypad.start_waiting(0x3);

        keypad.set(0x7, false).unwrap();
        assert_eq!(keypad.wait(), KeyWait::Waiting { x: 0x3 });

        keypad.set(0x7, true).unwrap();
        assert_eq!(keypad.wait(), KeyWait::Captured { x: 0x3, key: 0x7 });

        // later presses don't overwrite the captured key
        keypad.set(0x9, true).unwrap();
        assert_eq!(keypad.wait(), KeyWait::Captured { x: 0x3, key: 0x7 });

        keypad.finish_waiting();
        assert_eq!(keypad.wait(), KeyWait::Idle);
    }

    #[test]
    fn is_pressed_uses_low_nibble() {
        let mut keypad = Keypad::new();
        keypad.set(0x2, true).unwrap();
        assert!(keypad.is_pressed(0x12));
    }
}
