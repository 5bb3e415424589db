/// Single-flight latch around the compose box.
///
/// `busy` is true exactly while one send is outstanding. While busy the
/// compose and send controls are disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputGate {
    busy: bool,
    controls_enabled: bool,
    compose_focused: bool,
}

impl Default for InputGate {
    fn default() -> Self {
        Self {
            busy: false,
            controls_enabled: true,
            compose_focused: true,
        }
    }
}

impl InputGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    pub fn compose_focused(&self) -> bool {
        self.compose_focused
    }

    /// Disable the controls. Focus is left where it is.
    pub fn lock(&mut self) {
        self.busy = true;
        self.controls_enabled = false;
    }

    /// Re-enable the controls and hand focus back to the compose box.
    pub fn unlock(&mut self) {
        self.busy = false;
        self.controls_enabled = true;
        self.compose_focused = true;
    }

    pub fn focus_compose(&mut self) {
        self.compose_focused = true;
    }

    pub fn blur_compose(&mut self) {
        self.compose_focused = false;
    }

    /// Whether the compose box currently accepts keystrokes.
    pub fn accepts_input(&self) -> bool {
        self.controls_enabled && self.compose_focused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_keeps_focus() {
        let mut gate = InputGate::new();
        gate.blur_compose();
        gate.lock();
        assert!(gate.is_busy());
        assert!(!gate.controls_enabled());
        assert!(!gate.compose_focused());

        let mut gate = InputGate::new();
        gate.lock();
        assert!(gate.compose_focused());
        assert!(!gate.accepts_input());
    }

    #[test]
    fn test_unlock_returns_focus() {
        let mut gate = InputGate::new();
        gate.lock();
        gate.blur_compose();
        gate.unlock();
        assert!(!gate.is_busy());
        assert!(gate.controls_enabled());
        assert!(gate.compose_focused());
        assert!(gate.accepts_input());
    }
}
