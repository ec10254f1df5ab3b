//! Edge-triggered stop for the outgoing command stream.

use pilot_types::ActuatorCommand;

/// What to send to the actuators for one command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatchAction {
    /// Send the command.
    Apply(ActuatorCommand),
    /// First zero after a non-zero streak: send a stop.
    Stop,
    /// Still zero: send nothing.
    Hold,
}

/// Turns a per-tick command stream into apply/stop/hold actions.
///
/// A zero command issues a stop exactly once; further zeros are silent until
/// a non-zero command breaks the streak.
///
/// ```
/// use pilot_control::{CommandLatch, LatchAction};
/// use pilot_types::ActuatorCommand;
///
/// let mut latch = CommandLatch::new();
/// assert_eq!(latch.update(ActuatorCommand::zero()), LatchAction::Stop);
/// assert_eq!(latch.update(ActuatorCommand::zero()), LatchAction::Hold);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommandLatch {
    last_command_was_zero: bool,
    last: ActuatorCommand,
}

impl CommandLatch {
    /// Creates a latch whose first zero command issues a stop.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the previous command was all-zero.
    #[must_use]
    pub const fn last_command_was_zero(&self) -> bool {
        self.last_command_was_zero
    }

    /// The previous command.
    #[must_use]
    pub const fn last(&self) -> ActuatorCommand {
        self.last
    }

    /// Records `command` and returns the action to take.
    pub fn update(&mut self, command: ActuatorCommand) -> LatchAction {
        self.last = command;
        if !command.is_zero() {
            self.last_command_was_zero = false;
            return LatchAction::Apply(command);
        }
        if self.last_command_was_zero {
            LatchAction::Hold
        } else {
            self.last_command_was_zero = true;
            LatchAction::Stop
        }
    }
}
