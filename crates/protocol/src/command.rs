//! One-byte commands and replies.

use std::fmt;

/// Commands sent by the primary, one byte each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Initialize local state.
    Prepare = 0x01,
    /// Followed by a workload document.
    Workload = 0x02,
    /// Start the scheduler.
    Run = 0x03,
    /// Wait for the scheduler to drain and return its results.
    Results = 0x04,
    /// Terminate the command loop. Has no reply.
    Fin = 0x05,
}

impl Command {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Prepare),
            0x02 => Some(Self::Workload),
            0x03 => Some(Self::Run),
            0x04 => Some(Self::Results),
            0x05 => Some(Self::Fin),
            _ => None,
        }
    }

    /// Whether the secondary answers this command with a reply byte.
    pub fn expects_reply(self) -> bool {
        !matches!(self, Self::Fin)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Prepare => "prepare",
            Self::Workload => "workload",
            Self::Run => "run",
            Self::Results => "results",
            Self::Fin => "fin",
        };
        f.write_str(name)
    }
}

/// Replies sent by the secondary, one byte each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reply {
    Ok = 0x99,
    /// Followed by a one-element document carrying the reason.
    Err = 0x98,
}

impl Reply {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x99 => Some(Self::Ok),
            0x98 => Some(Self::Err),
            _ => None,
        }
    }
}
