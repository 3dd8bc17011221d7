//! Command opcodes for the PCV protocol.
//!
//! Commands occupy bytes 4-5 of a frame, little-endian. The set was
//! reverse-engineered from USB captures; codes outside the table decode to
//! [`Command::Invalid`] rather than failing.

/// Commands supported by the PCV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    /// Unknown or unmapped command code.
    Invalid = 0,
    /// Read FRAM contents.
    ReadFram = 3,
    /// Write FRAM contents.
    WriteFram = 4,
    /// Request real-time engine values (RPM, throttle, gear...).
    GetChannelStatus = 5,
    /// Read flash contents.
    ReadFlash = 6,
    /// Request bootloader information.
    GetBootInfo = 234,
    /// Request firmware information.
    GetFirmwareInfo = 235,
    /// Sent regularly by the device even when no request is outstanding.
    CanPass = 8450,
    /// Start a device update.
    UpdateDevice = 20480,
    /// Clear stored error codes.
    ClearErrors = 20481,
    /// Enter map edit mode.
    EnterEditMode = 20482,
    /// Exit map edit mode.
    ExitEditMode = 20483,
}

impl Command {
    /// Maps a wire command code to a command.
    ///
    /// Unknown codes map to [`Command::Invalid`].
    #[must_use]
    pub const fn from_code(code: u16) -> Self {
        match code {
            3 => Self::ReadFram,
            4 => Self::WriteFram,
            5 => Self::GetChannelStatus,
            6 => Self::ReadFlash,
            234 => Self::GetBootInfo,
            235 => Self::GetFirmwareInfo,
            8450 => Self::CanPass,
            20480 => Self::UpdateDevice,
            20481 => Self::ClearErrors,
            20482 => Self::EnterEditMode,
            20483 => Self::ExitEditMode,
            _ => Self::Invalid,
        }
    }

    /// Returns the wire command code.
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }
}

impl From<Command> for u16 {
    fn from(cmd: Command) -> Self {
        cmd.code()
    }
}
