// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Line-oriented device commands

use std::fmt;
use std::path::Path;
use tracing::info;
use crate::audio;
use crate::config::TransferConfig;
use crate::error::{Error, LinkError, Result, TransferError};
use crate::link::Link;
use crate::worker::TransferHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    Hello,
    List { channel: u8 },
    Play { channel: u8, file: String },
    Stop { channel: u8 },
    /// Puts the device into Y-MODEM receive mode for `file`
    Upload { channel: u8, file: String },
}

impl DeviceCommand {
    pub fn channel(&self) -> Option<u8> {
        match self {
            DeviceCommand::Hello => None,
            DeviceCommand::List { channel }
            | DeviceCommand::Play { channel, .. }
            | DeviceCommand::Stop { channel }
            | DeviceCommand::Upload { channel, .. } => Some(*channel),
        }
    }

    fn file(&self) -> Option<&str> {
        match self {
            DeviceCommand::Play { file, .. } | DeviceCommand::Upload { file, .. } => Some(file),
            _ => None,
        }
    }

    /// Reject commands the device cannot parse
    pub fn validate(&self, channels: u8) -> std::result::Result<(), LinkError> {
        if let Some(channel) = self.channel() {
            if channel >= channels {
                return Err(LinkError::InvalidChannel { channel, channels });
            }
        }
        if let Some(file) = self.file() {
            if file.is_empty() || file.chars().any(|c| c.is_whitespace() || c.is_control()) {
                return Err(LinkError::InvalidFileName(file.to_string()));
            }
        }
        Ok(())
    }

    /// Wire form, CRLF terminated
    pub fn to_line(&self) -> String {
        format!("{}\r\n", self)
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceCommand::Hello => write!(f, "HELLO"),
            DeviceCommand::List { channel } => write!(f, "LS {}", channel),
            DeviceCommand::Play { channel, file } => write!(f, "PLAY {} {}", channel, file),
            DeviceCommand::Stop { channel } => write!(f, "STOP {}", channel),
            DeviceCommand::Upload { channel, file } => write!(f, "UPLOAD {} {}", channel, file),
        }
    }
}

/// Sends control commands over a [`Link`]
pub struct DeviceClient<'a> {
    link: &'a Link,
}

impl<'a> DeviceClient<'a> {
    pub fn new(link: &'a Link) -> Self {
        DeviceClient { link }
    }

    pub fn send(&self, command: &DeviceCommand) -> std::result::Result<(), LinkError> {
        command.validate(self.link.config().channels)?;
        info!(">> {}", command);
        self.link.write(command.to_line().as_bytes())
    }

    pub fn hello(&self) -> std::result::Result<(), LinkError> {
        self.send(&DeviceCommand::Hello)
    }

    pub fn list(&self, channel: u8) -> std::result::Result<(), LinkError> {
        self.send(&DeviceCommand::List { channel })
    }

    pub fn play(&self, channel: u8, file: &str) -> std::result::Result<(), LinkError> {
        self.send(&DeviceCommand::Play { channel, file: file.to_string() })
    }

    pub fn stop(&self, channel: u8) -> std::result::Result<(), LinkError> {
        self.send(&DeviceCommand::Stop { channel })
    }

    /// Announce `path` on `channel`, let the device settle, then send it.
    ///
    /// The file must be a WAV the player can decode; nothing is written to
    /// the device otherwise.
    pub fn upload(&self, channel: u8, path: &Path, config: TransferConfig) -> Result<TransferHandle> {
        if !path.is_file() {
            return Err(Error::Transfer(TransferError::FileNotFound(path.to_path_buf())));
        }
        audio::check_player_format(path)?;
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Transfer(TransferError::FileNotFound(path.to_path_buf())))?;

        self.send(&DeviceCommand::Upload { channel, file })?;
        std::thread::sleep(self.link.config().upload_settle);
        Ok(self.link.start_transfer(path.to_path_buf(), config)?)
    }
}
