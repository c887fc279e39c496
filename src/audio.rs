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

//! Audio format accepted by the player

use std::path::Path;
use tracing::{debug, warn};
use crate::error::TransferError;

/// Sample rate the player decodes
pub const PLAYER_SAMPLE_RATE: u32 = 32_000;

/// Bits per sample the player decodes
pub const PLAYER_BITS_PER_SAMPLE: u16 = 16;

/// The player has one output per channel
pub const PLAYER_CHANNELS: u16 = 1;

/// Read the WAV header of `path` and reject anything the player cannot play.
///
/// Only the header is read; sample data is not decoded.
pub fn check_player_format(path: &Path) -> Result<(), TransferError> {
    let reader = hound::WavReader::open(path).map_err(TransferError::InvalidWav)?;
    let spec = reader.spec();
    debug!(
        rate = spec.sample_rate,
        bits = spec.bits_per_sample,
        channels = spec.channels,
        "wav header"
    );

    if spec.sample_rate != PLAYER_SAMPLE_RATE
        || spec.bits_per_sample != PLAYER_BITS_PER_SAMPLE
        || spec.channels != PLAYER_CHANNELS
    {
        warn!(
            "{} is {} Hz, {}-bit, {} ch; player needs {} Hz, {}-bit, mono",
            path.display(),
            spec.sample_rate,
            spec.bits_per_sample,
            spec.channels,
            PLAYER_SAMPLE_RATE,
            PLAYER_BITS_PER_SAMPLE
        );
        return Err(TransferError::UnsupportedFormat {
            rate: spec.sample_rate,
            bits: spec.bits_per_sample,
            channels: spec.channels,
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn write_test_wav(path: &Path, rate: u32, bits: u16, channels: u16, samples: usize) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample: bits,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..samples {
        writer.write_sample((i % 64) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_format_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.wav");
        write_test_wav(&path, 32_000, 16, 1, 320);
        assert!(check_player_format(&path).is_ok());
    }

    #[test]
    fn test_wrong_rate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cd.wav");
        write_test_wav(&path, 44_100, 16, 1, 100);
        assert!(matches!(
            check_player_format(&path),
            Err(TransferError::UnsupportedFormat { rate: 44_100, bits: 16, channels: 1 })
        ));
    }

    #[test]
    fn test_stereo_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_test_wav(&path, 32_000, 16, 2, 100);
        assert!(matches!(
            check_player_format(&path),
            Err(TransferError::UnsupportedFormat { channels: 2, .. })
        ));
    }

    #[test]
    fn test_eight_bit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lofi.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 32_000,
            bits_per_sample: 8,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..50 {
            writer.write_sample(i as i8).unwrap();
        }
        writer.finalize().unwrap();

        assert!(matches!(
            check_player_format(&path),
            Err(TransferError::UnsupportedFormat { bits: 8, .. })
        ));
    }

    #[test]
    fn test_not_a_wav_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.wav");
        std::fs::write(&path, b"just some text").unwrap();
        assert!(matches!(check_player_format(&path), Err(TransferError::InvalidWav(_))));
    }
}
