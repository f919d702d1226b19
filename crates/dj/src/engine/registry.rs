//! Shared, read-only registry of decodable formats.

use std::fs::File;
use std::path::Path;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::DecodeError;

/// Extensions registered by default: the usual DJ formats.
const BASIC_FORMATS: &[&str] = &["wav", "aif", "aiff", "flac", "ogg", "mp3"];

/// Stream properties discovered by probing a file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbedFormat {
    pub length_seconds: f64,
    pub sample_rate: Option<u32>,
    pub channels: Option<usize>,
}

/// Formats every deck may load.
///
/// Built once at startup and shared behind an `Arc`; nothing mutates it
/// afterwards, so decks probe through it concurrently.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    extensions: Vec<&'static str>,
}

impl FormatRegistry {
    /// Registry with the basic formats.
    pub fn with_basic_formats() -> Self {
        Self {
            extensions: BASIC_FORMATS.to_vec(),
        }
    }

    /// Registered extensions, lowercase without the dot.
    pub fn extensions(&self) -> &[&'static str] {
        &self.extensions
    }

    /// Whether the file extension is registered.
    pub fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            })
            .unwrap_or(false)
    }

    /// Probe a file for its length without decoding audio samples.
    ///
    /// Falls back to summing packet durations when the container does not
    /// declare a frame count (common for MP3).
    pub fn probe(&self, path: &Path) -> Result<ProbedFormat, DecodeError> {
        if !self.supports(path) {
            return Err(DecodeError::Unsupported {
                path: path.to_path_buf(),
            });
        }

        let file = File::open(path).map_err(|e| DecodeError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                log::debug!("Probe failed for {}: {}", path.display(), e);
                DecodeError::Unsupported {
                    path: path.to_path_buf(),
                }
            })?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecodeError::NoAudioTrack {
                path: path.to_path_buf(),
            })?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let frames = match params.n_frames {
            Some(n) => n,
            None => {
                let mut total: u64 = 0;
                loop {
                    match format.next_packet() {
                        Ok(packet) => {
                            if packet.track_id() == track_id {
                                total += packet.dur();
                            }
                        }
                        Err(SymphoniaError::IoError(e))
                            if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                        {
                            break
                        }
                        Err(e) => {
                            log::debug!("Stopped scanning {} early: {}", path.display(), e);
                            break;
                        }
                    }
                }
                total
            }
        };

        let length_seconds = if let Some(time_base) = params.time_base {
            let time = time_base.calc_time(frames);
            time.seconds as f64 + time.frac
        } else if let Some(rate) = params.sample_rate {
            frames as f64 / rate as f64
        } else {
            0.0
        };

        if !length_seconds.is_finite() || length_seconds <= 0.0 {
            return Err(DecodeError::UnknownLength {
                path: path.to_path_buf(),
            });
        }

        Ok(ProbedFormat {
            length_seconds,
            sample_rate: params.sample_rate,
            channels: params.channels.map(|c| c.count()),
        })
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_basic_formats()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    /// Write a mono 16-bit PCM WAV file with `frames` silent samples.
    fn write_silent_wav(path: &Path, sample_rate: u32, frames: u32) {
        let data_len = frames * 2;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(44 + data_len as usize, 0);

        let mut file = File::create(path).unwrap();
        file.write_all(&bytes).unwrap();
    }

    #[test]
    fn test_supports_is_case_insensitive() {
        let registry = FormatRegistry::with_basic_formats();
        assert!(registry.supports(Path::new("track.MP3")));
        assert!(registry.supports(Path::new("/music/set.flac")));
        assert!(!registry.supports(Path::new("notes.txt")));
        assert!(!registry.supports(Path::new("no_extension")));
    }

    #[test]
    fn test_probe_wav_length() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("two_seconds.wav");
        write_silent_wav(&path, 8000, 16000);

        let probed = FormatRegistry::default().probe(&path).unwrap();
        assert!((probed.length_seconds - 2.0).abs() < 1e-6);
        assert_eq!(probed.sample_rate, Some(8000));
        assert_eq!(probed.channels, Some(1));
    }

    #[test]
    fn test_probe_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let registry = FormatRegistry::default();

        let missing = dir.path().join("missing.wav");
        assert!(matches!(
            registry.probe(&missing),
            Err(DecodeError::Unreadable { .. })
        ));

        let text = dir.path().join("readme.txt");
        std::fs::write(&text, "hello").unwrap();
        assert!(matches!(
            registry.probe(&text),
            Err(DecodeError::Unsupported { .. })
        ));

        let garbage = dir.path().join("garbage.wav");
        std::fs::write(&garbage, b"definitely not audio").unwrap();
        assert!(matches!(
            registry.probe(&garbage),
            Err(DecodeError::Unsupported { .. })
        ));
    }
}
