//! Audio file loading and decoding into engine buffers

use keydrop_analysis::PcmBuffer;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey};
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during track loading
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Resample error: {0}")]
    Resample(String),
}

/// A decoded track ready for analysis and a deck
#[derive(Debug, Clone)]
pub struct LoadedTrack {
    /// Planar samples at the loader's target rate
    pub buffer: PcmBuffer,
    pub title: String,
    pub artist: Option<String>,
    /// Rate of the file before resampling
    pub source_sample_rate: u32,
}

impl LoadedTrack {
    /// Display name: "artist - title" when the artist is known
    pub fn display_name(&self) -> String {
        match &self.artist {
            Some(artist) => format!("{} - {}", artist, self.title),
            None => self.title.clone(),
        }
    }
}

/// Audio file loader using Symphonia
pub struct TrackLoader {
    target_sample_rate: u32,
}

impl Default for TrackLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackLoader {
    /// Create a new track loader with default 48kHz sample rate
    pub fn new() -> Self {
        Self::with_sample_rate(48000)
    }

    /// Create a new track loader with specific sample rate
    pub fn with_sample_rate(target_sample_rate: u32) -> Self {
        Self {
            target_sample_rate: target_sample_rate.max(1),
        }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Load and decode an audio file
    pub fn load(&self, path: &Path) -> Result<LoadedTrack, LoadError> {
        let file = std::fs::File::open(path)?;
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
            .map_err(|e| LoadError::UnsupportedFormat(e.to_string()))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let source_rate = codec_params
            .sample_rate
            .ok_or_else(|| LoadError::Decode("unknown sample rate".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::UnsupportedFormat(e.to_string()))?;

        let (title, artist) = read_tags(format.as_mut(), path);

        let mut channels: Vec<Vec<f32>> = Vec::new();
        let mut skipped = 0usize;
        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(_)) => {
                    // Corrupt frame; keep going
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            let count = spec.channels.count();
            let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            samples.copy_interleaved_ref(decoded);

            if channels.len() < count {
                channels.resize(count, Vec::new());
            }
            deinterleave_into(samples.samples(), &mut channels[..count]);
        }

        if skipped > 0 {
            warn!(path = %path.display(), skipped, "skipped undecodable packets");
        }
        if channels.iter().all(|c| c.is_empty()) {
            return Err(LoadError::Decode("no samples decoded".to_string()));
        }

        let channels = if source_rate != self.target_sample_rate {
            debug!(from = source_rate, to = self.target_sample_rate, "resampling");
            resample(&channels, source_rate, self.target_sample_rate)?
        } else {
            channels
        };

        let buffer = PcmBuffer::new(self.target_sample_rate, channels);
        info!(
            path = %path.display(),
            duration = buffer.duration_sec(),
            channels = buffer.channel_count(),
            "track decoded"
        );

        Ok(LoadedTrack {
            buffer,
            title,
            artist,
            source_sample_rate: source_rate,
        })
    }
}

/// Append interleaved samples to per-channel vectors
fn deinterleave_into(interleaved: &[f32], channels: &mut [Vec<f32>]) {
    let count = channels.len();
    if count == 0 {
        return;
    }
    for frame in interleaved.chunks_exact(count) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
}

/// Title and artist tags, falling back to the file stem for the title
fn read_tags(format: &mut dyn FormatReader, path: &Path) -> (String, Option<String>) {
    let mut title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Unknown")
        .to_string();
    let mut artist = None;

    if let Some(meta) = format.metadata().current() {
        for tag in meta.tags() {
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) => title = tag.value.to_string(),
                Some(StandardTagKey::Artist) => artist = Some(tag.value.to_string()),
                _ => {}
            }
        }
    }

    (title, artist)
}

/// Resample planar audio between rates
fn resample(channels: &[Vec<f32>], source_rate: u32, target_rate: u32) -> Result<Vec<Vec<f32>>, LoadError> {
    use rubato::{FftFixedInOut, Resampler};

    let count = channels.len();
    let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);

    let mut resampler =
        FftFixedInOut::<f32>::new(source_rate as usize, target_rate as usize, 1024, count)
            .map_err(|e| LoadError::Resample(e.to_string()))?;

    let expected = (frames as u64 * target_rate as u64 / source_rate as u64) as usize;
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + 1024); count];

    let chunk = resampler.input_frames_next();
    let mut pos = 0;
    while pos < frames {
        let end = (pos + chunk).min(frames);
        let block: Vec<Vec<f32>> = channels
            .iter()
            .map(|c| {
                let mut v = c[pos..end].to_vec();
                // Pad the final partial chunk with silence
                v.resize(chunk, 0.0);
                v
            })
            .collect();

        let resampled = resampler
            .process(&block, None)
            .map_err(|e| LoadError::Resample(e.to_string()))?;
        for (out, data) in output.iter_mut().zip(resampled) {
            out.extend(data);
        }
        pos = end;
    }

    // Drop the padding tail so duration is preserved
    for out in &mut output {
        out.truncate(expected);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    /// Write a 16-bit PCM mono WAV file
    fn write_wav(path: &Path, sample_rate: u32, samples: &[i16]) {
        let data_len = (samples.len() * 2) as u32;
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
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(&bytes).unwrap();
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("keydrop-loader-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = TrackLoader::new().load(Path::new("/nonexistent/keydrop/track.mp3"));
        assert!(matches!(result, Err(LoadError::Io(_))));
    }

    #[test]
    fn test_garbage_is_unsupported() {
        let path = temp_path("garbage.bin");
        std::fs::write(&path, b"definitely not audio").unwrap();
        let result = TrackLoader::new().load(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(LoadError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_load_wav_at_native_rate() {
        let path = temp_path("tone.wav");
        let samples: Vec<i16> = (0..4000).map(|i| if i % 2 == 0 { 8192 } else { -8192 }).collect();
        write_wav(&path, 8000, &samples);

        let track = TrackLoader::with_sample_rate(8000).load(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(track.buffer.sample_rate(), 8000);
        assert_eq!(track.buffer.frames(), 4000);
        assert_eq!(track.source_sample_rate, 8000);
        assert!(track.title.starts_with("keydrop-loader-"));
        assert_eq!(track.artist, None);
        let first = track.buffer.channel(0).unwrap()[0];
        assert!((first - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_load_wav_resamples() {
        let path = temp_path("resample.wav");
        write_wav(&path, 24000, &vec![1000i16; 24000]);

        let track = TrackLoader::with_sample_rate(48000).load(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(track.buffer.sample_rate(), 48000);
        assert_eq!(track.buffer.frames(), 48000);
        assert!((track.buffer.duration_sec() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_deinterleave() {
        let mut channels = vec![Vec::new(), Vec::new()];
        deinterleave_into(&[1.0, -1.0, 2.0, -2.0, 3.0], &mut channels);
        assert_eq!(channels[0], vec![1.0, 2.0]);
        assert_eq!(channels[1], vec![-1.0, -2.0]);
    }

    #[test]
    fn test_display_name() {
        let track = LoadedTrack {
            buffer: PcmBuffer::default(),
            title: "Song".to_string(),
            artist: Some("Band".to_string()),
            source_sample_rate: 44100,
        };
        assert_eq!(track.display_name(), "Band - Song");
    }
}
