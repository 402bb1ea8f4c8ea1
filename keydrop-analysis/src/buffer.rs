//! Decoded multi-channel PCM audio

/// A decoded audio buffer with one sample vector per channel
///
/// Produced by the track loader and treated as immutable once handed to a
/// deck. All channels have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PcmBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl PcmBuffer {
    /// Create a buffer from per-channel sample vectors
    ///
    /// Channels are truncated to the shortest one so every frame is complete.
    pub fn new(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Self {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for ch in &mut channels {
            ch.truncate(frames);
        }
        Self {
            sample_rate,
            channels,
        }
    }

    /// Create a buffer by de-interleaving `samples` with `channel_count` channels
    pub fn from_interleaved(samples: &[f32], channel_count: usize, sample_rate: u32) -> Self {
        let channel_count = channel_count.max(1);
        let frames = samples.len() / channel_count;
        let channels = (0..channel_count)
            .map(|ch| {
                (0..frames)
                    .map(|f| samples[f * channel_count + ch])
                    .collect()
            })
            .collect();
        Self::new(sample_rate, channels)
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Length in frames
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0 || self.sample_rate == 0
    }

    /// Duration in seconds
    pub fn duration_sec(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Samples of one channel
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Time-reversed copy of the whole buffer
    pub fn reversed(&self) -> Self {
        let channels = self
            .channels
            .iter()
            .map(|ch| ch.iter().rev().copied().collect())
            .collect();
        Self {
            sample_rate: self.sample_rate,
            channels,
        }
    }

    /// Downmix to mono by averaging all channels
    pub fn to_mono(&self) -> Vec<f32> {
        match self.channels.len() {
            0 => Vec::new(),
            1 => self.channels[0].clone(),
            n => {
                let scale = 1.0 / n as f32;
                let mut out = vec![0.0f32; self.frames()];
                for ch in &self.channels {
                    for (o, s) in out.iter_mut().zip(ch) {
                        *o += s * scale;
                    }
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_interleaved() {
        let buf = PcmBuffer::from_interleaved(&[0.1, -0.1, 0.2, -0.2, 0.3, -0.3], 2, 44100);
        assert_eq!(buf.channel_count(), 2);
        assert_eq!(buf.frames(), 3);
        assert_eq!(buf.channel(0), Some(&[0.1, 0.2, 0.3][..]));
        assert_eq!(buf.channel(1), Some(&[-0.1, -0.2, -0.3][..]));
    }

    #[test]
    fn test_channels_truncated_to_shortest() {
        let buf = PcmBuffer::new(48000, vec![vec![0.0; 10], vec![0.0; 7]]);
        assert_eq!(buf.frames(), 7);
        assert_eq!(buf.channel(0).map(<[f32]>::len), Some(7));
    }

    #[test]
    fn test_reversed() {
        let buf = PcmBuffer::new(8000, vec![vec![1.0, 2.0, 3.0]]);
        let rev = buf.reversed();
        assert_eq!(rev.channel(0), Some(&[3.0, 2.0, 1.0][..]));
        assert_eq!(rev.sample_rate(), 8000);
    }

    #[test]
    fn test_to_mono_averages() {
        let buf = PcmBuffer::new(8000, vec![vec![1.0, 0.0], vec![0.0, -1.0]]);
        assert_eq!(buf.to_mono(), vec![0.5, -0.5]);
    }

    #[test]
    fn test_duration() {
        let buf = PcmBuffer::new(48000, vec![vec![0.0; 96000]]);
        assert!((buf.duration_sec() - 2.0).abs() < 1e-9);
        assert!(PcmBuffer::default().is_empty());
    }
}
