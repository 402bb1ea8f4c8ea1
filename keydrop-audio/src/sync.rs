//! Beat sync - one-shot alignment of a slave deck to a master deck

use crate::deck::Deck;
use keydrop_analysis::BeatAnalysis;
use tracing::{debug, info};

/// Correction applied to the slave deck
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncCorrection {
    /// Seek offset applied to the slave (seconds, clamped)
    pub delta_sec: f64,
    /// Playback rate the slave ramps toward
    pub target_rate: f32,
}

/// Aligns beat grids and tempo between two decks
#[derive(Debug, Clone)]
pub struct SyncService {
    /// Largest seek correction in seconds
    max_jump_sec: f64,
    min_rate: f32,
    max_rate: f32,
    /// Time taken to glide to the new rate
    ramp_sec: f64,
}

impl Default for SyncService {
    fn default() -> Self {
        Self {
            max_jump_sec: 0.35,
            min_rate: 0.98,
            max_rate: 1.02,
            ramp_sec: 1.2,
        }
    }
}

impl SyncService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Correction for a slave at `slave_pos` against a master at `master_pos`
    pub fn correction(
        &self,
        master_pos: f64,
        slave_pos: f64,
        master: &BeatAnalysis,
        slave: &BeatAnalysis,
    ) -> SyncCorrection {
        let master_next = master.grid().next_beat(master_pos);
        let slave_next = slave.grid().next_beat(slave_pos);
        let delta_sec = (master_next - slave_next).clamp(-self.max_jump_sec, self.max_jump_sec);

        let raw = master.bpm / slave.bpm.max(1e-6);
        let target_rate = raw.clamp(self.min_rate, self.max_rate);

        SyncCorrection {
            delta_sec,
            target_rate,
        }
    }

    /// Nudge `slave` onto `master`'s grid and glide its tempo
    ///
    /// No-op when either deck has no track.
    pub fn sync_slave_to_master(
        &self,
        master: &Deck,
        slave: &mut Deck,
        master_analysis: &BeatAnalysis,
        slave_analysis: &BeatAnalysis,
    ) -> Option<SyncCorrection> {
        if !master.is_loaded() || !slave.is_loaded() {
            debug!("sync ignored, both decks need a track");
            return None;
        }

        let slave_pos = slave.position_sec();
        let correction = self.correction(
            master.position_sec(),
            slave_pos,
            master_analysis,
            slave_analysis,
        );

        slave.seek(slave_pos + correction.delta_sec);
        slave.ramp_playback_rate(correction.target_rate, self.ramp_sec);

        info!(
            master = %master.id(),
            slave = %slave.id(),
            delta = correction.delta_sec,
            rate = correction.target_rate,
            "decks synced"
        );
        Some(correction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EngineContext;
    use crate::deck::{DeckId, DeckTrack};
    use keydrop_analysis::PcmBuffer;
    use std::sync::Arc;

    fn analysis(bpm: f32, anchor_sec: f64) -> BeatAnalysis {
        BeatAnalysis {
            bpm,
            confidence: 1.0,
            peak_times_sec: Vec::new(),
            anchor_sec,
        }
    }

    #[test]
    fn test_rate_within_range_is_unclamped() {
        let sync = SyncService::new();
        let c = sync.correction(0.0, 0.0, &analysis(128.0, 0.0), &analysis(130.0, 0.0));
        assert!((c.target_rate - 128.0 / 130.0).abs() < 1e-6);
        assert!((c.target_rate - 0.9846).abs() < 1e-4);
    }

    #[test]
    fn test_rate_clamped_outside_range() {
        let sync = SyncService::new();
        let fast = sync.correction(0.0, 0.0, &analysis(140.0, 0.0), &analysis(100.0, 0.0));
        assert_eq!(fast.target_rate, 1.02);
        let slow = sync.correction(0.0, 0.0, &analysis(100.0, 0.0), &analysis(140.0, 0.0));
        assert_eq!(slow.target_rate, 0.98);
    }

    #[test]
    fn test_delta_aligns_next_beats() {
        let sync = SyncService::new();
        // Both at 120 BPM; slave grid is 0.1 s later than master's
        let c = sync.correction(1.2, 1.2, &analysis(120.0, 0.0), &analysis(120.0, 0.1));
        // master next beat 1.5, slave next beat 1.6
        assert!((c.delta_sec + 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_delta_clamped() {
        let sync = SyncService::new();
        // 60 BPM grids offset by half a beat
        let c = sync.correction(0.1, 0.1, &analysis(60.0, 0.0), &analysis(60.0, 0.5));
        // master next beat 1.0, slave next beat 0.5
        assert!((c.delta_sec - 0.35).abs() < 1e-9);
    }

    fn loaded_deck(id: DeckId, ctx: &Arc<EngineContext>) -> Deck {
        let mut deck = Deck::new(id, ctx.clone());
        let buffer = PcmBuffer::new(8000, vec![vec![0.1; 8000 * 20]]);
        deck.load(DeckTrack::new(Arc::new(buffer)));
        deck
    }

    #[test]
    fn test_sync_without_track_is_noop() {
        let ctx = EngineContext::new(8000);
        let master = loaded_deck(DeckId::One, &ctx);
        let mut slave = Deck::new(DeckId::Two, ctx.clone());
        let result =
            SyncService::new().sync_slave_to_master(&master, &mut slave, &analysis(128.0, 0.0), &analysis(130.0, 0.0));
        assert_eq!(result, None);
        assert_eq!(slave.position_sec(), 0.0);
    }

    #[test]
    fn test_sync_seeks_slave() {
        let ctx = EngineContext::new(8000);
        let mut master = loaded_deck(DeckId::One, &ctx);
        let mut slave = loaded_deck(DeckId::Two, &ctx);
        master.seek(1.2);
        slave.seek(1.2);

        let result = SyncService::new()
            .sync_slave_to_master(&master, &mut slave, &analysis(120.0, 0.0), &analysis(120.0, 0.1))
            .unwrap();
        assert!((result.delta_sec + 0.1).abs() < 1e-9);
        assert!((slave.position_sec() - 1.1).abs() < 1e-9);
        assert_eq!(result.target_rate, 1.0);
    }
}
