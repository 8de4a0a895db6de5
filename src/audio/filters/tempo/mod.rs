//! WSOLA tempo scaling.
//!
//! The stream is cut into overlapping fragments of one window each. Every
//! fragment is slid within half a window of its nominal input position to
//! the offset whose waveform best matches the previous fragment, then the
//! two are crossfaded with a Hann window. Fragments advance by
//! `tempo * window/2` in the input timeline and by `window/2` in the output
//! timeline, so pitch is preserved while duration scales by `1 / tempo`.
//!
//! | State | Action |
//! |---|---|
//! | [`TempoState::LoadFragment`] | fill the current fragment from the input ring |
//! | [`TempoState::AdjustPosition`] | align against the previous fragment |
//! | [`TempoState::ReloadFragment`] | refill at the corrected position (once) |
//! | [`TempoState::OutputOverlapAdd`] | crossfade into the destination |
//! | [`TempoState::FlushOutput`] | terminal drain after end of input |
//!
//! [`TempoFilter::apply`] suspends only when it needs more input or more
//! destination space; calling it again resumes exactly where it stopped.

pub mod align;
pub mod fft;
pub mod fragment;
pub mod overlap;

use tracing::{debug, trace};

use self::fft::{Complex, RealFft};
use self::fragment::Fragment;
use crate::audio::buffer::{SampleRing, try_vec};
use crate::audio::constants::{RING_WINDOWS, TEMPO_MAX, TEMPO_MIN, WINDOW_RATE_DIVISOR};
use crate::audio::sample::Sample;
use crate::common::errors::{CodecError, CodecResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempoState {
    LoadFragment,
    AdjustPosition,
    ReloadFragment,
    OutputOverlapAdd,
    FlushOutput,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TempoStats {
    /// Fragments advanced past.
    pub fragments: u64,
    /// Alignments that moved a fragment.
    pub corrections: u64,
    /// Fragments re-read after a correction.
    pub reloads: u64,
    /// Most alignment passes spent on any single fragment.
    pub max_alignments: u32,
}

/// Analysis window for `sample_rate`: about 41.7 ms, rounded up to a power
/// of two.
pub fn window_for_rate(sample_rate: u32) -> usize {
    ((sample_rate / WINDOW_RATE_DIVISOR) as usize).next_power_of_two()
}

pub fn validate_tempo(tempo: f64) -> CodecResult<f64> {
    if !(TEMPO_MIN..=TEMPO_MAX).contains(&tempo) {
        return Err(CodecError::invalid(format!(
            "tempo value {tempo} exceeds [{TEMPO_MIN}, {TEMPO_MAX}] range"
        )));
    }
    Ok(tempo)
}

pub struct TempoFilter<S: Sample> {
    channels: usize,
    window: usize,
    tempo: f64,

    ring: SampleRing<S>,
    frags: [Fragment<S>; 2],
    nfrag: u64,
    state: TempoState,

    /// Output samples produced so far.
    output_position: i64,
    /// Previous fragment position (plus half a window) at the last tempo change.
    origin: [i64; 2],
    /// Alignment passes spent on the current fragment.
    alignments: u32,

    hann: Vec<f32>,
    fft: RealFft,
    mono: Vec<f32>,
    spectrum: Vec<Complex>,
    correlation: Vec<f32>,

    stats: TempoStats,
}

impl<S: Sample> TempoFilter<S> {
    /// Allocate every buffer the filter will ever need.
    pub fn new(sample_rate: u32, channels: usize, tempo: f64) -> CodecResult<Self> {
        let tempo = validate_tempo(tempo)?;
        if channels == 0 {
            return Err(CodecError::unsupported("tempo filter needs at least one channel"));
        }
        let window = window_for_rate(sample_rate);
        if window < 2 {
            return Err(CodecError::unsupported(format!(
                "sample rate {sample_rate} Hz is too low for tempo scaling"
            )));
        }

        let mut filter = Self {
            channels,
            window,
            tempo,
            ring: SampleRing::new(window * RING_WINDOWS, channels)?,
            frags: [Fragment::new(window, channels)?, Fragment::new(window, channels)?],
            nfrag: 0,
            state: TempoState::LoadFragment,
            output_position: 0,
            origin: [0, 0],
            alignments: 0,
            hann: overlap::hann(window),
            fft: RealFft::new(window * 2)?,
            mono: try_vec(window * 2, 0.0)?,
            spectrum: try_vec(window + 1, Complex::default())?,
            correlation: try_vec(window * 2, 0.0)?,
            stats: TempoStats::default(),
        };
        filter.reset();

        debug!(
            "tempo filter: {} Hz, {} ch, {:?}, window {}, tempo {}",
            sample_rate,
            channels,
            S::FORMAT,
            window,
            tempo
        );
        Ok(filter)
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Input ring capacity in multi-channel samples.
    pub fn ring_capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn state(&self) -> TempoState {
        self.state
    }

    pub fn stats(&self) -> TempoStats {
        self.stats
    }

    /// `[input samples consumed, output samples produced]`.
    pub fn position(&self) -> [i64; 2] {
        [self.ring.position(), self.output_position]
    }

    /// Return to the freshly constructed state, keeping all buffers.
    pub fn reset(&mut self) {
        self.ring.clear();
        self.nfrag = 0;
        self.state = TempoState::LoadFragment;
        self.output_position = 0;
        self.origin = [0, 0];
        self.alignments = 0;
        self.stats = TempoStats::default();

        for frag in &mut self.frags {
            frag.position = [0, 0];
            frag.nsamples = 0;
        }

        // start half a window early so the first fragment's left half needs
        // no renormalization
        let half = (self.window / 2) as i64;
        self.frags[0].position = [-half, -half];
    }

    /// Change the tempo mid-stream.
    ///
    /// Drift is measured from the previous fragment onward, so output timing
    /// stays continuous across the change.
    pub fn set_tempo(&mut self, tempo: f64) -> CodecResult<()> {
        let tempo = validate_tempo(tempo)?;
        let half = (self.window / 2) as i64;
        let prev = &self.frags[self.prev_index()];
        self.origin = [prev.position[0] + half, prev.position[1] + half];
        debug!(
            "tempo {} -> {}, origin resynced to {:?}",
            self.tempo, tempo, self.origin
        );
        self.tempo = tempo;
        Ok(())
    }

    /// Consume as much of `input` as possible and append as much output to
    /// `dst` as fits below `limit` interleaved values.
    ///
    /// `input` is advanced past everything that was consumed. On return
    /// either `input` is empty or `dst` is full.
    pub fn apply(&mut self, input: &mut &[S], dst: &mut Vec<S>, limit: usize) {
        loop {
            match self.state {
                TempoState::LoadFragment => {
                    if !self.load_fragment(Some(&mut *input)) {
                        return;
                    }
                    self.analyze_current();

                    // there is nothing to align the very first fragment with
                    if self.nfrag == 0 {
                        self.advance();
                        continue;
                    }
                    self.state = TempoState::AdjustPosition;
                }
                TempoState::AdjustPosition => {
                    self.state = if self.adjust_position() != 0 {
                        TempoState::ReloadFragment
                    } else {
                        TempoState::OutputOverlapAdd
                    };
                }
                TempoState::ReloadFragment => {
                    if !self.load_fragment(Some(&mut *input)) {
                        return;
                    }
                    self.stats.reloads += 1;
                    self.analyze_current();
                    self.state = TempoState::OutputOverlapAdd;
                }
                TempoState::OutputOverlapAdd => {
                    if !self.overlap_add(dst, limit) {
                        return;
                    }
                    self.advance();
                    self.state = TempoState::LoadFragment;
                }
                TempoState::FlushOutput => return,
            }
        }
    }

    /// Drain buffered input after end of stream.
    ///
    /// Returns `true` once everything has been emitted. `false` means call
    /// again, with more room in `dst` if it is full.
    pub fn flush(&mut self, dst: &mut Vec<S>, limit: usize) -> bool {
        if self.state != TempoState::FlushOutput {
            trace!("tempo filter flushing at {:?}", self.position());
            self.state = TempoState::FlushOutput;
        }

        let cur = self.cur_index();
        let input_end = self.ring.position();
        {
            let frag = &self.frags[cur];
            if input_end == frag.input_end() && self.output_position == frag.output_end() {
                return true;
            }
        }

        if self.frags[cur].input_end() < input_end {
            // finish the final, possibly partial, fragment; one that was
            // already aligned is only re-read at its corrected position
            let pending_reload = self.alignments > 0 && self.frags[cur].nsamples == 0;
            self.load_fragment(None);
            if pending_reload {
                self.stats.reloads += 1;
            }
            if self.nfrag != 0 {
                self.analyze_current();
                if self.alignments == 0 && self.adjust_position() != 0 {
                    self.load_fragment(None);
                    self.stats.reloads += 1;
                }
            }
        }

        let half = self.window / 2;
        let (frag_out, frag_len) = {
            let frag = &self.frags[cur];
            (frag.position[1], frag.nsamples)
        };
        let overlap_end = frag_out + half.min(frag_len) as i64;

        if self.output_position < overlap_end && !self.overlap_add(dst, limit) {
            return false;
        }

        if self.frags[cur].input_end() < self.ring.position() {
            self.advance();
            return false;
        }

        // copy the rest of the fragment unblended
        let ch = self.channels;
        let frag = &self.frags[cur];
        let start = self.output_position.max(overlap_end);
        let stop = frag.output_end();
        let offset = (start - frag.position[1]) as usize;
        let room = limit.saturating_sub(dst.len()) / ch;
        let count = ((stop - start).max(0) as usize).min(room);

        dst.extend_from_slice(&frag.data[offset * ch..(offset + count) * ch]);
        self.output_position = start + count as i64;

        self.output_position >= stop
    }

    fn cur_index(&self) -> usize {
        (self.nfrag % 2) as usize
    }

    fn prev_index(&self) -> usize {
        ((self.nfrag + 1) % 2) as usize
    }

    /// Push input into the ring until it reaches absolute position `stop`.
    fn load_data(&mut self, input: &mut &[S], stop: i64) -> bool {
        let ch = self.channels;
        let capacity = self.ring.capacity();

        while self.ring.position() < stop {
            let available = input.len() / ch;
            if available == 0 {
                break;
            }
            // pieces no larger than the ring; anything that scrolls out is
            // behind every future fragment
            let wanted = (stop - self.ring.position()) as usize;
            let n = wanted.min(available).min(capacity);
            let (piece, rest) = input.split_at(n * ch);
            self.ring.push(piece);
            *input = rest;
        }

        self.ring.position() >= stop
    }

    /// Fill the current fragment from the ring. Without `input` this reads
    /// whatever is buffered, leaving the fragment short at end of stream.
    fn load_fragment(&mut self, input: Option<&mut &[S]>) -> bool {
        let cur = self.cur_index();
        let start = self.frags[cur].position[0];
        let stop = start + self.window as i64;

        if let Some(input) = input {
            if !self.load_data(input, stop) {
                return false;
            }
        }

        let missing = (stop - self.ring.position()).max(0) as usize;
        let nsamples = self.window.saturating_sub(missing);

        let frag = &mut self.frags[cur];
        frag.nsamples = nsamples;
        self.ring
            .read_into(&mut frag.data[..nsamples * self.channels], start, nsamples);
        true
    }

    fn analyze_current(&mut self) {
        let cur = self.cur_index();
        self.frags[cur].analyze(self.channels, &mut self.fft, &mut self.mono);
    }

    fn advance(&mut self) {
        let step = (self.tempo * (self.window / 2) as f64) as i64;
        let half = (self.window / 2) as i64;

        self.nfrag += 1;
        let prev = self.frags[self.prev_index()].position;
        let cur = self.cur_index();

        let frag = &mut self.frags[cur];
        frag.position = [prev[0] + step, prev[1] + half];
        frag.nsamples = 0;
        self.alignments = 0;
        self.stats.fragments += 1;
    }

    /// Align the current fragment against the previous one, returning the
    /// applied correction.
    fn adjust_position(&mut self) -> i64 {
        let cur = self.cur_index();
        let prev = &self.frags[self.prev_index()];
        let drift = align::drift(prev.position, self.origin, self.window, self.tempo);

        let correction = align::align(
            &prev.xdat,
            &self.frags[cur].xdat,
            self.window,
            drift,
            &mut self.fft,
            &mut self.spectrum,
            &mut self.correlation,
        );
        self.alignments += 1;
        self.stats.max_alignments = self.stats.max_alignments.max(self.alignments);

        if correction != 0 {
            let frag = &mut self.frags[cur];
            frag.position[0] -= correction;
            frag.nsamples = 0;
            self.stats.corrections += 1;
        }
        correction
    }

    fn overlap_add(&mut self, dst: &mut Vec<S>, limit: usize) -> bool {
        let cur = self.cur_index();
        let prev = self.prev_index();
        overlap::overlap_add(
            &self.frags[prev],
            &self.frags[cur],
            &self.hann,
            self.channels,
            &mut self.output_position,
            dst,
            limit,
        )
    }
}
