//! The looping sampler engine
//!
//! One [`Sampler`] renders one voice: it reads a bound [`SampleBuffer`]
//! through a Q32.32 phase accumulator, keeps the playhead inside the active
//! loop region, crossfades into the pending region at loop boundaries, and
//! runs the result through a resonant filter.
//!
//! # Real-time contract
//!
//! `render` and `process_commands` never allocate, lock, or block. The
//! filter is a type parameter, so the per-sample call is static. Work that
//! depends only on controls (pending region, crossfade length, filter
//! coefficients, base rate) happens once per block.

use std::sync::Arc;

use crate::buffer::SampleBuffer;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::filter::{FilterChain, ResonantFilter};
use crate::fixed::phase_index;
use crate::output::OutputSink;
use crate::types::{DiagFlags, Direction, PlaybackMode, TransportState};

use super::command::EngineCommand;
use super::control::{ControlSnapshot, ControlSource};
use super::crossfade::{self, CrossfadeSession};
use super::interpolate;
use super::rate::RateCalculator;
use super::region::{LoopRegion, RegionManager};
use super::telemetry::{clamp_u32, Telemetry, TelemetrySnapshot};

/// A single looping voice
pub struct Sampler<F: ResonantFilter = FilterChain> {
    config: EngineConfig,
    buffer: Option<SampleBuffer>,
    state: TransportState,
    mode: PlaybackMode,
    direction: Direction,
    phase: i64,
    regions: RegionManager,
    rate: RateCalculator,
    session: Option<CrossfadeSession>,
    cooldown: usize,
    filter: F,
    telemetry: Arc<Telemetry>,
    loop_events: u32,
}

impl Sampler<FilterChain> {
    /// Create an engine with the filter selected in `config`
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let filter = FilterChain::new(config.filter, config.output_sample_rate);
        Self::with_filter(config, filter)
    }
}

impl<F: ResonantFilter> Sampler<F> {
    pub fn with_filter(config: EngineConfig, filter: F) -> EngineResult<Self> {
        config.validate()?;
        log::debug!(
            "Sampler created: {} Hz, block {}, filter {:?}, fm policy {:?}",
            config.output_sample_rate,
            config.block_size,
            config.filter,
            config.fm_policy
        );
        Ok(Self {
            regions: RegionManager::new(config.min_loop_len),
            rate: RateCalculator::new(&config),
            config,
            buffer: None,
            state: TransportState::Idle,
            mode: PlaybackMode::Forward,
            direction: Direction::Forward,
            phase: 0,
            session: None,
            cooldown: 0,
            filter,
            telemetry: Arc::new(Telemetry::new()),
            loop_events: 0,
        })
    }

    /// Telemetry block for readers on other threads
    pub fn telemetry(&self) -> Arc<Telemetry> {
        Arc::clone(&self.telemetry)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────

    /// Bind (or with `None`, unbind) the sample buffer.
    ///
    /// Playback state that refers to the old buffer is discarded: the
    /// active region is invalidated, so the next playing block resyncs from
    /// the controls. Returns the previous buffer.
    pub fn bind_buffer(&mut self, buffer: Option<SampleBuffer>) -> Option<SampleBuffer> {
        let previous = std::mem::replace(&mut self.buffer, buffer);
        self.regions.invalidate();
        self.session = None;
        self.cooldown = 0;
        self.phase = 0;
        self.loop_events = 0;
        self.direction = self.mode.initial_direction();
        self.filter.reset();

        match &self.buffer {
            Some(buffer) => {
                self.rate.set_rates(buffer.source_rate(), self.config.output_sample_rate);
                log::debug!("Buffer bound: {:?}, unity ratio {:.4}", buffer, self.rate.unity());
            }
            None => {
                self.state = TransportState::Idle;
                log::debug!("Buffer unbound");
            }
        }
        previous
    }

    pub fn buffer(&self) -> Option<&SampleBuffer> {
        self.buffer.as_ref()
    }

    /// Arm for playback. Arming needs a bound buffer; it stops a running
    /// voice and rewinds to the loop entry on the next play.
    pub fn arm(&mut self, armed: bool) {
        if !armed {
            self.set_state(TransportState::Idle);
            return;
        }
        if self.buffer.is_none() {
            log::debug!("Arm ignored: no buffer bound");
            return;
        }
        self.regions.invalidate();
        self.session = None;
        self.cooldown = 0;
        self.set_state(TransportState::Ready);
    }

    /// Start or pause. Ignored while idle.
    pub fn play(&mut self, playing: bool) {
        if self.state == TransportState::Idle {
            return;
        }
        self.set_state(if playing {
            TransportState::Playing
        } else {
            TransportState::Paused
        });
    }

    pub fn toggle_play(&mut self) {
        self.play(self.state != TransportState::Playing);
    }

    /// Change the playback mode. Forward and reverse reset the direction;
    /// alternate keeps travelling the current way.
    pub fn set_mode(&mut self, mode: PlaybackMode) {
        self.mode = mode;
        if mode != PlaybackMode::Alternate {
            self.direction = mode.initial_direction();
        }
    }

    fn set_state(&mut self, state: TransportState) {
        if self.state != state {
            log::debug!("Transport {} -> {}", self.state.name(), state.name());
            self.state = state;
        }
    }

    /// Apply queued commands. Called by the audio context before `render`.
    pub fn process_commands(&mut self, commands: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(command) = commands.pop() {
            self.apply(command);
        }
    }

    pub fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Bind(buffer) => {
                self.bind_buffer(Some(buffer));
            }
            EngineCommand::Unbind => {
                self.bind_buffer(None);
            }
            EngineCommand::Arm(armed) => self.arm(armed),
            EngineCommand::Play(playing) => self.play(playing),
            EngineCommand::TogglePlay => self.toggle_play(),
            EngineCommand::SetMode(mode) => self.set_mode(mode),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Live playhead phase (Q32.32)
    pub fn phase(&self) -> i64 {
        self.phase
    }

    pub fn active_region(&self) -> LoopRegion {
        self.regions.active()
    }

    pub fn pending_region(&self) -> LoopRegion {
        self.regions.pending()
    }

    pub fn crossfade(&self) -> Option<&CrossfadeSession> {
        self.session.as_ref()
    }

    pub fn is_crossfading(&self) -> bool {
        self.session.is_some()
    }

    pub fn cooldown_remaining(&self) -> usize {
        self.cooldown
    }

    pub fn loop_events(&self) -> u32 {
        self.loop_events
    }

    // ─────────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────────

    /// Render one block into `out` and publish telemetry.
    ///
    /// Returns the diagnostic flags raised during the block.
    pub fn render<C, S>(&mut self, controls: &C, out: &mut S) -> DiagFlags
    where
        C: ControlSource + ?Sized,
        S: OutputSink + ?Sized,
    {
        // Moved out for the block so the sample slice can be borrowed
        // alongside the mutable engine state
        let buffer = self.buffer.take();
        let diag = self.render_block(buffer.as_ref(), controls, out);
        self.buffer = buffer;
        diag
    }

    fn render_block<C, S>(&mut self, buffer: Option<&SampleBuffer>, controls: &C, out: &mut S) -> DiagFlags
    where
        C: ControlSource + ?Sized,
        S: OutputSink + ?Sized,
    {
        let snapshot = controls.snapshot();
        let reset = controls.reset_requested();
        let mut diag = DiagFlags::empty();

        let samples = match buffer {
            Some(buffer) if buffer.len() >= 2 => buffer.samples(),
            _ => {
                diag |= DiagFlags::NO_BUFFER;
                if self.state != TransportState::Playing {
                    diag |= DiagFlags::NOT_PLAYING;
                }
                out.fill_silence();
                if reset {
                    controls.acknowledge_reset();
                }
                self.publish(buffer.map_or(0, |b| b.len()), diag);
                return diag;
            }
        };
        let total = samples.len();

        if self.state != TransportState::Playing {
            diag |= DiagFlags::NOT_PLAYING;
            out.fill_silence();
            if self.session.is_none() {
                self.regions.update_pending(&snapshot, total);
                if reset {
                    self.hard_reset();
                    controls.acknowledge_reset();
                }
            }
            self.publish(total, diag);
            return diag;
        }

        self.filter.set_controls(snapshot.filter_cutoff, snapshot.filter_resonance);
        self.rate.begin_block(&snapshot);

        if self.session.is_none() {
            self.regions.update_pending(&snapshot, total);
        }
        if !self.regions.active_is_valid(total) {
            diag |= DiagFlags::LOOP_INVALID;
            self.resync();
        }

        // A reset waits while a crossfade or its cooldown is running
        if reset && self.session.is_none() && self.cooldown == 0 {
            self.handle_reset(&snapshot, &mut diag);
            controls.acknowledge_reset();
        }

        for i in 0..out.len() {
            let increment = self.rate.next_increment(self.direction);
            if increment == 0 {
                diag |= DiagFlags::ZERO_INCREMENT;
            } else if Direction::of_increment(increment, self.direction) != self.direction {
                diag |= DiagFlags::DIRECTION_FLIPPED;
            }

            let raw = if self.session.is_some() {
                self.crossfade_step(samples, increment, &mut diag)
            } else {
                self.playback_step(samples, increment, snapshot.xfade_length, &mut diag)
            };
            out.write(i, self.filter.process(raw));
        }

        log::trace!(
            "block: phase {} active {:?} crossfade {} diag {:?}",
            phase_index(self.phase),
            self.regions.active(),
            self.session.is_some(),
            diag
        );
        self.publish(total, diag);
        diag
    }

    /// Effective crossfade length for the current regions, or `None` when
    /// the control disables crossfading
    fn crossfade_length(&self, control: u16, diag: &mut DiagFlags) -> Option<usize> {
        if control == 0 {
            return None;
        }
        let max_both = crossfade::max_length(self.regions.active().len(), self.regions.pending().len());
        if max_both == 0 {
            return None;
        }
        let requested = crossfade::requested_length(control, max_both);
        let (length, clamped) = crossfade::effective_length(requested, self.config.min_xfade, max_both);
        if clamped {
            *diag |= DiagFlags::XFADE_CLAMPED;
        }
        Some(length)
    }

    /// Adopt pending and snap to its entry edge
    fn resync(&mut self) {
        self.regions.adopt_pending();
        self.phase = self.regions.active().entry_phase(self.direction);
        self.cooldown = 0;
        log::trace!("Resynced to {:?}", self.regions.active());
    }

    fn hard_reset(&mut self) {
        self.resync();
        self.loop_events = self.loop_events.wrapping_add(1);
    }

    fn handle_reset(&mut self, snapshot: &ControlSnapshot, diag: &mut DiagFlags) {
        let increment = self.rate.increment(self.direction);
        match self.crossfade_length(snapshot.xfade_length, diag) {
            Some(length) if increment != 0 => self.start_session(length, increment),
            _ => self.hard_reset(),
        }
    }

    fn start_session(&mut self, length: usize, increment: i64) {
        let session = CrossfadeSession::begin(
            self.phase,
            self.regions.active(),
            self.regions.pending(),
            length,
            increment,
        );
        log::trace!(
            "Crossfade: {} samples over {} steps into {:?}",
            length,
            session.total(),
            session.head_region()
        );
        self.session = Some(session);
    }

    fn crossfade_step(&mut self, samples: &[i16], increment: i64, diag: &mut DiagFlags) -> i16 {
        let Some(session) = self.session.as_mut() else {
            return 0;
        };
        let step = session.step(samples, increment, self.config.fm_policy);
        if step.clamped {
            *diag |= DiagFlags::INDEX_CLAMPED;
        }
        if step.finished {
            let head_phase = session.head_phase();
            let head_region = session.head_region();
            self.session = None;
            self.phase = head_phase;
            self.regions.set_active(head_region);
            self.cooldown = self.config.cooldown_samples;
            self.loop_events = self.loop_events.wrapping_add(1);
        }
        step.sample
    }

    /// Whether the next step reaches the crossfade window at the far edge
    fn approaching_edge(&self, increment: i64, length: usize) -> bool {
        let active = self.regions.active();
        let index = phase_index(self.phase);
        let next = self.phase.saturating_add(increment);
        if increment > 0 {
            index >= active.end.saturating_sub(length) as i64 || next >= active.end_phase()
        } else {
            index < (active.start + length) as i64 || next < active.start_phase()
        }
    }

    fn playback_step(&mut self, samples: &[i16], increment: i64, xfade_control: u16, diag: &mut DiagFlags) -> i16 {
        let xfade = self.crossfade_length(xfade_control, diag);

        if self.mode != PlaybackMode::Alternate && self.cooldown == 0 && increment != 0 {
            if let Some(length) = xfade {
                if self.approaching_edge(increment, length) {
                    self.start_session(length, increment);
                    return self.crossfade_step(samples, increment, diag);
                }
            }
        }

        self.cooldown = self.cooldown.saturating_sub(1);

        let active = self.regions.active();
        let travel = Direction::of_increment(increment, self.direction);
        let tap = interpolate::read(samples, self.phase, active);
        if tap.clamped {
            *diag |= DiagFlags::INDEX_CLAMPED;
        }

        let next = self.phase.saturating_add(increment);
        self.phase = if active.contains(phase_index(next)) {
            next
        } else if self.mode == PlaybackMode::Alternate {
            self.reflect(next, active)
        } else {
            self.wrap(next, active, travel, xfade.is_none())
        };
        tap.sample
    }

    /// Wrap past an edge in forward or reverse mode. With crossfading off a
    /// pending region is adopted at the seam, keeping the edge distance.
    fn wrap(&mut self, next: i64, active: LoopRegion, travel: Direction, hard_swap: bool) -> i64 {
        self.loop_events = self.loop_events.wrapping_add(1);
        let wrapped = active.wrap(next);
        if hard_swap && self.regions.has_pending_change() {
            let pending = self.regions.pending();
            self.regions.adopt_pending();
            return active.transfer(wrapped, &pending, travel);
        }
        wrapped
    }

    /// Reflect off an edge in alternate mode and reverse travel. A pending
    /// region is adopted at the edge that was hit.
    fn reflect(&mut self, next: i64, active: LoopRegion) -> i64 {
        self.loop_events = self.loop_events.wrapping_add(1);
        self.direction = self.direction.flipped();

        // Pivot on the edge samples so they play once per pass
        let hit_top = next >= active.end_phase();
        let top = active.entry_phase(Direction::Reverse);
        let reflected = if hit_top {
            top - (next - top)
        } else {
            active.start_phase() + (active.start_phase() - next)
        };
        let reflected = active.clamp(reflected);

        if !self.regions.has_pending_change() {
            return reflected;
        }
        let pending = self.regions.pending();
        self.regions.adopt_pending();
        let mapped = if hit_top {
            pending.entry_phase(Direction::Reverse) - (top - reflected)
        } else {
            pending.start_phase() + (reflected - active.start_phase())
        };
        pending.clamp(mapped)
    }

    fn publish(&self, total: usize, diag: DiagFlags) {
        let active = self.regions.active();
        let pending = self.regions.pending();
        let (playhead, secondary, crossfading) = match &self.session {
            Some(session) => (
                phase_index(session.head_phase()),
                phase_index(session.tail_phase()),
                true,
            ),
            None => (phase_index(self.phase), 0, false),
        };
        self.telemetry.publish(&TelemetrySnapshot {
            active_start: clamp_u32(active.start),
            active_end: clamp_u32(active.end),
            pending_start: clamp_u32(pending.start),
            pending_end: clamp_u32(pending.end),
            playhead: clamp_u32(playhead.max(0) as usize),
            secondary_playhead: clamp_u32(secondary.max(0) as usize),
            crossfade_active: crossfading,
            total_samples: clamp_u32(total),
            state: self.state,
            mode: self.mode,
            direction: self.direction,
            diag,
            loop_events: self.loop_events,
        });
    }
}
