// ─────────────────────────────────────────────────────────────────────
// SCPN Track Extrapolation — Extrapolation Engine
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Extrapolation engine.
//!
//! Drives the propagation, navigation and material ports through the
//! volume-to-volume loop, the layer walk inside an ordered destination
//! volume and the final hop onto the destination surface.
//!
//! All navigation state lives in a per-call `Call` value: the engine
//! itself only keeps the one-entry destination recall, so one
//! `Extrapolator` can serve independent calls from several threads.
//! Volume switches are iterations of one loop; `max_steps` and
//! `max_volume_transitions` bound every call.

use std::sync::Mutex;

use crate::arena::{StateArena, StateId};
use crate::cache::{BoundaryParameters, MaterialMark, NavigationCache};
use crate::material_effects::{MaterialEffectsOnTrack, MaterialEffectsUpdator, MaterialSlab};
use crate::navigator::Navigator;
use crate::propagator::{PropagationResult, PropagationTarget, Propagator, TargetKind};
use crate::status::{
    ExtrapolationOptions, ExtrapolationOutcome, ExtrapolationReport, NavigationBreak,
    VolumeResolution,
};
use trackx_geometry::tracking_geometry::BOUNDARY_NUDGE_MM;
use trackx_geometry::{BoundaryFace, BoundarySurface, Layer, Surface, TrackingGeometry};
use trackx_math::Vector3;
use trackx_types::config::ExtrapolatorConfig;
use trackx_types::error::ExtrapolationResult;
use trackx_types::ids::{LayerId, SurfaceId, VolumeId};
use trackx_types::parameters::TrackParameters;
use trackx_types::particle::{Direction, ParticleHypothesis};

/// Why a call left the navigation loops early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Break(NavigationBreak),
    Absorbed,
}

type Flow<T> = Result<T, Stop>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MaterialCall {
    Full,
    Pre,
    Post,
}

/// Result of one propagation inside the current volume.
enum Step {
    Arrived(StateId),
    Stay,
    Crossed(Option<VolumeId>),
}

/// Mutable state of one top-level call.
struct Call<'d> {
    options: ExtrapolationOptions,
    /// Resolved, never `Either`.
    direction: Direction,
    destination: Option<&'d Surface>,
    arena: StateArena,
    cache: NavigationCache,
    /// Last valid state.
    current: StateId,
    start_layer: Option<LayerId>,
    destination_layer: Option<LayerId>,
    destination_volume: Option<VolumeId>,
    oscillations: usize,
    /// Distance to the destination at the previous hand-off.
    distance: Option<f64>,
    /// Position of the previous hand-off.
    last_hand_off: Vector3,
    /// Dense volume being crossed and where it was entered.
    dense_entry: Option<(VolumeId, Vector3)>,
    material: Vec<MaterialEffectsOnTrack>,
    sensitive: Vec<TrackParameters>,
    intermediate: Vec<TrackParameters>,
    report: ExtrapolationReport,
}

impl<'d> Call<'d> {
    fn new(
        start: TrackParameters,
        destination: Option<&'d Surface>,
        options: ExtrapolationOptions,
        direction: Direction,
    ) -> Self {
        let mut arena = StateArena::new();
        let last_hand_off = start.position();
        let current = arena.insert(start);
        let report = ExtrapolationReport {
            direction: Some(direction),
            ..Default::default()
        };
        Call {
            options,
            direction,
            destination,
            arena,
            cache: NavigationCache::new(),
            current,
            start_layer: None,
            destination_layer: None,
            destination_volume: None,
            oscillations: 0,
            distance: None,
            last_hand_off,
            dense_entry: None,
            material: Vec::new(),
            sensitive: Vec::new(),
            intermediate: Vec::new(),
            report,
        }
    }

    fn state(&self, id: StateId) -> Flow<TrackParameters> {
        self.arena
            .get(id)
            .cloned()
            .ok_or(Stop::Break(NavigationBreak::PropagationFailure))
    }

    fn current_state(&self) -> Flow<TrackParameters> {
        self.state(self.current)
    }

    fn sign(&self) -> f64 {
        self.direction.sign().unwrap_or(1.0)
    }

    /// Accept `parameters` as the new last valid state.
    fn advance(&mut self, parameters: TrackParameters) -> StateId {
        let id = self.arena.insert(parameters);
        self.current = id;
        id
    }

    fn record_intermediate(&mut self, parameters: &TrackParameters) {
        if self.options.collect_intermediate {
            self.intermediate.push(parameters.clone());
        }
    }

    /// Free every state the cache and the next step can no longer reach.
    fn sweep(&mut self) {
        let mut protected = vec![self.current];
        if let Some(at) = self.cache.at_boundary {
            protected.push(at.entry);
            protected.push(at.resume);
        }
        let freed = self.arena.sweep(&protected);
        log::trace!("Swept {freed} intermediate states");
    }
}

/// Trajectory extrapolation through a tracking geometry.
#[derive(Debug)]
pub struct Extrapolator<P, N, M> {
    propagator: P,
    navigator: N,
    updator: M,
    config: ExtrapolatorConfig,
    /// Last destination surface and the volume it was resolved to.
    recall: Mutex<Option<(SurfaceId, VolumeId)>>,
}

impl<P, N, M> Extrapolator<P, N, M>
where
    P: Propagator,
    N: Navigator,
    M: MaterialEffectsUpdator,
{
    pub fn new(
        propagator: P,
        navigator: N,
        updator: M,
        config: ExtrapolatorConfig,
    ) -> ExtrapolationResult<Self> {
        config.validate()?;
        Ok(Extrapolator {
            propagator,
            navigator,
            updator,
            config,
            recall: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ExtrapolatorConfig {
        &self.config
    }

    pub fn propagator(&self) -> &P {
        &self.propagator
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn geometry(&self) -> &TrackingGeometry {
        self.navigator.geometry()
    }

    // ── Entry points ─────────────────────────────────────────────────

    /// Extrapolate `parameters` onto `destination`. `None` when the
    /// destination cannot be reached.
    pub fn extrapolate(
        &self,
        parameters: &TrackParameters,
        destination: &Surface,
        direction: Direction,
        bounds_check: bool,
        particle: ParticleHypothesis,
    ) -> Option<TrackParameters> {
        let options = ExtrapolationOptions::new(direction, particle).bounds_check(bounds_check);
        self.extrapolate_with(parameters, Some(destination), &options)
            .parameters
    }

    /// As `extrapolate`, also returning the material crossed in order.
    pub fn extrapolate_with_material(
        &self,
        parameters: &TrackParameters,
        destination: &Surface,
        direction: Direction,
        bounds_check: bool,
        particle: ParticleHypothesis,
    ) -> (Option<TrackParameters>, Vec<MaterialEffectsOnTrack>) {
        let options = ExtrapolationOptions::new(direction, particle)
            .bounds_check(bounds_check)
            .collect_material(true);
        let outcome = self.extrapolate_with(parameters, Some(destination), &options);
        (outcome.parameters, outcome.material)
    }

    /// Single propagation onto `destination`, ignoring volumes and material.
    pub fn extrapolate_directly(
        &self,
        parameters: &TrackParameters,
        destination: &Surface,
        direction: Direction,
        bounds_check: bool,
        particle: ParticleHypothesis,
    ) -> Option<TrackParameters> {
        self.propagator
            .propagate_to(
                parameters,
                destination,
                direction,
                &self.config.field,
                particle,
                bounds_check,
            )
            .map(|r| r.parameters)
    }

    /// Walk until the track leaves the world. Returns every layer and
    /// boundary state in traversal order, the world exit last.
    pub fn extrapolate_blindly(
        &self,
        parameters: &TrackParameters,
        direction: Direction,
        particle: ParticleHypothesis,
    ) -> Vec<TrackParameters> {
        let options = ExtrapolationOptions::new(direction, particle).collect_intermediate(true);
        self.extrapolate_with(parameters, None, &options).intermediate
    }

    /// Every layer and boundary state on the way to `destination`, then
    /// the destination state itself.
    pub fn extrapolate_stepwise(
        &self,
        parameters: &TrackParameters,
        destination: &Surface,
        direction: Direction,
        bounds_check: bool,
        particle: ParticleHypothesis,
    ) -> Vec<TrackParameters> {
        let options = ExtrapolationOptions::new(direction, particle)
            .bounds_check(bounds_check)
            .collect_intermediate(true);
        let outcome = self.extrapolate_with(parameters, Some(destination), &options);
        let mut states = outcome.intermediate;
        states.extend(outcome.parameters);
        states
    }

    /// General entry point. Without a destination the call walks until
    /// the world boundary.
    pub fn extrapolate_with(
        &self,
        parameters: &TrackParameters,
        destination: Option<&Surface>,
        options: &ExtrapolationOptions,
    ) -> ExtrapolationOutcome {
        let direction = self.resolve_direction(parameters, destination, options);
        let mut call = Call::new(parameters.clone(), destination, *options, direction);
        let flow = self.navigate(&mut call);
        self.conclude(call, flow)
    }

    // ── Resolution ───────────────────────────────────────────────────

    /// Commit `Either` to one direction: the sign of a trial propagation
    /// onto the destination, else of the projection of the destination
    /// offset on the momentum.
    fn resolve_direction(
        &self,
        parameters: &TrackParameters,
        destination: Option<&Surface>,
        options: &ExtrapolationOptions,
    ) -> Direction {
        if options.direction.is_resolved() {
            return options.direction;
        }
        let Some(dest) = destination else {
            return Direction::Forward;
        };
        let trial = self.propagator.propagate_to(
            parameters,
            dest,
            Direction::Either,
            &self.config.field,
            options.particle,
            false,
        );
        let resolved = match trial {
            Some(r) => Direction::from_sign(r.path_length),
            None => {
                let offset = dest.reference_point() - parameters.position();
                Direction::from_sign(offset.dot(parameters.direction()))
            }
        };
        log::debug!("Resolved direction either -> {resolved:?}");
        resolved
    }

    fn recalled(&self, surface: SurfaceId) -> Option<VolumeId> {
        match self.recall.lock() {
            Ok(guard) => (*guard).and_then(|(s, v)| (s == surface).then_some(v)),
            Err(_) => None,
        }
    }

    fn remember(&self, surface: SurfaceId, volume: VolumeId) {
        if let Ok(mut guard) = self.recall.lock() {
            *guard = Some((surface, volume));
        }
    }

    /// Static volume for a surface-bound or free position: association,
    /// then recall, then point location.
    fn locate(
        &self,
        surface: Option<SurfaceId>,
        point: Vector3,
    ) -> Option<(VolumeId, VolumeResolution)> {
        let geometry = self.navigator.geometry();
        if let Some(id) = surface {
            let associated = geometry
                .association(id)
                .and_then(|a| geometry.static_volume_of(a.volume));
            if let Some(v) = associated {
                return Some((v, VolumeResolution::Association));
            }
            if let Some(v) = self.recalled(id) {
                return Some((v, VolumeResolution::Recall));
            }
        }
        self.navigator
            .volume_containing(point)
            .map(|v| (v, VolumeResolution::PointLocation))
    }

    fn resolve_start(&self, call: &mut Call<'_>, start: &TrackParameters) -> Flow<VolumeId> {
        let Some((volume, how)) = self.locate(start.surface(), start.position()) else {
            log::warn!(
                "No volume contains the start position {:?}",
                start.position()
            );
            return Err(Stop::Break(NavigationBreak::UnresolvedVolume));
        };
        call.report.start_volume = Some(volume);
        call.report.start_resolution = Some(how);
        call.start_layer = start
            .surface()
            .and_then(|s| self.navigator.geometry().layer_of_surface(s));
        Ok(volume)
    }

    fn resolve_destination(&self, call: &mut Call<'_>, destination: &Surface) -> Flow<VolumeId> {
        let Some((volume, how)) = self.locate(Some(destination.id()), destination.reference_point())
        else {
            log::warn!("No volume contains destination {}", destination.id());
            return Err(Stop::Break(NavigationBreak::UnresolvedVolume));
        };
        self.remember(destination.id(), volume);
        call.report.destination_volume = Some(volume);
        call.report.destination_resolution = Some(how);
        call.destination_volume = Some(volume);
        call.destination_layer = self
            .navigator
            .geometry()
            .layer_of_surface(destination.id());
        Ok(volume)
    }

    // ── Volume-to-volume loop ────────────────────────────────────────

    /// `Ok(None)` is a clean world exit of a call that collects but has
    /// no state to return.
    fn navigate(&self, call: &mut Call<'_>) -> Flow<Option<StateId>> {
        let geometry = self.navigator.geometry();
        let start = call.current_state()?;

        if let Some(dest) = call.destination {
            if dest.is_on_surface(
                start.position(),
                self.config.on_surface_tolerance_mm,
                call.options.bounds_check,
            ) {
                log::trace!("Start already on destination {}", dest.id());
                return Ok(Some(call.current));
            }
        }

        let mut volume = self.resolve_start(call, &start)?;
        if let Some(dest) = call.destination {
            self.resolve_destination(call, dest)?;
            call.distance = Some(dest.distance(start.position()));
        }
        call.report.visited_volumes.push(volume);
        if let Some(d) = geometry.containing_detached(volume, start.position()) {
            if geometry.volume(d).is_some_and(|v| v.is_dense()) {
                call.dense_entry = Some((d, start.position()));
            }
        }

        self.apply_start_post_update(call, &start)?;

        let check = self
            .navigator
            .at_volume_boundary(&start, volume, call.direction);
        if check.at_boundary {
            log::trace!("Start sits on {:?} of {volume}", check.face);
            match self.hand_off(call, volume, check.neighbor)? {
                Some(next) => volume = next,
                None => return Ok(self.world_exit(call)),
            }
        }

        loop {
            if call.cache.resolve(geometry, volume) {
                call.report.cache_resolutions = call.cache.resolutions();
            }
            if call.destination.is_some()
                && call.destination_volume == Some(volume)
                && call.cache.is_walkable()
            {
                return self.walk_layers(call, volume);
            }
            match self.step_in_volume(call, volume)? {
                Step::Arrived(id) => return Ok(Some(id)),
                Step::Stay => {}
                Step::Crossed(next) => match self.hand_off(call, volume, next)? {
                    Some(v) => volume = v,
                    None => return Ok(self.world_exit(call)),
                },
            }
        }
    }

    fn world_exit(&self, call: &Call<'_>) -> Option<StateId> {
        log::trace!("Left the world");
        call.destination.is_none().then_some(call.current)
    }

    /// One propagation toward everything the cached volume offers.
    fn step_in_volume(&self, call: &mut Call<'_>, volume: VolumeId) -> Flow<Step> {
        let geometry = self.navigator.geometry();
        let state = call.current_state()?;
        let targets = call
            .cache
            .targets(geometry, call.destination, call.options.bounds_check);

        let Some(result) = self.propagate(call, &state, &targets)? else {
            return self.step_through_navigator(call, volume, &state);
        };
        if result.hit_destination() {
            let id = call.arena.insert(result.parameters);
            return self.finish(call, id).map(Step::Arrived);
        }

        let mut crossed: Option<(VolumeId, BoundaryFace)> = None;
        let hit = call.arena.insert(result.parameters);
        call.current = hit;
        for kind in &result.hits {
            match *kind {
                TargetKind::Layer(layer) => self.cross_layer(call, layer)?,
                TargetKind::DenseBoundary { volume: dense, .. } => self.cross_dense(call, dense)?,
                TargetKind::Boundary { volume: owner, face } => {
                    crossed.get_or_insert((owner, face));
                }
                TargetKind::Destination | TargetKind::Sensitive { .. } => {}
            }
        }
        let Some((owner, face)) = crossed else {
            return Ok(Step::Stay);
        };
        let boundary = geometry.volume(owner).and_then(|v| v.boundary(face));
        let entry = call.current;
        self.cross_boundary(call, volume, entry, boundary, Some(face), None)
            .map(Step::Crossed)
    }

    /// Propagation toward the volume's surfaces failed; ask the navigation
    /// port for the next volume instead.
    fn step_through_navigator(
        &self,
        call: &mut Call<'_>,
        volume: VolumeId,
        state: &TrackParameters,
    ) -> Flow<Step> {
        self.count_step(call)?;
        let next = self.navigator.next_volume(
            &self.propagator,
            state,
            call.direction,
            volume,
            &self.config.field,
            call.options.particle,
        );
        let Some(next) = next else {
            log::debug!("No step and no next volume from {volume}");
            return Err(Stop::Break(NavigationBreak::PropagationFailure));
        };
        let position = next.parameters.position();
        let boundary = self
            .navigator
            .geometry()
            .volume(volume)
            .and_then(|v| v.boundary(next.exit_face))
            .filter(|b| {
                b.surface()
                    .is_on_surface(position, self.config.on_surface_tolerance_mm, false)
            });
        let entry = call.arena.insert(next.parameters);
        call.current = entry;
        self.cross_boundary(
            call,
            volume,
            entry,
            boundary,
            Some(next.exit_face),
            Some(next.volume),
        )
        .map(Step::Crossed)
    }

    /// Apply boundary (and pending dense) material at `entry` and find the
    /// volume behind. `neighbor` skips the lookup when already known.
    fn cross_boundary(
        &self,
        call: &mut Call<'_>,
        volume: VolumeId,
        entry: StateId,
        boundary: Option<&BoundarySurface>,
        face: Option<BoundaryFace>,
        neighbor: Option<Option<VolumeId>>,
    ) -> Flow<Option<VolumeId>> {
        let entry_state = call.state(entry)?;
        let mut state = self.settle_dense(call, entry_state.clone())?;
        if let Some(b) = boundary {
            if let Some(material) = b.material() {
                let position = state.position();
                let motion = state.direction() * call.sign();
                let slab = MaterialSlab::new(
                    *material,
                    b.surface().path_correction(position, motion),
                    Some(b.surface().id()),
                );
                state = self.apply_material(call, &state, &slab, MaterialCall::Full)?;
            }
        }
        call.record_intermediate(&state);
        let resume = call.advance(state);

        let next = match neighbor {
            Some(known) => known,
            None => self.neighbor_of(call, volume, &entry_state),
        };
        call.cache.at_boundary = Some(BoundaryParameters {
            next_volume: next,
            entry,
            resume,
            exit_face: face,
        });
        Ok(next)
    }

    fn neighbor_of(
        &self,
        call: &Call<'_>,
        volume: VolumeId,
        state: &TrackParameters,
    ) -> Option<VolumeId> {
        let check = self
            .navigator
            .at_volume_boundary(state, volume, call.direction);
        if check.at_boundary {
            return check.neighbor;
        }
        let motion = (state.direction() * call.sign()).normalized()?;
        self.navigator
            .volume_containing(state.position() + motion * BOUNDARY_NUDGE_MM)
    }

    /// Accept or reject the transition `from` → `next`. `Ok(None)` is a
    /// clean world exit.
    fn hand_off(
        &self,
        call: &mut Call<'_>,
        from: VolumeId,
        next: Option<VolumeId>,
    ) -> Flow<Option<VolumeId>> {
        let state = call.current_state()?;
        let Some(next) = next else {
            if call.destination.is_none() || call.options.collect_sensitive {
                return Ok(None);
            }
            log::debug!("No volume behind the boundary of {from}");
            return Err(Stop::Break(NavigationBreak::MissingVolume));
        };

        let position = state.position();
        let motion = state.direction() * call.sign();
        let progress = (position - call.last_hand_off).dot(motion);
        call.last_hand_off = position;
        let stalled = progress < self.config.loop_tolerance_mm;

        if next == from {
            if stalled {
                log::debug!("Loop: {from} re-entered without progress");
                return Err(Stop::Break(NavigationBreak::Loop));
            }
            return Ok(Some(next));
        }

        let history = &call.report.visited_volumes;
        if history.len() >= 2 && history[history.len() - 2] == next {
            if stalled {
                log::debug!("Loop: back to {next} without progress");
                return Err(Stop::Break(NavigationBreak::Loop));
            }
            call.oscillations += 1;
            if call.oscillations > 1 {
                log::debug!("Oscillation between {from} and {next}");
                return Err(Stop::Break(NavigationBreak::Oscillation));
            }
            log::trace!("Tolerated oscillation {from} -> {next}");
        }

        if let Some(dest) = call.destination {
            let d = dest.distance(position);
            if let Some(previous) = call.distance {
                if d > previous + self.config.distance_regression_tolerance_mm {
                    log::debug!(
                        "Distance to destination grew from {previous:.3} to {d:.3} mm"
                    );
                    return Err(Stop::Break(NavigationBreak::DistanceRegression));
                }
            }
            call.distance = Some(d);
        }

        if call.report.volume_transitions() >= self.config.max_volume_transitions {
            return Err(Stop::Break(NavigationBreak::DepthLimit));
        }
        call.report.visited_volumes.push(next);
        call.dense_entry = None;
        call.sweep();
        log::trace!("{from} -> {next} at {position:?}");
        Ok(Some(next))
    }

    // ── Layer walk ───────────────────────────────────────────────────

    /// Walk the ordered layers of the destination volume, then hop onto the
    /// destination. Each next layer is taken from the state reached on the
    /// previous one, so a track turning back in radius walks outward again.
    fn walk_layers(&self, call: &mut Call<'_>, volume: VolumeId) -> Flow<Option<StateId>> {
        let geometry = self.navigator.geometry();
        let Some(destination) = call.destination else {
            return Ok(None);
        };
        let layer_count = geometry.volume(volume).map_or(0, |v| v.layer_count());
        let budget = self
            .config
            .initial_layer_attempts
            .max(self.config.successive_layer_attempts * layer_count);

        let state = call.current_state()?;
        let (mut cursor, mut passed) = self.walk_start(call, volume, &state);
        let mut failures = 0usize;
        let mut walked: Vec<LayerId> = Vec::new();
        loop {
            let candidate = cursor.and_then(|id| geometry.layer(id));
            // A track turning back leaves through the layer it last passed.
            let back = passed
                .filter(|&b| Some(b) != cursor)
                .and_then(|b| geometry.layer(b));
            if candidate.is_none() && back.is_none() {
                break;
            }
            if let Some(id) = cursor {
                if walked.len() >= 2 && walked[walked.len() - 2] == id {
                    log::debug!("Layer loop at {id}");
                    break;
                }
            }
            let state = call.current_state()?;
            let mut targets = Vec::with_capacity(3);
            for layer in candidate.into_iter().chain(back) {
                targets.push(PropagationTarget::new(
                    layer.surface(),
                    TargetKind::Layer(layer.id()),
                    true,
                ));
            }
            targets.push(PropagationTarget::new(
                destination,
                TargetKind::Destination,
                call.options.bounds_check,
            ));

            let Some(result) = self.propagate(call, &state, &targets)? else {
                failures += 1;
                let Some(layer) = candidate else {
                    break;
                };
                log::trace!("Missed {} ({failures}/{budget})", layer.id());
                if failures >= budget {
                    break;
                }
                let motion = state.direction() * call.sign();
                cursor = layer.next_layer(state.position(), motion);
                continue;
            };
            failures = 0;
            if result.hit_destination() {
                let hit = call.arena.insert(result.parameters);
                return self.finish(call, hit).map(Some);
            }
            call.current = call.arena.insert(result.parameters);
            let crossed: Vec<LayerId> = result
                .hits
                .iter()
                .filter_map(|kind| match *kind {
                    TargetKind::Layer(l) => Some(l),
                    _ => None,
                })
                .collect();
            let Some(&last) = crossed.last() else {
                break;
            };
            for &l in &crossed {
                self.cross_layer(call, l)?;
                walked.push(l);
            }
            passed = Some(last);
            if call.destination_layer == Some(last) {
                break;
            }
            let state = call.current_state()?;
            let motion = state.direction() * call.sign();
            cursor = geometry
                .layer(last)
                .and_then(|l| l.next_layer(state.position(), motion));
        }

        let state = call.current_state()?;
        let target = [PropagationTarget::new(
            destination,
            TargetKind::Destination,
            call.options.bounds_check,
        )];
        match self.propagate(call, &state, &target)? {
            Some(result) => {
                let hit = call.arena.insert(result.parameters);
                self.finish(call, hit).map(Some)
            }
            None => {
                log::debug!("Final hop onto {} failed", destination.id());
                Err(Stop::Break(NavigationBreak::PropagationFailure))
            }
        }
    }

    /// First layer to aim at from `state`, and the layer it sits on or has
    /// just passed. Starts from the associated start layer when the state
    /// is still on it, else from the nearest layer of `volume`.
    fn walk_start(
        &self,
        call: &Call<'_>,
        volume: VolumeId,
        state: &TrackParameters,
    ) -> (Option<LayerId>, Option<LayerId>) {
        let geometry = self.navigator.geometry();
        let position = state.position();
        let motion = state.direction() * call.sign();
        let tolerance = self.config.on_surface_tolerance_mm;
        let associated = call
            .start_layer
            .and_then(|id| geometry.layer(id))
            .filter(|l| {
                l.volume() == volume && l.surface().is_on_surface(position, tolerance, false)
            });
        let Some(layer) = associated.or_else(|| {
            geometry
                .nearest_layer(volume, position)
                .and_then(|id| geometry.layer(id))
        }) else {
            return (None, None);
        };
        let next = layer.next_layer(position, motion);
        if layer.surface().is_on_surface(position, tolerance, false) {
            return (next, Some(layer.id()));
        }
        let s = layer.surface().signed_distance(position);
        if motion.dot(layer.surface().normal_at(position)) * s < 0.0 {
            (Some(layer.id()), None)
        } else {
            (next, Some(layer.id()))
        }
    }

    // ── Material ─────────────────────────────────────────────────────

    fn layer_slab(layer: &Layer, state: &TrackParameters, sign: f64) -> Option<MaterialSlab> {
        let material = layer.material()?;
        let position = state.position();
        let motion = state.direction() * sign;
        Some(
            MaterialSlab::new(
                *material,
                layer.surface().path_correction(position, motion),
                Some(layer.surface().id()),
            )
            .with_pre_factor(layer.material_pre_factor(position, motion)),
        )
    }

    /// Run one updator call. `Err(Absorbed)` when the particle stops.
    fn apply_material(
        &self,
        call: &mut Call<'_>,
        state: &TrackParameters,
        slab: &MaterialSlab,
        kind: MaterialCall,
    ) -> Flow<TrackParameters> {
        let particle = call.options.particle;
        if !self.config.include_material_effects || particle == ParticleHypothesis::NonInteracting
        {
            return Ok(state.clone());
        }
        let mode = self.config.material_update_mode;
        let update = match kind {
            MaterialCall::Full => self
                .updator
                .update(state, slab, call.direction, particle, mode),
            MaterialCall::Pre => self
                .updator
                .pre_update(state, slab, call.direction, particle, mode),
            MaterialCall::Post => self
                .updator
                .post_update(state, slab, call.direction, particle, mode),
        };
        let Some(update) = update else {
            log::warn!(
                "Particle absorbed at {:?} ({:.4} X0)",
                state.position(),
                slab.thickness_in_x0()
            );
            return Err(Stop::Absorbed);
        };
        call.report.material_updates += 1;
        if call.options.collect_material {
            call.material.push(update.effects);
        }
        Ok(update.parameters)
    }

    fn apply_start_post_update(&self, call: &mut Call<'_>, start: &TrackParameters) -> Flow<()> {
        let Some(id) = call.start_layer else {
            return Ok(());
        };
        call.cache.last_material = Some(MaterialMark {
            layer: id,
            position: start.position(),
        });
        if !self.config.apply_start_post_update || call.destination_layer == Some(id) {
            return Ok(());
        }
        let Some(slab) = self
            .navigator
            .geometry()
            .layer(id)
            .and_then(|l| Self::layer_slab(l, start, call.sign()))
        else {
            return Ok(());
        };
        let updated = self.apply_material(call, start, &slab, MaterialCall::Post)?;
        call.advance(updated);
        Ok(())
    }

    /// Material of a layer the current state sits on.
    fn cross_layer(&self, call: &mut Call<'_>, id: LayerId) -> Flow<()> {
        let geometry = self.navigator.geometry();
        let Some(layer) = geometry.layer(id) else {
            return Ok(());
        };
        let mut state = call.current_state()?;
        let position = state.position();
        if !call
            .cache
            .material_applied(id, position, self.config.on_surface_tolerance_mm)
        {
            if let Some(slab) = Self::layer_slab(layer, &state, call.sign()) {
                let kind = if call.destination_layer == Some(id) {
                    MaterialCall::Pre
                } else {
                    MaterialCall::Full
                };
                state = self.apply_material(call, &state, &slab, kind)?;
                call.cache.last_material = Some(MaterialMark { layer: id, position });
            }
        }
        call.record_intermediate(&state);
        if call.options.collect_sensitive && self.config.overlap_search && layer.has_sub_surfaces()
        {
            self.search_overlaps(call, layer, &state);
        }
        call.advance(state);
        Ok(())
    }

    /// Record states on the sensitive sub-surfaces of `layer` within the
    /// overlap window around `state`.
    fn search_overlaps(&self, call: &mut Call<'_>, layer: &Layer, state: &TrackParameters) {
        for (index, sub) in layer.sub_surfaces().iter().enumerate() {
            if sub.is_on_surface(state.position(), self.config.on_surface_tolerance_mm, true) {
                call.sensitive.push(state.clone().on_surface(sub.id()));
                continue;
            }
            let target = [PropagationTarget::new(
                sub,
                TargetKind::Sensitive {
                    layer: layer.id(),
                    index,
                },
                true,
            )];
            let hit = self.propagator.propagate(
                state,
                &target,
                Direction::Either,
                &self.config.field,
                call.options.particle,
                call.cache.volume(),
            );
            if let Some(r) = hit {
                if r.path_length.abs() <= self.config.overlap_tolerance_mm {
                    call.sensitive.push(r.parameters);
                }
            }
        }
    }

    /// Entering or leaving a dense detached volume.
    fn cross_dense(&self, call: &mut Call<'_>, dense: VolumeId) -> Flow<()> {
        let state = call.current_state()?;
        match call.dense_entry {
            Some((inside, _)) if inside == dense => {
                let state = self.settle_dense(call, state)?;
                call.record_intermediate(&state);
                call.advance(state);
            }
            _ => {
                call.dense_entry = Some((dense, state.position()));
                call.record_intermediate(&state);
            }
        }
        Ok(())
    }

    /// Apply the material of a dense volume crossed since its entry point.
    fn settle_dense(&self, call: &mut Call<'_>, state: TrackParameters) -> Flow<TrackParameters> {
        let Some((dense, entry)) = call.dense_entry.take() else {
            return Ok(state);
        };
        let path = state.position().distance(entry);
        let material = self
            .navigator
            .geometry()
            .volume(dense)
            .and_then(|v| v.material().copied());
        match material {
            Some(m) if path > 0.0 => {
                let slab = MaterialSlab::new(m.with_thickness(path), 1.0, None);
                self.apply_material(call, &state, &slab, MaterialCall::Full)
            }
            _ => Ok(state),
        }
    }

    /// Destination reached with state `id`.
    fn finish(&self, call: &mut Call<'_>, id: StateId) -> Flow<StateId> {
        let mut state = call.state(id)?;
        state = self.settle_dense(call, state)?;
        if let Some(layer_id) = call.destination_layer {
            let eligible = self.config.apply_destination_pre_update
                && call.start_layer != Some(layer_id)
                && !call.cache.material_applied(
                    layer_id,
                    state.position(),
                    self.config.on_surface_tolerance_mm,
                );
            if eligible {
                let slab = self
                    .navigator
                    .geometry()
                    .layer(layer_id)
                    .and_then(|l| Self::layer_slab(l, &state, call.sign()));
                if let Some(slab) = slab {
                    let position = state.position();
                    state = self.apply_material(call, &state, &slab, MaterialCall::Pre)?;
                    call.cache.last_material = Some(MaterialMark {
                        layer: layer_id,
                        position,
                    });
                }
            }
        }
        Ok(call.advance(state))
    }

    // ── Propagation ──────────────────────────────────────────────────

    fn count_step(&self, call: &mut Call<'_>) -> Flow<()> {
        if call.report.steps >= self.config.max_steps {
            log::debug!("Step limit of {} reached", self.config.max_steps);
            return Err(Stop::Break(NavigationBreak::StepLimit));
        }
        call.report.steps += 1;
        Ok(())
    }

    fn propagate(
        &self,
        call: &mut Call<'_>,
        state: &TrackParameters,
        targets: &[PropagationTarget<'_>],
    ) -> Flow<Option<PropagationResult>> {
        self.count_step(call)?;
        Ok(self.propagator.propagate(
            state,
            targets,
            call.direction,
            &self.config.field,
            call.options.particle,
            call.cache.volume(),
        ))
    }

    // ── Conclusion ───────────────────────────────────────────────────

    fn conclude(&self, call: Call<'_>, flow: Flow<Option<StateId>>) -> ExtrapolationOutcome {
        let Call {
            mut arena,
            mut report,
            cache,
            current,
            destination,
            direction,
            options,
            material,
            sensitive,
            intermediate,
            ..
        } = call;
        report.cache_resolutions = cache.resolutions();

        let parameters = match flow {
            Ok(Some(id)) => arena.take(id),
            Ok(None) => None,
            Err(Stop::Absorbed) => {
                report.absorbed = true;
                if self.config.return_last_valid_on_absorption {
                    arena.take(current)
                } else {
                    None
                }
            }
            Err(Stop::Break(kind)) => {
                report.navigation_break = Some(kind);
                match destination {
                    Some(dest) if !self.config.stop_with_navigation_break => {
                        log::debug!("Navigation break ({kind}), trying the direct fallback");
                        report.fallback_used = true;
                        arena.get(current).and_then(|last| {
                            self.propagator
                                .propagate_to(
                                    last,
                                    dest,
                                    direction,
                                    &self.config.field,
                                    options.particle,
                                    options.bounds_check,
                                )
                                .map(|r| r.parameters)
                        })
                    }
                    _ => {
                        log::debug!("Navigation break ({kind})");
                        None
                    }
                }
            }
        };
        arena.sweep(&[]);
        report.states_created = arena.created();
        report.states_released = arena.released();
        report.states_returned = arena.taken();
        log::trace!(
            "Call used {} states, {} released",
            report.states_created,
            report.states_released
        );

        ExtrapolationOutcome {
            parameters,
            material,
            sensitive,
            intermediate,
            report,
        }
    }
}
