//! The playback state machine and scheduling loop.
//!
//! The engine is single-threaded and cooperatively scheduled: the host
//! calls [PlaybackEngine::tick] from its per-frame callback, passing the
//! [Ticket] issued by [PlaybackEngine::play]. Every transition out of
//! the playing state invalidates outstanding tickets synchronously, so a
//! late-firing callback can never render against swapped-out state.

use crate::feature::{Color, Frame, StaticFeatures, TrafficLightPoint, VehiclePoint};
use crate::geometry::GeometryBuilder;
use crate::math::Point2d;
use crate::network::RoadNetwork;
use crate::replay::{ReplayLog, SignalStatus};
use crate::transform::{GeoTransform, LngLat};
use crate::Error;
use log::debug;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Lower bound of the playback speed.
const MIN_SPEED: f64 = 0.01;
/// Upper bound of the playback speed.
const MAX_SPEED: f64 = 1.0;

/// Consumes the features produced during playback.
pub trait RenderSink {
    /// Receives the static feature sets, once per successful load.
    fn draw_static(&mut self, features: &StaticFeatures);
    /// Receives one rendered replay frame.
    fn draw_frame(&mut self, frame: &Frame);
}

/// Identifies one scheduled run of the playback loop.
///
/// Tickets issued before a pause, stop or reload are stale; ticking with
/// a stale ticket is a no-op that returns `None`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ticket(u64);

/// A snapshot of the engine's playback state.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlaybackState {
    pub current_step: usize,
    pub total_steps: usize,
    pub playing: bool,
    pub speed: f64,
}

/// The playback engine.
///
/// Owns the loaded scene, the current step index, the play state and the
/// speed; no other component reads or writes them.
pub struct PlaybackEngine {
    scene: Option<Scene>,
    speed: f64,
    /// Generation of the currently valid ticket.
    generation: u64,
    playing: bool,
    /// When the last frame was rendered by the scheduling loop.
    last_render: Option<Instant>,
}

/// Everything swapped in atomically by a successful load.
struct Scene {
    network: RoadNetwork,
    transform: GeoTransform,
    features: StaticFeatures,
    lights: Vec<LightGroup>,
    light_index: HashMap<String, usize>,
    log: ReplayLog,
    current: usize,
}

/// The anchors of one edge's traffic lights with their current phases.
struct LightGroup {
    edge_id: String,
    anchors: Vec<LngLat>,
    statuses: Vec<SignalStatus>,
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self {
            scene: None,
            speed: MAX_SPEED,
            generation: 0,
            playing: false,
            last_render: None,
        }
    }
}

impl PlaybackEngine {
    /// Creates a new engine with nothing loaded.
    pub fn new() -> Self {
        Default::default()
    }

    /// Loads a network and replay log, replacing any previous scene.
    ///
    /// The new scene is fully built before anything is swapped in; on
    /// failure the engine's previous state, including any loaded scene,
    /// is left untouched. On success any in-flight scheduling is
    /// cancelled, the static features are handed to the sink, and the
    /// engine is left paused at step 0.
    pub fn load(
        &mut self,
        network_json: &str,
        log_text: &str,
        transform: GeoTransform,
        sink: &mut dyn RenderSink,
    ) -> Result<(), Error> {
        let network = RoadNetwork::load(network_json)?;
        let log = ReplayLog::load(log_text)?;
        let features = GeometryBuilder::new(&network, &transform).build();

        let lights: Vec<LightGroup> = features
            .light_anchors
            .iter()
            .map(|set| LightGroup {
                edge_id: set.edge_id.clone(),
                anchors: set.anchors.clone(),
                statuses: vec![SignalStatus::Unknown; set.anchors.len()],
            })
            .collect();
        let light_index = lights
            .iter()
            .enumerate()
            .map(|(idx, group)| (group.edge_id.clone(), idx))
            .collect();

        // Outstanding tickets must go stale before the swap.
        self.cancel();
        self.last_render = None;
        let scene = self.scene.insert(Scene {
            network,
            transform,
            features,
            lights,
            light_index,
            log,
            current: 0,
        });
        debug!(
            "loaded scene: {} steps, {} road polygons",
            scene.log.len(),
            scene.features.road_polygons.len()
        );
        sink.draw_static(&scene.features);
        Ok(())
    }

    /// The road network of the loaded scene, if any.
    pub fn network(&self) -> Option<&RoadNetwork> {
        self.scene.as_ref().map(|scene| &scene.network)
    }

    /// The static features of the loaded scene, if any.
    pub fn features(&self) -> Option<&StaticFeatures> {
        self.scene.as_ref().map(|scene| &scene.features)
    }

    /// A snapshot of the playback state.
    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            current_step: self.scene.as_ref().map_or(0, |scene| scene.current),
            total_steps: self.scene.as_ref().map_or(0, |scene| scene.log.len()),
            playing: self.playing,
            speed: self.speed,
        }
    }

    /// Starts playback and returns the ticket to drive [tick] with.
    ///
    /// A no-op returning `None` when nothing is loaded or the log has no
    /// steps. Calling play while already playing returns the current
    /// ticket.
    pub fn play(&mut self) -> Option<Ticket> {
        let scene = self.scene.as_ref()?;
        if scene.log.is_empty() {
            return None;
        }
        if !self.playing {
            self.playing = true;
            self.generation = self.generation.wrapping_add(1);
            self.last_render = None;
        }
        Some(Ticket(self.generation))
    }

    /// Pauses playback, keeping the current step.
    pub fn pause(&mut self) {
        self.cancel();
    }

    /// Stops playback: resets to step 0 and renders it immediately.
    pub fn stop(&mut self, sink: &mut dyn RenderSink) {
        self.cancel();
        if let Some(scene) = &mut self.scene {
            scene.current = 0;
            if !scene.log.is_empty() {
                scene.render(sink);
            }
        }
    }

    /// Advances one step, wrapping around at the end of the log, and
    /// renders it immediately. Works in any play state.
    pub fn step_forward(&mut self, sink: &mut dyn RenderSink) {
        self.jog(1, sink);
    }

    /// Retreats one step, wrapping around at the start of the log, and
    /// renders it immediately. Works in any play state.
    pub fn step_backward(&mut self, sink: &mut dyn RenderSink) {
        self.jog(-1, sink);
    }

    /// Jumps to the given step, modulo the log length, and renders it
    /// immediately. Works in any play state.
    pub fn seek(&mut self, step: usize, sink: &mut dyn RenderSink) {
        if let Some(scene) = &mut self.scene {
            if scene.log.is_empty() {
                return;
            }
            scene.current = step % scene.log.len();
            scene.render(sink);
        }
    }

    fn jog(&mut self, delta: isize, sink: &mut dyn RenderSink) {
        if let Some(scene) = &mut self.scene {
            if scene.log.is_empty() {
                return;
            }
            let total = scene.log.len();
            scene.current = (scene.current + total).wrapping_add_signed(delta) % total;
            scene.render(sink);
        }
    }

    /// Sets the playback speed, clamped to `[0.01, 1.0]`.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
    }

    /// Adjusts the playback speed by `delta`, clamped to `[0.01, 1.0]`.
    pub fn adjust_speed(&mut self, delta: f64) {
        self.set_speed(self.speed + delta);
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Runs one scheduled tick; call from the host's per-frame callback.
    ///
    /// Renders the current step and advances once the frame interval has
    /// elapsed since the last render. Returns the ticket to pass to the
    /// next callback, or `None` when the ticket is stale and the loop
    /// must not be rescheduled.
    pub fn tick(
        &mut self,
        ticket: Ticket,
        now: Instant,
        sink: &mut dyn RenderSink,
    ) -> Option<Ticket> {
        if !self.playing || ticket != Ticket(self.generation) {
            return None;
        }
        let due = match self.last_render {
            Some(last) => now.duration_since(last) >= self.frame_interval(),
            None => true,
        };
        if due {
            let scene = self.scene.as_mut().expect("playing without a scene");
            scene.render(sink);
            scene.current = (scene.current + 1) % scene.log.len();
            self.last_render = Some(now);
        }
        Some(ticket)
    }

    /// The interval between rendered frames at the current speed:
    /// `1000 / (60 * speed^2)` milliseconds. The square gives
    /// fine-grained control at low speeds while full speed plays at
    /// 60 frames per second.
    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / (60.0 * self.speed * self.speed))
    }

    /// Invalidates any outstanding ticket and leaves the playing state.
    fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.playing = false;
    }
}

impl Scene {
    /// Renders the current step into the sink: applies the step's signal
    /// phases to the anchor statuses, then emits vehicle and
    /// traffic-light points in geographic coordinates.
    fn render(&mut self, sink: &mut dyn RenderSink) {
        let step = self.log.parse_step(self.current);

        for signal in &step.signals {
            match self.light_index.get(&signal.edge_id) {
                Some(&idx) => {
                    let group = &mut self.lights[idx];
                    for (slot, status) in group.statuses.iter_mut().zip(&signal.statuses) {
                        *slot = *status;
                    }
                }
                None => debug!("signal update for unknown edge {}", signal.edge_id),
            }
        }

        let vehicle_points = step
            .vehicles
            .iter()
            .map(|vehicle| VehiclePoint {
                id: vehicle.id.clone(),
                position: self.transform.to_geo(Point2d::new(vehicle.x, vehicle.y)),
                bearing: self.transform.to_bearing(vehicle.heading),
                color: Color::from_seed(vehicle.color_seed),
            })
            .collect();

        let traffic_light_points = self
            .lights
            .iter()
            .flat_map(|group| {
                group.statuses.iter().enumerate().map(|(lane, status)| {
                    TrafficLightPoint {
                        id: format!("{}_{}", group.edge_id, lane),
                        position: group.anchors[lane],
                        color: status.color(),
                        opacity: status.opacity(),
                    }
                })
            })
            .collect();

        sink.draw_frame(&Frame {
            step: self.current,
            vehicle_points,
            traffic_light_points,
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Records every frame handed to the sink.
    #[derive(Default)]
    struct TestSink {
        static_draws: usize,
        frames: Vec<Frame>,
    }

    impl RenderSink for TestSink {
        fn draw_static(&mut self, _features: &StaticFeatures) {
            self.static_draws += 1;
        }

        fn draw_frame(&mut self, frame: &Frame) {
            self.frames.push(frame.clone());
        }
    }

    fn transform() -> GeoTransform {
        GeoTransform::new(LngLat::new(0.0, 0.0), crate::GeoScale { lng: 1.0, lat: 1.0 })
    }

    const NETWORK: &str = r#"{
        "nodes": [
            {"id": "A", "point": [0, 0], "virtual": true},
            {"id": "B", "point": [100, 0], "virtual": false, "width": 5}
        ],
        "edges": [
            {"id": "E1", "from": "A", "to": "B",
             "points": [[0, 0], [100, 0]], "laneWidths": [3, 3], "nLane": 2}
        ]
    }"#;

    const LOG: &str = "10 20 0 v1 0 4 2;E1 r g\n30 20 0 v1 0 4 2;E1 g r\n50 20 0 v1 0 4 2;\n";

    fn loaded_engine(sink: &mut TestSink) -> PlaybackEngine {
        let mut engine = PlaybackEngine::new();
        engine.load(NETWORK, LOG, transform(), sink).unwrap();
        engine
    }

    #[test]
    fn load_hands_static_features_to_the_sink() {
        let mut sink = TestSink::default();
        let engine = loaded_engine(&mut sink);
        assert_eq!(sink.static_draws, 1);
        assert_eq!(engine.state().total_steps, 3);
        assert_eq!(engine.state().current_step, 0);
        assert!(!engine.state().playing);
    }

    #[test]
    fn first_tick_renders_the_scenario_frame() {
        let mut sink = TestSink::default();
        let mut engine = loaded_engine(&mut sink);

        let ticket = engine.play().unwrap();
        assert!(engine.state().playing);
        let next = engine.tick(ticket, Instant::now(), &mut sink);
        assert_eq!(next, Some(ticket));

        let frame = &sink.frames[0];
        assert_eq!(frame.step, 0);
        assert_eq!(frame.vehicle_points.len(), 1);
        let vehicle = &frame.vehicle_points[0];
        assert_eq!(vehicle.id, "v1");
        assert_eq!(vehicle.position, LngLat::new(10.0, 20.0));
        assert_eq!(vehicle.bearing, 90.0);

        // Lane 0 red, lane 1 green, both opaque.
        assert_eq!(frame.traffic_light_points.len(), 2);
        assert_eq!(frame.traffic_light_points[0].color, Color::RED);
        assert_eq!(frame.traffic_light_points[0].opacity, 1.0);
        assert_eq!(frame.traffic_light_points[1].color, Color::GREEN);

        assert_eq!(engine.state().current_step, 1);
    }

    #[test]
    fn ticks_respect_the_frame_interval() {
        let mut sink = TestSink::default();
        let mut engine = loaded_engine(&mut sink);
        engine.set_speed(1.0);

        let start = Instant::now();
        let ticket = engine.play().unwrap();
        engine.tick(ticket, start, &mut sink);
        assert_eq!(sink.frames.len(), 1);

        // Too soon: nothing rendered.
        engine.tick(ticket, start + Duration::from_millis(5), &mut sink);
        assert_eq!(sink.frames.len(), 1);

        // One full interval later the next step renders.
        engine.tick(ticket, start + Duration::from_millis(17), &mut sink);
        assert_eq!(sink.frames.len(), 2);
        assert_eq!(sink.frames[1].step, 1);
    }

    #[test]
    fn stale_tickets_are_ignored() {
        let mut sink = TestSink::default();
        let mut engine = loaded_engine(&mut sink);

        let ticket = engine.play().unwrap();
        engine.pause();
        assert!(!engine.state().playing);
        assert_eq!(engine.tick(ticket, Instant::now(), &mut sink), None);
        assert!(sink.frames.is_empty());

        // A fresh play issues a fresh ticket; the old one stays dead.
        let replay = engine.play().unwrap();
        assert_ne!(ticket, replay);
        assert_eq!(engine.tick(ticket, Instant::now(), &mut sink), None);
        assert_eq!(engine.tick(replay, Instant::now(), &mut sink), Some(replay));
    }

    #[test]
    fn stop_resets_and_renders_step_zero() {
        let mut sink = TestSink::default();
        let mut engine = loaded_engine(&mut sink);

        engine.step_forward(&mut sink);
        engine.step_forward(&mut sink);
        assert_eq!(engine.state().current_step, 2);

        engine.stop(&mut sink);
        assert_eq!(engine.state().current_step, 0);
        assert!(!engine.state().playing);
        assert_eq!(sink.frames.last().unwrap().step, 0);
    }

    #[test]
    fn stepping_wraps_around_the_log() {
        let mut sink = TestSink::default();
        let mut engine = loaded_engine(&mut sink);
        let total = engine.state().total_steps;

        for _ in 0..total {
            engine.step_forward(&mut sink);
        }
        assert_eq!(engine.state().current_step, 0);

        engine.step_backward(&mut sink);
        assert_eq!(engine.state().current_step, total - 1);
        for _ in 0..total - 1 {
            engine.step_backward(&mut sink);
        }
        assert_eq!(engine.state().current_step, 0);
    }

    #[test]
    fn seek_wraps_modulo_total_steps() {
        let mut sink = TestSink::default();
        let mut engine = loaded_engine(&mut sink);
        engine.seek(7, &mut sink);
        assert_eq!(engine.state().current_step, 7 % 3);
        assert_eq!(sink.frames.last().unwrap().step, 1);
    }

    #[test]
    fn speed_is_always_clamped() {
        let mut engine = PlaybackEngine::new();
        engine.set_speed(5.0);
        assert_eq!(engine.speed(), 1.0);
        engine.set_speed(-3.0);
        assert_eq!(engine.speed(), 0.01);
        engine.set_speed(0.5);
        engine.adjust_speed(10.0);
        assert_eq!(engine.speed(), 1.0);
        engine.adjust_speed(-10.0);
        assert_eq!(engine.speed(), 0.01);
        engine.adjust_speed(0.09);
        assert!((engine.speed() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn full_speed_plays_at_sixty_fps() {
        let mut engine = PlaybackEngine::new();
        engine.set_speed(1.0);
        assert_eq!(engine.frame_interval(), Duration::from_secs_f64(1.0 / 60.0));
        engine.set_speed(0.5);
        assert_eq!(engine.frame_interval(), Duration::from_secs_f64(1.0 / 15.0));
    }

    #[test]
    fn play_without_steps_is_a_no_op() {
        let mut sink = TestSink::default();
        let mut engine = PlaybackEngine::new();
        assert_eq!(engine.play(), None);

        engine.load(NETWORK, "", transform(), &mut sink).unwrap();
        assert_eq!(engine.state().total_steps, 0);
        assert_eq!(engine.play(), None);
        assert!(!engine.state().playing);
    }

    #[test]
    fn failed_load_keeps_the_previous_scene() {
        let mut sink = TestSink::default();
        let mut engine = loaded_engine(&mut sink);
        engine.step_forward(&mut sink);

        let bad_network = r#"{"nodes": [], "edges": [
            {"id": "E9", "from": "nope", "to": "nada",
             "points": [[0, 0], [1, 0]], "laneWidths": [3], "nLane": 1}
        ]}"#;
        let err = engine.load(bad_network, LOG, transform(), &mut sink);
        assert!(matches!(err, Err(Error::UnresolvedNode { .. })));

        // Previous scene still queryable and playable.
        assert_eq!(engine.state().total_steps, 3);
        assert_eq!(engine.state().current_step, 1);
        assert!(engine.features().is_some());
        assert!(engine.network().unwrap().edge_by_ext_id("E1").is_some());
        assert!(engine.play().is_some());

        // A malformed log fails the load the same way.
        let err = engine.load(NETWORK, "bad line with no groups", transform(), &mut sink);
        assert!(matches!(err, Err(Error::MalformedStep { line: 1 })));
        assert_eq!(engine.state().total_steps, 3);
    }

    #[test]
    fn reload_invalidates_outstanding_tickets() {
        let mut sink = TestSink::default();
        let mut engine = loaded_engine(&mut sink);
        let ticket = engine.play().unwrap();

        engine.load(NETWORK, LOG, transform(), &mut sink).unwrap();
        assert!(!engine.state().playing);
        assert_eq!(engine.tick(ticket, Instant::now(), &mut sink), None);
    }

    #[test]
    fn signal_statuses_persist_between_steps() {
        let mut sink = TestSink::default();
        let mut engine = loaded_engine(&mut sink);

        // Step 1 swaps the phases; step 2 carries no signal group, so
        // the phases from step 1 stick.
        engine.seek(1, &mut sink);
        engine.seek(2, &mut sink);
        let frame = sink.frames.last().unwrap();
        assert_eq!(frame.traffic_light_points[0].color, Color::GREEN);
        assert_eq!(frame.traffic_light_points[1].color, Color::RED);
    }
}
