use std::time::{Duration, Instant};

use traffic_replay::{
    Frame, GeoScale, GeoTransform, LngLat, PlaybackEngine, RenderSink, StaticFeatures,
};

/// Counts what a real map layer would have drawn.
#[derive(Default)]
struct StatsSink {
    frames: usize,
    vehicles: usize,
}

impl RenderSink for StatsSink {
    fn draw_static(&mut self, features: &StaticFeatures) {
        println!(
            "{} road polygons, {} lane markings, {} center lines, {} intersections, {} signal edges",
            features.road_polygons.len(),
            features.lane_marking_lines.len(),
            features.center_lines.len(),
            features.intersection_polygons.len(),
            features.light_anchors.len(),
        );
    }

    fn draw_frame(&mut self, frame: &Frame) {
        self.frames += 1;
        self.vehicles += frame.vehicle_points.len();
    }
}

fn main() {
    let mut args = std::env::args().skip(1);
    let usage = "usage: traffic-replay <roadnet.json> <replay.txt>";
    let network = std::fs::read_to_string(args.next().expect(usage)).unwrap();
    let log = std::fs::read_to_string(args.next().expect(usage)).unwrap();

    let transform = GeoTransform::new(
        LngLat::new(116.391, 39.906),
        GeoScale {
            lng: 1.17e-5,
            lat: 0.9e-5,
        },
    );

    let mut sink = StatsSink::default();
    let mut engine = PlaybackEngine::new();
    engine.load(&network, &log, transform, &mut sink).unwrap();

    let total = engine.state().total_steps;
    println!("Playing {} steps...", total);
    let mut ticket = engine.play().expect("replay log is empty");

    let start = Instant::now();
    while sink.frames < total {
        ticket = match engine.tick(ticket, Instant::now(), &mut sink) {
            Some(ticket) => ticket,
            None => break,
        };
        std::thread::sleep(Duration::from_millis(2));
    }

    let elapsed = start.elapsed();
    println!(
        "Rendered {} frames ({} vehicle points) in {:?} --> {:.1} steps/s",
        sink.frames,
        sink.vehicles,
        elapsed,
        sink.frames as f64 / elapsed.as_secs_f64(),
    );
}
