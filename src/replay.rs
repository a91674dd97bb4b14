//! Replay-log parsing.
//!
//! The log is plain text with one line per simulation step:
//! `"<vehicleGroup>;<signalGroup>"`. Loading validates the two-group
//! shape of every line; the records inside a line are parsed on demand.

use crate::Error;
use itertools::Itertools;
use log::debug;
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};

/// Signal phase of one lane's traffic light.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SignalStatus {
    Red,
    Green,
    /// Rendered fully transparent.
    Hidden,
    /// Any unrecognised code; rendered gray.
    Unknown,
}

impl SignalStatus {
    fn from_code(code: &str) -> Self {
        match code {
            "r" => SignalStatus::Red,
            "g" => SignalStatus::Green,
            "i" => SignalStatus::Hidden,
            _ => SignalStatus::Unknown,
        }
    }

    pub fn color(self) -> crate::Color {
        match self {
            SignalStatus::Red => crate::Color::RED,
            SignalStatus::Green => crate::Color::GREEN,
            SignalStatus::Hidden | SignalStatus::Unknown => crate::Color::GRAY,
        }
    }

    pub fn opacity(self) -> f64 {
        match self {
            SignalStatus::Hidden => 0.0,
            _ => 1.0,
        }
    }
}

/// One vehicle's snapshot within a step, in local coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleRecord {
    pub id: String,
    pub x: f64,
    pub y: f64,
    /// Heading in radians, counter-clockwise from the local +x axis.
    pub heading: f64,
    /// Whether the vehicle is changing lanes this step.
    pub lane_change: bool,
    /// Vehicle length in m.
    pub length: f64,
    /// Vehicle width in m.
    pub width: f64,
    /// Seed for the stable per-vehicle color, derived from `id`.
    pub color_seed: u64,
}

/// One edge's signal phases within a step, ordered by lane index.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalRecord {
    pub edge_id: String,
    pub statuses: SmallVec<[SignalStatus; 8]>,
}

/// One parsed step of the replay log.
#[derive(Clone, Debug, Default)]
pub struct ReplayStep {
    pub vehicles: Vec<VehicleRecord>,
    pub signals: Vec<SignalRecord>,
}

/// A validated, step-indexed replay log.
#[derive(Clone, Debug, Default)]
pub struct ReplayLog {
    lines: Vec<String>,
}

impl ReplayLog {
    /// Loads a replay log, validating that every line splits into a
    /// vehicle group and a signal group.
    ///
    /// Malformed lines fail the whole load; malformed entries within a
    /// well-formed line are only discovered, and skipped, when the step
    /// is parsed.
    pub fn load(text: &str) -> Result<Self, Error> {
        let mut lines = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.split(';').count() != 2 {
                return Err(Error::MalformedStep { line: idx + 1 });
            }
            lines.push(line.to_string());
        }
        Ok(Self { lines })
    }

    /// The number of steps in the log.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Parses the step at `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn parse_step(&self, index: usize) -> ReplayStep {
        let (vehicles, signals) = self.lines[index]
            .split(';')
            .collect_tuple()
            .expect("line shape is validated on load");

        ReplayStep {
            vehicles: split_entries(vehicles).filter_map(parse_vehicle).collect(),
            signals: split_entries(signals).filter_map(parse_signal).collect(),
        }
    }
}

fn split_entries(group: &str) -> impl Iterator<Item = &str> {
    group.split(',').map(str::trim).filter(|e| !e.is_empty())
}

/// Parses a `"x y heading id laneChange length width"` entry.
/// Entries with missing or unparsable fields are skipped.
fn parse_vehicle(entry: &str) -> Option<VehicleRecord> {
    let fields: SmallVec<[&str; 8]> = entry.split_whitespace().collect();
    if fields.len() < 7 {
        debug!("skipping short vehicle entry {:?}", entry);
        return None;
    }
    let number = |i: usize| {
        fields[i]
            .parse::<f64>()
            .map_err(|_| debug!("skipping vehicle entry with bad field {:?}", fields[i]))
            .ok()
    };
    let id = fields[3].to_string();
    Some(VehicleRecord {
        x: number(0)?,
        y: number(1)?,
        heading: number(2)?,
        lane_change: number(4)? != 0.0,
        length: number(5)?,
        width: number(6)?,
        color_seed: color_seed(&id),
        id,
    })
}

/// Parses an `"edgeId status0 status1 ..."` entry.
/// Entries shorter than two fields are skipped.
fn parse_signal(entry: &str) -> Option<SignalRecord> {
    let mut fields = entry.split_whitespace();
    let edge_id = fields.next()?.to_string();
    let statuses: SmallVec<_> = fields.map(SignalStatus::from_code).collect();
    if statuses.is_empty() {
        debug!("skipping short signal entry {:?}", entry);
        return None;
    }
    Some(SignalRecord { edge_id, statuses })
}

/// Hashes a vehicle id into its color seed. The default hasher is used
/// with its fixed keys, so seeds are stable across runs.
fn color_seed(id: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    id.hash(&mut hasher);
    hasher.finish()
}
