use crate::board::{StateKey, NUM_CELLS};
use chrono::offset::Local;
use itertools::Itertools;
use rand::{prelude::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

/// Action values of one state, indexed by cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Moves {
    moves: [f32; NUM_CELLS],
}

/// The action-value table. A state that was never updated reads as nine
/// zeros; reads never insert, only updates do.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QTable {
    qtable: HashMap<StateKey, Moves>,
}

impl Deref for Moves {
    type Target = [f32; NUM_CELLS];
    fn deref(&self) -> &<Self as Deref>::Target {
        &self.moves
    }
}

impl DerefMut for Moves {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.moves
    }
}

impl Deref for QTable {
    type Target = HashMap<StateKey, Moves>;
    fn deref(&self) -> &<Self as Deref>::Target {
        &self.qtable
    }
}

impl From<[f32; NUM_CELLS]> for Moves {
    fn from(moves: [f32; NUM_CELLS]) -> Self {
        Moves { moves }
    }
}

impl Moves {
    /// Largest value over all nine cells, occupied ones included.
    pub fn max_value(&self) -> f32 {
        self.moves.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Picks uniformly among the legal moves sharing the highest value.
    pub fn select_max_move<R: Rng + ?Sized>(&self, legal: &[usize], rng: &mut R) -> Option<usize> {
        let max_moves = legal
            .iter()
            .copied()
            .max_set_by(|&move1, &move2| self.moves[move1].total_cmp(&self.moves[move2]));
        max_moves.choose(rng).copied()
    }
}

impl QTable {
    pub fn new() -> Self {
        QTable {
            qtable: HashMap::with_capacity(5_500),
        }
    }

    pub fn values(&self, state: &StateKey) -> Moves {
        self.qtable.get(state).copied().unwrap_or_default()
    }

    pub fn value(&self, state: &StateKey, action: usize) -> f32 {
        self.values(state)[action]
    }

    /// `max(Q[state])`, 0.0 for a state with no entry.
    pub fn max_value(&self, state: &StateKey) -> f32 {
        self.qtable.get(state).map_or(0.0, Moves::max_value)
    }

    /// Mutable values of `state`, created as zeros on first access.
    pub fn entry_mut(&mut self, state: StateKey) -> &mut Moves {
        self.qtable.entry(state).or_default()
    }

    /// One-step temporal-difference update, returning the new value:
    /// `Q[s][a] += lr * (reward + discount * max(Q[s']) - Q[s][a])`.
    pub fn update_q_table(
        &mut self,
        current_state_key: StateKey,
        current_move: usize,
        next_state_key: &StateKey,
        reward: f32,
        learning_rate: f32,
        discount_rate: f32,
    ) -> f32 {
        let expected = reward + discount_rate * self.max_value(next_state_key);
        let value = &mut self.entry_mut(current_state_key)[current_move];
        *value += learning_rate * (expected - *value);
        *value
    }
}

/// Writes the table as `qtable-<date>.json` and `qtable-<date>.pickle` into
/// `path` and returns both file paths.
pub fn q_table_to_disk(path: &Path, q: &QTable) -> Result<(PathBuf, PathBuf), anyhow::Error> {
    let today = Local::now().date_naive();
    let q_json = path.join(format!("qtable-{today}.json"));
    let q_pickle = path.join(format!("qtable-{today}.pickle"));

    let mut file_json = BufWriter::new(File::create(&q_json)?);
    serde_json::to_writer(&mut file_json, q)?;
    file_json.flush()?;

    let mut file = BufWriter::new(File::create(&q_pickle)?);
    serde_pickle::to_writer(&mut file, q, serde_pickle::SerOptions::new())?;
    file.flush()?;

    log::debug!(
        "saved {} states to {} and {}",
        q.len(),
        q_json.display(),
        q_pickle.display()
    );
    Ok((q_json, q_pickle))
}

pub fn q_table_from_disk_pickle(file: &Path) -> Result<QTable, anyhow::Error> {
    let reader = BufReader::new(File::open(file)?);
    let decoded: QTable = serde_pickle::from_reader(reader, serde_pickle::DeOptions::new())?;
    Ok(decoded)
}

pub fn q_table_from_disk_json(file: &Path) -> Result<QTable, anyhow::Error> {
    let reader = BufReader::new(File::open(file)?);
    let decoded: QTable = serde_json::from_reader(reader)?;
    Ok(decoded)
}

/// Loads a table saved by [`q_table_to_disk`], picking the format from the
/// file extension.
pub fn q_table_from_disk(file: &Path) -> Result<QTable, anyhow::Error> {
    let q = match file.extension().and_then(|ext| ext.to_str()) {
        Some("json") => q_table_from_disk_json(file)?,
        Some("pickle") => q_table_from_disk_pickle(file)?,
        _ => anyhow::bail!(
            "unknown Q-table format for {}, expected .json or .pickle",
            file.display()
        ),
    };
    log::debug!("loaded {} states from {}", q.len(), file.display());
    Ok(q)
}
