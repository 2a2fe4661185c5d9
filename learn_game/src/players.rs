use crate::board::{Board, StateKey, CENTER, CORNERS};
use crate::config::{LearningConfig, RewardConfig};
use crate::error::GameError;
use crate::q_table::QTable;
use rand::prelude::SliceRandom;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum Marks {
    Cross,
    Nought,
}

impl Marks {
    pub fn other(self) -> Self {
        match self {
            Self::Cross => Marks::Nought,
            Self::Nought => Marks::Cross,
        }
    }
    pub fn as_char(self) -> char {
        match self {
            Self::Cross => 'X',
            Self::Nought => '0',
        }
    }
}

pub trait Player {
    fn get_mark(&self) -> Marks;
    fn choose_move(&mut self, board: &Board) -> Result<usize, GameError>;
    fn make_move(&self, board: &mut Board, mv: usize) -> Result<(), GameError> {
        board.apply_move(mv, self.get_mark())
    }
}

fn build_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Rule-based move: win now, else block the opponent, else the center, else
/// a random corner, else any random cell. Win and block scans go in index
/// order, so the first completing cell is taken.
pub fn expert_move<R: Rng + ?Sized>(board: &Board, mark: Marks, rng: &mut R) -> Result<usize, GameError> {
    let available_moves = board.legal_actions();
    if available_moves.is_empty() {
        return Err(GameError::EmptyActionSet(board.state_key()));
    }
    if let Some(&mv) = available_moves.iter().find(|&&mv| board.wins_with(mv, mark)) {
        return Ok(mv);
    }
    if let Some(&mv) = available_moves
        .iter()
        .find(|&&mv| board.wins_with(mv, mark.other()))
    {
        return Ok(mv);
    }
    if available_moves.contains(&CENTER) {
        return Ok(CENTER);
    }
    let corners: Vec<usize> = available_moves
        .iter()
        .copied()
        .filter(|mv| CORNERS.contains(mv))
        .collect();
    corners
        .choose(rng)
        .or_else(|| available_moves.choose(rng))
        .copied()
        .ok_or_else(|| GameError::EmptyActionSet(board.state_key()))
}

/// Scripted opponent playing [`expert_move`].
#[derive(Debug)]
pub struct ExpertPlayer {
    pub name: String,
    pub mark: Marks,
    rng: StdRng,
}

impl ExpertPlayer {
    pub fn new(name: &str, mark: Marks, seed: Option<u64>) -> Self {
        ExpertPlayer {
            name: name.to_owned(),
            mark,
            rng: build_rng(seed),
        }
    }
}

impl Player for ExpertPlayer {
    fn get_mark(&self) -> Marks {
        self.mark
    }
    fn choose_move(&mut self, board: &Board) -> Result<usize, GameError> {
        expert_move(board, self.mark, &mut self.rng)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Exploration {
    pub rate: f32,
    pub min_rate: f32,
    pub decay: f32,
}

/// Epsilon-greedy Q-learning player. Exploration plays the expert move for
/// its own mark rather than a uniformly random cell.
#[derive(Debug)]
pub struct QLearningPlayer {
    pub name: String,
    pub mark: Marks,
    q: QTable,
    exploration: Exploration,
    learning_rate: f32,
    min_learning_rate: f32,
    learning_rate_decay: f32,
    discount_rate: f32,
    rewards: RewardConfig,
    rng: StdRng,
}

impl QLearningPlayer {
    pub fn new(
        name: &str,
        mark: Marks,
        learning: &LearningConfig,
        rewards: &RewardConfig,
        seed: Option<u64>,
    ) -> Self {
        QLearningPlayer {
            name: name.to_owned(),
            mark,
            q: QTable::new(),
            exploration: Exploration {
                rate: learning.exploration_rate,
                min_rate: learning.min_exploration_rate,
                decay: learning.exploration_decay,
            },
            learning_rate: learning.learning_rate,
            min_learning_rate: learning.min_learning_rate,
            learning_rate_decay: learning.learning_rate_decay,
            discount_rate: learning.discount_rate,
            rewards: rewards.clone(),
            rng: build_rng(seed),
        }
    }

    pub fn with_q_table(mut self, q: QTable) -> Self {
        self.q = q;
        self
    }

    pub fn q_table(&self) -> &QTable {
        &self.q
    }

    pub fn into_q_table(self) -> QTable {
        self.q
    }

    pub fn exploration(&self) -> Exploration {
        self.exploration
    }

    pub fn set_exploration(&mut self, exploration: Exploration) {
        self.exploration = exploration;
    }

    pub fn exploration_rate(&self) -> f32 {
        self.exploration.rate
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn discount_rate(&self) -> f32 {
        self.discount_rate
    }

    /// Live play: no exploration at all, only greedy moves with random
    /// tie-breaking.
    pub fn disable_exploration(&mut self) {
        self.exploration.rate = 0.0;
        self.exploration.min_rate = 0.0;
    }

    pub fn choose_action(&mut self, board: &Board) -> Result<usize, GameError> {
        let available_moves = board.legal_actions();
        if available_moves.is_empty() {
            return Err(GameError::EmptyActionSet(board.state_key()));
        }
        let explore = self.rng.gen::<f32>() < self.exploration.rate;
        let mv = if explore {
            expert_move(board, self.mark, &mut self.rng)?
        } else {
            self.q
                .values(&board.state_key())
                .select_max_move(&available_moves, &mut self.rng)
                .ok_or_else(|| GameError::EmptyActionSet(board.state_key()))?
        };
        log::trace!(
            "{} chose {} on {} ({})",
            self.name,
            mv,
            board.state_key(),
            if explore { "explore" } else { "greedy" }
        );
        self.decay_exploration();
        Ok(mv)
    }

    // A rate already at or below its floor is left alone, decay never raises it.
    fn decay_exploration(&mut self) {
        if self.exploration.rate > self.exploration.min_rate {
            self.exploration.rate =
                (self.exploration.rate * self.exploration.decay).max(self.exploration.min_rate);
        }
    }

    pub fn decay_learning_rate(&mut self) {
        if self.learning_rate > self.min_learning_rate {
            self.learning_rate = (self.learning_rate * self.learning_rate_decay).max(self.min_learning_rate);
        }
    }

    /// Reward of `board` for `mark`: win, loss and draw outcomes, otherwise
    /// the sum of the bonuses of every cell still available.
    pub fn reward(&self, board: &Board, mark: Marks) -> f32 {
        if board.check_win(mark) {
            self.rewards.win
        } else if board.check_win(mark.other()) {
            self.rewards.loss
        } else if board.is_full() {
            self.rewards.draw
        } else {
            board
                .legal_actions()
                .into_iter()
                .map(|mv| self.rewards.cell_bonus(mv))
                .sum()
        }
    }

    pub fn opponent_win_penalty(&self) -> f32 {
        self.rewards.opponent_win_penalty.min(self.rewards.loss)
    }

    pub fn update(&mut self, state: StateKey, action: usize, next_state: &StateKey, reward: f32) -> f32 {
        self.q.update_q_table(
            state,
            action,
            next_state,
            reward,
            self.learning_rate,
            self.discount_rate,
        )
    }
}

impl Player for QLearningPlayer {
    fn get_mark(&self) -> Marks {
        self.mark
    }
    fn choose_move(&mut self, board: &Board) -> Result<usize, GameError> {
        self.choose_action(board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn board(key: &str) -> Board {
        Board::from(key.parse::<StateKey>().unwrap())
    }

    fn learner(exploration_rate: f32) -> QLearningPlayer {
        let defaults = LearningConfig::default();
        let learning = LearningConfig {
            exploration_rate,
            min_exploration_rate: defaults.min_exploration_rate.min(exploration_rate),
            ..defaults
        };
        QLearningPlayer::new("RLmax", Marks::Cross, &learning, &RewardConfig::default(), Some(3))
    }

    #[test]
    fn is_marks_working() {
        let mark_1 = Marks::Cross;
        let mark_2 = mark_1.other();
        assert_eq!(mark_2, Marks::Nought);
        assert_eq!(mark_2.other(), Marks::Cross);
        assert_eq!(mark_1.as_char(), 'X');
        assert_eq!(mark_2.as_char(), '0');
    }

    #[test]
    fn expert_takes_immediate_win() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(expert_move(&board("XX-------"), Marks::Cross, &mut rng), Ok(2));
    }

    #[test]
    fn expert_blocks_before_taking_center() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(expert_move(&board("00-X-----"), Marks::Cross, &mut rng), Ok(2));
    }

    #[test]
    fn expert_prefers_win_over_block() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(expert_move(&board("00-XX----"), Marks::Cross, &mut rng), Ok(5));
        assert_eq!(expert_move(&board("00-XX----"), Marks::Nought, &mut rng), Ok(2));
    }

    #[test]
    fn expert_takes_center_then_random_corner() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(expert_move(&board("X--------"), Marks::Nought, &mut rng), Ok(4));
        let corners: HashSet<usize> = (0..64)
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                expert_move(&board("----X----"), Marks::Nought, &mut rng).unwrap()
            })
            .collect();
        assert_eq!(corners, HashSet::from(CORNERS));
    }

    #[test]
    fn expert_falls_back_to_remaining_cells() {
        let fallback = board("X0X-0-0X0");
        let chosen: HashSet<usize> = (0..32)
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                expert_move(&fallback, Marks::Cross, &mut rng).unwrap()
            })
            .collect();
        assert_eq!(chosen, HashSet::from([3, 5]));
    }

    #[test]
    fn expert_on_full_board_is_an_error() {
        let mut rng = StdRng::seed_from_u64(0);
        let full = board("X0XX000XX");
        assert_eq!(
            expert_move(&full, Marks::Cross, &mut rng),
            Err(GameError::EmptyActionSet(full.state_key()))
        );
    }

    #[test]
    fn expert_player_is_seeded() {
        let start = board("----X----");
        let mut first = ExpertPlayer::new("expert", Marks::Nought, Some(11));
        let mut second = ExpertPlayer::new("expert", Marks::Nought, Some(11));
        for _ in 0..10 {
            assert_eq!(first.choose_move(&start), second.choose_move(&start));
        }
    }

    #[test]
    fn greedy_choice_is_a_legal_maximum() {
        let mut player = learner(0.0);
        let cases = [
            ("---------", [0.1, 0.0, 0.2, 0.0, 0.7, 0.0, 0.2, 0.0, 0.1]),
            ("X---0----", [5.0, 0.3, 0.1, 0.0, 9.0, -0.2, 0.3, 0.0, 0.1]),
            ("X0X-0-0X0", [1.0, 1.0, 1.0, -0.5, 1.0, -0.1, 1.0, 1.0, 1.0]),
        ];
        for (key, values) in cases {
            let state: StateKey = key.parse().unwrap();
            *player.q.entry_mut(state) = values.into();
            let current = Board::from(state);
            let legal = current.legal_actions();
            let best = legal
                .iter()
                .map(|&mv| values[mv])
                .fold(f32::NEG_INFINITY, f32::max);
            for _ in 0..20 {
                let mv = player.choose_action(&current).unwrap();
                assert!(legal.contains(&mv), "{key}: {mv}");
                assert_eq!(values[mv], best, "{key}: {mv}");
            }
        }
        assert_eq!(player.exploration_rate(), 0.0);
    }

    #[test]
    fn exploration_follows_the_expert() {
        let mut player = learner(1.0);
        let current = board("XX-0-0---");
        player.q.entry_mut(current.state_key())[8] = 10.0;
        assert_eq!(player.choose_action(&current), Ok(2));
    }

    #[test]
    fn exploration_rate_decays_to_its_floor() {
        let mut player = learner(1.0);
        player.set_exploration(Exploration {
            rate: 0.5,
            min_rate: 0.2,
            decay: 0.5,
        });
        let current = Board::new();
        player.choose_action(&current).unwrap();
        assert_eq!(player.exploration_rate(), 0.25);
        player.choose_action(&current).unwrap();
        assert_eq!(player.exploration_rate(), 0.2);
        player.choose_action(&current).unwrap();
        assert_eq!(player.exploration_rate(), 0.2);
    }

    #[test]
    fn rate_below_its_floor_never_climbs() {
        let learning = LearningConfig {
            exploration_rate: 0.0,
            learning_rate: 0.01,
            ..LearningConfig::default()
        };
        let mut player =
            QLearningPlayer::new("RLmax", Marks::Cross, &learning, &RewardConfig::default(), Some(3));
        let current = board("X---0----");
        *player.q.entry_mut(current.state_key()) = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.9].into();
        for _ in 0..2_000 {
            assert_eq!(player.choose_action(&current), Ok(8));
        }
        assert_eq!(player.exploration_rate(), 0.0);
        player.decay_learning_rate();
        assert_eq!(player.learning_rate(), 0.01);
    }

    #[test]
    fn disabled_exploration_stays_disabled() {
        let mut player = learner(1.0);
        player.disable_exploration();
        let current = board("X---0----");
        *player.q.entry_mut(current.state_key()) = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.9].into();
        for _ in 0..20 {
            assert_eq!(player.choose_action(&current), Ok(8));
        }
        assert_eq!(player.exploration_rate(), 0.0);
    }

    #[test]
    fn choose_action_on_full_board_is_an_error() {
        let mut player = learner(0.5);
        let full = board("X0XX000XX");
        assert_eq!(
            player.choose_action(&full),
            Err(GameError::EmptyActionSet(full.state_key()))
        );
    }

    #[test]
    fn reward_ordering() {
        let player = learner(0.0);
        let win = player.reward(&board("XXX00----"), Marks::Cross);
        let draw = player.reward(&board("X0XX000XX"), Marks::Cross);
        let ongoing = player.reward(&board("X---0----"), Marks::Cross);
        let loss = player.reward(&board("000XX-X--"), Marks::Cross);
        assert!(win > draw);
        assert!(draw > ongoing);
        assert!(ongoing >= 0.0);
        assert!(0.0 > loss);
        assert!(player.opponent_win_penalty() <= loss);
    }

    #[test]
    fn shaping_sums_available_cells() {
        let player = learner(0.0);
        let rewards = RewardConfig::default();
        let expected = 3.0 * rewards.corner_bonus + 4.0 * rewards.edge_bonus;
        assert!((player.reward(&board("X---0----"), Marks::Cross) - expected).abs() < 1e-6);
        assert!((player.reward(&Board::new(), Marks::Nought) - rewards.max_shaping()).abs() < 1e-6);
    }

    #[test]
    fn learning_rate_decays_to_its_floor() {
        let mut player = learner(0.0);
        for _ in 0..1_000 {
            player.decay_learning_rate();
        }
        assert_eq!(player.learning_rate(), LearningConfig::default().min_learning_rate);
    }
}
