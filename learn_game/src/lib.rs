use crate::board::{Board, IsGameOver, StateKey};
use crate::config::Config;
use crate::error::GameError;
use crate::players::{ExpertPlayer, Marks, Player, QLearningPlayer};
use crate::q_table::QTable;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

pub mod board;
pub mod config;
pub mod error;
pub mod players;
pub mod q_table;
pub mod worker;

/// The learning player is always X and always moves first, both in training
/// and in live play.
pub const LEARNER_MARK: Marks = Marks::Cross;

/// One learning-side move. `next_state` is the board the learner faces on
/// its next turn, or the terminal board.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    pub state: StateKey,
    pub action: usize,
    pub next_state: StateKey,
    pub reward: f32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    LearnerWin,
    Draw,
    OpponentWin,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Episode {
    pub transitions: Vec<Transition>,
    pub outcome: Outcome,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TrainingSummary {
    pub episodes: usize,
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
}

impl TrainingSummary {
    fn record(&mut self, outcome: Outcome) {
        self.episodes += 1;
        match outcome {
            Outcome::LearnerWin => self.wins += 1,
            Outcome::Draw => self.draws += 1,
            Outcome::OpponentWin => self.losses += 1,
        }
    }
}

impl fmt::Display for TrainingSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} games: {} won, {} drawn, {} lost",
            self.episodes, self.wins, self.draws, self.losses
        )
    }
}

/// The engine: board, learning player and scripted opponent.
#[derive(Debug)]
pub struct Game {
    pub board: Board,
    pub learner: QLearningPlayer,
    pub opponent: ExpertPlayer,
    config: Config,
    episode: usize,
}

impl Game {
    pub fn new(config: Config) -> Self {
        let learner = QLearningPlayer::new(
            "RLmax",
            LEARNER_MARK,
            &config.learning,
            &config.rewards,
            config.seed,
        );
        let opponent = ExpertPlayer::new(
            "expert",
            LEARNER_MARK.other(),
            config.seed.map(|seed| seed.wrapping_add(1)),
        );
        Game {
            board: Board::new(),
            learner,
            opponent,
            config,
            episode: 0,
        }
    }

    pub fn with_q_table(mut self, q: QTable) -> Self {
        self.learner = self.learner.with_q_table(q);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Episodes trained so far.
    pub fn episode(&self) -> usize {
        self.episode
    }

    pub fn new_episode(&mut self) {
        self.board.reset();
    }

    pub fn legal_actions(&self) -> Vec<usize> {
        self.board.legal_actions()
    }

    /// AI move for the current board.
    pub fn choose_action(&mut self) -> Result<usize, GameError> {
        self.learner.choose_action(&self.board)
    }

    pub fn apply_move(&mut self, action: usize, mark: Marks) -> Result<(), GameError> {
        self.board.apply_move(action, mark)
    }

    pub fn check_win(&self, mark: Marks) -> bool {
        self.board.check_win(mark)
    }

    pub fn is_draw(&self) -> bool {
        self.board.is_draw()
    }

    /// Switches the learner to pure exploitation and clears the board.
    pub fn start_live_play(&mut self) {
        self.learner.disable_exploration();
        self.new_episode();
    }

    fn play_episode(&mut self, learn: bool) -> Result<Episode, GameError> {
        self.new_episode();
        let learner_mark = self.learner.get_mark();
        let opponent_mark = self.opponent.get_mark();
        let mut transitions = Vec::with_capacity(5);
        let outcome = loop {
            let state = self.board.state_key();
            let mv = self.learner.choose_action(&self.board)?;
            self.learner.make_move(&mut self.board, mv)?;
            let (reward, outcome) = match self.board.is_game_over(learner_mark) {
                IsGameOver::Win => (
                    self.learner.reward(&self.board, learner_mark),
                    Some(Outcome::LearnerWin),
                ),
                IsGameOver::Drawn => (
                    self.learner.reward(&self.board, learner_mark),
                    Some(Outcome::Draw),
                ),
                IsGameOver::InPlay => {
                    let reply = self.opponent.choose_move(&self.board)?;
                    self.opponent.make_move(&mut self.board, reply)?;
                    match self.board.is_game_over(opponent_mark) {
                        IsGameOver::Win => {
                            (self.learner.opponent_win_penalty(), Some(Outcome::OpponentWin))
                        }
                        IsGameOver::Drawn => (
                            self.learner.reward(&self.board, learner_mark),
                            Some(Outcome::Draw),
                        ),
                        IsGameOver::InPlay => (self.learner.reward(&self.board, learner_mark), None),
                    }
                }
            };
            let transition = Transition {
                state,
                action: mv,
                next_state: self.board.state_key(),
                reward,
            };
            if learn {
                self.learner.update(
                    transition.state,
                    transition.action,
                    &transition.next_state,
                    transition.reward,
                );
            }
            transitions.push(transition);
            if let Some(outcome) = outcome {
                break outcome;
            }
        };
        Ok(Episode {
            transitions,
            outcome,
        })
    }

    /// Plays one training game and updates the table once per learner move.
    pub fn learn_episode(&mut self) -> Result<Episode, GameError> {
        let episode = self.play_episode(true)?;
        self.episode += 1;
        Ok(episode)
    }

    pub fn learn_q_table(&mut self) -> Result<TrainingSummary, GameError> {
        self.learn_q_table_until(&AtomicBool::new(false))
    }

    /// Runs the configured number of episodes. `cancel` is only checked
    /// between episodes.
    pub fn learn_q_table_until(&mut self, cancel: &AtomicBool) -> Result<TrainingSummary, GameError> {
        let episodes = self.config.episodes;
        let decay_every = self.config.learning.learning_rate_decay_every;
        let log_every = self.config.log_every;
        let mut summary = TrainingSummary::default();
        log::info!("training for {} episodes", episodes);
        for _ in 0..episodes {
            if cancel.load(Ordering::Relaxed) {
                log::info!("training cancelled after {}", summary);
                break;
            }
            let episode = self.learn_episode()?;
            summary.record(episode.outcome);
            // a zero period disables the schedule instead of dividing by zero
            if self.episode.checked_rem(decay_every) == Some(0) {
                self.learner.decay_learning_rate();
                log::debug!(
                    "episode {}: learning rate is {:.4}",
                    self.episode,
                    self.learner.learning_rate()
                );
            }
            if summary.episodes.checked_rem(log_every) == Some(0) {
                log::info!(
                    "{}; exploration rate {:.4}, learning rate {:.4}, {} states",
                    summary,
                    self.learner.exploration_rate(),
                    self.learner.learning_rate(),
                    self.learner.q_table().len()
                );
            }
        }
        log::info!("training finished: {}", summary);
        Ok(summary)
    }

    /// Greedy games against the opponent. The table is left untouched and
    /// the exploration schedule is restored afterwards.
    pub fn evaluate(&mut self, games: usize) -> Result<TrainingSummary, GameError> {
        let exploration = self.learner.exploration();
        self.learner.disable_exploration();
        let mut summary = TrainingSummary::default();
        let result = (0..games).try_for_each(|_| {
            let episode = self.play_episode(false)?;
            summary.record(episode.outcome);
            Ok::<(), GameError>(())
        });
        self.learner.set_exploration(exploration);
        self.new_episode();
        result.map(|()| summary)
    }
}
