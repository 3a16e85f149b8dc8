//! State of a single poll.

use std::collections::HashMap;

use crate::poll::PollError;
use crate::transport::{Control, ControlAction, Panel, Player, UserId};

/// Number of cells of a result bar.
const BAR_CELLS: usize = 10;

/// Lifecycle of a poll: `Draft -> Open -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Options are shown, voting has not started
    Draft,
    /// Votes are accepted
    Open,
    /// Results are posted, nothing changes anymore
    Closed,
}

/// Tally of one option.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub option: String,
    pub votes: usize,
    pub percentage: f64,
}

impl Standing {
    /// Ten-cell bar, one filled cell per full 10%.
    pub fn bar(&self) -> String {
        let filled = ((self.percentage / 10.0) as usize).min(BAR_CELLS);
        format!("{}{}", "█".repeat(filled), "░".repeat(BAR_CELLS - filled))
    }
}

/// A poll and the votes it received.
///
/// # Examples
///
/// ```
/// use wordchain::poll::{Poll, PollState};
/// use wordchain::transport::Player;
///
/// let alice = Player::new("@alice:example.com", "Alice");
/// let mut poll = Poll::new(
///     "Lunch".to_string(),
///     vec!["Pizza".to_string(), "Sushi".to_string()],
///     alice.clone(),
/// );
///
/// poll.open(&alice).unwrap();
/// poll.vote(&alice, 1).unwrap();
/// poll.close(&alice).unwrap();
/// assert_eq!(poll.state(), PollState::Closed);
/// assert_eq!(poll.ranking()[0].option, "Sushi");
/// ```
#[derive(Debug)]
pub struct Poll {
    title: String,
    options: Vec<String>,
    creator: Player,
    state: PollState,
    /// Choice of every voter
    votes: HashMap<UserId, usize>,
}

impl Poll {
    /// Creates a draft poll.
    ///
    /// # Arguments
    ///
    /// * `title` - Question shown on top of the panel
    /// * `options` - Choices, already trimmed
    /// * `creator` - The only user who can open and close the poll
    pub fn new(title: String, options: Vec<String>, creator: Player) -> Self {
        Poll {
            title,
            options,
            creator,
            state: PollState::Draft,
            votes: HashMap::new(),
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn creator(&self) -> &Player {
        &self.creator
    }

    /// Starts the voting. Only the creator can do it.
    ///
    /// # Errors
    ///
    /// - [`PollError::NotCreator`] if `user` did not create the poll
    /// - [`PollError::AlreadyOpen`] if the poll is not a draft anymore
    pub fn open(&mut self, user: &Player) -> Result<(), PollError> {
        if *user != self.creator {
            return Err(PollError::NotCreator);
        }
        if self.state != PollState::Draft {
            return Err(PollError::AlreadyOpen);
        }
        self.state = PollState::Open;
        Ok(())
    }

    /// Records the choice of `user`, replacing any previous one.
    ///
    /// # Arguments
    ///
    /// * `user` - The voter
    /// * `option` - Zero-based index of the chosen option
    ///
    /// # Errors
    ///
    /// - [`PollError::NotOpen`] outside of the voting
    /// - [`PollError::InvalidOption`] with the one-based number of an option
    ///   that does not exist
    pub fn vote(&mut self, user: &Player, option: usize) -> Result<(), PollError> {
        if self.state != PollState::Open {
            return Err(PollError::NotOpen);
        }
        if option >= self.options.len() {
            return Err(PollError::InvalidOption(option + 1));
        }
        self.votes.insert(user.id.clone(), option);
        Ok(())
    }

    /// Stops the voting. Only the creator can do it.
    ///
    /// # Errors
    ///
    /// - [`PollError::NotCreator`] if `user` did not create the poll
    /// - [`PollError::NotOpen`] if the voting has not started or is over
    pub fn close(&mut self, user: &Player) -> Result<(), PollError> {
        if *user != self.creator {
            return Err(PollError::NotCreator);
        }
        if self.state != PollState::Open {
            return Err(PollError::NotOpen);
        }
        self.state = PollState::Closed;
        Ok(())
    }

    /// Number of voters.
    pub fn total(&self) -> usize {
        self.votes.len()
    }

    /// Tallies in option order.
    pub fn standings(&self) -> Vec<Standing> {
        let total = self.total();
        let mut counts = vec![0; self.options.len()];
        for option in self.votes.values() {
            counts[*option] += 1;
        }

        self.options
            .iter()
            .zip(counts)
            .map(|(option, votes)| Standing {
                option: option.clone(),
                votes,
                percentage: if total > 0 {
                    votes as f64 * 100.0 / total as f64
                } else {
                    0.0
                },
            })
            .collect()
    }

    /// Tallies from most to least voted; ties keep the option order.
    pub fn ranking(&self) -> Vec<Standing> {
        let mut standings = self.standings();
        standings.sort_by(|a, b| b.votes.cmp(&a.votes));
        standings
    }

    /// Panel showing the poll in its current state, with the controls that
    /// state accepts.
    pub fn panel(&self) -> Panel {
        let lines = match self.state {
            PollState::Draft => self
                .options
                .iter()
                .enumerate()
                .map(|(index, option)| format!("{}. {}", index + 1, option))
                .collect(),
            PollState::Open | PollState::Closed => self
                .standings()
                .iter()
                .enumerate()
                .map(|(index, standing)| {
                    format!(
                        "{}. {}: {} {} vote(s) ({:.1}%)",
                        index + 1,
                        standing.option,
                        standing.bar(),
                        standing.votes,
                        standing.percentage
                    )
                })
                .collect(),
        };

        let controls = match self.state {
            PollState::Draft => vec![Control::new(ControlAction::PollOpen, "Start vote")],
            PollState::Open => {
                let mut controls: Vec<Control> = self
                    .options
                    .iter()
                    .enumerate()
                    .map(|(index, option)| Control::new(ControlAction::PollVote(index), option))
                    .collect();
                controls.push(Control::new(ControlAction::PollClose, "End vote"));
                controls
            }
            PollState::Closed => Vec::new(),
        };

        Panel {
            title: format!("📊 {}", self.title),
            lines,
            controls,
        }
    }

    /// Final results, posted once the poll is closed.
    pub fn results(&self) -> String {
        let ranking = self.ranking();
        let mut lines = vec![
            format!("📊 **{}**", self.title),
            format!("Total votes: **{}**", self.total()),
        ];

        if let Some(winner) = ranking.first() {
            lines.push(format!(
                "🏆 Most voted: **{}** {} vote(s) ({:.1}%)",
                winner.option, winner.votes, winner.percentage
            ));
        }

        lines.push(String::new());
        for (index, standing) in ranking.iter().enumerate() {
            let rank = match index {
                0 => "🥇".to_owned(),
                1 => "🥈".to_owned(),
                2 => "🥉".to_owned(),
                _ => format!("{}.", index + 1),
            };
            lines.push(format!(
                "{} {}: {} {} vote(s) ({:.1}%)",
                rank,
                standing.option,
                standing.bar(),
                standing.votes,
                standing.percentage
            ));
        }

        lines.push(String::new());
        lines.push(format!("Poll created by {}", self.creator));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Player {
        Player::new("@alice:example.com", "Alice")
    }

    fn bob() -> Player {
        Player::new("@bob:example.com", "Bob")
    }

    fn carol() -> Player {
        Player::new("@carol:example.com", "Carol")
    }

    fn poll() -> Poll {
        Poll::new(
            "Lunch".to_string(),
            vec!["Pizza".to_string(), "Sushi".to_string(), "Salad".to_string()],
            alice(),
        )
    }

    #[test]
    fn test_only_creator_opens_and_closes() {
        let mut poll = poll();
        assert!(matches!(poll.open(&bob()), Err(PollError::NotCreator)));
        poll.open(&alice()).unwrap();
        assert!(matches!(poll.open(&alice()), Err(PollError::AlreadyOpen)));
        assert!(matches!(poll.close(&bob()), Err(PollError::NotCreator)));
        poll.close(&alice()).unwrap();
        assert_eq!(poll.state(), PollState::Closed);
    }

    #[test]
    fn test_vote_requires_open_poll() {
        let mut poll = poll();
        assert!(matches!(poll.vote(&bob(), 0), Err(PollError::NotOpen)));

        poll.open(&alice()).unwrap();
        poll.vote(&bob(), 0).unwrap();
        poll.close(&alice()).unwrap();

        assert!(matches!(poll.vote(&carol(), 0), Err(PollError::NotOpen)));
        assert_eq!(poll.total(), 1);
    }

    #[test]
    fn test_revote_moves_the_vote() {
        let mut poll = poll();
        poll.open(&alice()).unwrap();

        poll.vote(&bob(), 0).unwrap();
        poll.vote(&bob(), 1).unwrap();

        let standings = poll.standings();
        assert_eq!(standings[0].votes, 0);
        assert_eq!(standings[1].votes, 1);
        assert_eq!(poll.total(), 1);
    }

    #[test]
    fn test_unknown_option() {
        let mut poll = poll();
        poll.open(&alice()).unwrap();
        assert!(matches!(poll.vote(&bob(), 3), Err(PollError::InvalidOption(4))));
    }

    #[test]
    fn test_ranking_and_bars() {
        let mut poll = poll();
        poll.open(&alice()).unwrap();
        poll.vote(&alice(), 1).unwrap();
        poll.vote(&bob(), 1).unwrap();
        poll.vote(&carol(), 2).unwrap();

        let ranking = poll.ranking();
        assert_eq!(ranking[0].option, "Sushi");
        assert_eq!(ranking[1].option, "Salad");
        assert_eq!(ranking[2].option, "Pizza");
        assert_eq!(ranking[0].bar(), "██████░░░░");
        assert_eq!(ranking[2].bar(), "░░░░░░░░░░");

        let results = poll.results();
        assert!(results.contains("Total votes: **3**"));
        assert!(results.contains("🏆 Most voted: **Sushi** 2 vote(s) (66.7%)"));
        assert!(results.contains("🥉 Pizza"));
    }

    #[test]
    fn test_panel_controls_follow_state() {
        let mut poll = poll();
        assert_eq!(
            poll.panel().controls,
            vec![Control::new(ControlAction::PollOpen, "Start vote")]
        );

        poll.open(&alice()).unwrap();
        let controls = poll.panel().controls;
        assert_eq!(controls.len(), 4);
        assert_eq!(controls[3].action, ControlAction::PollClose);

        poll.close(&alice()).unwrap();
        assert!(poll.panel().controls.is_empty());
    }
}
