use crate::calculation::{calculate_expectation, Expectation};
use crate::shoe::Shoe;
use crate::{Rule, ACE, TEN};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::ops;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const MIN_HARD_SCORE: u8 = 4;
pub const MIN_SOFT_SCORE: u8 = 12;

/// Rows for starting totals 4..=20 (without a usable ace) and 12..=20 (with
/// one). Two-card 21s are naturals and never land in these tables.
pub const HARD_ROWS: usize = (21 - MIN_HARD_SCORE) as usize;
pub const SOFT_ROWS: usize = (21 - MIN_SOFT_SCORE) as usize;

/// Unordered two-card starting hands over 10 value classes.
pub const STARTING_HANDS: usize = 55;

/// Expectations of playing a pair as a normal hand versus splitting it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SplitExpectation {
    pub no_split: f64,
    pub split: f64,
}

impl ops::AddAssign<&SplitExpectation> for SplitExpectation {
    fn add_assign(&mut self, rhs: &SplitExpectation) {
        self.no_split += rhs.no_split;
        self.split += rhs.split;
    }
}

/// The solved outcome of one starting combination. Workers produce these and
/// never touch the aggregate tables; the coordinating thread folds them in
/// after every worker has joined, so cells shared by several combinations
/// accumulate without any synchronization on the hot path.
#[derive(Clone, Debug)]
pub struct HandSolution {
    pub hand_index: usize,
    pub hand_cards: (u8, u8),
    pub dealer_up_card: u8,
    pub two_card_score: u8,
    pub expectation: Expectation,
    pub split: Option<SplitExpectation>,
    pub best_profit: f64,
}

#[derive(Clone, Debug)]
pub struct StrategyTables {
    pub hard_hands: [[Expectation; 10]; HARD_ROWS],
    pub soft_hands: [[Expectation; 10]; SOFT_ROWS],
    pub pair_hands: [[SplitExpectation; 10]; 10],
    pub best_profit_per_hand: [[f64; 10]; STARTING_HANDS],
    pub average_profit: f64,
}

impl StrategyTables {
    fn new() -> StrategyTables {
        StrategyTables {
            hard_hands: [[Expectation::default(); 10]; HARD_ROWS],
            soft_hands: [[Expectation::default(); 10]; SOFT_ROWS],
            pair_hands: [[SplitExpectation::default(); 10]; 10],
            best_profit_per_hand: [[0.0; 10]; STARTING_HANDS],
            average_profit: 0.0,
        }
    }

    fn accumulate(&mut self, solution: &HandSolution) {
        let dealer = solution.dealer_up_card as usize;

        if solution.two_card_score != 21 {
            if solution.hand_cards.0 == ACE || solution.hand_cards.1 == ACE {
                let row = (solution.two_card_score - MIN_SOFT_SCORE) as usize;
                self.soft_hands[row][dealer] += &solution.expectation;
            } else {
                let row = (solution.two_card_score - MIN_HARD_SCORE) as usize;
                self.hard_hands[row][dealer] += &solution.expectation;
            }
        }

        if let Some(split) = &solution.split {
            self.pair_hands[solution.hand_cards.0 as usize][dealer] += split;
        }

        self.best_profit_per_hand[solution.hand_index][dealer] = solution.best_profit;
    }
}

#[derive(Clone, Copy, Debug)]
struct Job {
    hand_index: usize,
    card1: u8,
    card2: u8,
    dealer_up_card: u8,
}

/// Solves all 550 starting combinations and aggregates them into the four
/// lookup tables plus the overall average profit. `number_of_threads == 0`
/// uses the available parallelism.
pub fn generate_tables(rule: &Rule, number_of_threads: usize) -> StrategyTables {
    assert!(
        rule.number_of_decks >= 1,
        "Invalid number of decks! It must be positive"
    );

    let number_of_threads = {
        if number_of_threads == 0 {
            let parallelism = std::thread::available_parallelism();
            match parallelism {
                Ok(n) => n.get(),
                Err(_) => 1,
            }
        } else {
            number_of_threads
        }
    };

    let mut jobs = Vec::with_capacity(STARTING_HANDS * 10);
    let mut hand_index = 0;
    for card1 in ACE..=TEN {
        for card2 in ACE..=card1 {
            for dealer_up_card in ACE..=TEN {
                jobs.push(Job {
                    hand_index,
                    card1,
                    card2,
                    dealer_up_card,
                });
            }
            hand_index += 1;
        }
    }
    let total_jobs = jobs.len();

    let mut dispatched_jobs: Vec<Vec<Job>> = Vec::with_capacity(number_of_threads);
    for _ in 0..number_of_threads {
        dispatched_jobs.push(Vec::new());
    }
    for (i, job) in jobs.into_iter().enumerate() {
        dispatched_jobs[i % number_of_threads].push(job);
    }

    log::info!(
        "Solving {} starting combinations on {} threads",
        total_jobs,
        number_of_threads
    );

    let base_shoe = Shoe::with_number_of_decks(rule.number_of_decks);
    let completed = Arc::new(AtomicUsize::new(0));

    let mut threads = Vec::with_capacity(number_of_threads - 1);
    for _ in 1..number_of_threads {
        let jobs_for_thread = dispatched_jobs.pop().unwrap();
        let rule = *rule;
        let completed = Arc::clone(&completed);
        let thread = std::thread::spawn(move || {
            let mut solutions = Vec::with_capacity(jobs_for_thread.len());
            for job in &jobs_for_thread {
                solutions.push(solve_starting_hand(&rule, base_shoe, job, &completed));
            }
            solutions
        });
        threads.push(thread);
    }

    let mut solutions: Vec<HandSolution> = Vec::with_capacity(total_jobs);
    for job in dispatched_jobs.first().unwrap() {
        solutions.push(solve_starting_hand(rule, base_shoe, job, &completed));
    }
    for thread in threads {
        let mut worker_solutions = thread.join().expect("worker thread panicked");
        solutions.append(&mut worker_solutions);
    }

    let mut tables = StrategyTables::new();
    for solution in &solutions {
        tables.accumulate(solution);
    }
    tables.average_profit = average_profit(rule, &tables.best_profit_per_hand);
    tables
}

fn solve_starting_hand(
    rule: &Rule,
    base_shoe: Shoe,
    job: &Job,
    completed: &AtomicUsize,
) -> HandSolution {
    // Seeded from the combination itself, so a run's output is bit-identical
    // regardless of thread count or scheduling.
    let mut rng = StdRng::seed_from_u64(job_seed(job));

    let mut shoe = base_shoe;
    let (expectation, two_card_score) = calculate_expectation(
        rule,
        &mut shoe,
        &[job.card1, job.card2],
        job.dealer_up_card,
        &mut rng,
    );
    let (mut best_profit, _) = expectation.get_max_expectation();

    let split = {
        if job.card1 == job.card2 {
            let mut split_shoe = base_shoe;
            // The matching card leaves the shoe unseen; the second half of
            // the split plays it, not this hand.
            split_shoe.remove_card(job.card2);
            let (split_evs, _) = calculate_expectation(
                rule,
                &mut split_shoe,
                &[job.card1],
                job.dealer_up_card,
                &mut rng,
            );
            let split_profit = 2.0 * split_evs.get_max_expectation().0;

            let no_split_profit = best_profit;
            let best_with_split = best_profit.max(split_profit);
            if job.card1 == TEN {
                // Only equal ranks may be split, and the ten-group mixes
                // four ranks: weight the split option by the chance the
                // second card matches the first's rank.
                let n = rule.number_of_decks as f64;
                let ten_split_chance = (4.0 * n - 1.0) / (16.0 * n - 1.0);
                best_profit = no_split_profit * (1.0 - ten_split_chance)
                    + best_with_split * ten_split_chance;
            } else {
                best_profit = best_with_split;
            }

            Some(SplitExpectation {
                no_split: no_split_profit,
                split: split_profit,
            })
        } else {
            None
        }
    };

    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
    log::debug!("{:3}/550 starting combinations solved", done);

    HandSolution {
        hand_index: job.hand_index,
        hand_cards: (job.card1, job.card2),
        dealer_up_card: job.dealer_up_card,
        two_card_score,
        expectation,
        split,
        best_profit,
    }
}

fn job_seed(job: &Job) -> u64 {
    ((job.card1 as u64) << 16) | ((job.card2 as u64) << 8) | (job.dealer_up_card as u64)
}

/// Number of ordered three-card deals from a physical shoe that realize the
/// given abstracted combination: ×2 for the unordered player pair unless the
/// cards match, depleting availability for repeated classes, and 16 copies
/// per deck for the ten-group.
pub fn permutation_count(number_of_decks: u8, card1: u8, card2: u8, dealer_card: u8) -> f64 {
    let n = number_of_decks as f64;
    let mut drawn_cards = [card1, card2, dealer_card];
    drawn_cards.sort_unstable();

    let mut tens = 0;
    let mut repeats = 0;
    for i in 0..drawn_cards.len() {
        if drawn_cards[i] == TEN {
            tens += 1;
        } else if i > 0 && drawn_cards[i] == drawn_cards[i - 1] {
            repeats += 1;
        }
    }
    let neither = drawn_cards.len() - tens - repeats;

    let mut permutations = {
        if card1 == card2 {
            1.0
        } else {
            2.0
        }
    };
    for _ in 0..neither {
        permutations *= 4.0 * n;
    }
    for i in 1..=repeats {
        permutations *= 4.0 * n - i as f64;
    }
    for i in 0..tens {
        permutations *= 16.0 * n - i as f64;
    }
    permutations
}

fn average_profit(rule: &Rule, best_profit_per_hand: &[[f64; 10]; STARTING_HANDS]) -> f64 {
    let mut total = 0.0;
    let mut hand_index = 0;
    for card1 in ACE..=TEN {
        for card2 in ACE..=card1 {
            for dealer_card in ACE..=TEN {
                total += best_profit_per_hand[hand_index][dealer_card as usize]
                    * permutation_count(rule.number_of_decks, card1, card2, dealer_card);
            }
            hand_index += 1;
        }
    }
    let cards_in_shoe = (rule.number_of_decks as f64) * 52.0;
    total / (cards_in_shoe * (cards_in_shoe - 1.0) * (cards_in_shoe - 2.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_classes_are_rarer() {
        assert!(permutation_count(1, 6, 6, 6) < permutation_count(1, 6, 6, 7));
        assert!(permutation_count(1, 6, 6, 7) < permutation_count(1, 6, 7, 8));
    }

    #[test]
    fn distinct_low_classes_are_equally_likely() {
        assert_eq!(permutation_count(1, 0, 1, 2), permutation_count(1, 3, 4, 5));
    }

    #[test]
    fn ten_group_cards_are_more_common() {
        assert!(permutation_count(1, 6, 6, 6) < permutation_count(1, TEN, TEN, TEN));
        assert!(permutation_count(1, 0, 1, 2) < permutation_count(1, 3, 4, TEN));
    }

    #[test]
    fn permutations_cover_every_three_card_deal() {
        for number_of_decks in 1..=8u8 {
            let mut permutations = 0.0;
            for card1 in ACE..=TEN {
                for card2 in ACE..=card1 {
                    for dealer_card in ACE..=TEN {
                        permutations += permutation_count(number_of_decks, card1, card2, dealer_card);
                    }
                }
            }
            let cards = (number_of_decks as f64) * 52.0;
            assert_eq!(permutations, cards * (cards - 1.0) * (cards - 2.0));
        }
    }

    #[test]
    fn solutions_with_a_shared_cell_accumulate() {
        // 2+6 and 3+5 both start at a hard 8 against the same dealer card.
        let first = HandSolution {
            hand_index: 10,
            hand_cards: (5, 1),
            dealer_up_card: 4,
            two_card_score: 8,
            expectation: Expectation {
                stand: -0.1,
                hit: 0.2,
                double: 0.3,
            },
            split: None,
            best_profit: 0.3,
        };
        let second = HandSolution {
            hand_index: 12,
            hand_cards: (4, 2),
            dealer_up_card: 4,
            two_card_score: 8,
            expectation: Expectation {
                stand: -0.2,
                hit: 0.1,
                double: 0.2,
            },
            split: None,
            best_profit: 0.2,
        };

        let mut tables = StrategyTables::new();
        tables.accumulate(&first);
        tables.accumulate(&second);

        let row = (8 - MIN_HARD_SCORE) as usize;
        let cell = tables.hard_hands[row][4];
        assert_eq!(
            cell,
            Expectation {
                stand: -0.1 + -0.2,
                hit: 0.2 + 0.1,
                double: 0.3 + 0.2,
            }
        );
        assert_eq!(tables.best_profit_per_hand[10][4], 0.3);
        assert_eq!(tables.best_profit_per_hand[12][4], 0.2);
    }

    #[test]
    fn ace_hands_land_in_the_soft_table() {
        let solution = HandSolution {
            hand_index: 3,
            hand_cards: (2, ACE),
            dealer_up_card: 7,
            two_card_score: 14,
            expectation: Expectation {
                stand: -0.3,
                hit: 0.05,
                double: 0.01,
            },
            split: None,
            best_profit: 0.05,
        };

        let mut tables = StrategyTables::new();
        tables.accumulate(&solution);

        let row = (14 - MIN_SOFT_SCORE) as usize;
        assert_eq!(tables.soft_hands[row][7], solution.expectation);
        assert_eq!(tables.hard_hands[(14 - MIN_HARD_SCORE) as usize][7], Expectation::default());
    }

    #[test]
    fn pair_solutions_fill_the_split_table() {
        let solution = HandSolution {
            hand_index: 0,
            hand_cards: (7, 7),
            dealer_up_card: 9,
            two_card_score: 16,
            expectation: Expectation {
                stand: -0.4,
                hit: -0.45,
                double: -0.9,
            },
            split: Some(SplitExpectation {
                no_split: -0.4,
                split: -0.2,
            }),
            best_profit: -0.2,
        };

        let mut tables = StrategyTables::new();
        tables.accumulate(&solution);
        assert_eq!(
            tables.pair_hands[7][9],
            SplitExpectation {
                no_split: -0.4,
                split: -0.2,
            }
        );
    }

    #[test]
    fn naturals_skip_the_score_tables() {
        let solution = HandSolution {
            hand_index: 54,
            hand_cards: (TEN, ACE),
            dealer_up_card: 5,
            two_card_score: 21,
            expectation: Expectation {
                stand: 1.5,
                hit: 1.5,
                double: 1.5,
            },
            split: None,
            best_profit: 1.5,
        };

        let mut tables = StrategyTables::new();
        tables.accumulate(&solution);
        for row in &tables.soft_hands {
            for cell in row {
                assert_eq!(*cell, Expectation::default());
            }
        }
        assert_eq!(tables.best_profit_per_hand[54][5], 1.5);
    }

    // Runs the full single-deck computation twice; expensive, so ignored by
    // default. cargo test -- --ignored exercises it.
    #[test]
    #[ignore]
    fn full_single_deck_run_is_deterministic() {
        let rule = Rule::default();
        let first = generate_tables(&rule, 4);
        let second = generate_tables(&rule, 1);
        assert_eq!(first.hard_hands, second.hard_hands);
        assert_eq!(first.soft_hands, second.soft_hands);
        assert_eq!(first.pair_hands, second.pair_hands);
        assert_eq!(first.best_profit_per_hand, second.best_profit_per_hand);
        assert_eq!(first.average_profit, second.average_profit);
    }
}
