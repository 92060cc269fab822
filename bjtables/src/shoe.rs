use crate::{ACE, TEN};

use rand::Rng;

/// A depleting shoe: the number of cards left in each value class, plus the
/// derived total. Shoes are cheap values. Every concurrent computation gets
/// its own copy, and the recursive searches copy them again whenever a
/// probability branch must not leak its draws into siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shoe {
    counts: [u16; 10],
    total: u16,
}

impl Shoe {
    /// Creates a full shoe of the given number of standard 52-card decks.
    pub fn with_number_of_decks(number_of_decks: u8) -> Shoe {
        let mut counts = [(number_of_decks as u16) * 4; 10];
        counts[TEN as usize] = (number_of_decks as u16) * 16;
        Shoe {
            counts,
            total: (number_of_decks as u16) * 52,
        }
    }

    pub fn get_total(&self) -> u16 {
        self.total
    }

    /// Proportion of the remaining cards that belong to the given value
    /// class, i.e. the probability of drawing that class next.
    pub fn get_proportion(&self, card: u8) -> f64 {
        self.counts[card as usize] as f64 / self.total as f64
    }

    /// Deals a card of the given value class into a hand. This is the only
    /// operation that changes a hand's score.
    pub fn deal_card(&mut self, card: u8, hand: &mut Hand) {
        self.remove_card(card);
        hand.receive_card(card);
    }

    /// Removes a card from the shoe without dealing it to any hand. Used to
    /// exclude a card from play (the matching card a split hands off) and as
    /// the mutation half of the remove/add pairing during tree search.
    ///
    /// Note that this method won't check if the card value is valid.
    pub fn remove_card(&mut self, card: u8) {
        debug_assert!(
            self.counts[card as usize] > 0,
            "removed card {} from an exhausted class",
            card
        );
        self.counts[card as usize] -= 1;
        self.total -= 1;
    }

    /// Returns a previously removed card to the shoe. Every branch that
    /// removes a card must add it back before returning, so that sibling
    /// branches observe the pre-branch shoe.
    pub fn add_card(&mut self, card: u8) {
        self.counts[card as usize] += 1;
        self.total += 1;
    }

    /// Deals a uniformly random remaining card into a hand and returns its
    /// value class. Only the dealer rollout fallback draws this way; the
    /// exhaustive recursions never do.
    pub fn deal_random_card<R: Rng>(&mut self, hand: &mut Hand, rng: &mut R) -> u8 {
        debug_assert!(self.total > 0, "dealt from an empty shoe");
        let pos = rng.gen_range(0..self.total);
        let mut card = ACE;
        let mut sum = 0;
        loop {
            sum += self.counts[card as usize];
            if sum > pos {
                break;
            }
            card += 1;
        }
        self.deal_card(card, hand);
        card
    }
}

impl std::ops::Index<u8> for Shoe {
    type Output = u16;
    fn index(&self, index: u8) -> &Self::Output {
        &self.counts[index as usize]
    }
}

/// A hand reduced to what the rules care about: the running score and how
/// many aces are still counted as 11. The score is always the best total the
/// drawn cards allow, so a hand with `score <= 21` has not busted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hand {
    score: u8,
    soft_aces: u8,
}

impl Hand {
    pub fn new() -> Hand {
        Default::default()
    }

    pub fn get_score(&self) -> u8 {
        self.score
    }

    pub fn is_soft(&self) -> bool {
        self.soft_aces > 0
    }

    /// An ace enters at 11; whenever the hand would bust, soft aces demote
    /// to 1 one at a time until the score fits or none remain.
    fn receive_card(&mut self, card: u8) {
        if card == ACE {
            self.score += 11;
            self.soft_aces += 1;
        } else {
            self.score += card + 1;
        }
        while self.score > 21 && self.soft_aces > 0 {
            self.score -= 10;
            self.soft_aces -= 1;
        }
    }

    /// The lowest next-card value that guarantees a bust, measured against
    /// the hard total: soft aces can still absorb 10 points each.
    pub fn bust_threshold(&self) -> u8 {
        21 - (self.score - 10 * self.soft_aces)
    }
}

/// The minimum face value of a value class. Only the ace differs from its
/// face: it can always count as 1.
pub fn card_min_value(card: u8) -> u8 {
    card + 1
}
