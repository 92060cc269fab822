use crate::shoe::{card_min_value, Hand, Shoe};
use crate::{Decision, Rule, ACE, LOSS_PROFIT, TEN, TIE_PROFIT};

use rand::Rng;
use serde::Serialize;
use std::ops;

mod dealer_odds;

/// Branches with odds below this threshold stop expanding hits and report a
/// sentinel instead, which makes every ancestor prefer its stand value.
/// Without the cutoff, long vanishingly-likely draw sequences explode the
/// branching factor.
const FORCED_STAND_ODDS: f64 = 1.0 / 10_000.0;

/// Expected profit per unit wagered for each of the three initial actions,
/// valid at the first decision point: two player cards and the dealer's up
/// card known, nothing else drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Expectation {
    pub stand: f64,
    pub hit: f64,
    pub double: f64,
}

impl Expectation {
    pub fn get_max_expectation(&self) -> (f64, Decision) {
        let (mut mx_ex, mut decision) = (self.stand, Decision::Stand);
        if mx_ex < self.hit {
            (mx_ex, decision) = (self.hit, Decision::Hit);
        }
        if mx_ex < self.double {
            (mx_ex, decision) = (self.double, Decision::Double);
        }
        (mx_ex, decision)
    }
}

impl ops::AddAssign<&Expectation> for Expectation {
    fn add_assign(&mut self, rhs: &Expectation) {
        self.stand += rhs.stand;
        self.hit += rhs.hit;
        self.double += rhs.double;
    }
}

/// Evaluates one starting combination: deals the given player cards and the
/// dealer's up card out of the shoe, then searches the full conditional
/// probability tree. Returns the expectations of the three initial actions
/// together with the starting hand's score.
///
/// `hand_cards` usually holds two cards; the split evaluation passes a
/// single card to value one half of a split pair.
pub fn calculate_expectation<R: Rng>(
    rule: &Rule,
    shoe: &mut Shoe,
    hand_cards: &[u8],
    dealer_up_card: u8,
    rng: &mut R,
) -> (Expectation, u8) {
    let mut player = Hand::new();
    for &card in hand_cards {
        shoe.deal_card(card, &mut player);
    }
    let mut dealer = Hand::new();
    shoe.deal_card(dealer_up_card, &mut dealer);

    // Natural blackjack pays out immediately. The only question left is
    // whether the dealer pushes with a natural of her own, which requires a
    // ten or ace up card and the matching hole card.
    if player.get_score() == 21 {
        let tie_chance = match dealer.get_score() {
            10 => shoe.get_proportion(ACE),
            11 => shoe.get_proportion(TEN),
            _ => 0.0,
        };
        let ev = tie_chance * TIE_PROFIT + (1.0 - tie_chance) * rule.payout_blackjack;
        let evs = Expectation {
            stand: ev,
            hit: ev,
            double: ev,
        };
        return (evs, player.get_score());
    }

    let mut evs = Expectation::default();
    stand_hit_values(player, dealer, shoe, 1.0, &mut evs, rng);
    (evs, player.get_score())
}

/// The stand/hit/double search. Returns `(stand, hit)` values for this node
/// so that the parent can pick the better of "stand after the card it just
/// drew" and "keep hitting", which is what makes hit mean hit-optimally at
/// every depth. The double value only ever takes one more card, so it
/// accumulates the children's stand values.
fn stand_hit_values<R: Rng>(
    // Input parameters
    player: Hand,
    dealer: Hand,

    // Parameters to maintain current state
    shoe: &mut Shoe,
    odds: f64,

    // Output parameters
    evs: &mut Expectation,

    rng: &mut R,
) -> (f64, f64) {
    let stand_avg = dealer_odds::resolve_dealer(shoe, player.get_score(), dealer, odds, rng);

    if odds < FORCED_STAND_ODDS {
        return (stand_avg, -f64::INFINITY);
    }

    let mut hit_avg = 0.0;
    let mut double_down_avg = 0.0;
    let bust_thresh = player.bust_threshold();
    for card in ACE..=TEN {
        if shoe[card] == 0 {
            continue;
        }
        let updated_odds = odds * shoe.get_proportion(card);
        if card_min_value(card) > bust_thresh {
            hit_avg += LOSS_PROFIT * updated_odds;
            double_down_avg += LOSS_PROFIT * updated_odds;
        } else {
            let mut next_player = player;
            shoe.deal_card(card, &mut next_player);
            let (hit_then_stand_avg, hit_twice_avg) =
                stand_hit_values(next_player, dealer, shoe, updated_odds, evs, rng);
            hit_avg += hit_then_stand_avg.max(hit_twice_avg);
            double_down_avg += hit_then_stand_avg;
            shoe.add_card(card);
        }
    }

    if odds == 1.0 {
        // The root call is the first decision point, the only state the
        // returned expectations are defined for. Doubling doubles the stake.
        evs.stand = stand_avg;
        evs.hit = hit_avg;
        evs.double = 2.0 * double_down_avg;
    }

    (stand_avg, hit_avg)
}
