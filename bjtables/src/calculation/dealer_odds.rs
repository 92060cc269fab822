use crate::shoe::{card_min_value, Hand, Shoe};
use crate::{ACE, LOSS_PROFIT, TEN, TIE_PROFIT, WIN_PROFIT};

use rand::Rng;
use std::cmp::Ordering;

/// Below this threshold a branch no longer subdivides. The exhaustive
/// expansion would keep compounding the branching factor on nearly-empty
/// shoes full of low cards, while the branch's contribution is already
/// numerically negligible.
const ROLLOUT_ODDS: f64 = 1.0 / 1_000_000.0;

/// Probability-weighted profit over every way the dealer's hand can
/// complete, with the player frozen at `player_score`. `dealer` holds
/// exactly the up card; this function branches over the hole card and the
/// draw-out that follows.
///
/// Callers must have settled player naturals beforehand: a hole card that
/// completes a dealer natural resolves here as an outright loss.
pub(super) fn resolve_dealer<R: Rng>(
    shoe: &mut Shoe,
    player_score: u8,
    dealer: Hand,
    odds: f64,
    rng: &mut R,
) -> f64 {
    let mut avg = 0.0;
    for card in ACE..=TEN {
        if shoe[card] == 0 {
            continue;
        }
        let updated_odds = odds * shoe.get_proportion(card);
        let mut with_hole_card = dealer;
        shoe.deal_card(card, &mut with_hole_card);
        if with_hole_card.get_score() == 21 {
            // Dealer natural: the only two-card 21.
            avg += LOSS_PROFIT * updated_odds;
        } else {
            avg += draw_out_dealer(shoe, player_score, with_hole_card, updated_odds, rng);
        }
        shoe.add_card(card);
    }
    avg
}

fn draw_out_dealer<R: Rng>(
    shoe: &mut Shoe,
    player_score: u8,
    dealer: Hand,
    odds: f64,
    rng: &mut R,
) -> f64 {
    if dealer.get_score() >= 17 {
        return settle(player_score, dealer.get_score()) * odds;
    }

    if odds < ROLLOUT_ODDS {
        // Collapse the subtree into one random completion, resolved at the
        // branch's current odds rather than subdivided any further.
        let mut rollout_shoe = *shoe;
        let mut dealer = dealer;
        while dealer.get_score() < 17 {
            rollout_shoe.deal_random_card(&mut dealer, rng);
        }
        return settle(player_score, dealer.get_score()) * odds;
    }

    let mut sum = 0.0;
    let bust_thresh = dealer.bust_threshold();
    for card in ACE..=TEN {
        if shoe[card] == 0 {
            continue;
        }
        let updated_odds = odds * shoe.get_proportion(card);
        if card_min_value(card) > bust_thresh {
            sum += WIN_PROFIT * updated_odds;
        } else {
            let mut next_dealer = dealer;
            shoe.deal_card(card, &mut next_dealer);
            sum += draw_out_dealer(shoe, player_score, next_dealer, updated_odds, rng);
            shoe.add_card(card);
        }
    }
    sum
}

/// Profit for the standing player once the dealer stops drawing. A dealer
/// bust is a win no matter the player's score; busted player hands never
/// reach the dealer resolution.
fn settle(player_score: u8, dealer_score: u8) -> f64 {
    if dealer_score > 21 {
        return WIN_PROFIT;
    }
    match player_score.cmp(&dealer_score) {
        Ordering::Greater => WIN_PROFIT,
        Ordering::Less => LOSS_PROFIT,
        Ordering::Equal => TIE_PROFIT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn resolve_single_deck(player_score: u8, dealer_up_card: u8) -> f64 {
        let mut shoe = Shoe::with_number_of_decks(1);
        let mut dealer = Hand::new();
        shoe.deal_card(dealer_up_card, &mut dealer);
        // A fresh rng per call keeps the rollout draws identical across
        // calls, so resolved values are directly comparable.
        let mut rng = StdRng::seed_from_u64(7);
        resolve_dealer(&mut shoe, player_score, dealer, 1.0, &mut rng)
    }

    #[test]
    fn player_scores_below_seventeen_are_equivalent() {
        // The dealer draws to at least 17, so any standing score below 17
        // only ever beats a busted dealer.
        assert_eq!(resolve_single_deck(2, 3), resolve_single_deck(16, 3));
        assert_eq!(resolve_single_deck(4, 3), resolve_single_deck(12, 3));
    }

    #[test]
    fn higher_player_scores_resolve_progressively_better() {
        assert!(resolve_single_deck(18, 3) < resolve_single_deck(19, 3));
        assert!(resolve_single_deck(19, 3) < resolve_single_deck(20, 3));
        assert!(resolve_single_deck(20, 3) < resolve_single_deck(21, 3));
    }

    #[test]
    fn twenty_one_only_loses_to_a_dealer_natural() {
        // Against a 4 up card the dealer cannot make a natural, so a frozen
        // 21 never loses: the resolved value is a probability of winning.
        let value = resolve_single_deck(21, 3);
        assert!(value > 0.0 && value <= 1.0);
    }

    #[test]
    fn settle_treats_dealer_bust_as_a_win() {
        assert_eq!(settle(12, 22), WIN_PROFIT);
        assert_eq!(settle(20, 26), WIN_PROFIT);
        assert_eq!(settle(18, 18), TIE_PROFIT);
        assert_eq!(settle(17, 20), LOSS_PROFIT);
        assert_eq!(settle(20, 17), WIN_PROFIT);
    }
}
