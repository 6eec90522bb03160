use rand::seq::SliceRandom;
use std::collections::VecDeque;

/// An ordered deck consumed from the front, backed by a read-only master
/// pool. Replenishing reshuffles the whole master back in; the master is
/// never mutated, so two rooms built from the same snapshot stay
/// independent.
#[derive(Debug, Clone)]
pub struct Deck<T> {
    master: Vec<T>,
    cards: VecDeque<T>,
}

impl<T: Clone> Deck<T> {
    /// Build a deck from a master pool, shuffled immediately.
    pub fn new(master: Vec<T>) -> Self {
        let mut cards: Vec<T> = master.clone();
        cards.shuffle(&mut rand::rng());
        Self {
            master,
            cards: cards.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    pub fn master_len(&self) -> usize {
        self.master.len()
    }

    /// Remove and return the front card, or None if the deck is empty and
    /// the master pool is too. Prompt decks rely on the None to signal the
    /// deck-exhausted terminal outcome.
    pub fn draw(&mut self) -> Option<T> {
        self.cards.pop_front()
    }

    /// Draw up to `n` cards. Returns fewer only when the deck cannot
    /// provide more; callers that must not come up short call `ensure`
    /// first.
    pub fn draw_up_to(&mut self, n: usize) -> Vec<T> {
        let take = n.min(self.cards.len());
        self.cards.drain(..take).collect()
    }

    /// Top the deck back up by reshuffling the full master pool in when
    /// fewer than `n` cards remain. No-op for an empty master.
    pub fn ensure(&mut self, n: usize) {
        if self.cards.len() < n && !self.master.is_empty() {
            let mut refill = self.master.clone();
            refill.shuffle(&mut rand::rng());
            self.cards.extend(refill);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> Vec<u32> {
        (0..n as u32).collect()
    }

    #[test]
    fn new_deck_is_a_permutation_of_master() {
        let deck = Deck::new(numbered(50));
        assert_eq!(deck.remaining(), 50);
        let mut drawn: Vec<u32> = {
            let mut d = deck;
            d.draw_up_to(50)
        };
        drawn.sort_unstable();
        assert_eq!(drawn, numbered(50));
    }

    #[test]
    fn draw_consumes_from_front() {
        let mut deck = Deck::new(numbered(10));
        let first = deck.draw().unwrap();
        assert_eq!(deck.remaining(), 9);
        // The drawn card is gone
        let rest = deck.draw_up_to(9);
        assert!(!rest.contains(&first));
    }

    #[test]
    fn draw_up_to_returns_partial_when_short() {
        let mut deck = Deck::new(numbered(3));
        let cards = deck.draw_up_to(5);
        assert_eq!(cards.len(), 3);
        assert_eq!(deck.remaining(), 0);
        assert!(deck.draw().is_none());
    }

    #[test]
    fn ensure_reshuffles_master_back_in() {
        let mut deck = Deck::new(numbered(10));
        deck.draw_up_to(8);
        assert_eq!(deck.remaining(), 2);
        deck.ensure(5);
        assert_eq!(deck.remaining(), 12);
        // All draws still come from the same master values
        let drawn = deck.draw_up_to(12);
        assert!(drawn.iter().all(|c| *c < 10));
    }

    #[test]
    fn ensure_is_noop_when_already_sufficient() {
        let mut deck = Deck::new(numbered(10));
        deck.ensure(5);
        assert_eq!(deck.remaining(), 10);
    }

    #[test]
    fn empty_master_never_replenishes() {
        let mut deck: Deck<u32> = Deck::new(Vec::new());
        deck.ensure(1);
        assert!(deck.draw().is_none());
    }
}
