//! Folding the card stream into a final result.

use std::collections::BTreeMap;

use crate::{
    card::{Booster, Card},
    crawler::{CardStream, CrawlReport},
};

pub trait Reducer {
    type Output;

    fn push(&mut self, card: Card);
    fn finish(self) -> Self::Output;
}

/// All cards in arrival order.
#[derive(Debug, Default)]
pub struct ListReducer {
    cards: Vec<Card>,
}

impl Reducer for ListReducer {
    type Output = Vec<Card>;

    fn push(&mut self, card: Card) {
        self.cards.push(card);
    }

    fn finish(self) -> Vec<Card> {
        self.cards
    }
}

/// Cards grouped by [`Card::release`], each group in arrival order.
#[derive(Debug, Default)]
pub struct BoosterReducer {
    boosters: BTreeMap<String, Booster>,
}

impl Reducer for BoosterReducer {
    type Output = BTreeMap<String, Booster>;

    fn push(&mut self, card: Card) {
        self.boosters
            .entry(card.release.clone())
            .or_insert_with_key(|code| Booster {
                release_code: code.clone(),
                cards: Vec::new(),
            })
            .cards
            .push(card);
    }

    fn finish(self) -> BTreeMap<String, Booster> {
        self.boosters
    }
}

/// Feeds every card of `stream` to `reducer`, then waits for the run to end.
pub async fn reduce<R: Reducer>(
    mut reducer: R,
    mut stream: CardStream,
) -> (R::Output, CrawlReport) {
    while let Some(card) = stream.recv().await {
        reducer.push(card);
    }
    let report = stream.finish().await;
    (reducer.finish(), report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(number: &str, release: &str) -> Card {
        Card {
            card_number: number.into(),
            release: release.into(),
            ..Card::default()
        }
    }

    fn fold<R: Reducer>(mut reducer: R, cards: &[Card]) -> R::Output {
        for card in cards {
            reducer.push(card.clone());
        }
        reducer.finish()
    }

    #[test]
    fn list_keeps_arrival_order() {
        let cards = [card("BD/W63-002", "W63"), card("BD/W63-001", "W63")];
        assert_eq!(fold(ListReducer::default(), &cards), cards.to_vec());
    }

    #[test]
    fn boosters_group_by_release() {
        let cards = [
            card("BD/W63-002", "W63"),
            card("BD/W73-001", "W73"),
            card("BD/W63-001", "W63"),
            card("PROMO", ""),
        ];
        let boosters = fold(BoosterReducer::default(), &cards);
        assert_eq!(boosters.len(), 3);
        let w63 = &boosters["W63"];
        assert_eq!(w63.release_code, "W63");
        let numbers: Vec<_> = w63.cards.iter().map(|c| &c.card_number).collect();
        assert_eq!(numbers, ["BD/W63-002", "BD/W63-001"]);
        assert_eq!(boosters[""].cards.len(), 1);
    }
}
