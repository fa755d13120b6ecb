use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// What happened to one result page of a task.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PageState {
    queued: DateTime<Utc>,
    /// Failed passes so far.
    passes: usize,
    scanned_at: Option<DateTime<Utc>>,
    last_result: Option<StateOutcome>,
    given_up: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "status", content = "outcome")]
pub enum StateOutcome {
    Ok(String),
    Error(String),
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            queued: Utc::now(),
            passes: 0,
            scanned_at: None,
            last_result: None,
            given_up: false,
        }
    }
}

impl PageState {
    pub fn queued() -> PageState {
        Self::default()
    }
    pub fn scanned_ok(&mut self, cards: usize) {
        self.scanned_at = Some(Utc::now());
        self.last_result = Some(StateOutcome::Ok(format!("{cards} cards")));
    }
    /// Records a failed pass and returns the number of failed passes so far.
    pub fn pass_failed<S: Into<String>>(&mut self, error: S) -> usize {
        self.passes += 1;
        self.last_result = Some(StateOutcome::Error(error.into()));
        self.passes
    }
    pub fn give_up(&mut self) {
        self.given_up = true;
    }
    pub fn passes(&self) -> usize {
        self.passes
    }
    pub fn is_scanned(&self) -> bool {
        self.scanned_at.is_some()
    }
    pub fn is_given_up(&self) -> bool {
        self.given_up
    }
    pub fn last_result(&self) -> Option<&StateOutcome> {
        self.last_result.as_ref()
    }
}

/// Page URL to its state, for one task.
pub type PageLedger = BTreeMap<String, PageState>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_passes_accumulate() {
        let mut state = PageState::queued();
        assert_eq!(state.pass_failed("bad status code 503"), 1);
        assert_eq!(state.pass_failed("bad status code 502"), 2);
        assert_eq!(
            state.last_result(),
            Some(&StateOutcome::Error("bad status code 502".into()))
        );
        state.scanned_ok(15);
        assert!(state.is_scanned());
        assert_eq!(state.passes(), 2);
    }

    #[test]
    fn serializes_outcome_with_status_tag() {
        let mut state = PageState::queued();
        state.scanned_ok(3);
        let json = serde_json::to_value(&state).expect("serializable");
        assert_eq!(json["last_result"]["status"], "Ok");
        assert_eq!(json["last_result"]["outcome"], "3 cards");
        assert_eq!(json["given_up"], false);
        let back: PageState = serde_json::from_value(json).expect("deserializable");
        assert_eq!(back, state);
    }
}
