//! Candidate resolution
//!
//! Tries an ordered list of locator candidates against a live session and
//! returns the first element that becomes displayed. A failing candidate is
//! a non-match, never an error.

use tokio::time::Instant;

use crate::automation::{AutomationSession, ElementHandle};
use crate::common::{Error, Result};

use super::step::LocatorCandidate;

/// Result of one resolver invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Found {
        element: ElementHandle,
        candidate_index: usize,
    },
    NotFound,
}

impl ResolutionOutcome {
    pub fn found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    pub fn element(&self) -> Option<&ElementHandle> {
        match self {
            Self::Found { element, .. } => Some(element),
            Self::NotFound => None,
        }
    }

    pub fn matched_candidate_index(&self) -> Option<usize> {
        match self {
            Self::Found {
                candidate_index, ..
            } => Some(*candidate_index),
            Self::NotFound => None,
        }
    }
}

/// Resolve the first displayed element among `candidates`
///
/// Each candidate's lookups and displayed wait together are bounded by its
/// `display_timeout`. A missing element is looked up again until that
/// timeout, so an exhausted list costs the sum of the timeouts. An empty
/// list returns `NotFound` without touching the session.
pub async fn resolve(
    session: &mut dyn AutomationSession,
    candidates: &[LocatorCandidate],
) -> ResolutionOutcome {
    for (index, candidate) in candidates.iter().enumerate() {
        let attempt = attempt_candidate(&mut *session, candidate);

        match tokio::time::timeout(candidate.display_timeout, attempt).await {
            Ok(Ok(Some(element))) => {
                tracing::debug!(
                    query = %candidate.query,
                    index,
                    "Candidate matched"
                );
                return ResolutionOutcome::Found {
                    element,
                    candidate_index: index,
                };
            }
            Ok(Ok(None)) => {
                tracing::debug!(
                    query = %candidate.query,
                    "Element not displayed within {} ms",
                    candidate.display_timeout.as_millis()
                );
            }
            Ok(Err(e)) if e.is_not_found() => {
                tracing::debug!(query = %candidate.query, "No such element");
            }
            Ok(Err(e @ Error::InvalidSelector { .. })) => {
                tracing::warn!("Skipping candidate: {}", e);
            }
            Ok(Err(e)) => {
                tracing::debug!(query = %candidate.query, "Candidate query failed: {}", e);
            }
            Err(_) => {
                let e = Error::Timeout(candidate.display_timeout.as_millis() as u64);
                tracing::debug!(query = %candidate.query, "Candidate abandoned: {}", e);
            }
        }
    }

    ResolutionOutcome::NotFound
}

/// Find the element and wait for it to be displayed
///
/// The lookup is repeated while the element is missing from the tree, so a
/// screen that is still loading gets the whole candidate budget.
async fn attempt_candidate(
    session: &mut dyn AutomationSession,
    candidate: &LocatorCandidate,
) -> Result<Option<ElementHandle>> {
    let deadline = Instant::now() + candidate.display_timeout;
    let poll = session.poll_interval();

    let element = loop {
        match session.find_element(&candidate.query).await {
            Ok(element) => break element,
            Err(e) if e.is_not_found() => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(e);
                }
                tokio::time::sleep(poll.min(deadline - now)).await;
            }
            Err(e) => return Err(e),
        }
    };

    let remaining = deadline.saturating_duration_since(Instant::now());
    if session.wait_displayed(&element, remaining).await? {
        Ok(Some(element))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testkit::{Script, ScriptedSession};
    use std::time::Duration;

    fn candidate(query: &str, ms: u64) -> LocatorCandidate {
        LocatorCandidate::new(query, Duration::from_millis(ms))
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_candidates_issue_no_queries() {
        let script = Script::new();
        let mut session = ScriptedSession::new(script.clone());

        let outcome = resolve(&mut session, &[]).await;

        assert_eq!(outcome, ResolutionOutcome::NotFound);
        assert!(script.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_match_wins() {
        let script = Script::new();
        script.visible("//first");
        script.visible("//second");
        let mut session = ScriptedSession::new(script.clone());

        let outcome = resolve(
            &mut session,
            &[candidate("//first", 1000), candidate("//second", 1000)],
        )
        .await;

        assert!(outcome.found());
        assert_eq!(outcome.matched_candidate_index(), Some(0));
        assert_eq!(script.find_count("//second"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_through_missing_and_invalid_candidates() {
        let script = Script::new();
        script.invalid("//[broken");
        script.visible("//third");
        let mut session = ScriptedSession::new(script.clone());

        let outcome = resolve(
            &mut session,
            &[
                candidate("//missing", 1000),
                candidate("//[broken", 1000),
                candidate("//third", 1000),
            ],
        )
        .await;

        assert_eq!(outcome.matched_candidate_index(), Some(2));
        assert_eq!(
            outcome.element().map(|e| e.id().to_string()),
            Some("el://third".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_protocol_error_is_non_match() {
        let script = Script::new();
        script.broken("//flaky");
        script.visible("//stable");
        let mut session = ScriptedSession::new(script.clone());

        let outcome = resolve(
            &mut session,
            &[candidate("//flaky", 1000), candidate("//stable", 1000)],
        )
        .await;

        assert_eq!(outcome.matched_candidate_index(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_costs_sum_of_timeouts() {
        let script = Script::new();
        script.hidden("//hidden-a");
        script.hidden("//hidden-b");
        let mut session = ScriptedSession::new(script.clone());

        let started = Instant::now();
        let outcome = resolve(
            &mut session,
            &[
                candidate("//hidden-a", 8000),
                candidate("//absent", 2000),
                candidate("//hidden-b", 5000),
            ],
        )
        .await;
        let elapsed = started.elapsed();

        assert_eq!(outcome, ResolutionOutcome::NotFound);
        assert!(elapsed >= Duration::from_millis(15_000));
        assert!(elapsed <= Duration::from_millis(15_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_candidates_wait_their_full_timeouts() {
        let script = Script::new();
        let mut session = ScriptedSession::new(script.clone());

        let started = Instant::now();
        let outcome = resolve(
            &mut session,
            &[candidate("//absent-a", 2000), candidate("//absent-b", 3000)],
        )
        .await;
        let elapsed = started.elapsed();

        assert_eq!(outcome, ResolutionOutcome::NotFound);
        assert!(elapsed >= Duration::from_millis(5000));
        assert!(elapsed <= Duration::from_millis(5500));
        assert!(script.find_count("//absent-a") > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_element_added_to_tree_late_is_found() {
        let script = Script::new();
        script.attached_after("//loading", Duration::from_millis(1500));
        let mut session = ScriptedSession::new(script.clone());

        let started = Instant::now();
        let outcome = resolve(&mut session, &[candidate("//loading", 5000)]).await;

        assert!(outcome.found());
        assert!(started.elapsed() >= Duration::from_millis(1500));
        assert!(started.elapsed() < Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_element_added_after_timeout_is_missed() {
        let script = Script::new();
        script.attached_after("//slow", Duration::from_millis(4000));
        script.visible("//fallback");
        let mut session = ScriptedSession::new(script.clone());

        let outcome = resolve(
            &mut session,
            &[candidate("//slow", 3000), candidate("//fallback", 1000)],
        )
        .await;

        assert_eq!(outcome.matched_candidate_index(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_selector_is_not_retried() {
        let script = Script::new();
        script.invalid("//[broken");
        let mut session = ScriptedSession::new(script.clone());

        let started = Instant::now();
        let outcome = resolve(&mut session, &[candidate("//[broken", 5000)]).await;

        assert_eq!(outcome, ResolutionOutcome::NotFound);
        assert_eq!(script.find_count("//[broken"), 1);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_query_is_bounded_by_candidate_timeout() {
        let script = Script::new();
        script.stalled("//stuck");
        script.visible("//next");
        let mut session = ScriptedSession::new(script.clone());

        let started = Instant::now();
        let outcome = resolve(
            &mut session,
            &[candidate("//stuck", 3000), candidate("//next", 3000)],
        )
        .await;

        assert_eq!(outcome.matched_candidate_index(), Some(1));
        assert!(started.elapsed() < Duration::from_millis(3500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_element_displayed_late_within_timeout() {
        let script = Script::new();
        script.appears_after("//late", Duration::from_millis(1500));
        let mut session = ScriptedSession::new(script.clone());

        let outcome = resolve(&mut session, &[candidate("//late", 2000)]).await;
        assert!(outcome.found());

        let outcome = resolve(&mut session, &[candidate("//late", 1000)]).await;
        assert!(outcome.found(), "element stays displayed once shown");
    }
}
