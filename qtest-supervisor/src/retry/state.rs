// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{RetryPolicy, Verdict};
use qtest_log::TestCaseId;
use std::collections::BTreeMap;

/// Counters and sets owned by the retry engine for one supervised run.
///
/// Budgets only ever decrease, and a test case that has recovered stays recovered for the rest of
/// the run.
#[derive(Clone, Debug)]
pub struct RetryState {
    max_repeats: u32,
    passes_needed: u32,
    crash_reruns_left: u32,
    executable_reruns_left: u32,
    cases: BTreeMap<TestCaseId, CaseProgress>,
    pending: Vec<TestCaseId>,
    confirmed: Vec<TestCaseId>,
    recovered: Vec<TestCaseId>,
    verdict: Option<Verdict>,
}

/// Rerun progress for one test case.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CaseProgress {
    /// Reruns left in this test case's budget.
    pub reruns_left: u32,

    /// Reruns performed so far.
    pub reruns: u32,

    /// Reruns that passed so far.
    pub passes: u32,
}

/// Permission to rerun a test case once.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RerunTicket {
    /// Which rerun this is, starting from 1.
    pub rerun: u32,

    /// The total rerun budget.
    pub budget: u32,

    /// Whether this rerun is verbose. The last rerun in the budget always is.
    pub verbose: bool,
}

/// The result of recording a rerun.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RerunProgress {
    /// The test case has passed often enough and is no longer failing.
    Recovered,

    /// More reruns are needed to decide.
    Undecided,
}

impl RetryState {
    /// Creates a new state with the budgets of `policy`.
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            max_repeats: policy.max_repeats,
            passes_needed: policy.passes_needed,
            crash_reruns_left: policy.crash_reruns,
            executable_reruns_left: policy.executable_reruns(),
            cases: BTreeMap::new(),
            pending: Vec::new(),
            confirmed: Vec::new(),
            recovered: Vec::new(),
            verdict: None,
        }
    }

    /// Returns the number of whole-executable reruns left after crashes.
    pub fn crash_reruns_left(&self) -> u32 {
        self.crash_reruns_left
    }

    /// Uses up one whole-executable rerun after a crash, if any are left.
    pub fn take_crash_rerun(&mut self) -> bool {
        take(&mut self.crash_reruns_left)
    }

    /// Uses up the whole-executable rerun for runs without a log, if it is still available.
    pub fn take_executable_rerun(&mut self) -> bool {
        take(&mut self.executable_reruns_left)
    }

    /// Starts confirming the failures of a full run.
    ///
    /// Test cases that already recovered or were already confirmed earlier in this supervised run
    /// are dropped. Undecided failures of an earlier full run are forgotten, but per-test-case
    /// budgets carry over.
    pub fn begin_confirmation(&mut self, failures: Vec<TestCaseId>) -> &[TestCaseId] {
        self.pending.clear();
        for failure in failures {
            if self.recovered.contains(&failure)
                || self.confirmed.contains(&failure)
                || self.pending.contains(&failure)
            {
                continue;
            }
            self.cases.entry(failure.clone()).or_insert(CaseProgress {
                reruns_left: self.max_repeats,
                reruns: 0,
                passes: 0,
            });
            self.pending.push(failure);
        }
        &self.pending
    }

    /// Takes one rerun from the budget of `test_case`.
    ///
    /// Returns `None` if the budget is used up or the test case is not pending.
    pub fn next_rerun(&mut self, test_case: &TestCaseId) -> Option<RerunTicket> {
        if !self.pending.contains(test_case) {
            return None;
        }
        let progress = self.cases.get_mut(test_case)?;
        if !take(&mut progress.reruns_left) {
            return None;
        }
        progress.reruns += 1;
        Some(RerunTicket {
            rerun: progress.reruns,
            budget: self.max_repeats,
            verbose: progress.reruns_left == 0,
        })
    }

    /// Records a passing rerun of `test_case`.
    pub fn record_pass(&mut self, test_case: &TestCaseId) -> RerunProgress {
        let Some(progress) = self.cases.get_mut(test_case) else {
            return RerunProgress::Undecided;
        };
        progress.passes += 1;
        if progress.passes >= self.passes_needed {
            self.pending.retain(|pending| pending != test_case);
            self.recovered.push(test_case.clone());
            RerunProgress::Recovered
        } else {
            RerunProgress::Undecided
        }
    }

    /// Marks `test_case` as a confirmed failure.
    pub fn confirm(&mut self, test_case: &TestCaseId) {
        self.pending.retain(|pending| pending != test_case);
        if !self.confirmed.contains(test_case) {
            self.confirmed.push(test_case.clone());
        }
    }

    /// Returns the progress of `test_case`, if it ever failed.
    pub fn progress(&self, test_case: &TestCaseId) -> Option<CaseProgress> {
        self.cases.get(test_case).copied()
    }

    /// Returns the failures confirmed so far.
    ///
    /// A confirmed failure stays confirmed for the rest of the supervised run, including across
    /// whole-executable reruns.
    pub fn confirmed(&self) -> &[TestCaseId] {
        &self.confirmed
    }

    /// Returns the test cases that failed and later recovered.
    pub fn recovered(&self) -> &[TestCaseId] {
        &self.recovered
    }

    /// Records the verdict.
    ///
    /// # Panics
    ///
    /// Panics if a verdict was already recorded.
    pub fn finish(&mut self, verdict: Verdict) -> Verdict {
        assert!(
            self.verdict.is_none(),
            "verdict already recorded: {:?}",
            self.verdict
        );
        self.verdict = Some(verdict);
        verdict
    }
}

fn take(counter: &mut u32) -> bool {
    match counter.checked_sub(1) {
        Some(left) => {
            *counter = left;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn policy(max_repeats: u32, passes_needed: u32) -> RetryPolicy {
        RetryPolicy {
            max_repeats,
            passes_needed,
            ..Default::default()
        }
    }

    #[test]
    fn budget_runs_out_with_one_verbose_rerun() {
        let mut state = RetryState::new(&policy(3, 1));
        let case = TestCaseId::new("flaky");
        state.begin_confirmation(vec![case.clone()]);

        let tickets: Vec<_> = std::iter::from_fn(|| state.next_rerun(&case)).collect();
        assert_eq!(
            tickets,
            vec![
                RerunTicket {
                    rerun: 1,
                    budget: 3,
                    verbose: false
                },
                RerunTicket {
                    rerun: 2,
                    budget: 3,
                    verbose: false
                },
                RerunTicket {
                    rerun: 3,
                    budget: 3,
                    verbose: true
                },
            ]
        );

        state.confirm(&case);
        assert_eq!(state.confirmed(), &[case.clone()]);
        assert_eq!(state.next_rerun(&case), None, "confirmed cases are not rerun");
        assert_eq!(
            state.progress(&case),
            Some(CaseProgress {
                reruns_left: 0,
                reruns: 3,
                passes: 0
            })
        );
    }

    #[test]
    fn zero_budget() {
        let mut state = RetryState::new(&policy(0, 1));
        let case = TestCaseId::new("flaky");
        state.begin_confirmation(vec![case.clone()]);
        assert_eq!(state.next_rerun(&case), None);
        assert!(!state.take_executable_rerun());
    }

    #[test]
    fn passes_needed() {
        let mut state = RetryState::new(&policy(5, 2));
        let case = TestCaseId::with_tag("rows", "second");
        state.begin_confirmation(vec![case.clone()]);

        state.next_rerun(&case).expect("budget left");
        assert_eq!(state.record_pass(&case), RerunProgress::Undecided);
        state.next_rerun(&case).expect("budget left");
        assert_eq!(state.record_pass(&case), RerunProgress::Recovered);

        assert_eq!(state.recovered(), &[case.clone()]);
        assert_eq!(state.next_rerun(&case), None, "recovered cases are not rerun");
    }

    #[test]
    fn recovered_cases_stay_recovered() {
        let mut state = RetryState::new(&policy(5, 1));
        let flaky = TestCaseId::new("flaky");
        let broken = TestCaseId::new("broken");

        state.begin_confirmation(vec![flaky.clone(), broken.clone()]);
        state.next_rerun(&flaky).expect("budget left");
        state.record_pass(&flaky);
        state.next_rerun(&broken).expect("budget left");
        state.confirm(&broken);

        // A later full run fails both again, along with a new failure.
        let other = TestCaseId::new("other");
        let pending =
            state.begin_confirmation(vec![flaky.clone(), broken.clone(), other.clone()]);
        assert_eq!(pending, &[other.clone()]);
        assert_eq!(state.confirmed(), &[broken.clone()], "confirmations are kept");
    }

    #[test]
    fn undecided_budgets_carry_over() {
        let mut state = RetryState::new(&policy(5, 1));
        let flaky = TestCaseId::new("flaky");

        state.begin_confirmation(vec![flaky.clone()]);
        state.next_rerun(&flaky).expect("budget left");

        // A crash interrupts confirmation and the next full run fails `flaky` again.
        let pending = state.begin_confirmation(vec![flaky.clone()]);
        assert_eq!(pending, &[flaky.clone()]);
        assert_eq!(
            state.progress(&flaky).map(|progress| progress.reruns_left),
            Some(4)
        );
    }

    #[test]
    fn global_budgets() {
        let mut state = RetryState::new(&RetryPolicy::default());
        assert_eq!(state.crash_reruns_left(), 1);
        assert!(state.take_crash_rerun());
        assert!(!state.take_crash_rerun());
        assert!(state.take_executable_rerun());
        assert!(!state.take_executable_rerun());
    }

    #[test]
    #[should_panic = "verdict already recorded"]
    fn single_verdict() {
        let mut state = RetryState::new(&RetryPolicy::default());
        assert_eq!(state.finish(Verdict::Pass), Verdict::Pass);
        state.finish(Verdict::Fail);
    }
}
