// tests/scheduler_property.rs

use proptest::prelude::*;

use buildwatch::sched::{BuildOutcome, BuildScheduler};
use buildwatch::types::{BuildStatus, TargetDescriptor};
use buildwatch_test_utils::builders::target;

fn batch(n: usize) -> Vec<TargetDescriptor> {
    (0..n).map(|i| target(&format!("t{i}"), &format!("src/t{i}"))).collect()
}

proptest! {
    /// For any batch size, limit, completion order and failure pattern:
    /// - never more than `max_parallel` running
    /// - every target ends terminal
    /// - the batch finishes exactly once, on the last completion
    #[test]
    fn bounded_concurrency_and_work_conservation(
        size in 1usize..25,
        max_parallel in 1usize..8,
        picks in proptest::collection::vec(any::<usize>(), 0..64),
        failures in proptest::collection::vec(any::<bool>(), 25),
    ) {
        let mut scheduler = BuildScheduler::new(max_parallel);
        let mut running: Vec<String> = Vec::new();
        let mut finished_count = 0;
        let mut completions = 0;

        let step = scheduler.start_batch(batch(size)).unwrap();
        running.extend(step.admitted.into_iter().map(|t| t.name));
        prop_assert!(running.len() <= max_parallel);

        let mut picks = picks.into_iter();
        while !running.is_empty() {
            let idx = picks.next().unwrap_or(0) % running.len();
            let name = running.swap_remove(idx);
            let i: usize = name[1..].parse().unwrap();
            let outcome = if failures[i] {
                BuildOutcome::failed("scripted")
            } else {
                BuildOutcome::succeeded()
            };

            let step = scheduler.complete(&name, outcome);
            completions += 1;
            prop_assert!(step.completed.is_some());
            running.extend(step.admitted.into_iter().map(|t| t.name));
            prop_assert!(running.len() <= max_parallel);
            prop_assert_eq!(scheduler.active_count(), running.len());

            if let Some(results) = step.finished {
                finished_count += 1;
                prop_assert_eq!(completions, size);
                prop_assert!(running.is_empty());
                for task in results.tasks.values() {
                    prop_assert!(task.is_terminal());
                    let i: usize = task.name()[1..].parse().unwrap();
                    let expected = if failures[i] { BuildStatus::Failure } else { BuildStatus::Success };
                    prop_assert_eq!(task.status, expected);
                }
            }
        }

        prop_assert_eq!(finished_count, 1);
        prop_assert!(scheduler.is_idle());
    }
}
