use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use rulestreak::{ActionDefinition, ActionRegistry, Precomputed, Rule, RuleProcessor};

type Hits = Arc<AtomicUsize>;

fn counting_registry(hits: &Hits) -> ActionRegistry<(), bool> {
    let hits = Arc::clone(hits);
    ActionRegistry::new().register("count", move |_, _, _| {
        hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

#[test]
fn shared_processor_across_threads() {
    let hits = Hits::default();
    let processor = Arc::new(RuleProcessor::new(Precomputed, counting_registry(&hits)));
    let rule = Arc::new(
        Rule::builder("always", true)
            .on_true(ActionDefinition::new("count", 1))
            .max_history(8)
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let processor = Arc::clone(&processor);
            let rule = Arc::clone(&rule);
            thread::spawn(move || {
                for _ in 0..250 {
                    processor.run(&mut (), &rule).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(hits.load(Ordering::SeqCst), 2000);
    let history = processor.history(&rule);
    assert_eq!(history.len(), 8);
    assert!(history.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn interleaved_outcomes_keep_bound_and_order() {
    let hits = Hits::default();
    let hits_in = Arc::clone(&hits);
    let registry = ActionRegistry::<bool, ()>::new().register("count", move |_, _, _| {
        hits_in.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    // The outcome is whatever the calling thread's context says.
    let evaluator = |ctx: &bool, _: &()| -> Result<bool, Infallible> { Ok(*ctx) };
    let processor = Arc::new(RuleProcessor::new(evaluator, registry));
    let rule = Arc::new(
        Rule::builder("flip", ())
            .on_true(ActionDefinition::new("count", 3))
            .on_false(ActionDefinition::new("count", 3))
            .max_history(5)
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let processor = Arc::clone(&processor);
            let rule = Arc::clone(&rule);
            thread::spawn(move || {
                let mut ctx = i % 2 == 0;
                for _ in 0..200 {
                    let report = processor.run_detailed(&mut ctx, &rule).unwrap();
                    let streak = report.streak();
                    assert!((1..=5).contains(&streak.len()));
                    assert!(streak.records().iter().all(|r| r.result() == ctx));
                    assert_eq!(report.fired().is_empty(), streak.len() < 3);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let history = processor.history(&rule);
    assert_eq!(history.len(), 5);
    assert!(history.windows(2).all(|w| w[0] < w[1]));
    assert!(hits.load(Ordering::SeqCst) <= 1200);
}

#[test]
fn sequence_numbers_unique_across_threads() {
    let processor = Arc::new(RuleProcessor::new(Precomputed, ActionRegistry::<(), bool>::new()));
    let rules: Vec<Arc<Rule<bool>>> = (0..4)
        .map(|i| {
            let rule = Rule::builder(format!("r{i}"), i % 2 == 0)
                .max_history(100)
                .build()
                .unwrap();
            Arc::new(rule)
        })
        .collect();

    let handles: Vec<_> = rules
        .iter()
        .map(|rule| {
            let processor = Arc::clone(&processor);
            let rule = Arc::clone(rule);
            thread::spawn(move || {
                for _ in 0..100 {
                    processor.run(&mut (), &rule).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut seqs: Vec<u64> = rules
        .iter()
        .flat_map(|r| processor.history(r))
        .map(|r| r.sequence())
        .collect();
    seqs.sort_unstable();
    seqs.dedup();
    assert_eq!(seqs.len(), 400);
    assert_eq!(seqs.first(), Some(&1));
    assert_eq!(seqs.last(), Some(&400));
}
