use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use adaptive_sampler_core::samplers::{AdaptiveSamplerCore, AdaptiveSamplerCoreConfig};
use adaptive_sampler_core::scheduler::{ManualScheduler, ThreadScheduler};
use adaptive_sampler_core::{SamplerError, WindowStats};

const WINDOW: Duration = Duration::from_secs(1);

fn recording_listener() -> (Arc<Mutex<Vec<WindowStats>>>, impl Fn(&WindowStats) + Send + Sync + 'static) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = calls.clone();
    (calls, move |stats: &WindowStats| recorded.lock().unwrap().push(*stats))
}

fn assert_stats(stats: &WindowStats, tests: u64, samples: u64, budget: u64, average: f64, probability: f64) {
    assert_eq!(stats.window_tests, tests);
    assert_eq!(stats.window_samples, samples);
    assert_eq!(stats.budget, budget);
    assert_eq!(stats.total_average, average);
    assert!(
        (stats.probability - probability).abs() < 0.00007,
        "probability {} != {}",
        stats.probability,
        probability
    );
}

#[test]
fn listener_observes_every_window() {
    let scheduler = Arc::new(ManualScheduler::new());
    let (calls, listener) = recording_listener();
    let sampler = AdaptiveSamplerCore::builder(AdaptiveSamplerCoreConfig::new(WINDOW, 2, 1, 1))
        .listener(listener)
        .scheduler(scheduler.clone())
        .build_shared()
        .unwrap();
    let core: &AdaptiveSamplerCore = &sampler;

    // Initial config at construction
    assert_eq!(calls.lock().unwrap().len(), 1);
    assert_stats(&calls.lock().unwrap()[0], 0, 0, 4, 0.0, 1.0);

    core.keep();
    core.drop();
    assert_eq!(scheduler.run_pending(), 1);
    // budget = 2 - 1, probability = 1 / 2
    assert_stats(&calls.lock().unwrap()[1], 2, 1, 1, 2.0, 0.5);

    core.keep();
    core.keep();
    core.drop();
    scheduler.run_pending();
    // budget = 2 - 2, probability = 0 / 3
    assert_stats(&calls.lock().unwrap()[2], 3, 2, 0, 3.0, 0.0);

    core.drop();
    core.drop();
    core.drop();
    scheduler.run_pending();
    // budget = 2 - 0, probability = 2 / 3
    assert_stats(&calls.lock().unwrap()[3], 3, 0, 2, 3.0, 0.6666);

    assert_eq!(calls.lock().unwrap().len(), 4);
}

#[test]
fn auto_start_registers_one_task_per_window() {
    let scheduler = Arc::new(ManualScheduler::new());
    let sampler = AdaptiveSamplerCore::builder(AdaptiveSamplerCoreConfig::new(WINDOW, 10, 1, 1))
        .scheduler(scheduler.clone())
        .build_shared()
        .unwrap();

    assert!(sampler.is_started());
    assert_eq!(scheduler.periods(), vec![WINDOW]);
    assert_eq!(sampler.start(), Err(SamplerError::AlreadyStarted));
    assert_eq!(scheduler.task_count(), 1);
}

#[test]
fn manual_start_when_auto_start_disabled() {
    let scheduler = Arc::new(ManualScheduler::new());
    let mut config = AdaptiveSamplerCoreConfig::new(WINDOW, 10, 1, 1);
    config.auto_start = false;
    let sampler = AdaptiveSamplerCore::builder(config)
        .scheduler(scheduler.clone())
        .build_shared()
        .unwrap();

    assert!(!sampler.is_started());
    assert_eq!(scheduler.task_count(), 0);

    sampler.start().unwrap();
    assert!(sampler.is_started());
    scheduler.run_pending();
    assert_eq!(sampler.rollover_count(), 1);
}

#[test]
fn start_without_scheduler_fails() {
    let config = AdaptiveSamplerCoreConfig::new(WINDOW, 10, 1, 1);
    match AdaptiveSamplerCore::builder(config.clone()).build_shared() {
        Err(err) => assert_eq!(err, SamplerError::SchedulerMissing),
        Ok(_) => panic!("Expected SchedulerMissing"),
    }

    let sampler = Arc::new(AdaptiveSamplerCore::new(config).unwrap());
    assert_eq!(sampler.start(), Err(SamplerError::SchedulerMissing));
    assert!(!sampler.is_started());
}

#[test]
fn dropped_sampler_cancels_its_task() {
    let scheduler = Arc::new(ManualScheduler::new());
    let sampler = AdaptiveSamplerCore::builder(AdaptiveSamplerCoreConfig::new(WINDOW, 10, 1, 1))
        .scheduler(scheduler.clone())
        .build_shared()
        .unwrap();

    assert_eq!(scheduler.run_pending(), 1);
    assert_eq!(scheduler.task_count(), 1);

    std::mem::drop(sampler);
    // The task notices the sampler is gone and cancels itself
    assert_eq!(scheduler.run_pending(), 1);
    assert_eq!(scheduler.task_count(), 0);
}

#[test]
fn panicking_listener_does_not_break_rollover() {
    let sampler = AdaptiveSamplerCore::builder(AdaptiveSamplerCoreConfig::new(WINDOW, 2, 1, 1))
        .listener(|_: &WindowStats| panic!("listener failure"))
        .build()
        .unwrap();

    sampler.keep();
    sampler.drop();
    let stats = sampler.roll_window();
    assert_eq!(stats.budget, 1);
    assert_eq!(sampler.state().probability, 0.5);
    assert_eq!(sampler.rollover_count(), 1);

    // Sampling keeps working after the listener failed
    sampler.keep();
    assert_eq!(sampler.roll_window().window_samples, 1);
}

#[test]
fn degraded_when_no_rollover_happens() {
    let sampler = AdaptiveSamplerCore::new(AdaptiveSamplerCoreConfig::new(
        Duration::from_millis(50),
        10,
        1,
        1,
    ))
    .unwrap();

    thread::sleep(Duration::from_millis(120));
    assert!(sampler.is_degraded());
    // Still accepting with the initial probability
    assert_eq!(sampler.probability(), 1.0);
    assert!(sampler.sample());

    sampler.roll_window();
    assert!(!sampler.is_degraded());
}

#[test]
fn budget_cap_bounds_samples_before_first_rollover() {
    // Warm-up budget = 10 * (2 + 1)
    let sampler = AdaptiveSamplerCore::new(AdaptiveSamplerCoreConfig::new(WINDOW, 10, 1, 2)).unwrap();
    let accepted = (0..1000).filter(|_| sampler.sample()).count();
    assert_eq!(accepted, 30);
    assert_eq!(sampler.probability(), 1.0);

    // Forced keeps are never capped
    assert!(sampler.keep());
    assert_eq!(sampler.sample_count(), 31);
}

#[test]
fn uncapped_sampler_accepts_everything_until_first_rollover() {
    let mut config = AdaptiveSamplerCoreConfig::new(WINDOW, 10, 1, 2);
    config.budget_cap = false;
    let sampler = AdaptiveSamplerCore::new(config).unwrap();

    let accepted = (0..1000).filter(|_| sampler.sample()).count();
    assert_eq!(accepted, 1000);

    // 1000 samples against a target of 10: budget exhausted, probability 0
    let stats = sampler.roll_window();
    assert_eq!(stats.budget, 0);
    assert_eq!(stats.probability, 0.0);
    assert_eq!((0..100).filter(|_| sampler.sample()).count(), 0);
}

#[test]
fn thread_scheduler_rolls_windows() {
    let scheduler = Arc::new(ThreadScheduler::new("sampler-roll"));
    let (calls, listener) = recording_listener();
    let sampler = AdaptiveSamplerCore::builder(AdaptiveSamplerCoreConfig::new(
        Duration::from_millis(10),
        50,
        4,
        2,
    ))
    .listener(listener)
    .scheduler(scheduler.clone())
    .build_shared()
    .unwrap();

    for _ in 0..20 {
        for _ in 0..100 {
            sampler.sample();
        }
        thread::sleep(Duration::from_millis(5));
    }
    thread::sleep(Duration::from_millis(30));

    assert!(sampler.rollover_count() >= 3, "only {} rollovers", sampler.rollover_count());
    let calls = calls.lock().unwrap();
    // Construction call plus one per rollover
    assert!(calls.len() as u64 >= sampler.rollover_count());
    let rolled_tests: u64 = calls.iter().map(|stats| stats.window_tests).sum();
    assert!(rolled_tests <= sampler.test_count());
    for stats in calls.iter() {
        assert!((0.0..=1.0).contains(&stats.probability));
        assert!(stats.budget <= 50 * 3);
    }
    drop(calls);

    scheduler.shutdown();
}
