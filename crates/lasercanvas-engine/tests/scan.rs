use std::cell::RefCell;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use lasercanvas_engine::{
    Equation, ScanConfig, ScanError, ScanOutcome, ScanRange, Scanner, VariableError,
    VariableStore,
};
use pretty_assertions::assert_eq;

type BoxedScan = Pin<Box<dyn Future<Output = ScanOutcome>>>;

fn poll_once(scan: &mut BoxedScan) -> Poll<ScanOutcome> {
    let mut cx = Context::from_waker(Waker::noop());
    scan.as_mut().poll(&mut cx)
}

fn drive(mut scan: BoxedScan) -> ScanOutcome {
    loop {
        if let Poll::Ready(outcome) = poll_once(&mut scan) {
            return outcome;
        }
    }
}

/// Callback that tallies calls per resolution.
fn tally() -> (
    Rc<RefCell<BTreeMap<usize, usize>>>,
    impl FnMut([usize; 2], usize, &VariableStore),
) {
    let counts = Rc::new(RefCell::new(BTreeMap::new()));
    let sink = Rc::clone(&counts);
    let callback = move |_: [usize; 2], resolution: usize, _: &VariableStore| {
        *sink.borrow_mut().entry(resolution).or_insert(0) += 1;
    };
    (counts, callback)
}

#[test]
fn scan_visits_steps_plus_one_points() {
    let scanner = Scanner::new(VariableStore::default().shared());
    let mut seen = Vec::new();
    scanner
        .scan("x", ScanRange::new(0.0, 1.0), 4, |step, steps, store| {
            assert_eq!(steps, 4);
            seen.push((step, store.get("x").unwrap()));
        })
        .unwrap();
    assert_eq!(
        seen,
        vec![(0, 0.0), (1, 0.25), (2, 0.5), (3, 0.75), (4, 1.0)]
    );
}

#[test]
fn scan_lets_callbacks_evaluate_equations() {
    let scanner = Scanner::new(VariableStore::default().shared());
    let eq = Equation::new("2 * x + 1");
    let mut values = Vec::new();
    scanner
        .scan("x", ScanRange::new(-1.0, 1.0), 2, |_, _, store| {
            values.push(eq.value_with(store));
        })
        .unwrap();
    assert_eq!(values, vec![-1.0, 1.0, 3.0]);
}

#[test]
fn scan_rejects_undeclared_names_and_zero_steps() {
    let scanner = Scanner::new(VariableStore::default().shared());
    assert_eq!(
        scanner.scan("z", ScanRange::default(), 4, |_, _, _| {}),
        Err(ScanError::Variable(VariableError::Undeclared("z".into())))
    );
    assert!(matches!(
        scanner.scan("x", ScanRange::default(), 0, |_, _, _| {}),
        Err(ScanError::InvalidConfig(_))
    ));
    assert!(scanner
        .scan2(["x", "w"], [ScanRange::default(); 2], |_, _, _| {})
        .is_err());
}

#[tokio::test]
async fn scan2_refines_progressively() {
    let scanner = Scanner::new(VariableStore::default().shared());
    let (counts, callback) = tally();
    let outcome = scanner
        .scan2(["x", "y"], [ScanRange::default(); 2], callback)
        .unwrap()
        .await;

    assert_eq!(outcome, ScanOutcome::Completed { rounds: 3 });
    assert_eq!(
        *counts.borrow(),
        BTreeMap::from([(16, 256), (32, 768), (64, 3072)])
    );
}

#[tokio::test]
async fn scan2_never_revisits_a_grid_point() {
    let scanner = Scanner::new(VariableStore::default().shared());
    let points = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&points);
    scanner
        .scan2(["x", "y"], [ScanRange::default(); 2], move |[x, y], n, store| {
            assert_eq!(store.get("x"), Some(x as f64 / n as f64));
            assert_eq!(store.get("y"), Some(y as f64 / n as f64));
            // Express every point on the finest grid.
            let scale = 64 / n;
            sink.borrow_mut().push((x * scale, y * scale));
        })
        .unwrap()
        .await;

    let mut points = points.borrow().clone();
    let total = points.len();
    points.sort_unstable();
    points.dedup();
    assert_eq!(points.len(), total);
    assert_eq!(total, 64 * 64);
}

#[tokio::test]
async fn scan2_restores_variables_after_every_round() {
    let variables = VariableStore::default().shared();
    variables.borrow_mut().set("x", 0.3).unwrap();
    variables.borrow_mut().set("y", -2.0).unwrap();
    let scanner = Scanner::new(Rc::clone(&variables));

    let last_resolution = Rc::new(RefCell::new(None));
    let seen = Rc::clone(&last_resolution);
    let watcher = Rc::clone(&variables);
    let mut scan: BoxedScan = Box::pin(
        scanner
            .scan2(["x", "y"], [ScanRange::new(1.0, 2.0); 2], move |_, n, _| {
                *seen.borrow_mut() = Some(n);
            })
            .unwrap(),
    );

    while poll_once(&mut scan).is_pending() {
        if last_resolution.borrow().is_some() {
            let store = watcher.borrow();
            assert_eq!(store.get("x"), Some(0.3));
            assert_eq!(store.get("y"), Some(-2.0));
        }
    }
    assert_eq!(variables.borrow().get("x"), Some(0.3));
    assert_eq!(variables.borrow().get("y"), Some(-2.0));
}

#[test]
fn a_newer_scan_supersedes_one_in_flight() {
    let scanner = Scanner::new(VariableStore::default().shared());
    let (b_counts, b_callback) = tally();
    let b_callback = RefCell::new(Some(b_callback));
    let scan_b: Rc<RefCell<Option<BoxedScan>>> = Rc::new(RefCell::new(None));

    let a_counts = Rc::new(RefCell::new(BTreeMap::new()));
    let a_sink = Rc::clone(&a_counts);
    let starter = scanner.clone();
    let slot = Rc::clone(&scan_b);
    let scan_a = scanner
        .scan2(["x", "y"], [ScanRange::default(); 2], move |_, n, _| {
            *a_sink.borrow_mut().entry(n).or_insert(0) += 1;
            if n == 32 {
                if let Some(callback) = b_callback.borrow_mut().take() {
                    let scan = starter
                        .scan2(["x", "y"], [ScanRange::default(); 2], callback)
                        .unwrap();
                    *slot.borrow_mut() = Some(Box::pin(scan));
                }
            }
        })
        .unwrap();

    // The round that was running when B started still finishes.
    assert_eq!(
        drive(Box::pin(scan_a)),
        ScanOutcome::Superseded {
            rounds_completed: 2
        }
    );
    assert_eq!(*a_counts.borrow(), BTreeMap::from([(16, 256), (32, 768)]));

    let scan_b = scan_b.borrow_mut().take().unwrap();
    assert_eq!(drive(scan_b), ScanOutcome::Completed { rounds: 3 });
    assert_eq!(
        *b_counts.borrow(),
        BTreeMap::from([(16, 256), (32, 768), (64, 3072)])
    );
}

#[test]
fn starting_a_scan_supersedes_an_unpolled_one() {
    let scanner = Scanner::new(VariableStore::default().shared());
    let (a_counts, a_callback) = tally();
    let scan_a = scanner
        .scan2(["x", "y"], [ScanRange::default(); 2], a_callback)
        .unwrap();
    let scan_b = scanner
        .scan2(["x", "y"], [ScanRange::default(); 2], |_, _, _| {})
        .unwrap();

    assert_eq!(
        drive(Box::pin(scan_a)),
        ScanOutcome::Superseded {
            rounds_completed: 0
        }
    );
    assert!(a_counts.borrow().is_empty());
    assert_eq!(drive(Box::pin(scan_b)), ScanOutcome::Completed { rounds: 3 });
}

#[test]
fn cancel_supersedes_without_starting_a_scan() {
    let scanner = Scanner::new(VariableStore::default().shared());
    let before = scanner.generation();
    let mut scan: BoxedScan = Box::pin(
        scanner
            .scan2(["x", "y"], [ScanRange::default(); 2], |_, _, _| {})
            .unwrap(),
    );
    assert_eq!(scanner.generation(), before + 1);

    assert!(poll_once(&mut scan).is_pending());
    assert!(poll_once(&mut scan).is_pending());
    scanner.cancel();
    assert_eq!(
        drive(scan),
        ScanOutcome::Superseded {
            rounds_completed: 1
        }
    );
}

#[tokio::test]
async fn custom_config_controls_rounds() {
    let config = ScanConfig {
        steps: 8,
        start_resolution: 4,
        max_resolution: 8,
    };
    let scanner = Scanner::with_config(VariableStore::default().shared(), config).unwrap();
    let (counts, callback) = tally();
    let outcome = scanner
        .scan2(["x", "y"], [ScanRange::default(); 2], callback)
        .unwrap()
        .await;
    assert_eq!(outcome, ScanOutcome::Completed { rounds: 2 });
    assert_eq!(*counts.borrow(), BTreeMap::from([(4, 16), (8, 48)]));
}
