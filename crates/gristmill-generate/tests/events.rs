use std::collections::HashMap;

use gristmill_core::{indices, Computation, EvalSeq, Factor, Index, Range, Term};
use gristmill_generate::{
    form_events, generate, replay, ComputationContext, ContextBuilder, ContextError, Event,
    EventLog, GenerateError, Printer, ScheduleError, ScheduleOptions, TermContext,
};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn idx(names: &[&str]) -> Vec<Index> {
    indices(&Range::zero_to("R", "n"), names)
}

fn f(base: &str, names: &[&str]) -> Factor {
    Factor::new(base, idx(names))
}

/// I1 = X Y, I2 = Y X, I3 = tr(I1), R1 = I1 I3 + I2, R2 = 2 I1.
fn reference_seq() -> EvalSeq {
    let matmul = |p: &str, q: &str| {
        Term::product(vec![f(p, &["a", "c"]), f(q, &["c", "b"])]).summed(idx(&["c"]))
    };
    let i1 = Computation::new("I1", idx(&["a", "b"]))
        .with_term(matmul("X", "Y"))
        .intermediate();
    let i2 = Computation::new("I2", idx(&["a", "b"]))
        .with_term(matmul("Y", "X"))
        .intermediate();
    let i3 = Computation::new("I3", vec![])
        .with_term(Term::product(vec![f("I1", &["a", "a"])]).summed(idx(&["a"])))
        .intermediate();
    let r1 = Computation::new("R1", idx(&["a", "b"])).with_terms([
        Term::product(vec![f("I1", &["a", "b"]), f("I3", &[])]),
        Term::product(vec![f("I2", &["a", "b"])]),
    ]);
    let r2 = Computation::new("R2", idx(&["a", "b"]))
        .with_term(Term::product(vec![f("I1", &["a", "b"])]).with_coefficient("2", "1"));
    EvalSeq::new(vec![i1, i2, i3, r1, r2]).unwrap()
}

fn shown(seq: &EvalSeq, events: &[Event]) -> Vec<String> {
    events.iter().map(|e| e.display(seq).to_string()).collect()
}

#[test]
fn test_reference_trace() {
    let seq = reference_seq();
    let events = form_events(&seq, &ScheduleOptions::default()).unwrap();
    assert_eq!(
        shown(&seq, &events),
        [
            "Declare(I1)",
            "Declare(I2)",
            "Declare(I3)",
            "BeginBody",
            "BeforeCompute(I1)",
            "ComputeTerm(I1, 0)",
            "BeforeCompute(I3)",
            "ComputeTerm(I3, 0)",
            "BeforeCompute(R1)",
            "ComputeTerm(R1, 0)",
            "OutOfUse(I3)",
            "BeforeCompute(R2)",
            "ComputeTerm(R2, 0)",
            "OutOfUse(I1)",
            "BeforeCompute(I2)",
            "ComputeTerm(I2, 0)",
            "ComputeTerm(R1, 1)",
            "OutOfUse(I2)",
            "EndBody",
        ]
    );
}

#[test]
fn test_event_log_replay() {
    let seq = reference_seq();
    let mut log = EventLog::new();
    generate(&seq, &ScheduleOptions::default(), &ContextBuilder::new(), &mut log).unwrap();
    assert_eq!(
        log.lines(),
        [
            "declare I1[a,b]",
            "declare I2[a,b]",
            "declare I3",
            "begin",
            "before I1",
            "I1[a,b] += 1/1 * sum(c) X[a,c] * Y[c,b]",
            "before I3",
            "I3 += 1/1 * sum(a) I1[a,a]",
            "before R1",
            "R1[a,b] += 1/1 * I1[a,b] * I3",
            "free I3",
            "before R2",
            "R2[a,b] += 2/1 * I1[a,b]",
            "free I1",
            "before I2",
            "I2[a,b] += 1/1 * sum(c) Y[a,c] * X[c,b]",
            "R1[a,b] += 1/1 * I2[a,b]",
            "free I2",
            "end",
        ]
    );
}

#[test]
fn test_cycle_emits_nothing() {
    let a = Computation::new("A", idx(&["a"])).with_term(Term::product(vec![f("B", &["a"])]));
    let b = Computation::new("B", idx(&["a"]))
        .with_term(Term::product(vec![f("A", &["a"])]))
        .intermediate();
    let seq = EvalSeq::new(vec![a, b]).unwrap();

    let err = form_events(&seq, &ScheduleOptions::default()).unwrap_err();
    assert_eq!(
        err,
        ScheduleError::Cycle {
            participants: vec!["A".into(), "B".into()]
        }
    );

    let mut log = EventLog::new();
    let err = generate(&seq, &ScheduleOptions::default(), &ContextBuilder::new(), &mut log)
        .unwrap_err();
    assert!(matches!(err, GenerateError::Schedule(ScheduleError::Cycle { .. })));
    assert!(log.lines().is_empty());
}

// ============================================================================
// Replay errors
// ============================================================================

#[test]
fn test_replay_rejects_bad_references() {
    let seq = reference_seq();
    let builder = ContextBuilder::new();

    let unknown = [Event::BeforeCompute { comp: 9 }];
    let err = replay(&seq, &unknown, &builder, &mut EventLog::new()).unwrap_err();
    assert!(matches!(err, GenerateError::UnknownComputation { comp: 9, len: 5 }));

    let err = replay(
        &seq,
        &[Event::ComputeTerm { comp: 0, term: 1 }],
        &builder,
        &mut EventLog::new(),
    )
    .unwrap_err();
    match err {
        GenerateError::Context(ContextError::TermOutOfRange { target, term, len }) => {
            assert_eq!(target.as_str(), "I1");
            assert_eq!((term, len), (1, 1));
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Fails on the first out-of-use marker.
#[derive(Default)]
struct NoFree {
    seen: usize,
}

impl Printer for NoFree {
    fn declare(&mut self, _: &ComputationContext) -> anyhow::Result<()> {
        self.seen += 1;
        Ok(())
    }
    fn begin_body(&mut self) -> anyhow::Result<()> {
        self.seen += 1;
        Ok(())
    }
    fn before_compute(&mut self, _: &ComputationContext) -> anyhow::Result<()> {
        self.seen += 1;
        Ok(())
    }
    fn compute_term(&mut self, _: &ComputationContext, _: &TermContext) -> anyhow::Result<()> {
        self.seen += 1;
        Ok(())
    }
    fn out_of_use(&mut self, ctx: &ComputationContext) -> anyhow::Result<()> {
        anyhow::bail!("cannot free {}", ctx.base)
    }
    fn end_body(&mut self) -> anyhow::Result<()> {
        self.seen += 1;
        Ok(())
    }
}

#[test]
fn test_printer_failure_names_the_event() {
    let seq = reference_seq();
    let mut printer = NoFree::default();
    let err = generate(&seq, &ScheduleOptions::default(), &ContextBuilder::new(), &mut printer)
        .unwrap_err();
    assert_eq!(err.to_string(), "printer failed at OutOfUse(I3)");
    let GenerateError::Printer { source, .. } = err else {
        panic!("expected a printer error");
    };
    assert_eq!(source.to_string(), "cannot free I3");
    assert_eq!(printer.seen, 10);
}

// ============================================================================
// Lifecycle properties over random sequences
// ============================================================================

/// A random acyclic sequence of vectors over `a`, listed in shuffled order
/// so that forward references occur.
fn random_seq(rng: &mut ChaCha8Rng) -> EvalSeq {
    let n = rng.random_range(2..10);
    let mut comps: Vec<Computation> = (0..n)
        .map(|k| {
            let n_terms = rng.random_range(1..4);
            let terms: Vec<Term> = (0..n_terms)
                .map(|_| {
                    let mut factors = vec![f("x", &["a"])];
                    for _ in 0..rng.random_range(0..3) {
                        if k > 0 {
                            let dep = rng.random_range(0..k);
                            factors.push(f(&format!("c{dep}"), &["a"]));
                        }
                    }
                    Term::product(factors)
                })
                .collect();
            let comp = Computation::new(format!("c{k}"), idx(&["a"])).with_terms(terms);
            if rng.random_bool(0.6) {
                comp.intermediate()
            } else {
                comp
            }
        })
        .collect();
    comps.shuffle(rng);
    EvalSeq::new(comps).unwrap()
}

fn check_lifecycle(seq: &EvalSeq, events: &[Event]) {
    let pos = |e: &Event| events.iter().position(|x| x == e);
    let begin = pos(&Event::BeginBody).unwrap();
    let end = pos(&Event::EndBody).unwrap();
    assert_eq!(events.iter().filter(|e| **e == Event::BeginBody).count(), 1);
    assert_eq!(events.iter().filter(|e| **e == Event::EndBody).count(), 1);
    assert_eq!(end, events.len() - 1);

    let mut declared = HashMap::new();
    let mut started = HashMap::new();
    let mut freed = HashMap::new();
    let mut computed: HashMap<(usize, usize), usize> = HashMap::new();
    for (i, e) in events.iter().enumerate() {
        match *e {
            Event::Declare { comp } => assert!(declared.insert(comp, i).is_none()),
            Event::BeforeCompute { comp } => assert!(started.insert(comp, i).is_none()),
            Event::ComputeTerm { comp, term } => {
                assert!(computed.insert((comp, term), i).is_none())
            }
            Event::OutOfUse { comp } => assert!(freed.insert(comp, i).is_none()),
            Event::BeginBody | Event::EndBody => {}
        }
    }

    for (c, comp) in seq.iter().enumerate() {
        assert_eq!(declared.contains_key(&c), comp.is_intermediate);
        assert!(declared.get(&c).map_or(true, |&d| d < begin));
        let start = started[&c];
        assert!(start > begin && start < end);

        let mut last = start;
        for t in 0..comp.terms.len() {
            let at = computed[&(c, t)];
            assert!(at > last, "terms of {} out of order", comp.base);
            last = at;

            for d in seq.term_dependencies(c, t) {
                let n = seq[d].terms.len();
                let done = if n == 0 { started[&d] } else { computed[&(d, n - 1)] };
                assert!(done < at, "{} read before it was complete", seq[d].base);
                if let Some(&free) = freed.get(&d) {
                    assert!(free > at, "{} read after it was freed", seq[d].base);
                }
            }
        }

        match freed.get(&c) {
            Some(&free) => {
                assert!(comp.is_intermediate);
                assert!(free > last);
            }
            None => assert!(!comp.is_intermediate, "{} never freed", comp.base),
        }
    }
    assert_eq!(freed.len(), seq.intermediate_count());
}

#[test]
fn test_random_sequences_keep_lifecycle_rules() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for _ in 0..50 {
        let seq = random_seq(&mut rng);
        let events = form_events(&seq, &ScheduleOptions::default()).unwrap();
        check_lifecycle(&seq, &events);
        assert_eq!(events, form_events(&seq, &ScheduleOptions::default()).unwrap());
    }
}
