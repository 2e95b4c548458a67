use gristmill_core::{indices, Computation, Expr, Factor, Phase, Range, Term};
use gristmill_generate::{ContextBuilder, IndexContext};

/// x[a,b] = 2r/(3s) u[b,a]**2 - 1/2 sum_c c**2 u[a,c] v[c,b]
fn colourful_tensor() -> Computation {
    let r = Range::zero_to("R", "n");
    let transpose = Term::product(vec![Factor::new("u", indices(&r, &["b", "a"])).pow(2)])
        .with_coefficient("2*r/3", "s");
    let contraction = Term::product(vec![
        Factor::new("u", indices(&r, &["a", "c"])),
        Factor::new("v", indices(&r, &["c", "b"])),
    ])
    .summed(indices(&r, &["c"]))
    .with_coefficient("1/2", "1")
    .with_other(Expr::with_deps("c**2", ["c"]))
    .negated();
    Computation::new("x", indices(&r, &["a", "b"])).with_terms([transpose, contraction])
}

fn check_range(ctx: &IndexContext, index: &str) {
    assert_eq!(ctx.index, index);
    assert_eq!(ctx.range, "R");
    assert_eq!(ctx.lower, "0");
    assert_eq!(ctx.upper, "n");
    assert_eq!(ctx.size, "n");
}

#[test]
fn test_context_with_mangled_names() {
    let builder = ContextBuilder::new().with_mangle(|base, n| format!("{base}{n}"));
    let ctx = builder.build(&colourful_tensor());

    assert_eq!(ctx.base, "x2");
    assert_eq!(ctx.name.as_str(), "x");
    assert!(!ctx.is_intermediate);
    for (i, j) in ctx.indices.iter().zip(["a", "b"]) {
        check_range(i, j);
    }

    assert_eq!(ctx.terms.len(), 2);
    let transpose = ctx.term(0).unwrap();
    assert!(transpose.sums.is_empty());
    assert_eq!(transpose.phase, Phase::Plus);
    assert_eq!(transpose.phase.to_string(), "+");
    assert_eq!(transpose.numerator, "2*r/3");
    assert_eq!(transpose.denominator, "s");
    assert_eq!(transpose.indexed_factors.len(), 1);
    let factor = &transpose.indexed_factors[0];
    assert_eq!(factor.base, "u2**2");
    for (i, j) in factor.indices.iter().zip(["b", "a"]) {
        check_range(i, j);
    }
    assert!(transpose.other_factors.is_empty());

    let contraction = ctx.term(1).unwrap();
    assert_eq!(contraction.sums.len(), 1);
    check_range(&contraction.sums[0], "c");
    assert_eq!(contraction.phase.to_string(), "-");
    assert_eq!(contraction.numerator, "1/2");
    assert_eq!(contraction.denominator, "1");
    let bases: Vec<&str> = contraction.indexed_factors.iter().map(|f| f.base.as_str()).collect();
    assert_eq!(bases, ["u2", "v2"]);
    for (i, j) in contraction.indexed_factors[1].indices.iter().zip(["c", "b"]) {
        check_range(i, j);
    }
    assert_eq!(contraction.other_factors, ["c**2"]);

    assert!(ctx.term(2).is_err());
}

#[test]
fn test_building_is_pure() {
    let builder = ContextBuilder::new();
    let comp = colourful_tensor();
    assert_eq!(builder.build(&comp), builder.build(&comp));
    assert_eq!(builder.build(&comp).base, "x");
}
