//! End-to-end scenarios for the proof pass, driven from TrueJ source text

use super::{prove_classes, ProofOptions};
use crate::ast::try_parse;
use crate::kb::solve::Budget;
use crate::report::Reports;
use crate::scope::resolve;
use crate::tokens::tokenize;

/// Runs the whole pipeline, returning the collected error messages (with
/// their component) and the prover transcript
fn run_with(src: &str, options: &ProofOptions) -> (Vec<(String, String)>, String) {
    let tokens = tokenize(src);
    assert!(
        crate::tokens::collect_invalid(&tokens).is_empty(),
        "invalid tokens in test source"
    );
    let classes = try_parse(&tokens).unwrap_or_else(|e| panic!("parse error: {}", e.message));
    let mut reports = Reports::new();
    let scopes = resolve(&classes, &mut reports);
    let transcript = prove_classes(&classes, &tokens, src, &scopes, options, &mut reports)
        .unwrap_or_else(|f| panic!("fatal: {}", f.message));
    let messages = reports
        .records()
        .iter()
        .map(|r| (r.component.to_string(), r.message.clone()))
        .collect();
    (messages, transcript)
}

fn run(src: &str) -> (Vec<(String, String)>, String) {
    run_with(src, &ProofOptions::default())
}

fn assert_verifies(src: &str) -> String {
    let (messages, transcript) = run(src);
    assert!(messages.is_empty(), "unexpected errors: {:#?}", messages);
    transcript
}

#[test]
fn block_meaning_from_statements() {
    // The method's meaning is carried entirely by its statements; the
    // class-level means-statement must follow from them.
    let transcript = assert_verifies(
        "class BlockMeaning1 {
            int a, b, startingA;
            void swap() {
                startingA' = 'a;
                a' = 'b;
                b' = startingA';
            }
            means(startingA' = 'a & a' = 'b & b' = startingA');
        }",
    );

    // The transcript is the stream the prover saw: translated names and
    // operators, statements collapsed to formulas
    assert!(transcript.contains("'this.startingA^' = ('this.^a')"));
    assert!(transcript.contains("'this.a^' = ('this.^b')"));
    assert!(transcript.contains("/\\"));
}

#[test]
fn block_meaning_via_means_statement() {
    assert_verifies(
        "class BlockMeaning2 {
            int a, b;
            void swap() {
                int startingA' = 'a;
                a' = 'b;
                b' = startingA';
                means(a' = 'b & b' = 'a);
            }
        }",
    );
}

#[test]
fn means_quenches_prior_conjuncts() {
    // The first means-statement supplants what came before it; the second
    // claim's failing conjunct is blamed in its original spelling.
    let (messages, _) = run(
        "class BlockMeaning3 {
            int aa, a, b;
            void m() {
                a' = 'aa;
                means(a' = 'aa);
                b' = 'a;
                means(b' = 'a & b' = 'aa);
            }
        }",
    );

    let prover: Vec<&(String, String)> =
        messages.iter().filter(|(c, _)| c == "Prover").collect();
    assert_eq!(prover.len(), 1, "expected one prover error: {:#?}", messages);
    assert_eq!(
        prover[0].1,
        "The code does not support the proof of the statement: b' = 'aa"
    );
}

#[test]
fn value_name_needed_on_both_branches() {
    // `rate'` exists only on the then-branch, so the context pass refuses
    // the method, and the prover cannot support the method's claim either.
    let (messages, _) = run(
        "class Rates_1X {
            int rate, reportRate;
            void report(int premium) {
                if ('premium > 100) {
                    rate' = 2;
                }
                reportRate' = rate';
            }
            means(reportRate' = 2);
        }",
    );

    assert!(
        messages.iter().any(|(c, m)| c == "ContextCheck"
            && m == "value name rate' is not defined for the else-branch of the if statement"),
        "missing context error: {:#?}",
        messages
    );
    assert!(
        messages
            .iter()
            .any(|(c, m)| c == "Prover" && m.contains("does not support the proof")),
        "the proof pass accepted the means-statement: {:#?}",
        messages
    );
}

#[test]
fn explicit_noop_else_makes_the_order_provable() {
    assert_verifies(
        "class Pair_2 {
            int a, b;
            void sort() {
                if ('a > 'b) {
                    int t' = 'a;
                    a' = 'b;
                    b' = t';
                } else {
                    a' = 'a;
                    b' = 'b;
                }
                means(a' <= b');
            }
        }",
    );
}

#[test]
fn three_sort_verifies_case_by_case() {
    // Each leaf's means-statement is entailed by the guards on its path;
    // the method-level claim follows from the assembled if-meaning.
    assert_verifies(
        "class Triplet {
            int a, b, c;
            void threeSort() {
                if ('a <= 'b) {
                    if ('b <= 'c) {
                        a' = 'a; b' = 'b; c' = 'c;
                        means(a' <= b' & b' <= c');
                    } else if ('a <= 'c) {
                        a' = 'a; b' = 'c; c' = 'b;
                        means(a' <= b' & b' <= c');
                    } else {
                        a' = 'c; b' = 'a; c' = 'b;
                        means(a' <= b' & b' <= c');
                    }
                } else if ('a <= 'c) {
                    a' = 'b; b' = 'a; c' = 'c;
                    means(a' <= b' & b' <= c');
                } else if ('b <= 'c) {
                    a' = 'b; b' = 'c; c' = 'a;
                    means(a' <= b' & b' <= c');
                } else {
                    a' = 'c; b' = 'b; c' = 'a;
                    means(a' <= b' & b' <= c');
                }
                means(a' <= b' & b' <= c');
            }
        }",
    );
}

#[test]
fn duplicated_trailing_means_is_idempotent() {
    // Restating the proven summary verbatim must verify again: the first
    // means left exactly itself in the knowledge base.
    assert_verifies(
        "class BlockMeaning2a {
            int a, b;
            void swap() {
                int startingA' = 'a;
                a' = 'b;
                b' = startingA';
                means(a' = 'b & b' = 'a);
                means(a' = 'b & b' = 'a);
            }
        }",
    );
}

#[test]
fn branch_symmetry_with_negated_condition() {
    // Swapping the branches and negating the condition leaves the claim
    // provable
    assert_verifies(
        "class Pair_2R {
            int a, b;
            void sort() {
                if (!('a > 'b)) {
                    a' = 'a;
                    b' = 'b;
                } else {
                    int t' = 'a;
                    a' = 'b;
                    b' = t';
                }
                means(a' <= b');
            }
        }",
    );
}

#[test]
fn boolean_operands_lift_equality() {
    let transcript = assert_verifies(
        "class Flags {
            boolean f, g;
            void copy() {
                f' = true;
                g' = f';
                means(g' = true);
            }
        }",
    );

    // Boolean assignment and the boolean claim both use the equivalence
    // spelling, not arithmetic equality
    assert!(transcript.contains("'this.f^'===(true)"), "{}", transcript);
    assert!(transcript.contains("'this.g^' === true"), "{}", transcript);
}

#[test]
fn integer_operands_keep_arithmetic_equality() {
    let transcript = assert_verifies(
        "class Counter {
            int n;
            void bump() {
                n' = 'n + 1;
                means(n' > 'n);
            }
        }",
    );
    assert!(transcript.contains("'this.n^' = (('this.^n' + 1))"), "{}", transcript);
}

#[test]
fn return_translation_follows_the_compatibility_switch() {
    let src = "class Id {
        int n;
        int value() {
            return 'n;
        }
        means(return' = 'n);
    }";

    // Default: both the decorated and the undecorated name are asserted
    let (messages, transcript) = run(src);
    assert!(messages.is_empty(), "{:#?}", messages);
    assert!(transcript.contains("('return^' = 'this.^n')"));
    assert!(transcript.contains("(return = 'this.^n')"));

    // With the switch on, only the decorated form remains
    let strict = ProofOptions {
        require_decorated_final_value: true,
        ..ProofOptions::default()
    };
    let (messages, transcript) = run_with(src, &strict);
    assert!(messages.is_empty(), "{:#?}", messages);
    assert!(transcript.contains("('return^' = 'this.^n')"));
    assert!(!transcript.contains("(return = 'this.^n')"));
}

#[test]
fn empty_and_while_statements_translate() {
    // The loop keeps its partial-correctness face `(c /\ body)`; the claim
    // below only needs the guard, so it is provable even without invariants
    let transcript = assert_verifies(
        "class Loops {
            int n;
            void spin(int bound) {
                ;
                while ('n < bound) {
                    n' = 'n + 1;
                    means(n' > 'n);
                }
            }
        }",
    );
    assert!(transcript.contains("< bound"), "{}", transcript);
    assert!(transcript.contains("/\\"), "{}", transcript);
}

#[test]
fn prover_limit_suggests_a_lemma() {
    let tight = ProofOptions {
        require_decorated_final_value: false,
        budget: Budget {
            max_cases: 1,
            max_steps: 30,
        },
    };
    let (messages, _) = run_with(
        "class Pair_2 {
            int a, b;
            void sort() {
                if ('a > 'b) {
                    int t' = 'a;
                    a' = 'b;
                    b' = t';
                } else {
                    a' = 'a;
                    b' = 'b;
                }
                means(a' <= b');
            }
        }",
        &tight,
    );

    assert!(
        messages.iter().any(|(c, m)| {
            c == "Prover"
                && m.starts_with(
                    "The prover reached an internal limit. Consider adding a lemma to help prove \
                     the statement: ",
                )
                && m.ends_with("a' <= b'")
        }),
        "expected a lemma suggestion: {:#?}",
        messages
    );
}

#[test]
fn conjunct_localization_blames_the_right_side() {
    // The full claim fails, the first conjunct alone is provable, so the
    // reported span lies inside the second conjunct.
    let (messages, _) = run(
        "class Partial {
            int a, b;
            void m() {
                a' = 1;
                b' = 'b;
                means(a' = 1 & b' = 2);
            }
        }",
    );
    let prover: Vec<&(String, String)> =
        messages.iter().filter(|(c, _)| c == "Prover").collect();
    assert_eq!(prover.len(), 1, "{:#?}", messages);
    assert_eq!(
        prover[0].1,
        "The code does not support the proof of the statement: b' = 2"
    );
}

#[test]
fn float_literals_gain_a_leading_zero() {
    let transcript = assert_verifies(
        "class Franc {
            double rate;
            void set() {
                rate' = .25;
                means(rate' = .25);
            }
        }",
    );
    assert!(transcript.contains("0.25"), "{}", transcript);
    assert!(!transcript.contains("(.25"), "{}", transcript);
}

#[test]
fn line_comments_become_prover_comments_in_queries() {
    // The claim spans a line comment; the query must carry `%` instead of
    // `//`. The claim still verifies.
    let (messages, _) = run(
        "class Commented {
            int a;
            void m() {
                a' = 1;
                means(a' = // one
                      1);
            }
        }",
    );
    assert!(messages.is_empty(), "{:#?}", messages);
}

#[test]
fn multiple_methods_keep_independent_knowledge() {
    // The second method must not see the first method's assumptions
    let (messages, _) = run(
        "class Two {
            int a;
            void first() {
                a' = 1;
                means(a' = 1);
            }
            void second() {
                a' = 'a;
                means(a' = 1);
            }
        }",
    );
    let prover: Vec<&(String, String)> =
        messages.iter().filter(|(c, _)| c == "Prover").collect();
    assert_eq!(prover.len(), 1, "{:#?}", messages);
    assert!(prover[0].1.ends_with("a' = 1"));
}
