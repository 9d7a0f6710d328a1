//! Builtin library tests: output, coders, iteration, numerics, strings,
//! and containers.

mod common;

use common::*;
use rill_ast::Primary;
use rill_kernel::{Cause, Value};

// ============================================================================
// Output
// ============================================================================

#[test]
fn kind_of_names_every_kind() {
    let out = eval(ch(vec![p1(cmd(
        "kind-of",
        vec![
            w("bare"),
            w("str"),
            list(vec![]),
            map(vec![]),
            lam(vec![]),
        ],
    ))]));
    out.ok();
    assert_eq!(out.values, strs(&["string", "string", "list", "map", "fn"]));
}

#[test]
fn put_emits_values() {
    let out = eval(ch(vec![p1(cmd("put", vec![w("foo"), w("bar")]))]));
    out.ok();
    assert_eq!(out.values, strs(&["foo", "bar"]));
}

#[test]
fn explode_emits_list_elements() {
    let out = eval(ch(vec![p1(cmd(
        "explode",
        vec![list(vec![w("foo"), w("bar")])],
    ))]));
    out.ok();
    assert_eq!(out.values, strs(&["foo", "bar"]));
}

#[test]
fn print_writes_reprs_without_newline() {
    let out = eval(ch(vec![p1(cmd(
        "print",
        vec![list(vec![w("foo"), w("bar")])],
    ))]));
    out.ok();
    assert_eq!(out.text(), "[foo bar]");
}

#[test]
fn echo_terminates_with_newline() {
    let out = eval(ch(vec![p1(cmd(
        "echo",
        vec![list(vec![w("foo"), w("bar")])],
    ))]));
    out.ok();
    assert_eq!(out.text(), "[foo bar]\n");
}

#[test]
fn pprint_indents_containers() {
    let out = eval(ch(vec![p1(cmd(
        "pprint",
        vec![list(vec![w("foo"), w("bar")])],
    ))]));
    out.ok();
    assert_eq!(out.text(), "[\n foo\n bar\n]\n");
}

// ============================================================================
// Coders
// ============================================================================

#[test]
fn slurp_joins_byte_input() {
    let out = eval(ch(vec![pl(vec![
        cmd("print", vec![w("a\nb")]),
        cmd("slurp", vec![]),
    ])]));
    out.ok();
    assert_eq!(out.values, strs(&["a\nb"]));
}

#[test]
fn from_lines_splits_byte_input() {
    let out = eval(ch(vec![pl(vec![
        cmd("print", vec![w("a\nb")]),
        cmd("from-lines", vec![]),
    ])]));
    out.ok();
    assert_eq!(out.values, strs(&["a", "b"]));
}

#[test]
fn from_lines_suppresses_trailing_newline() {
    let out = eval(ch(vec![pl(vec![
        cmd("print", vec![w("a\nb\n")]),
        cmd("from-lines", vec![]),
    ])]));
    out.ok();
    assert_eq!(out.values, strs(&["a", "b"]));
}

#[test]
fn from_json_decodes_documents() {
    let out = eval(ch(vec![pl(vec![
        cmd("echo", vec![w(r#"{"k": "v", "a": [1, 2]}"#), w(r#""foo""#)]),
        cmd("from-json", vec![]),
    ])]));
    out.ok();
    assert_eq!(
        out.values,
        vec![
            Value::map([
                (Value::str("k"), Value::str("v")),
                (Value::str("a"), Value::list(strs(&["1", "2"]))),
            ]),
            Value::str("foo"),
        ]
    );
}

#[test]
fn from_json_rejects_garbage() {
    let out = eval(ch(vec![pl(vec![
        cmd("echo", vec![w("invalid")]),
        cmd("from-json", vec![]),
    ])]));
    assert!(matches!(out.result.unwrap_err().cause, Cause::Json(_)));
}

#[test]
fn to_lines_writes_one_value_per_line() {
    let out = eval(ch(vec![pl(vec![
        cmd("put", vec![w("l\norem"), w("ipsum")]),
        cmd("to-lines", vec![]),
    ])]));
    out.ok();
    assert_eq!(out.text(), "l\norem\nipsum\n");
}

#[test]
fn to_json_encodes_documents_sorted() {
    let out = eval(ch(vec![pl(vec![
        cmd(
            "put",
            vec![
                map(vec![
                    (w("k"), w("v")),
                    (w("a"), list(vec![w("1"), w("2")])),
                ]),
                w("foo"),
            ],
        ),
        cmd("to-json", vec![]),
    ])]));
    out.ok();
    assert_eq!(out.text(), "{\"a\":[\"1\",\"2\"],\"k\":\"v\"}\n\"foo\"\n");
}

#[test]
fn json_round_trip_is_structural_identity() {
    let out = eval(ch(vec![pl(vec![
        cmd(
            "put",
            vec![map(vec![
                (w("k"), list(vec![w("x"), w("y")])),
                (w("b"), w("true")),
            ])],
        ),
        cmd("to-json", vec![]),
        cmd("from-json", vec![]),
    ])]));
    out.ok();
    assert_eq!(
        out.values,
        vec![Value::map([
            (Value::str("k"), Value::list(strs(&["x", "y"]))),
            (Value::str("b"), Value::str("true")),
        ])]
    );
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn joins_with_separator() {
    let out = eval(ch(vec![p1(cmd(
        "joins",
        vec![w(":"), list(vec![w("/usr"), w("/bin"), w("/tmp")])],
    ))]));
    out.ok();
    assert_eq!(out.values, strs(&["/usr:/bin:/tmp"]));
}

#[test]
fn splits_on_separator() {
    let out = eval(ch(vec![p1(cmd(
        "splits",
        vec![w(":"), w("/usr:/bin:/tmp")],
    ))]));
    out.ok();
    assert_eq!(out.values, strs(&["/usr", "/bin", "/tmp"]));
}

#[test]
fn splits_is_right_inverse_of_joins() {
    let out = eval(ch(vec![p1(cmd(
        "splits",
        vec![
            w("\n"),
            ocap(vec![p1(cmd(
                "joins",
                vec![w("\n"), list(vec![w("a"), w("b"), w("c")])],
            ))]),
        ],
    ))]));
    out.ok();
    assert_eq!(out.values, strs(&["a", "b", "c"]));
}

#[test]
fn replaces_all_occurrences() {
    let out = eval(ch(vec![p1(cmd(
        "replaces",
        vec![w(":"), w("/"), w(":usr:bin:tmp")],
    ))]));
    out.ok();
    assert_eq!(out.values, strs(&["/usr/bin/tmp"]));
}

#[test]
fn replaces_with_max() {
    let out = eval(ch(vec![p1(cmdo(
        "replaces",
        vec![w(":"), w("/"), w(":usr:bin:tmp")],
        vec![("max", w("2"))],
    ))]));
    out.ok();
    assert_eq!(out.values, strs(&["/usr/bin:tmp"]));
}

#[test]
fn prefix_and_suffix_tests() {
    let out = eval(ch(vec![
        p1(cmd("has-prefix", vec![w("golang"), w("go")])),
        p1(cmd("has-prefix", vec![w("golang"), w("x")])),
        p1(cmd("has-suffix", vec![w("golang"), w("x")])),
    ]));
    out.ok();
    assert_eq!(out.values, bools(&[true, false, false]));
}

#[test]
fn string_equality_is_textual() {
    let out = eval(ch(vec![
        p1(cmd("==s", vec![w("haha"), w("haha")])),
        p1(cmd("==s", vec![w("10"), w("10.0")])),
    ]));
    out.ok();
    assert_eq!(out.values, bools(&[true, false]));
}

#[test]
fn string_ordering_is_lexicographic() {
    let out = eval(ch(vec![
        p1(cmd("<s", vec![w("a"), w("b")])),
        p1(cmd("<s", vec![w("2"), w("10")])),
    ]));
    out.ok();
    assert_eq!(out.values, bools(&[true, false]));
}

#[test]
fn ord_emits_code_points() {
    let out = eval(ch(vec![p1(cmd("ord", vec![w("a")]))]));
    out.ok();
    assert_eq!(out.values, strs(&["0x61"]));
}

#[test]
fn base_formats_in_radix() {
    let out = eval(ch(vec![p1(cmd("base", vec![w("16"), w("42"), w("233")]))]));
    out.ok();
    assert_eq!(out.values, strs(&["2a", "e9"]));
}

#[test]
fn wcswidth_counts_display_columns() {
    let out = eval(ch(vec![p1(cmd("wcswidth", vec![w("你好")]))]));
    out.ok();
    assert_eq!(out.values, strs(&["4"]));
}

#[test]
fn path_base_takes_final_component() {
    let out = eval(ch(vec![p1(cmd("path-base", vec![w("a/b/c.png")]))]));
    out.ok();
    assert_eq!(out.values, strs(&["c.png"]));
}

// ============================================================================
// Containers
// ============================================================================

#[test]
fn keys_of_empty_map_is_nothing() {
    let out = eval(ch(vec![p1(cmd("keys", vec![map(vec![])]))]));
    out.ok();
    assert!(out.values.is_empty());
}

#[test]
fn keys_of_map() {
    let out = eval(ch(vec![p1(cmd("keys", vec![map(vec![(w("a"), w("foo"))])]))]));
    out.ok();
    assert_eq!(out.values, strs(&["a"]));
}

#[test]
fn has_key_on_lists_and_maps() {
    let out = eval(ch(vec![
        p1(cmd("has-key", vec![list(vec![w("foo"), w("bar")]), w("0")])),
        p1(cmd("has-key", vec![list(vec![w("foo"), w("bar")]), w("0:1")])),
        p1(cmd("has-key", vec![list(vec![w("foo"), w("bar")]), w("0:20")])),
        p1(cmd(
            "has-key",
            vec![map(vec![(w("lorem"), w("ipsum")), (w("foo"), w("bar"))]), w("lorem")],
        )),
        p1(cmd(
            "has-key",
            vec![map(vec![(w("lorem"), w("ipsum")), (w("foo"), w("bar"))]), w("loremwsq")],
        )),
    ]));
    out.ok();
    assert_eq!(out.values, bools(&[true, true, false, true, false]));
}

#[test]
fn has_value_on_maps_lists_strings() {
    let m = || map(vec![(w("lorem"), w("ipsum")), (w("foo"), w("bar"))]);
    let out = eval(ch(vec![
        p1(cmd("has-value", vec![m(), w("lorem")])),
        p1(cmd("has-value", vec![m(), w("bar")])),
        p1(cmd("has-value", vec![list(vec![w("foo"), w("bar")]), w("bar")])),
        p1(cmd("has-value", vec![list(vec![w("foo"), w("bar")]), w("badehose")])),
        p1(cmd("has-value", vec![w("foo"), w("o")])),
        p1(cmd("has-value", vec![w("foo"), w("d")])),
    ]));
    out.ok();
    assert_eq!(out.values, bools(&[false, true, true, false, true, false]));
}

#[test]
fn assoc_is_functional_update() {
    let out = eval(ch(vec![
        p1(cmd(
            "put",
            vec![pidx(
                Primary::OutputCapture(ch(vec![p1(cmd(
                    "assoc",
                    vec![list(vec![w("0")]), w("0"), w("zero")],
                ))])),
                vec![w("0")],
            )],
        )),
        p1(cmd(
            "put",
            vec![pidx(
                Primary::OutputCapture(ch(vec![p1(cmd(
                    "assoc",
                    vec![map(vec![]), w("k"), w("v")],
                ))])),
                vec![w("k")],
            )],
        )),
        p1(cmd(
            "put",
            vec![pidx(
                Primary::OutputCapture(ch(vec![p1(cmd(
                    "assoc",
                    vec![map(vec![(w("k"), w("v"))]), w("k"), w("v2")],
                ))])),
                vec![w("k")],
            )],
        )),
    ]));
    out.ok();
    assert_eq!(out.values, strs(&["zero", "v", "v2"]));
}

#[test]
fn dissoc_removes_the_key() {
    let out = eval(ch(vec![p1(cmd(
        "has-key",
        vec![
            ocap(vec![p1(cmd(
                "dissoc",
                vec![map(vec![(w("k"), w("v"))]), w("k")],
            ))]),
            w("k"),
        ],
    ))]));
    out.ok();
    assert_eq!(out.values, bools(&[false]));
}

// ============================================================================
// Identity and equality
// ============================================================================

#[test]
fn is_compares_identity() {
    let out = eval(ch(vec![
        p1(cmd("is", vec![w("1"), w("1")])),
        p1(cmd("is", vec![list(vec![]), list(vec![])])),
        p1(cmd("is", vec![list(vec![w("1")]), list(vec![w("1")])])),
    ]));
    out.ok();
    assert_eq!(out.values, bools(&[true, true, false]));
}

#[test]
fn eq_compares_structure() {
    let out = eval(ch(vec![
        p1(cmd("eq", vec![w("1"), w("1")])),
        p1(cmd("eq", vec![list(vec![]), list(vec![])])),
        p1(cmd("eq", vec![list(vec![w("1")]), list(vec![w("1")])])),
    ]));
    out.ok();
    assert_eq!(out.values, bools(&[true, true, true]));
}

// ============================================================================
// Numbers
// ============================================================================

#[test]
fn arithmetic_builtins() {
    let out = eval(ch(vec![
        p1(cmd("+", vec![w("120000"), w("345")])),
        p1(cmd("-", vec![w("120345"), w("345")])),
        p1(cmd("-", vec![w("42")])),
        p1(cmd("*", vec![w("351"), w("41")])),
        p1(cmd("/", vec![w("14391"), w("41")])),
        p1(cmd("/", vec![w("1"), w("0")])),
        p1(cmd("^", vec![w("16"), w("2")])),
        p1(cmd("%", vec![w("23"), w("7")])),
    ]));
    out.ok();
    assert_eq!(
        out.values,
        strs(&["120345", "120000", "-42", "14391", "351", "+Inf", "256", "2"])
    );
}

#[test]
fn numeric_equality_parses_forms() {
    let out = eval(ch(vec![
        p1(cmd("==", vec![w("1"), w("1.0")])),
        p1(cmd("==", vec![w("10"), w("0xa")])),
    ]));
    out.ok();
    assert_eq!(out.values, bools(&[true, true]));
}

#[test]
fn numeric_equality_rejects_non_numbers() {
    let out = eval(ch(vec![p1(cmd("==", vec![w("a"), w("a")]))]));
    assert!(matches!(out.result.unwrap_err().cause, Cause::ArgKind(_)));
}

#[test]
fn numeric_comparison_accepts_hex() {
    let out = eval(ch(vec![p1(cmd(">", vec![w("0x10"), w("1")]))]));
    out.ok();
    assert_eq!(out.values, bools(&[true]));
}

// ============================================================================
// Iteration
// ============================================================================

#[test]
fn each_resolves_function_names() {
    let out = eval(ch(vec![pl(vec![
        cmd("put", vec![w("1"), w("42")]),
        cmd("each", vec![w("put")]),
    ])]));
    out.ok();
    assert_eq!(out.values, strs(&["1", "42"]));
}

#[test]
fn each_iterates_byte_lines() {
    let out = eval(ch(vec![pl(vec![
        cmd("echo", vec![w("1\n42")]),
        cmd("each", vec![w("put")]),
    ])]));
    out.ok();
    assert_eq!(out.values, strs(&["1", "42"]));
}

#[test]
fn each_iterates_explicit_list() {
    let out = eval(ch(vec![p1(cmd(
        "each",
        vec![w("put"), list(vec![w("1"), w("42")])],
    ))]));
    out.ok();
    assert_eq!(out.values, strs(&["1", "42"]));
}

#[test]
fn break_stops_each() {
    let out = eval(ch(vec![pl(vec![
        cmd("range", vec![w("10")]),
        cmd(
            "each",
            vec![lamp(
                vec!["x"],
                vec![
                    p1(if_form(
                        vec![(
                            ocap(vec![p1(cmd("==", vec![v("x"), w("4")]))]),
                            vec![p1(cmd("break", vec![]))],
                        )],
                        None,
                    )),
                    p1(cmd("put", vec![v("x")])),
                ],
            )],
        ),
    ])]));
    out.ok();
    assert_eq!(out.values, strs(&["0", "1", "2", "3"]));
}

#[test]
fn fail_in_each_propagates() {
    let out = eval(ch(vec![pl(vec![
        cmd("range", vec![w("10")]),
        cmd(
            "each",
            vec![lamp(
                vec!["x"],
                vec![
                    p1(if_form(
                        vec![(
                            ocap(vec![p1(cmd("==", vec![v("x"), w("4")]))]),
                            vec![p1(cmd("fail", vec![w("haha")]))],
                        )],
                        None,
                    )),
                    p1(cmd("put", vec![v("x")])),
                ],
            )],
        ),
    ])]));
    assert_eq!(out.values, strs(&["0", "1", "2", "3"]));
    assert!(matches!(out.result.unwrap_err().cause, Cause::Fail(_)));
}

#[test]
fn repeat_emits_copies() {
    let out = eval(ch(vec![p1(cmd("repeat", vec![w("4"), w("foo")]))]));
    out.ok();
    assert_eq!(out.values, strs(&["foo", "foo", "foo", "foo"]));
}

#[test]
fn constantly_returns_a_callable() {
    let out = eval(ch(vec![
        p1(set("f", ocap(vec![p1(cmd("constantly", vec![w("foo")]))]))),
        p1(cmdc(v("f"), vec![])),
        p1(cmdc(v("f"), vec![])),
    ]));
    out.ok();
    assert_eq!(out.values, strs(&["foo", "foo"]));
}

#[test]
fn constantly_result_rejects_arguments() {
    let out = eval(ch(vec![p1(cmdc(
        ocap(vec![p1(cmd("constantly", vec![w("foo")]))]),
        vec![w("bad")],
    ))]));
    assert!(matches!(out.result.unwrap_err().cause, Cause::Arity(_)));
}

#[test]
fn range_variants() {
    let out = eval(ch(vec![
        p1(cmd("range", vec![w("3")])),
        p1(cmd("range", vec![w("1"), w("3")])),
        p1(cmdo("range", vec![w("0"), w("10")], vec![("step", w("3"))])),
    ]));
    out.ok();
    assert_eq!(
        out.values,
        strs(&["0", "1", "2", "1", "2", "0", "3", "6", "9"])
    );
}

#[test]
fn all_passes_values_through() {
    let out = eval(ch(vec![pl(vec![
        cmd("put", vec![w("foo"), w("bar")]),
        cmd("all", vec![]),
    ])]));
    out.ok();
    assert_eq!(out.values, strs(&["foo", "bar"]));
}

#[test]
fn all_passes_bytes_through() {
    let out = eval(ch(vec![pl(vec![
        cmd("echo", vec![w("foobar")]),
        cmd("all", vec![]),
    ])]));
    out.ok();
    assert_eq!(out.text(), "foobar\n");
}

#[test]
fn all_passes_hybrid_streams_through() {
    let out = eval(ch(vec![pl(vec![
        cmdc(
            lam(vec![
                p1(cmd("put", vec![w("foo"), w("bar")])),
                p1(cmd("echo", vec![w("foobar")])),
            ]),
            vec![],
        ),
        cmd("all", vec![]),
    ])]));
    out.ok();
    assert_eq!(out.values, strs(&["foo", "bar"]));
    assert_eq!(out.text(), "foobar\n");
}

#[test]
fn take_stops_early() {
    let out = eval(ch(vec![pl(vec![
        cmd("range", vec![w("100")]),
        cmd("take", vec![w("2")]),
    ])]));
    out.ok();
    assert_eq!(out.values, strs(&["0", "1"]));
}

#[test]
fn drop_skips_prefix() {
    let out = eval(ch(vec![pl(vec![
        cmd("range", vec![w("100")]),
        cmd("drop", vec![w("98")]),
    ])]));
    out.ok();
    assert_eq!(out.values, strs(&["98", "99"]));
}

#[test]
fn count_input_stream() {
    let out = eval(ch(vec![pl(vec![
        cmd("range", vec![w("100")]),
        cmd("count", vec![]),
    ])]));
    out.ok();
    assert_eq!(out.values, strs(&["100"]));
}

#[test]
fn count_explicit_list() {
    let out = eval(ch(vec![p1(cmd(
        "count",
        vec![list(vec![ocap(vec![p1(cmd("range", vec![w("100")]))])])],
    ))]));
    out.ok();
    assert_eq!(out.values, strs(&["100"]));
}

// ============================================================================
// Failure builtins
// ============================================================================

#[test]
fn fail_raises_user_failure() {
    let out = eval(ch(vec![p1(cmd("fail", vec![w("haha")]))]));
    assert_eq!(out.result.unwrap_err().cause, Cause::Fail("haha".into()));
}

#[test]
fn return_outside_closure_reaches_top() {
    let out = eval(ch(vec![p1(cmd("return", vec![]))]));
    assert_eq!(out.result.unwrap_err().cause, Cause::Return);
}

#[test]
fn bool_reports_truthiness() {
    let out = eval(ch(vec![
        p1(cmd("bool", vec![v("true")])),
        p1(cmd("bool", vec![v("false")])),
        p1(cmd("bool", vec![w("anything")])),
    ]));
    out.ok();
    assert_eq!(out.values, bools(&[true, false, true]));
}
