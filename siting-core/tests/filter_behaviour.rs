//! Behaviour tests for filter token compilation.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use siting_core::{
    Column, FilterError, FilterOp, FilterSpec, SITE_SCORE_SCHEMA, compile_filters,
};

type Compiled = Result<Vec<FilterSpec>, FilterError>;

#[fixture]
fn tokens() -> RefCell<Vec<String>> {
    RefCell::new(Vec::new())
}

#[fixture]
fn compiled() -> RefCell<Option<Compiled>> {
    RefCell::new(None)
}

fn push(tokens: &RefCell<Vec<String>>, token: &str) {
    tokens.borrow_mut().push(token.to_owned());
}

fn error(compiled: &RefCell<Option<Compiled>>) -> FilterError {
    compiled
        .borrow()
        .clone()
        .expect("tokens should be compiled")
        .expect_err("compilation should fail")
}

#[given("the token \"col:area_sqm,min_score:10000\"")]
fn given_min_area(#[from(tokens)] tokens: &RefCell<Vec<String>>) {
    push(tokens, "col:area_sqm,min_score:10000");
}

#[given("the token \"min_score:10000\"")]
fn given_missing_column(#[from(tokens)] tokens: &RefCell<Vec<String>>) {
    push(tokens, "min_score:10000");
}

#[given("the token \"col:total_suitability_score,score:80,min_score:60\"")]
fn given_exact_and_range(#[from(tokens)] tokens: &RefCell<Vec<String>>) {
    push(tokens, "col:total_suitability_score,score:80,min_score:60");
}

#[given("the token \"col:site_name,score:1\"")]
fn given_text_column(#[from(tokens)] tokens: &RefCell<Vec<String>>) {
    push(tokens, "col:site_name,score:1");
}

#[when("the tokens are compiled for the joined view")]
fn when_compiled(
    #[from(tokens)] tokens: &RefCell<Vec<String>>,
    #[from(compiled)] compiled: &RefCell<Option<Compiled>>,
) {
    let raw = tokens.borrow();
    let result = compile_filters(raw.as_slice(), &SITE_SCORE_SCHEMA);
    *compiled.borrow_mut() = Some(result);
}

#[then("one at-least predicate on area_sqm is produced")]
fn then_at_least(#[from(compiled)] compiled: &RefCell<Option<Compiled>>) {
    let specs = compiled
        .borrow()
        .clone()
        .expect("tokens should be compiled")
        .expect("compilation should succeed");
    assert_eq!(specs.len(), 1);
    let spec = specs.first().expect("one predicate");
    assert_eq!(spec.column, Column::AreaSqm);
    assert_eq!(spec.op, FilterOp::AtLeast);
}

#[then("compilation fails because the column is missing")]
fn then_missing(#[from(compiled)] compiled: &RefCell<Option<Compiled>>) {
    assert!(matches!(error(compiled), FilterError::MissingColumn { .. }));
}

#[then("compilation fails because exact and range bounds are mixed")]
fn then_mixed(#[from(compiled)] compiled: &RefCell<Option<Compiled>>) {
    assert!(matches!(error(compiled), FilterError::ExactWithRange { .. }));
}

#[then("compilation fails because the column is not allowed")]
fn then_not_allowed(#[from(compiled)] compiled: &RefCell<Option<Compiled>>) {
    let err = error(compiled);
    assert!(matches!(err, FilterError::ColumnNotAllowed { .. }));
    assert!(err.to_string().contains("site_name"));
}

#[scenario(path = "tests/features/filters.feature", index = 0)]
fn min_bound(tokens: RefCell<Vec<String>>, compiled: RefCell<Option<Compiled>>) {
    let _ = (tokens, compiled);
}

#[scenario(path = "tests/features/filters.feature", index = 1)]
fn missing_column(tokens: RefCell<Vec<String>>, compiled: RefCell<Option<Compiled>>) {
    let _ = (tokens, compiled);
}

#[scenario(path = "tests/features/filters.feature", index = 2)]
fn exact_with_range(tokens: RefCell<Vec<String>>, compiled: RefCell<Option<Compiled>>) {
    let _ = (tokens, compiled);
}

#[scenario(path = "tests/features/filters.feature", index = 3)]
fn column_not_allowed(tokens: RefCell<Vec<String>>, compiled: RefCell<Option<Compiled>>) {
    let _ = (tokens, compiled);
}
