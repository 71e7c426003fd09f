//! Behaviour-driven step definitions driving the CLI scenarios.

use super::helpers::write_upload;
use super::*;
use crate::query::SitesResponse;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde::de::DeserializeOwned;
use siting_core::{StatisticsSummary, WeightError, WeightVector};
use siting_data::IngestError;
use std::cell::RefCell;
use tempfile::TempDir;

#[derive(Debug)]
struct CliWorld {
    _tmp: TempDir,
    root: Utf8PathBuf,
    database: Utf8PathBuf,
    upload: Utf8PathBuf,
    stdout: RefCell<Vec<u8>>,
    result: RefCell<Option<Result<(), CliError>>>,
}

impl CliWorld {
    fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
        Self {
            database: root.join("siting.db"),
            upload: root.join("upload.csv"),
            root,
            _tmp: tmp,
            stdout: RefCell::new(Vec::new()),
            result: RefCell::new(None),
        }
    }

    fn run(&self, args: &[&str]) {
        let mut argv = vec!["siting".to_owned()];
        argv.extend(args.iter().map(|arg| (*arg).to_owned()));
        argv.extend([format!("--{ARG_DATABASE}"), self.database.to_string()]);

        self.stdout.borrow_mut().clear();
        let outcome = Cli::try_parse_from(argv)
            .map_err(CliError::from)
            .and_then(|cli| {
                let mut buffer = self.stdout.borrow_mut();
                run_with(cli, &mut *buffer)
            });
        self.result.replace(Some(outcome));
    }

    fn output<T: DeserializeOwned>(&self) -> T {
        let borrowed = self.result.borrow();
        borrowed
            .as_ref()
            .expect("result recorded")
            .as_ref()
            .expect("expected success");
        serde_json::from_slice(&self.stdout.borrow()).expect("stdout should be JSON")
    }

    fn with_error(&self, check: impl FnOnce(&CliError)) {
        let borrowed = self.result.borrow();
        let error = borrowed
            .as_ref()
            .expect("result recorded")
            .as_ref()
            .expect_err("expected error");
        check(error);
    }
}

#[fixture]
fn world() -> CliWorld {
    CliWorld::new()
}

#[given("an uploaded CSV with three sites")]
fn uploaded_sites(#[from(world)] world: &CliWorld) {
    write_upload(&world.upload, str::to_owned);
    world.run(&["ingest", world.upload.as_str()]);
    let summary: serde_json::Value = world.output();
    assert_eq!(
        summary.get("processed").and_then(serde_json::Value::as_u64),
        Some(3)
    );
}

#[given("a CSV upload where site 2 has latitude 95")]
fn invalid_upload(#[from(world)] world: &CliWorld) {
    write_upload(&world.upload, |row| {
        if row.starts_with("2,") {
            row.replace("14.10", "95")
        } else {
            row.to_owned()
        }
    });
}

#[when("I ingest the upload")]
fn ingest_upload(#[from(world)] world: &CliWorld) {
    world.run(&["ingest", world.upload.as_str()]);
}

#[when("I list wasteland sites")]
fn list_wasteland(#[from(world)] world: &CliWorld) {
    world.run(&["sites", "--land-type", "wasteland", "--order-by", "-total_suitability_score"]);
}

#[when("I analyze with equal weights")]
fn analyze_equal(#[from(world)] world: &CliWorld) {
    world.run(&[
        "analyze", "--solar", "0.2", "--area", "0.2", "--grid", "0.2", "--slope", "0.2",
        "--infra", "0.2",
    ]);
}

#[when("I analyze with an infrastructure weight of 0.06")]
fn analyze_skewed(#[from(world)] world: &CliWorld) {
    world.run(&[
        "analyze", "--solar", "0.35", "--area", "0.25", "--grid", "0.20", "--slope", "0.15",
        "--infra", "0.06",
    ]);
}

#[when("I analyze with only a solar weight of 0.35")]
fn analyze_partial(#[from(world)] world: &CliWorld) {
    world.run(&["analyze", "--solar", "0.35"]);
}

#[when("I export sites in Gujarat")]
fn export_gujarat(#[from(world)] world: &CliWorld) {
    let output = world.root.join("exports").join("gujarat.csv");
    world.run(&["export", "--region", "Gujarat", "--output", output.as_str()]);
}

#[when("I show site 404")]
fn show_missing(#[from(world)] world: &CliWorld) {
    world.run(&["show", "404"]);
}

#[when("I request statistics with a page size of one")]
fn statistics_one(#[from(world)] world: &CliWorld) {
    world.run(&["statistics", "--limit", "1"]);
}

#[then("the command prints two rows led by site 1")]
fn two_rows(#[from(world)] world: &CliWorld) {
    let response: SitesResponse = world.output();
    assert_eq!(response.total_count, 2);
    let ids: Vec<_> = response.rows.iter().map(|row| row.site_id).collect();
    assert_eq!(ids, [1, 3]);
}

#[then("the command fails because the upload is invalid")]
fn upload_rejected(#[from(world)] world: &CliWorld) {
    world.with_error(|error| match error {
        CliError::Ingest(IngestError::Invalid { rejected, .. }) => {
            let ids: Vec<_> = rejected.iter().map(|r| r.site_id).collect();
            assert_eq!(ids, [2]);
        }
        other => panic!("expected Ingest(Invalid), found {other:?}"),
    });
}

#[then("listing sites prints no rows")]
fn no_rows(#[from(world)] world: &CliWorld) {
    world.run(&["sites"]);
    let response: SitesResponse = world.output();
    assert_eq!(response.total_count, 0);
    assert!(response.rows.is_empty());
}

#[then("the command reports three updated sites")]
fn three_updated(#[from(world)] world: &CliWorld) {
    let report: serde_json::Value = world.output();
    assert_eq!(
        report.get("updated").and_then(serde_json::Value::as_u64),
        Some(3)
    );
    assert_eq!(
        report.get("cancelled").and_then(serde_json::Value::as_bool),
        Some(false)
    );
}

#[then("the command fails because the weights are invalid")]
fn weights_rejected(#[from(world)] world: &CliWorld) {
    world.with_error(|error| match error {
        CliError::Weights(WeightError::BadSum { .. }) => {}
        other => panic!("expected a bad weight sum, found {other:?}"),
    });
}

#[then("the command fails because the area weight is missing")]
fn weight_missing(#[from(world)] world: &CliWorld) {
    world.with_error(|error| match error {
        CliError::Weights(WeightError::Missing { component }) => assert_eq!(*component, "area"),
        other => panic!("expected a missing weight, found {other:?}"),
    });
}

#[then("site 1 is still scored with the default weights")]
fn default_snapshot_kept(#[from(world)] world: &CliWorld) {
    world.run(&["show", "1"]);
    let detail: serde_json::Value = world.output();
    let snapshot = detail
        .get("latest_analysis")
        .and_then(|analysis| analysis.get("parameters_snapshot"))
        .cloned()
        .expect("site 1 has a score");
    let weights: WeightVector = serde_json::from_value(snapshot).expect("snapshot is a vector");
    assert_eq!(weights, WeightVector::DEFAULT);
}

#[then("the export file holds a header and one row")]
fn export_written(#[from(world)] world: &CliWorld) {
    let report: serde_json::Value = world.output();
    assert_eq!(report.get("rows").and_then(serde_json::Value::as_u64), Some(1));
    let text = std::fs::read_to_string(world.root.join("exports").join("gujarat.csv"))
        .expect("read export");
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.last().is_some_and(|line| line.starts_with("3,Charanka South,")));
}

#[then("the command fails because the site does not exist")]
fn site_missing(#[from(world)] world: &CliWorld) {
    world.with_error(|error| match error {
        CliError::NoSuchSite { site_id } => assert_eq!(*site_id, 404),
        other => panic!("expected NoSuchSite, found {other:?}"),
    });
}

#[then("the summary counts three sites and lists one")]
fn summary_counts(#[from(world)] world: &CliWorld) {
    let summary: StatisticsSummary = world.output();
    assert_eq!(summary.kpi.total_sites, 3);
    assert_eq!(summary.site_data.site_scoring_system.len(), 1);
}

macro_rules! register_cli_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/cli.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: CliWorld) {
            let _ = world;
        }
    };
}

register_cli_scenario!(list_after_upload, "listing sites after an upload");
register_cli_scenario!(reject_invalid_upload, "rejecting an upload with an invalid row");
register_cli_scenario!(reweight_all, "reweighting rescores every site");
register_cli_scenario!(reject_bad_weights, "rejecting weights that do not sum to one");
register_cli_scenario!(reject_partial_weights, "rejecting a partial weight update");
register_cli_scenario!(export_filtered, "exporting filtered sites");
register_cli_scenario!(show_unknown, "showing an unknown site");
register_cli_scenario!(summarise_sites, "summarising uploaded sites");
