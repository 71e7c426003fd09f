//! Behaviour tests for CSV upload, storage and export.

use std::cell::RefCell;

use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use siting_core::test_support::sample_draft;
use siting_core::{
    QueryParams, SiteDraft, SiteQuery, SiteScoreSource, SiteStore, WeightVector, execute_query,
};
use siting_data::{
    EXPORT_FILE_NAME, IngestError, IngestSummary, SqliteSiteStore, ingest_sites,
    read_site_drafts, write_export_file,
};
use tempfile::TempDir;

type Outcome = Result<IngestSummary, IngestError>;

#[fixture]
fn workspace() -> TempDir {
    TempDir::new().expect("temp dir")
}

#[fixture]
fn outcome() -> RefCell<Option<Outcome>> {
    RefCell::new(None)
}

fn root(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path")
}

fn upload_path(dir: &TempDir) -> Utf8PathBuf {
    root(dir).join("upload.csv")
}

fn database(dir: &TempDir) -> SqliteSiteStore {
    SqliteSiteStore::open(&root(dir).join("db/siting.db")).expect("open database")
}

fn write_upload(dir: &TempDir, drafts: &[SiteDraft]) {
    let mut writer = csv::Writer::from_path(upload_path(dir)).expect("create upload");
    for draft in drafts {
        writer.serialize(draft).expect("write draft");
    }
    writer.flush().expect("flush upload");
}

#[given("a CSV upload with three valid sites")]
fn given_valid_upload(#[from(workspace)] dir: &TempDir) {
    let drafts: Vec<_> = (1..=3).map(sample_draft).collect();
    write_upload(dir, &drafts);
}

#[given("a CSV upload where site 2 has latitude 95")]
fn given_invalid_upload(#[from(workspace)] dir: &TempDir) {
    let mut drafts: Vec<_> = (1..=3).map(sample_draft).collect();
    if let Some(draft) = drafts.get_mut(1) {
        draft.latitude = 95.0;
    }
    write_upload(dir, &drafts);
}

#[when("the upload is ingested into a fresh database")]
fn when_ingested(
    #[from(workspace)] dir: &TempDir,
    #[from(outcome)] outcome: &RefCell<Option<Outcome>>,
) {
    let drafts = read_site_drafts(&upload_path(dir)).expect("upload parses");
    let mut store = database(dir);
    let result = ingest_sites(&mut store, drafts, &WeightVector::DEFAULT);
    *outcome.borrow_mut() = Some(result);
}

#[then("three scored sites are stored")]
fn then_three_stored(
    #[from(workspace)] dir: &TempDir,
    #[from(outcome)] outcome: &RefCell<Option<Outcome>>,
) {
    let processed = outcome
        .borrow()
        .as_ref()
        .expect("upload attempted")
        .as_ref()
        .map(|summary| summary.processed)
        .expect("upload succeeds");
    assert_eq!(processed, 3);
    assert_eq!(database(dir).site_score_rows().expect("rows").len(), 3);
}

#[then("the export holds a header and three rows")]
fn then_export(#[from(workspace)] dir: &TempDir) {
    let store = database(dir);
    let query = SiteQuery::for_site_scores(&QueryParams::default()).expect("default query");
    let outcome = execute_query(store.site_score_rows().expect("rows"), &query);
    let path = root(dir).join("out").join(EXPORT_FILE_NAME);
    write_export_file(&path, &outcome.views()).expect("export");

    let text = std::fs::read_to_string(&path).expect("read export");
    let mut lines = text.lines();
    let header = lines.next().expect("header");
    assert!(header.contains("total_suitability_score"));
    assert_eq!(lines.count(), 3);
}

#[then("the upload is rejected naming site 2")]
fn then_rejected(#[from(outcome)] outcome: &RefCell<Option<Outcome>>) {
    let outcome = outcome.borrow();
    match outcome.as_ref().expect("upload attempted") {
        Err(IngestError::Invalid { rejected, .. }) => {
            let ids: Vec<_> = rejected.iter().map(|r| r.site_id).collect();
            assert_eq!(ids, [2]);
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[then("no sites are stored")]
fn then_nothing_stored(#[from(workspace)] dir: &TempDir) {
    assert!(database(dir).site_ids().expect("ids").is_empty());
}

#[scenario(path = "tests/features/upload.feature", index = 0)]
fn valid_upload(workspace: TempDir, outcome: RefCell<Option<Outcome>>) {
    let _ = (workspace, outcome);
}

#[scenario(path = "tests/features/upload.feature", index = 1)]
fn invalid_upload(workspace: TempDir, outcome: RefCell<Option<Outcome>>) {
    let _ = (workspace, outcome);
}
