use chrono::NaiveDate;
use docket_core::calendar::{IndicatorPolicy, build_month_grid};
use docket_core::cli::Invocation;
use docket_core::commands::dispatch;
use docket_core::config::Config;
use docket_core::deadline::calculate_days_left;
use docket_core::render::Renderer;
use docket_core::storage::{FileStorage, Storage};
use docket_core::store::{NewTask, TASKS_KEY, TaskEdit, TaskStore};
use tempfile::tempdir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn new_task(name: &str, date: &str, color: Option<&str>) -> NewTask {
    NewTask {
        name: name.to_string(),
        date: date.to_string(),
        color: color.map(str::to_string),
    }
}

#[test]
fn file_store_roundtrips_every_field() {
    let temp = tempdir().expect("tempdir");
    let storage = FileStorage::open(temp.path()).expect("open storage");
    let mut store = TaskStore::load(storage).expect("load store");

    store
        .add(new_task("Write report", "2026-10-23", Some("#3366ff")))
        .expect("add report");
    store
        .add(new_task("Renew passport", "2027-01-15", None))
        .expect("add passport");
    store.toggle(1).expect("toggle passport");
    let before = store.tasks().to_vec();

    let reopened = FileStorage::open(temp.path()).expect("reopen storage");
    let reloaded = TaskStore::load(reopened).expect("reload store");
    assert_eq!(reloaded.tasks(), before.as_slice());

    let raw = std::fs::read_to_string(temp.path().join("tasks.json")).expect("read tasks.json");
    let parsed: serde_json::Value = serde_json::from_str(&raw).expect("tasks.json is json");
    assert!(parsed.is_array());
    assert_eq!(parsed[0]["color"], "#3366ff");
    assert_eq!(parsed[1]["completed"], true);
    assert!(parsed[1].get("color").is_none());
}

#[test]
fn load_reports_corrupt_storage() {
    let temp = tempdir().expect("tempdir");
    let mut storage = FileStorage::open(temp.path()).expect("open storage");
    storage
        .set_item(TASKS_KEY, r#"[{"name":"x","date":"next tuesday","completed":false}]"#)
        .expect("seed bad data");

    let err = TaskStore::load(storage).expect_err("bad date must fail the load");
    assert!(format!("{err:#}").contains("invalid deadline date"));
}

#[test]
fn calendar_follows_store_mutations() {
    let temp = tempdir().expect("tempdir");
    let storage = FileStorage::open(temp.path()).expect("open storage");
    let mut store = TaskStore::load(storage).expect("load store");
    let today = date(2026, 10, 19);

    store.add(new_task("standup", "2026-10-21", None)).expect("add");
    store.add(new_task("retro", "2026-10-30", Some("purple"))).expect("add");

    let grid = build_month_grid(2026, 10, store.tasks(), Some(today)).expect("grid");
    let policy = IndicatorPolicy::FirstColor;
    let marked: Vec<_> = grid
        .day_cells()
        .filter(|cell| !policy.indicators(cell, store.tasks()).is_empty())
        .map(|cell| cell.day())
        .collect();
    assert_eq!(marked, vec![21, 30]);

    store
        .edit(
            0,
            TaskEdit {
                date: Some("2026-10-22".to_string()),
                ..TaskEdit::default()
            },
        )
        .expect("move standup");
    store.delete(1).expect("delete retro");

    let grid = build_month_grid(2026, 10, store.tasks(), Some(today)).expect("grid");
    let marked: Vec<_> = grid
        .day_cells()
        .filter(|cell| cell.has_tasks())
        .map(|cell| cell.day())
        .collect();
    assert_eq!(marked, vec![22]);
    assert_eq!(
        calculate_days_left(store.tasks()[0].date, today).to_string(),
        "3 days left"
    );
}

#[test]
fn dispatch_persists_mutations() {
    let temp = tempdir().expect("tempdir");
    let storage = FileStorage::open(temp.path()).expect("open storage");
    let mut store = TaskStore::load(storage).expect("load store");
    let cfg = Config::default();
    let renderer = Renderer::with_options(false, true, IndicatorPolicy::default());
    let today = date(2026, 10, 19);

    let run = |store: &mut TaskStore<FileStorage>, args: &[&str]| {
        let inv = Invocation::parse(&cfg, args.iter().map(Into::into).collect())
            .expect("parse invocation");
        dispatch(store, &cfg, &renderer, inv, today)
    };

    run(&mut store, &["add", "Book", "flights", "date:2026-11-02", "color:teal"]).expect("add");
    run(&mut store, &["add", "Call", "mom", "due:2026-10-19"]).expect("add");
    run(&mut store, &["done", "2"]).expect("done");
    run(&mut store, &["edit", "1", "Book", "trains"]).expect("edit");

    let err = run(&mut store, &["add", "No", "deadline"]).expect_err("missing date");
    assert_eq!(
        err.to_string(),
        "Please enter both task name and deadline date."
    );
    run(&mut store, &["calendar", "next"]).expect("calendar");

    let reloaded =
        TaskStore::load(FileStorage::open(temp.path()).expect("reopen")).expect("reload");
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.tasks()[0].name, "Book trains");
    assert_eq!(reloaded.tasks()[0].color.as_deref(), Some("teal"));
    assert!(reloaded.tasks()[1].completed);

    run(&mut store, &["clear"]).expect("clear");
    run(&mut store, &["delete", "1"]).expect("delete");
    assert!(store.is_empty());
    assert!(run(&mut store, &["delete", "1"]).is_err());
}
