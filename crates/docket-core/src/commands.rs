use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::calendar::{MonthGrid, build_month_grid, shift_month};
use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::{parse_year_month, year_month_of};
use crate::render::Renderer;
use crate::storage::Storage;
use crate::store::{NewTask, TaskEdit, TaskStore};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "list", "calendar", "show", "toggle", "done", "edit", "delete", "clear", "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch<S: Storage>(
    store: &mut TaskStore<S>,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(command, args = ?inv.command_args, "dispatching command");

    match command {
        "add" => cmd_add(store, renderer, &inv.command_args, today),
        "list" => cmd_list(store, renderer, today),
        "calendar" => cmd_calendar(store, renderer, &inv.command_args, today),
        "show" => cmd_show(store, renderer, &inv.command_args, today),
        "toggle" | "done" => cmd_toggle(store, renderer, &inv.command_args, today),
        "edit" => cmd_edit(store, renderer, &inv.command_args, today),
        "delete" => cmd_delete(store, renderer, &inv.command_args, today),
        "clear" => cmd_clear(store, renderer, today),
        "help" => cmd_help(cfg),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(store, renderer, args))]
fn cmd_add<S: Storage>(
    store: &mut TaskStore<S>,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command add");

    let (name, mods) = parse_name_and_mods(args);
    let mut input = NewTask {
        name,
        ..NewTask::default()
    };
    for one_mod in mods {
        match one_mod {
            Mod::Date(date) => input.date = date,
            Mod::Color(color) => input.color = color,
        }
    }

    let index = store.add(input)?;
    println!("Created task {}.", index + 1);
    render_after_mutation(store, renderer, today)
}

#[instrument(skip(store, renderer))]
fn cmd_list<S: Storage>(
    store: &TaskStore<S>,
    renderer: &Renderer,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command list");
    renderer.print_task_table(store.tasks(), today)
}

#[instrument(skip(store, renderer, args))]
fn cmd_calendar<S: Storage>(
    store: &TaskStore<S>,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command calendar");
    let grid = month_grid_for(store, args, today)?;
    renderer.print_calendar(&grid, store.tasks())
}

#[instrument(skip(store, renderer, args))]
fn cmd_show<S: Storage>(
    store: &TaskStore<S>,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command show");
    let grid = month_grid_for(store, args, today)?;
    renderer.print_views(store.tasks(), &grid, today)
}

#[instrument(skip(store, renderer, args))]
fn cmd_toggle<S: Storage>(
    store: &mut TaskStore<S>,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command toggle");

    let (index, rest) = parse_position(args)?;
    if !rest.is_empty() {
        warn!(extra = ?rest, "toggle ignores extra arguments");
    }
    let completed = store.toggle(index)?;
    if completed {
        println!("Completed task {}.", index + 1);
    } else {
        println!("Reopened task {}.", index + 1);
    }
    render_after_mutation(store, renderer, today)
}

#[instrument(skip(store, renderer, args))]
fn cmd_edit<S: Storage>(
    store: &mut TaskStore<S>,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command edit");

    let (index, rest) = parse_position(args)?;
    let edit = edit_from_args(rest);
    if edit.is_empty() {
        return Err(anyhow!(
            "edit requires a new name, date:YYYY-MM-DD or color:VALUE"
        ));
    }

    store.edit(index, edit)?;
    println!("Modified task {}.", index + 1);
    render_after_mutation(store, renderer, today)
}

#[instrument(skip(store, renderer, args))]
fn cmd_delete<S: Storage>(
    store: &mut TaskStore<S>,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command delete");

    let (index, rest) = parse_position(args)?;
    if !rest.is_empty() {
        warn!(extra = ?rest, "delete ignores extra arguments");
    }
    let removed = store.delete(index)?;
    println!("Deleted task {} '{}'.", index + 1, removed.name);
    render_after_mutation(store, renderer, today)
}

#[instrument(skip(store, renderer))]
fn cmd_clear<S: Storage>(
    store: &mut TaskStore<S>,
    renderer: &Renderer,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command clear");

    let removed = store.clear_completed()?;
    println!("Cleared {removed} completed task(s).");
    render_after_mutation(store, renderer, today)
}

fn cmd_help(cfg: &Config) -> anyhow::Result<()> {
    let default_command = cfg.get("default.command").unwrap_or_else(|| "show".to_string());
    println!("usage: docket [--data DIR] [--docketrc FILE] [rc.KEY=VALUE...] <command> [args]");
    println!();
    println!("  add <name...> date:YYYY-MM-DD [color:CSS]   add a task");
    println!("  list                                       list tasks with countdowns");
    println!("  calendar [YYYY-MM|next|prev]               show a month calendar");
    println!("  show [YYYY-MM|next|prev]                   list and calendar (default: {default_command})");
    println!("  toggle <n> | done <n>                      flip completion of task n");
    println!("  edit <n> [name...] [date:..] [color:..]    change task n; color: clears");
    println!("  delete <n>                                 remove task n");
    println!("  clear                                      remove completed tasks");
    Ok(())
}

/// Every mutation is followed by a full redraw of both views for the
/// current month.
fn render_after_mutation<S: Storage>(
    store: &TaskStore<S>,
    renderer: &Renderer,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let grid = month_grid_for(store, &[], today)?;
    renderer.print_views(store.tasks(), &grid, today)
}

fn month_grid_for<S: Storage>(
    store: &TaskStore<S>,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<MonthGrid> {
    let (year, month) = resolve_month(args, today)?;
    Ok(build_month_grid(year, month, store.tasks(), Some(today))?)
}

/// Month selector for `calendar`/`show`: nothing, `YYYY-MM`, `next` or `prev`.
pub fn resolve_month(args: &[String], today: NaiveDate) -> anyhow::Result<(i32, u32)> {
    let (year, month) = year_month_of(today);
    let Some(selector) = args.first() else {
        return Ok((year, month));
    };
    if args.len() > 1 {
        warn!(extra = ?&args[1..], "ignoring arguments after month selector");
    }

    match selector.to_ascii_lowercase().as_str() {
        "next" => Ok(shift_month(year, month, 1)),
        "prev" | "previous" => Ok(shift_month(year, month, -1)),
        "today" | "now" => Ok((year, month)),
        raw => Ok(parse_year_month(raw)?),
    }
}

/// Parses the leading 1-based task position into a 0-based index.
fn parse_position(args: &[String]) -> anyhow::Result<(usize, &[String])> {
    let (first, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("a task number is required"))?;
    let position = first
        .parse::<usize>()
        .with_context(|| format!("invalid task number: {first}"))?;
    if position == 0 {
        return Err(anyhow!("task numbers start at 1"));
    }
    Ok((position - 1, rest))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mod {
    Date(String),
    Color(Option<String>),
}

fn parse_name_and_mods(args: &[String]) -> (String, Vec<Mod>) {
    let mut name_parts = Vec::new();
    let mut mods = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg) {
            mods.push(one_mod);
            continue;
        }

        name_parts.push(arg.clone());
    }

    (name_parts.join(" "), mods)
}

fn parse_one_mod(tok: &str) -> Option<Mod> {
    let (key, value) = if let Some((k, v)) = tok.split_once(':') {
        (k, v)
    } else if let Some((k, v)) = tok.split_once('=') {
        (k, v)
    } else {
        return None;
    };

    match key.to_ascii_lowercase().as_str() {
        "date" | "due" | "deadline" => Some(Mod::Date(value.to_string())),
        "color" | "colour" => {
            let value = value.trim();
            Some(Mod::Color((!value.is_empty()).then(|| value.to_string())))
        }
        _ => None,
    }
}

fn edit_from_args(args: &[String]) -> TaskEdit {
    let (name, mods) = parse_name_and_mods(args);
    let mut edit = TaskEdit {
        name: (!name.is_empty()).then_some(name),
        ..TaskEdit::default()
    };
    for one_mod in mods {
        match one_mod {
            Mod::Date(date) => edit.date = Some(date),
            Mod::Color(color) => edit.color = Some(color),
        }
    }
    edit
}
