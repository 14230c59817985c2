use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

use habit_clock::DayClock;
use habit_domain::archive::ArchiveRecord;
use habit_domain::calendar::{self, DayIndex, WeekDays, DAYS_IN_WEEK, DAY_NAMES};
use habit_domain::editor::HabitDraft;
use habit_domain::events::HabitEvent;
use habit_domain::habit::HabitRecord;
use habit_domain::notifications::LoggingScheduler;
use habit_domain::rollover::RolloverReport;
use habit_domain::sort::{self, HomeSort, SnapshotSort};
use habit_domain::store::JsonStore;
use habit_domain::{HabitService, Status};

use crate::config::{self, AppConfig};

#[derive(Parser, Debug)]
#[command(name = "weekly-habits", version, about = "Weekly habit tracker")]
pub struct Cli {
    /// Directory holding habits, archives and the day clock.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Overrides the logical current date (YYYY-MM-DD).
    #[arg(long, global = true, value_parser = config::parse_date)]
    pub today: Option<NaiveDate>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Flags take precedence over the environment.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.data_dir {
            config.set_data_dir(dir);
        }
        if let Some(today) = self.today {
            config.today = Some(today);
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a habit.
    Add(AddArgs),
    /// Change a habit's fields.
    Edit(EditArgs),
    /// Set the status of one day of the current week.
    Mark(MarkArgs),
    /// Archive a habit; its history stays available.
    Finish(SelectorArgs),
    /// Bring a finished habit back.
    Restore(SelectorArgs),
    /// Clear an archive's statistics and history.
    Reset(SelectorArgs),
    /// Permanently remove a finished archive.
    Delete(SelectorArgs),
    List(ListArgs),
    History(HistoryArgs),
    /// Show the rollovers applied since the last run.
    Rollover,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    pub title: String,

    /// One of: everyday, weekdays, weekends, or a list such as mon,wed,fri
    #[arg(long, default_value = "everyday")]
    pub days: String,

    #[arg(long, default_value_t = 0)]
    pub color: u8,

    /// 0 (none) through 3
    #[arg(long, default_value_t = 0)]
    pub priority: u8,

    #[arg(long)]
    pub flag: bool,

    /// Reminder time, HH:MM
    #[arg(long, value_parser = parse_time)]
    pub reminder: Option<NaiveTime>,

    /// Completed days that count as reaching the goal
    #[arg(long)]
    pub goal: Option<u32>,

    /// Leave missed days incomplete instead of failing them
    #[arg(long)]
    pub no_tracking: bool,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Habit id prefix or unique title prefix
    pub habit: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub days: Option<String>,

    #[arg(long)]
    pub color: Option<u8>,

    #[arg(long)]
    pub priority: Option<u8>,

    #[arg(long, action = clap::ArgAction::Set)]
    pub flag: Option<bool>,

    #[arg(long, value_parser = parse_time, conflicts_with = "no_reminder")]
    pub reminder: Option<NaiveTime>,

    #[arg(long)]
    pub no_reminder: bool,

    #[arg(long, conflicts_with = "no_goal")]
    pub goal: Option<u32>,

    #[arg(long)]
    pub no_goal: bool,

    #[arg(long, action = clap::ArgAction::Set)]
    pub tracking: Option<bool>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum MarkStatus {
    Completed,
    Failed,
    Incomplete,
}

impl From<MarkStatus> for Status {
    fn from(value: MarkStatus) -> Self {
        match value {
            MarkStatus::Completed => Status::Completed,
            MarkStatus::Failed => Status::Failed,
            MarkStatus::Incomplete => Status::Incomplete,
        }
    }
}

#[derive(Args, Debug)]
pub struct MarkArgs {
    /// Habit id prefix or unique title prefix
    pub habit: String,

    #[arg(value_enum)]
    pub status: MarkStatus,

    /// Day of the current week (sun..sat); defaults to today
    #[arg(long, value_parser = parse_day)]
    pub day: Option<DayIndex>,
}

#[derive(Args, Debug)]
pub struct SelectorArgs {
    /// Id prefix or unique title prefix
    pub target: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// alphabetical, color, date-created, due-today, flag, priority, reminder-time
    #[arg(long, default_value = "due-today")]
    pub sort: HomeSort,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum WeekOrder {
    Oldest,
    #[default]
    Newest,
}

impl From<WeekOrder> for SnapshotSort {
    fn from(value: WeekOrder) -> Self {
        match value {
            WeekOrder::Oldest => SnapshotSort::DateAscending,
            WeekOrder::Newest => SnapshotSort::DateDescending,
        }
    }
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Also print every stored week
    #[arg(long)]
    pub weeks: bool,

    #[arg(long, value_enum, default_value = "newest")]
    pub order: WeekOrder,
}

/// Service, store and clock wired over one data directory.
pub struct App {
    config: AppConfig,
    service: HabitService,
    clock: DayClock,
    rolled: Vec<RolloverReport>,
}

impl App {
    pub fn open(config: AppConfig) -> Result<Self> {
        let store = JsonStore::open(&config.data_dir)
            .with_context(|| format!("failed to open store at `{}`", config.data_dir.display()))?;
        let clock = DayClock::open(&config.data_dir)?;
        let service = HabitService::builder()
            .with_store(Arc::new(store))
            .with_notification_scheduler(Box::new(LoggingScheduler))
            .subscribe(|event: &HabitEvent| debug!(?event, "habit event"))
            .build();
        Ok(Self {
            config,
            service,
            clock,
            rolled: Vec::new(),
        })
    }

    pub fn today(&self) -> NaiveDate {
        self.config.today()
    }

    /// Apply every day boundary crossed since the previous run.
    pub fn catch_up(&mut self) -> Result<usize> {
        let today = self.today();
        self.clock.catch_up(today)?;
        let reports = self.clock.run_pending(&self.service)?;
        let applied = reports.len();
        if applied > 0 {
            info!(applied, %today, "caught up with the calendar");
        }
        self.rolled.extend(reports);
        Ok(applied)
    }

    pub fn execute(&self, command: Command, out: &mut impl Write) -> Result<()> {
        let today = self.today();
        match command {
            Command::Add(args) => {
                let draft = HabitDraft {
                    title: args.title,
                    color: Some(args.color),
                    days: parse_days(&args.days)?,
                    priority: args.priority,
                    flag: args.flag,
                    reminder: args.reminder,
                    goal: args.goal,
                    tracking: !args.no_tracking,
                };
                let habit = self.service.create_habit(&draft, today)?;
                writeln!(out, "added {} ({})", habit.meta.title, short_id(&habit.id.to_string()))?;
            }
            Command::Edit(args) => {
                let habit = self.select_habit(&args.habit)?;
                let mut draft = HabitDraft::from_habit(&habit);
                if let Some(title) = args.title {
                    draft.title = title;
                }
                if let Some(days) = &args.days {
                    draft.days = parse_days(days)?;
                }
                if args.color.is_some() {
                    draft.color = args.color;
                }
                if let Some(priority) = args.priority {
                    draft.priority = priority;
                }
                if let Some(flag) = args.flag {
                    draft.flag = flag;
                }
                if args.reminder.is_some() || args.no_reminder {
                    draft.reminder = args.reminder;
                }
                if args.goal.is_some() || args.no_goal {
                    draft.goal = args.goal;
                }
                if let Some(tracking) = args.tracking {
                    draft.tracking = tracking;
                }
                let habit = self.service.edit_habit(habit.id, &draft, today)?;
                writeln!(out, "updated {}", habit.meta.title)?;
            }
            Command::Mark(args) => {
                let habit = self.select_habit(&args.habit)?;
                let day = args.day.unwrap_or_else(|| calendar::day_index(today));
                let status = Status::from(args.status);
                let habit = self.service.set_status(habit.id, day, status, today)?;
                writeln!(
                    out,
                    "{}: {} is {}",
                    habit.meta.title,
                    calendar::day_name(day),
                    status.label()
                )?;
                let archive = self.service.archive(habit.archive_id)?;
                if status == Status::Completed && archive.goal_reached() {
                    writeln!(out, "goal reached!")?;
                }
            }
            Command::Finish(args) => {
                let habit = self.select_habit(&args.target)?;
                let archive = self.service.finish_habit(habit.id)?;
                writeln!(out, "finished {}", archive.meta.title)?;
            }
            Command::Restore(args) => {
                let archive = self.select_archive(&args.target, false)?;
                let habit = self.service.restore_archive(archive.id, today)?;
                writeln!(out, "restored {}", habit.meta.title)?;
            }
            Command::Reset(args) => {
                let archive = self.select_archive(&args.target, true)?;
                let archive = self.service.reset_archive(archive.id, today)?;
                writeln!(out, "reset {}", archive.meta.title)?;
            }
            Command::Delete(args) => {
                let archive = self.select_archive(&args.target, false)?;
                self.service.delete_archive(archive.id)?;
                writeln!(out, "deleted {}", archive.meta.title)?;
            }
            Command::List(args) => self.list(args.sort, out)?,
            Command::History(args) => self.history(&args, out)?,
            Command::Rollover => {
                if self.rolled.is_empty() {
                    writeln!(out, "up to date")?;
                }
                for report in &self.rolled {
                    writeln!(
                        out,
                        "{} {:?}: {} rolled, {} auto-failed, {} new weeks",
                        report.date,
                        report.kind,
                        report.habits_processed,
                        report.auto_failed,
                        report.weeks_started
                    )?;
                }
            }
        }
        Ok(())
    }

    fn list(&self, sort: HomeSort, out: &mut impl Write) -> Result<()> {
        let today = self.today();
        let current_day = calendar::day_index(today);
        let habits = self.service.sorted_habits(sort, today)?;
        writeln!(out, "{} due today", self.service.due_today_count(today)?)?;
        for habit in &habits {
            let marker = if habit.button_state { "*" } else { " " };
            writeln!(
                out,
                "{marker} {}  {:<24} {}  {}",
                short_id(&habit.id.to_string()),
                habit.meta.title,
                week_row(habit.statuses()),
                status_label(habit, current_day)
            )?;
        }
        Ok(())
    }

    fn history(&self, args: &HistoryArgs, out: &mut impl Write) -> Result<()> {
        let view = self.service.history()?;
        for (heading, archives) in [("active", &view.active), ("finished", &view.finished)] {
            if archives.is_empty() {
                continue;
            }
            writeln!(out, "{heading}:")?;
            for archive in archives {
                let totals = archive.totals();
                writeln!(
                    out,
                    "  {}  {:<24} week {:>3}  {} done, {} failed, {} open  {:.0}%",
                    short_id(&archive.id.to_string()),
                    archive.meta.title,
                    archive.current_week_number(),
                    totals.completed,
                    totals.failed,
                    totals.incomplete,
                    archive.success_rate()
                )?;
                if args.weeks {
                    let mut weeks = archive.snapshots().to_vec();
                    sort::sort_snapshots(&mut weeks, args.order.into());
                    for week in &weeks {
                        writeln!(
                            out,
                            "      {} - {}  {}",
                            week.start_date,
                            week.end_date,
                            week_row(week.statuses())
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    fn select_habit(&self, selector: &str) -> Result<HabitRecord> {
        let habits = self.service.habits()?;
        select(habits, selector, |habit| (habit.id.to_string(), habit.meta.title.clone()))
            .with_context(|| format!("no single habit matches `{selector}`"))
    }

    fn select_archive(&self, selector: &str, active: bool) -> Result<ArchiveRecord> {
        let archives = self
            .service
            .archives()?
            .into_iter()
            .filter(|archive| archive.active() == active)
            .collect();
        select(archives, selector, |archive| {
            (archive.id.to_string(), archive.meta.title.clone())
        })
        .with_context(|| {
            let kind = if active { "active" } else { "finished" };
            format!("no single {kind} archive matches `{selector}`")
        })
    }
}

/// Pick the only record whose title starts with `selector`
/// (case-insensitive), or else the only one whose id does.
fn select<T>(records: Vec<T>, selector: &str, keys: impl Fn(&T) -> (String, String)) -> Result<T> {
    let needle = selector.trim().to_lowercase();
    if needle.is_empty() {
        bail!("empty selector");
    }
    let (by_title, rest): (Vec<T>, Vec<T>) = records
        .into_iter()
        .partition(|record| keys(record).1.to_lowercase().starts_with(&needle));
    let mut matches: Vec<T> = if by_title.is_empty() {
        rest.into_iter()
            .filter(|record| keys(record).0.starts_with(&needle))
            .collect()
    } else {
        by_title
    };
    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(anyhow!("nothing matches")),
        n => Err(anyhow!("{n} records match")),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn status_glyph(status: Status) -> char {
    match status {
        Status::Empty => '.',
        Status::Incomplete => 'o',
        Status::Completed => '+',
        Status::Failed => 'x',
    }
}

fn week_row(statuses: &[Status; DAYS_IN_WEEK]) -> String {
    statuses.iter().copied().map(status_glyph).collect()
}

fn status_label(habit: &HabitRecord, day: DayIndex) -> &'static str {
    habit.status(day).map(Status::label).unwrap_or("")
}

fn parse_day(value: &str) -> Result<DayIndex> {
    let value = value.trim().to_lowercase();
    DAY_NAMES
        .iter()
        .position(|name| value.len() >= 2 && name.to_lowercase().starts_with(&value))
        .ok_or_else(|| anyhow!("`{value}` is not a day of the week"))
}

pub fn parse_days(value: &str) -> Result<WeekDays> {
    match value.trim().to_lowercase().as_str() {
        "everyday" | "daily" => return Ok([true; DAYS_IN_WEEK]),
        "weekdays" => return Ok([false, true, true, true, true, true, false]),
        "weekends" => return Ok([true, false, false, false, false, false, true]),
        _ => {}
    }
    let mut days = [false; DAYS_IN_WEEK];
    for part in value.split(',').filter(|part| !part.trim().is_empty()) {
        days[parse_day(part)?] = true;
    }
    Ok(days)
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .with_context(|| format!("`{value}` is not an HH:MM time"))
}

/// Open the data directory, catch up with the calendar and run `cli.command`.
pub fn run(cli: Cli, mut config: AppConfig, out: &mut impl Write) -> Result<()> {
    cli.apply_overrides(&mut config);
    let mut app = App::open(config)?;
    app.catch_up()?;
    app.execute(cli.command, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::tempdir;

    fn invoke(dir: &std::path::Path, today: &str, args: &[&str]) -> Result<String> {
        let mut argv = vec!["weekly-habits", "--data-dir", dir.to_str().unwrap(), "--today", today];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv)?;
        let mut out = Vec::new();
        run(cli, AppConfig::default(), &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_day_sets() {
        assert_eq!(parse_days("weekdays").unwrap(), [false, true, true, true, true, true, false]);
        assert_eq!(
            parse_days("mon, wed,FRI").unwrap(),
            [false, true, false, true, false, true, false]
        );
        assert_eq!(parse_days("").unwrap(), [false; DAYS_IN_WEEK]);
        assert!(parse_days("mon,funday").is_err());
        assert!(parse_day("t").is_err());
        assert_eq!(parse_day("th").unwrap(), 4);
    }

    #[test]
    fn add_mark_and_list() {
        let temp = tempdir().unwrap();
        let dir = temp.path();
        let today = "2025-10-22";

        let added = invoke(dir, today, &["add", "Read", "--days", "mon,wed", "--goal", "1"]).unwrap();
        assert!(added.starts_with("added Read"));

        let marked = invoke(dir, today, &["mark", "read", "completed"]).unwrap();
        assert!(marked.contains("Wednesday is completed"));
        assert!(marked.contains("goal reached!"));

        let listed = invoke(dir, today, &["list", "--sort", "priority"]).unwrap();
        assert!(listed.starts_with("0 due today"));
        assert!(listed.contains(".o.+..."));
    }

    #[test]
    fn a_later_run_replays_missed_days() {
        let temp = tempdir().unwrap();
        let dir = temp.path();
        invoke(dir, "2025-10-24", &["add", "Stretch", "--days", "fri"]).unwrap();

        let report = invoke(dir, "2025-10-27", &["rollover"]).unwrap();
        assert_eq!(report.lines().count(), 3);
        assert!(report.contains("2025-10-25 Day: 1 rolled, 1 auto-failed"));
        assert!(report.contains("2025-10-26 Week: 1 rolled, 0 auto-failed, 1 new weeks"));

        let again = invoke(dir, "2025-10-27", &["rollover"]).unwrap();
        assert_eq!(again.trim(), "up to date");

        let history = invoke(dir, "2025-10-27", &["history", "--weeks"]).unwrap();
        assert!(history.contains("week   2"));
        assert!(history.contains("2025-10-19 - 2025-10-25  .....x."));
    }

    #[test]
    fn finish_restore_and_delete() {
        let temp = tempdir().unwrap();
        let dir = temp.path();
        let today = "2025-10-22";
        invoke(dir, today, &["add", "Floss"]).unwrap();

        assert!(invoke(dir, today, &["delete", "floss"]).is_err());
        invoke(dir, today, &["finish", "floss"]).unwrap();
        let history = invoke(dir, today, &["history"]).unwrap();
        assert!(history.starts_with("finished:"));

        let restored = invoke(dir, today, &["restore", "flo"]).unwrap();
        assert_eq!(restored.trim(), "restored Floss");

        invoke(dir, today, &["finish", "floss"]).unwrap();
        invoke(dir, today, &["delete", "floss"]).unwrap();
        let history = invoke(dir, today, &["history"]).unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn invalid_edit_is_reported() {
        let temp = tempdir().unwrap();
        let dir = temp.path();
        let today = "2025-10-22";
        invoke(dir, today, &["add", "Walk"]).unwrap();

        let err = invoke(dir, today, &["edit", "walk", "--days", ""]).unwrap_err();
        assert!(err.to_string().contains("day"));
        let err = invoke(dir, today, &["edit", "walk", "--priority", "9"]).unwrap_err();
        assert!(err.to_string().contains("priority"));

        let edited = invoke(dir, today, &["edit", "walk", "--title", "Evening walk"]).unwrap();
        assert_eq!(edited.trim(), "updated Evening walk");
    }
}
