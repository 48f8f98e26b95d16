use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Weekday};
use clap::Args;
use remindly_core::{
    ActivationEvents, DaySet, IntervalKind, JsonFileStore, ReminderDescription, ReminderDraft,
    ReminderId, ReminderStore, RepeatUnit, TimeOfDay, ValidationOutcome,
};

#[derive(Args)]
pub struct AddArgs {
    /// Reminder title
    pub title: String,
    /// Text shown with the notification
    #[arg(long, conflicts_with = "description_command")]
    pub description: Option<String>,
    /// Shell command whose output becomes the description
    #[arg(long)]
    pub description_command: Option<String>,
    /// Window start: "HH:MM" (today) or "YYYY-MM-DD HH:MM" (default: now)
    #[arg(long)]
    pub from: Option<String>,
    /// Window end, same formats as --from (default: one hour after start)
    #[arg(long)]
    pub to: Option<String>,
    /// Fire once at exactly this minute instead of randomly
    #[arg(long, conflicts_with_all = ["from", "to", "infinite"])]
    pub at: Option<String>,
    /// How many times to remind within the window
    #[arg(long, default_value = "1")]
    pub times: String,
    /// Repeat the window every N units
    #[arg(long)]
    pub every: Option<String>,
    /// Repeat unit: second, minute, hour, day, week, month
    #[arg(long, default_value = "day")]
    pub unit: RepeatUnit,
    /// Active all day, every day
    #[arg(long)]
    pub infinite: bool,
    /// Only on these weekdays, comma separated (e.g. "mon,wed,fri")
    #[arg(long, value_delimiter = ',')]
    pub days: Vec<Weekday>,
    /// Sound file to play on activation
    #[arg(long)]
    pub sound: Option<String>,
    /// Shell command to run on activation
    #[arg(long)]
    pub on_activate: Option<String>,
    /// Keep the notification tracked until it is dismissed
    #[arg(long)]
    pub show_when_active: bool,
    /// Add even when validation only warns
    #[arg(long, short)]
    pub yes: bool,
    /// Print the created reminder as JSON
    #[arg(long)]
    pub json: bool,
}

/// A parsed `--from`/`--to` value.
enum When {
    /// Time of day, anchored on today.
    Time(DateTime<Local>),
    Date(DateTime<Local>),
}

impl When {
    fn instant(&self) -> DateTime<Local> {
        match self {
            When::Time(at) | When::Date(at) => *at,
        }
    }
}

fn resolve(naive: NaiveDateTime) -> Result<DateTime<Local>, String> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("{naive} does not exist in the local time zone"))
}

fn parse_when(value: &str) -> Result<When, String> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(When::Date(at.with_timezone(&Local)));
    }
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return resolve(naive).map(When::Date);
        }
    }
    let time: TimeOfDay = value
        .parse()
        .map_err(|_| format!("cannot parse '{value}' as HH:MM or YYYY-MM-DD HH:MM"))?;
    resolve(time.on(Local::now().date_naive())).map(When::Time)
}

fn build_draft(args: AddArgs) -> Result<ReminderDraft, String> {
    let mut draft = ReminderDraft::new(args.title);
    draft.occurrences = args.times;
    draft.infinite = args.infinite;
    draft.description = match (args.description, args.description_command) {
        (_, Some(command)) => ReminderDescription::Command(command),
        (Some(text), None) => ReminderDescription::Text(text),
        (None, None) => ReminderDescription::default(),
    };
    draft.days = if args.days.is_empty() {
        DaySet::every_day()
    } else {
        args.days.into_iter().collect()
    };
    draft.events = ActivationEvents {
        sound: args.sound,
        show_when_active: args.show_when_active,
        command: args.on_activate,
    };

    if let Some(at) = args.at {
        let at = parse_when(&at)?.instant();
        draft.kind = IntervalKind::Date;
        draft.earliest = at;
        draft.latest = at + Duration::minutes(1);
        draft.occurrences = "1".into();
        return Ok(draft);
    }

    let from = args.from.as_deref().map(parse_when).transpose()?;
    let to = args.to.as_deref().map(parse_when).transpose()?;
    let earliest = from.as_ref().map_or_else(Local::now, When::instant);
    let mut latest = to
        .as_ref()
        .map_or(earliest + Duration::hours(1), When::instant);

    let times_of_day =
        matches!(from, Some(When::Time(_)) | None) && matches!(to, Some(When::Time(_)));
    if times_of_day && latest < earliest {
        latest += Duration::days(1);
    }

    draft.earliest = earliest;
    draft.latest = latest;
    if let Some(every) = args.every {
        draft.kind = IntervalKind::Time;
        draft.repeating = true;
        draft.repeat_quantity = every;
        draft.repeat_unit = args.unit;
    } else {
        draft.kind = IntervalKind::Date;
    }
    Ok(draft)
}

pub fn run(args: AddArgs) -> Result<(), Box<dyn std::error::Error>> {
    let json = args.json;
    let confirmed = args.yes;
    let draft = build_draft(args)?;

    let store = JsonFileStore::open_default()?;
    let existing = store.load_all()?;
    match draft.validate(&existing, None) {
        ValidationOutcome::Success => {}
        ValidationOutcome::Warning(message) if confirmed => eprintln!("warning: {message}"),
        ValidationOutcome::Warning(message) => {
            return Err(format!("{message} Pass --yes to add it anyway.").into());
        }
        ValidationOutcome::Error(message) => return Err(message.into()),
    }

    let id = ReminderId::next_available(existing.iter().map(|r| r.id().value()));
    let reminder = draft.into_reminder(id)?;
    store.save(&reminder)?;
    tracing::debug!(%id, "reminder saved");

    if json {
        println!("{}", serde_json::to_string_pretty(&reminder)?);
    } else {
        println!("Reminder {id} added: {}", reminder.title);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: AddArgs,
    }

    fn draft(argv: &[&str]) -> ReminderDraft {
        let mut full = vec!["add"];
        full.extend_from_slice(argv);
        build_draft(Wrapper::parse_from(full).args).unwrap()
    }

    #[test]
    fn times_of_day_roll_over_midnight() {
        let d = draft(&["Night", "--from", "23:00", "--to", "01:00"]);
        assert_eq!(d.latest - d.earliest, Duration::hours(2));
        assert_eq!(d.kind, IntervalKind::Date);
    }

    #[test]
    fn every_makes_a_repeating_time_window() {
        let d = draft(&[
            "Blink", "--from", "09:00", "--to", "09:01", "--every", "1", "--unit", "minute",
        ]);
        assert_eq!(d.kind, IntervalKind::Time);
        assert!(d.repeating);
        assert_eq!(d.repeat_unit, RepeatUnit::Minute);
        assert!(d.validate(&[], None).is_success());
    }

    #[test]
    fn at_is_a_single_one_minute_window() {
        let d = draft(&["Call", "--at", "2026-07-01 15:30", "--times", "5"]);
        assert_eq!(d.occurrences, "1");
        assert_eq!(d.latest - d.earliest, Duration::minutes(1));
    }

    #[test]
    fn days_and_command_description() {
        let d = draft(&["Standup", "--days", "mon,wed", "--description-command", "date"]);
        assert!(d.days.contains(Weekday::Mon));
        assert!(!d.days.contains(Weekday::Tue));
        assert_eq!(d.description, ReminderDescription::Command("date".into()));
    }

    #[test]
    fn unparseable_time_is_rejected() {
        let args = Wrapper::parse_from(["add", "x", "--from", "noon"]).args;
        assert!(build_draft(args).is_err());
    }
}
