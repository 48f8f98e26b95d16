use remindly_core::{JsonFileStore, Reminder, ReminderInterval, ReminderStore};

fn window(interval: &ReminderInterval) -> String {
    if interval.is_infinite() {
        return "always".to_string();
    }
    let earliest = interval.earliest();
    let latest = interval.latest();
    let end = if earliest.date_naive() == latest.date_naive() {
        latest.format("%H:%M").to_string()
    } else {
        latest.format("%Y-%m-%d %H:%M").to_string()
    };
    let mut text = format!("{} → {end}", earliest.format("%Y-%m-%d %H:%M"));
    if let Some(repeat) = interval.repeat() {
        text.push_str(&format!(" every {} {:?}", repeat.quantity, repeat.unit).to_lowercase());
    }
    text
}

fn line(reminder: &Reminder) -> String {
    format!(
        "{:<5} {:<9} {:<40} {}/{}  {}",
        reminder.id().to_string(),
        format!("{:?}", reminder.state()),
        window(&reminder.interval),
        reminder.occurrences(),
        reminder.total_occurrences(),
        reminder.title,
    )
}

pub fn run(past: bool, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = JsonFileStore::open_default()?;
    let reminders: Vec<Reminder> = store
        .load_all()?
        .into_iter()
        .filter(|r| r.is_finished() == past)
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&reminders)?);
        return Ok(());
    }

    if reminders.is_empty() {
        println!("no {} reminders", if past { "past" } else { "upcoming" });
        return Ok(());
    }
    for reminder in &reminders {
        println!("{}", line(reminder));
    }
    Ok(())
}
