use remindly_core::{JsonFileStore, ReminderStore};

pub fn run(value: u32) -> Result<(), Box<dyn std::error::Error>> {
    let store = JsonFileStore::open_default()?;
    let reminder = store
        .load_all()?
        .into_iter()
        .find(|r| r.id().value() == value)
        .ok_or_else(|| format!("no reminder #{value}"))?;

    store.delete(reminder.id())?;
    println!("Reminder {} removed: {}", reminder.id(), reminder.title);
    Ok(())
}
