use readtrack_core::model::BadgeTier;
use readtrack_core::Store;
use std::sync::{Arc, Mutex};

#[test]
fn test_story_badge_downgrade_emits_structured_warning() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.ensure_schema()?;

    let buffer = Arc::new(Mutex::new(Vec::new()));
    let buffer_clone = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_writer(move || MockWriter(buffer_clone.clone()))
        .finish();

    tracing::subscriber::with_default(subscriber, || -> anyhow::Result<()> {
        store.upgrade_story_completion(4, 2, BadgeTier::Gold)?;
        store.upgrade_story_completion(4, 2, BadgeTier::Bronze)?;
        Ok(())
    })?;

    let output = String::from_utf8(buffer.lock().unwrap().clone())?;
    let warning = output
        .lines()
        .find(|l| l.contains("\"event\":\"badge_downgrade_overwrite\""))
        .expect("downgrade warning logged");
    assert!(warning.contains("\"level\":\"WARN\""));
    assert!(warning.contains("\"to\":\"bronze\""));
    assert!(warning.contains("\"user_id\":4"));

    // The overwrite itself still happens.
    let badges = store.story_badges(4, 2)?;
    assert_eq!(badges[0].badge_type, Some(BadgeTier::Bronze));
    Ok(())
}

struct MockWriter(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
