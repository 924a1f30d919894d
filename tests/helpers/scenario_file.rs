//! Writes scenario files for the command-line tests.

use fanout::core::{ChangeEvent, EntityRef, NotificationAction};
use fanout::scenario::Scenario;
use std::io::Write;
use tempfile::NamedTempFile;
use uuid::Uuid;

use super::Org;

pub struct ScenarioFile {
    pub file: NamedTempFile,
    pub scenario: Scenario,
}

impl ScenarioFile {
    /// Persists `org` with an update event on its table.
    pub fn write(
        org: &Org,
        action: NotificationAction,
        task_assignees: Vec<EntityRef>,
        destination: Option<Uuid>,
    ) -> Self {
        let scenario = Scenario {
            directory: org.directory.snapshot(),
            action,
            event: ChangeEvent::new("entityUpdated", &org.table.entity_type, org.table.id),
            task_assignees,
            destination,
        };
        Self::from_scenario(scenario)
    }

    pub fn from_scenario(scenario: Scenario) -> Self {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&scenario).unwrap()).unwrap();
        Self { file, scenario }
    }
}
