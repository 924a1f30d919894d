pub mod scenario_file;

use fanout::core::{ChannelType, EntityRef, Identity, Relationship};
use fanout::store::InMemoryDirectory;
use std::sync::Arc;
use uuid::Uuid;

/// A small organisation around one tracked table.
///
/// - `alice` owns the table and is referenced explicitly by most tests
/// - the `data` team owns the table as well
/// - `bob` follows it
/// - `carol` is an administrator
pub struct Org {
    pub directory: InMemoryDirectory,
    pub table: EntityRef,
    pub alice: Identity,
    pub bob: Identity,
    pub carol: Identity,
    pub data_team: Identity,
}

impl Org {
    pub fn new() -> Self {
        let alice = Identity::person("alice")
            .with_email("alice@example.com")
            .with_webhook(ChannelType::Slack, "https://hooks.slack.com/alice")
            .with_webhook(ChannelType::MsTeams, "https://teams.example.com/alice");
        let bob = Identity::person("bob")
            .with_email("bob@example.com")
            .with_webhook(ChannelType::Slack, "https://hooks.slack.com/bob");
        let carol = Identity::person("carol")
            .with_email("carol@example.com")
            .with_admin(true)
            .with_webhook(ChannelType::Generic, "https://generic.example.com/carol");
        let data_team = Identity::team("data")
            .with_email("data@example.com")
            .with_webhook(ChannelType::Slack, "https://hooks.slack.com/data");
        let table = EntityRef::new(Uuid::new_v4(), "table");

        let mut directory = InMemoryDirectory::new();
        for identity in [&alice, &bob, &carol, &data_team] {
            directory.insert_identity(identity.clone());
        }
        directory.relate(alice.entity_ref(), Relationship::Owns, table.clone());
        directory.relate(data_team.entity_ref(), Relationship::Owns, table.clone());
        directory.relate(bob.entity_ref(), Relationship::Follows, table.clone());
        directory.relate(data_team.entity_ref(), Relationship::Has, bob.entity_ref());

        Self {
            directory,
            table,
            alice,
            bob,
            carol,
            data_team,
        }
    }

    pub fn into_shared(self) -> (Arc<InMemoryDirectory>, EntityRef) {
        (Arc::new(self.directory), self.table)
    }
}

/// `n` administrators named `admin-<page>-<i>`, each with an email address.
pub fn admins(page: usize, n: usize) -> Vec<Identity> {
    (0..n)
        .map(|i| {
            Identity::person(&format!("admin-{page}-{i}"))
                .with_admin(true)
                .with_email(&format!("admin-{page}-{i}@example.com"))
        })
        .collect()
}
