//! Expansion of task assignees into the persons they stand for.
//!
//! Person assignees are kept as they are; team assignees are replaced by
//! their member persons. The result is a set of person ids: addresses are
//! only extracted when a notification is actually delivered.

use super::{CategoryOutcome, RecipientResolver};
use crate::core::{ChannelType, Direction, EntityRef, IdentityKind, Relationship, TEAM};
use crate::store::StoreError;
use std::collections::HashSet;
use tracing::{error, instrument, warn};
use uuid::Uuid;

impl RecipientResolver {
    /// Expands assignee references into the set of person ids they cover.
    ///
    /// A team whose membership cannot be listed contributes no persons; the
    /// failure is logged and the remaining assignees are still expanded.
    #[instrument(skip_all, fields(assignees = assignees.len()))]
    pub async fn task_assignees(&self, assignees: &[EntityRef]) -> HashSet<Uuid> {
        let mut persons = HashSet::new();
        for assignee in assignees {
            match assignee.identity_kind() {
                Some(IdentityKind::Person) => {
                    persons.insert(assignee.id);
                }
                Some(IdentityKind::Team) => match self.team_members(assignee.id).await {
                    Ok(members) => persons.extend(members),
                    Err(e) => {
                        error!(team = %assignee.id, error = %e, "Failed to list team members")
                    }
                },
                None => {
                    warn!(
                        id = %assignee.id,
                        entity_type = %assignee.entity_type,
                        "Assignee is not a person or team, skipping"
                    )
                }
            }
        }
        persons
    }

    /// The persons a team has as members.
    pub async fn team_members(&self, team_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let related = self
            .relationships
            .find_related(team_id, TEAM, Relationship::Has, Direction::Outgoing)
            .await?;
        Ok(related
            .into_iter()
            .filter(|member| member.identity_kind() == Some(IdentityKind::Person))
            .map(|member| member.id)
            .collect())
    }

    /// Expands the assignees and extracts each person's address for `channel`.
    pub async fn assignee_addresses(
        &self,
        assignees: &[EntityRef],
        channel: ChannelType,
    ) -> CategoryOutcome {
        let persons: Vec<EntityRef> = self
            .task_assignees(assignees)
            .await
            .into_iter()
            .map(EntityRef::person)
            .collect();
        self.explicit_references(&persons, channel).await
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{ChannelType, EntityRef, Identity, Relationship};
    use crate::recipients::RecipientResolver;
    use crate::store::test_utils::FlakyRelationshipStore;
    use crate::store::InMemoryDirectory;
    use std::collections::HashSet;
    use std::sync::Arc;
    use uuid::Uuid;

    fn team_with_members(directory: &mut InMemoryDirectory, members: &[&Identity]) -> Identity {
        let team = Identity::team("reviewers");
        for member in members {
            directory.relate(team.entity_ref(), Relationship::Has, member.entity_ref());
        }
        directory.insert_identity(team.clone());
        team
    }

    #[tokio::test]
    async fn test_team_expands_to_members_plus_direct_person() {
        let mut directory = InMemoryDirectory::new();
        let members: Vec<Identity> = (0..3)
            .map(|i| Identity::person(&format!("member-{i}")))
            .collect();
        let team = team_with_members(&mut directory, &members.iter().collect::<Vec<_>>());
        let direct = Identity::person("direct");
        let directory = Arc::new(directory);
        let resolver = RecipientResolver::new(directory.clone(), directory);

        let persons = resolver
            .task_assignees(&[team.entity_ref(), direct.entity_ref()])
            .await;

        let mut expected: HashSet<Uuid> = members.iter().map(|m| m.id).collect();
        expected.insert(direct.id);
        assert_eq!(persons, expected);
    }

    #[tokio::test]
    async fn test_direct_person_who_is_also_member_counted_once() {
        let mut directory = InMemoryDirectory::new();
        let members: Vec<Identity> = (0..3)
            .map(|i| Identity::person(&format!("member-{i}")))
            .collect();
        let team = team_with_members(&mut directory, &members.iter().collect::<Vec<_>>());
        let directory = Arc::new(directory);
        let resolver = RecipientResolver::new(directory.clone(), directory);

        let persons = resolver
            .task_assignees(&[team.entity_ref(), members[0].entity_ref()])
            .await;

        assert_eq!(persons.len(), 3);
    }

    #[tokio::test]
    async fn test_nested_non_person_members_are_ignored() {
        let mut directory = InMemoryDirectory::new();
        let team = Identity::team("parent");
        let child = Identity::team("child");
        directory.relate(team.entity_ref(), Relationship::Has, child.entity_ref());
        directory.relate(
            team.entity_ref(),
            Relationship::Has,
            EntityRef::new(Uuid::new_v4(), "dashboard"),
        );
        let directory = Arc::new(directory);
        let resolver = RecipientResolver::new(directory.clone(), directory);

        let persons = resolver.task_assignees(&[team.entity_ref()]).await;

        assert!(persons.is_empty());
    }

    #[tokio::test]
    async fn test_failed_team_lookup_keeps_direct_persons() {
        let mut directory = InMemoryDirectory::new();
        let member = Identity::person("member");
        let team = team_with_members(&mut directory, &[&member]);
        let direct = Identity::person("direct");
        let directory = Arc::new(directory);
        let relationships =
            Arc::new(FlakyRelationshipStore::new(directory.clone()).failing_on(Relationship::Has));
        let resolver = RecipientResolver::new(directory, relationships);

        let persons = resolver
            .task_assignees(&[team.entity_ref(), direct.entity_ref()])
            .await;

        assert_eq!(persons, HashSet::from([direct.id]));
    }

    #[tokio::test]
    async fn test_assignee_addresses_extract_per_channel() {
        let mut directory = InMemoryDirectory::new();
        let member = Identity::person("member")
            .with_email("member@example.com")
            .with_webhook(ChannelType::GChat, "https://chat.test/member");
        let team = team_with_members(&mut directory, &[&member]);
        directory.insert_identity(member);
        let directory = Arc::new(directory);
        let resolver = RecipientResolver::new(directory.clone(), directory);

        let emails = resolver
            .assignee_addresses(&[team.entity_ref()], ChannelType::Email)
            .await
            .into_addresses();
        let hooks = resolver
            .assignee_addresses(&[team.entity_ref()], ChannelType::GChat)
            .await
            .into_addresses();

        assert_eq!(emails, HashSet::from(["member@example.com".to_string()]));
        assert_eq!(hooks, HashSet::from(["https://chat.test/member".to_string()]));
    }
}
