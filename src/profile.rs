//! Extraction of per-channel webhook endpoints from notification profiles.

use crate::core::{ChannelType, IdentityKind, NotificationProfile};
use tracing::debug;
use uuid::Uuid;

/// Returns the webhook endpoint a person or team configured for `channel`.
///
/// A missing profile, missing subscription configuration or blank endpoint
/// means the identity opted out of the channel; this is logged at debug level
/// and yields `None`. The endpoint is returned as configured.
///
/// Email addresses are not read here: callers dispatch on the channel type and
/// read the identity's email directly. Asking for [`ChannelType::Email`] yields
/// `None`.
pub fn webhook_endpoint(
    profile: Option<&NotificationProfile>,
    id: Uuid,
    kind: IdentityKind,
    channel: ChannelType,
) -> Option<String> {
    if !channel.is_webhook() {
        debug!(%id, %kind, %channel, "Channel has no webhook field, skipping");
        return None;
    }

    let Some(profile) = profile else {
        debug!(%id, %kind, %channel, "No notification profile, skipping");
        return None;
    };
    let Some(subscription) = profile.subscription.as_ref() else {
        debug!(%id, %kind, %channel, "Profile has no subscription configuration, skipping");
        return None;
    };

    let endpoint = subscription
        .webhook_for(channel)
        .and_then(|webhook| webhook.endpoint.as_deref())
        .filter(|endpoint| !endpoint.trim().is_empty());

    if endpoint.is_none() {
        debug!(%id, %kind, %channel, "No webhook configured for channel, skipping");
    }
    endpoint.map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Identity, SubscriptionConfig, Webhook};
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_missing_profile_yields_nothing() {
        let id = Uuid::new_v4();
        let endpoint = webhook_endpoint(None, id, IdentityKind::Person, ChannelType::Slack);

        assert_eq!(endpoint, None);
        assert!(logs_contain("No notification profile"));
        assert!(logs_contain(&id.to_string()));
    }

    #[test]
    fn test_profile_without_subscription_yields_nothing() {
        let profile = NotificationProfile { subscription: None };
        let endpoint = webhook_endpoint(
            Some(&profile),
            Uuid::new_v4(),
            IdentityKind::Team,
            ChannelType::Generic,
        );
        assert_eq!(endpoint, None);
    }

    #[test]
    fn test_returns_endpoint_for_requested_channel_only() {
        let person = Identity::person("alice")
            .with_webhook(ChannelType::Slack, "https://hooks.slack.test/alice");

        let slack = webhook_endpoint(
            person.profile.as_ref(),
            person.id,
            person.kind,
            ChannelType::Slack,
        );
        let teams = webhook_endpoint(
            person.profile.as_ref(),
            person.id,
            person.kind,
            ChannelType::MsTeams,
        );

        assert_eq!(slack.as_deref(), Some("https://hooks.slack.test/alice"));
        assert_eq!(teams, None);
    }

    #[test]
    fn test_endpoint_is_returned_as_configured() {
        let person = Identity::person("alice")
            .with_webhook(ChannelType::Generic, " https://hooks.test/alice/ ");

        let endpoint = webhook_endpoint(
            person.profile.as_ref(),
            person.id,
            person.kind,
            ChannelType::Generic,
        );

        assert_eq!(endpoint.as_deref(), Some(" https://hooks.test/alice/ "));
    }

    #[test]
    #[traced_test]
    fn test_email_channel_yields_nothing() {
        let person = Identity::person("alice")
            .with_email("alice@example.com")
            .with_webhook(ChannelType::Slack, "https://hooks.test/alice");

        let endpoint = webhook_endpoint(
            person.profile.as_ref(),
            person.id,
            person.kind,
            ChannelType::Email,
        );

        assert_eq!(endpoint, None);
        assert!(logs_contain("Channel has no webhook field"));
    }

    #[test]
    #[traced_test]
    fn test_blank_endpoint_counts_as_unconfigured() {
        let profile = NotificationProfile {
            subscription: Some(SubscriptionConfig {
                g_chat: Some(Webhook::new("   ")),
                generic: Some(Webhook { endpoint: None }),
                ..Default::default()
            }),
        };
        let id = Uuid::new_v4();

        assert_eq!(
            webhook_endpoint(Some(&profile), id, IdentityKind::Person, ChannelType::GChat),
            None
        );
        assert_eq!(
            webhook_endpoint(Some(&profile), id, IdentityKind::Person, ChannelType::Generic),
            None
        );
        assert!(logs_contain("No webhook configured for channel"));
    }
}
