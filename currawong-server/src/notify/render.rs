//! Renders sep2 Notification bodies for batches of changed entities.

use anyhow::Context as _;
use quick_xml::escape::escape;
use time::OffsetDateTime;

use crate::mapper::{self, MapperContext};
use crate::model::Subscription;
use crate::scope::VIRTUAL_END_DEVICE_SITE_ID;
use crate::sep2::pub_sub::{NOTIFICATION_STATUS_DEFAULT, NOTIFICATION_STATUS_DELETED};
use crate::sep2::SEP2_NS;

use super::batch::ChangedEntity;

/// The href of the subscription that produced a notification, also sent as
/// the `x-envoy-subscription-href` header.
pub fn subscription_href(ctx: &MapperContext, subscription: &Subscription) -> String {
    let site_id = subscription.scoped_site_id.unwrap_or(VIRTUAL_END_DEVICE_SITE_ID);
    ctx.href(&format!("/edev/{site_id}/sub/{}", subscription.subscription_id))
}

fn xsi_type(entity: &ChangedEntity) -> &'static str {
    match entity {
        ChangedEntity::Site { .. } => "EndDeviceList",
        ChangedEntity::Doe { .. } => "DERControlList",
        ChangedEntity::Rate { .. } => "TimeTariffIntervalList",
        ChangedEntity::Reading { .. } => "ReadingList",
    }
}

fn render_entity(ctx: &MapperContext, entity: &ChangedEntity, now: OffsetDateTime) -> anyhow::Result<String> {
    match entity {
        ChangedEntity::Site { site, .. } => {
            quick_xml::se::to_string(&mapper::end_device::map_site(ctx, site)).context("render EndDevice")
        }
        ChangedEntity::Doe { doe, deleted, .. } => {
            let control =
                mapper::derp::map_doe(ctx, doe.site_id, doe.site_control_group_id, doe, now, *deleted);
            quick_xml::se::to_string(&control).context("render DERControl")
        }
        ChangedEntity::Rate { rate, .. } => {
            let mut rendered = String::new();
            for interval in mapper::pricing::map_rate_all_readings(ctx, rate) {
                rendered.push_str(
                    &quick_xml::se::to_string(&interval).context("render TimeTariffInterval")?,
                );
            }
            Ok(rendered)
        }
        ChangedEntity::Reading { reading, .. } => {
            quick_xml::se::to_string_with_root("Reading", &mapper::metering::map_reading(reading))
                .context("render Reading")
        }
    }
}

/// Renders the full Notification body for one (subscription, chunk) pair.
/// All entities in a chunk share the deleted flag; a deletion notification
/// carries the last-known state with sep2 status 4.
pub fn render_notification(
    ctx: &MapperContext,
    subscription: &Subscription,
    entities: &[ChangedEntity],
    now: OffsetDateTime,
) -> anyhow::Result<String> {
    let deleted = entities.first().is_some_and(ChangedEntity::deleted);
    let status = if deleted {
        NOTIFICATION_STATUS_DELETED
    } else {
        NOTIFICATION_STATUS_DEFAULT
    };

    let subscribed_resource = ctx.href(&mapper::pub_sub::subscribed_resource_uri(subscription));
    let subscription_uri = subscription_href(ctx, subscription);

    let mut inner = String::new();
    for entity in entities {
        inner.push_str(&render_entity(ctx, entity, now)?);
    }

    let count = entities.len();
    let resource_type = entities.first().map(xsi_type).unwrap_or("Resource");

    Ok(format!(
        concat!(
            r#"<Notification xmlns="{ns}" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            "<subscribedResource>{subscribed}</subscribedResource>",
            r#"<Resource xsi:type="{resource_type}" all="{count}" results="{count}">{inner}</Resource>"#,
            "<status>{status}</status>",
            "<subscriptionURI>{subscription_uri}</subscriptionURI>",
            "</Notification>",
        ),
        ns = SEP2_NS,
        subscribed = escape(&subscribed_resource),
        resource_type = resource_type,
        count = count,
        inner = inner,
        status = status,
        subscription_uri = escape(&subscription_uri),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::{Site, SubscriptionResource};

    fn ctx() -> MapperContext {
        MapperContext {
            href_prefix: None,
            iana_pen: 40414,
            pow10: -2,
        }
    }

    fn subscription() -> Subscription {
        Subscription {
            subscription_id: 9,
            aggregator_id: 1,
            resource_type: SubscriptionResource::Site,
            resource_id: None,
            scoped_site_id: None,
            notification_uri: String::from("https://example.com/hook"),
            entity_limit: 10,
            created_time: OffsetDateTime::UNIX_EPOCH,
            changed_time: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn site_entity(site_id: i64, deleted: bool) -> ChangedEntity {
        ChangedEntity::Site {
            site: Site {
                site_id,
                aggregator_id: 1,
                sfdi: 1234,
                ..Site::default()
            },
            deleted,
        }
    }

    #[test]
    fn notification_carries_every_entity_in_the_batch() {
        let body = render_notification(
            &ctx(),
            &subscription(),
            &[site_entity(1, false), site_entity(2, false)],
            OffsetDateTime::UNIX_EPOCH,
        )
        .expect("renders");

        assert_eq!(body.matches("<EndDevice").count(), 2);
        assert!(body.contains(r#"all="2""#));
        assert!(body.contains("<status>0</status>"));
        assert!(body.contains("<subscriptionURI>/edev/0/sub/9</subscriptionURI>"));
    }

    #[test]
    fn deletion_notification_uses_status_4() {
        let body = render_notification(
            &ctx(),
            &subscription(),
            &[site_entity(1, true)],
            OffsetDateTime::UNIX_EPOCH,
        )
        .expect("renders");

        assert!(body.contains("<status>4</status>"));
        // The payload still carries the last-known state.
        assert!(body.contains("<EndDevice"));
    }
}
