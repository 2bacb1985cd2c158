use crate::http::ServiceError;
use crate::model::{Subscription, SubscriptionCondition, SubscriptionResource};
use crate::scope::VIRTUAL_END_DEVICE_SITE_ID;
use crate::sep2::pub_sub::{Condition, Subscription as WireSubscription, SubscriptionList};
use crate::sep2::sep2_ns;
use crate::store::subscription::SubscriptionInsert;

use super::{MapperContext, PUBLIC_SITE_DER_ID};

/// Renders the resource URI a subscription watches, reversing
/// [`parse_subscribed_resource`].
pub fn subscribed_resource_uri(subscription: &Subscription) -> String {
    let site_id = subscription.scoped_site_id.unwrap_or(VIRTUAL_END_DEVICE_SITE_ID);
    match subscription.resource_type {
        SubscriptionResource::Site => String::from("/edev"),
        SubscriptionResource::DynamicOperatingEnvelope => match subscription.resource_id {
            Some(id) => format!("/edev/{site_id}/derp/{PUBLIC_SITE_DER_ID}/derc/{id}"),
            None => format!("/edev/{site_id}/derp/{PUBLIC_SITE_DER_ID}/derc"),
        },
        SubscriptionResource::TariffGeneratedRate => match subscription.resource_id {
            Some(id) => format!("/edev/{site_id}/tp/{id}/rc"),
            None => format!("/edev/{site_id}/tp"),
        },
        SubscriptionResource::Reading => match subscription.resource_id {
            Some(id) => format!("/mup/{id}"),
            None => String::from("/mup"),
        },
        SubscriptionResource::DefaultSiteControl => {
            format!("/edev/{site_id}/derp/{PUBLIC_SITE_DER_ID}/dderc")
        }
    }
}

/// Parses a client-supplied `subscribedResource` URI into the watched
/// resource type, optional resource id and optional site scope.
pub fn parse_subscribed_resource(
    uri: &str,
) -> Result<(SubscriptionResource, Option<i64>, Option<i64>), ServiceError> {
    let parts: Vec<&str> = uri.split('/').filter(|part| !part.is_empty()).collect();

    let parse_id = |raw: &str| -> Result<i64, ServiceError> {
        raw.parse()
            .map_err(|_| ServiceError::bad_request(format!("'{raw}' is not a valid id in {uri}")))
    };

    let site_scope = |site_id: i64| {
        if site_id == VIRTUAL_END_DEVICE_SITE_ID {
            None
        } else {
            Some(site_id)
        }
    };

    match parts.as_slice() {
        ["edev"] => Ok((SubscriptionResource::Site, None, None)),
        ["mup"] => Ok((SubscriptionResource::Reading, None, None)),
        ["mup", mup_id] => Ok((SubscriptionResource::Reading, Some(parse_id(mup_id)?), None)),
        ["edev", site_id, "derp", _, "derc"] => Ok((
            SubscriptionResource::DynamicOperatingEnvelope,
            None,
            site_scope(parse_id(site_id)?),
        )),
        ["edev", site_id, "derp", _, "derc", doe_id] => Ok((
            SubscriptionResource::DynamicOperatingEnvelope,
            Some(parse_id(doe_id)?),
            site_scope(parse_id(site_id)?),
        )),
        ["edev", site_id, "derp", _, "dderc"] => Ok((
            SubscriptionResource::DefaultSiteControl,
            None,
            site_scope(parse_id(site_id)?),
        )),
        ["edev", site_id, "tp"] => Ok((
            SubscriptionResource::TariffGeneratedRate,
            None,
            site_scope(parse_id(site_id)?),
        )),
        ["edev", site_id, "tp", tariff_id, "rc"] => Ok((
            SubscriptionResource::TariffGeneratedRate,
            Some(parse_id(tariff_id)?),
            site_scope(parse_id(site_id)?),
        )),
        _ => Err(ServiceError::bad_request(format!(
            "subscribedResource '{uri}' is not a subscribable resource"
        ))),
    }
}

pub fn map_subscription(
    ctx: &MapperContext,
    subscription: &Subscription,
    conditions: &[SubscriptionCondition],
) -> WireSubscription {
    let site_id = subscription.scoped_site_id.unwrap_or(VIRTUAL_END_DEVICE_SITE_ID);
    WireSubscription {
        xmlns: sep2_ns(),
        href: Some(ctx.href(&format!(
            "/edev/{site_id}/sub/{}",
            subscription.subscription_id
        ))),
        subscribed_resource: ctx.href(&subscribed_resource_uri(subscription)),
        condition: conditions.first().map(|condition| Condition {
            attribute_identifier: 0,
            lower_threshold: condition.lower_threshold,
            upper_threshold: condition.upper_threshold,
        }),
        encoding: 0, // application/sep+xml
        level: String::from("+S1"),
        limit: subscription.entity_limit,
        notification_uri: subscription.notification_uri.clone(),
    }
}

pub fn map_subscription_list(
    ctx: &MapperContext,
    site_id: i64,
    subscriptions: &[(Subscription, Vec<SubscriptionCondition>)],
    total: i64,
) -> SubscriptionList {
    SubscriptionList {
        xmlns: sep2_ns(),
        href: ctx.href(&format!("/edev/{site_id}/sub")),
        all: total,
        results: i64::try_from(subscriptions.len()).unwrap_or(i64::MAX),
        subscriptions: subscriptions
            .iter()
            .map(|(subscription, conditions)| map_subscription(ctx, subscription, conditions))
            .collect(),
    }
}

/// Maps a client subscription request into an insertable row, stripping the
/// configured href prefix from the subscribed resource first.
pub fn subscription_from_request(
    ctx: &MapperContext,
    aggregator_id: i64,
    request: &WireSubscription,
    changed_time: time::OffsetDateTime,
) -> Result<SubscriptionInsert, ServiceError> {
    let resource_uri = strip_href_prefix(ctx, &request.subscribed_resource);
    let (resource_type, resource_id, scoped_site_id) = parse_subscribed_resource(&resource_uri)?;

    if request.limit < 1 {
        return Err(ServiceError::bad_request("subscription limit must be at least 1"));
    }

    Ok(SubscriptionInsert {
        aggregator_id,
        resource_type,
        resource_id,
        scoped_site_id,
        notification_uri: request.notification_uri.clone(),
        entity_limit: request.limit,
        conditions: request
            .condition
            .iter()
            .map(|condition| (condition.lower_threshold, condition.upper_threshold))
            .collect(),
        changed_time,
    })
}

fn strip_href_prefix(ctx: &MapperContext, href: &str) -> String {
    match ctx.href_prefix.as_deref() {
        Some(prefix) if href.starts_with(prefix) => {
            let stripped = &href[prefix.len()..];
            if stripped.starts_with('/') {
                stripped.to_owned()
            } else {
                format!("/{stripped}")
            }
        }
        _ => href.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case("/edev", SubscriptionResource::Site, None, None)]
    #[case("/edev/0/derp/1/derc", SubscriptionResource::DynamicOperatingEnvelope, None, None)]
    #[case("/edev/3/derp/1/derc", SubscriptionResource::DynamicOperatingEnvelope, None, Some(3))]
    #[case("/edev/3/derp/1/derc/42", SubscriptionResource::DynamicOperatingEnvelope, Some(42), Some(3))]
    #[case("/edev/3/tp/7/rc", SubscriptionResource::TariffGeneratedRate, Some(7), Some(3))]
    #[case("/mup", SubscriptionResource::Reading, None, None)]
    #[case("/mup/5", SubscriptionResource::Reading, Some(5), None)]
    fn subscribed_resource_parses(
        #[case] uri: &str,
        #[case] resource: SubscriptionResource,
        #[case] resource_id: Option<i64>,
        #[case] site_id: Option<i64>,
    ) {
        assert_eq!(
            parse_subscribed_resource(uri).expect("parses"),
            (resource, resource_id, site_id)
        );
    }

    #[test]
    fn junk_subscribed_resource_is_rejected() {
        assert!(parse_subscribed_resource("/dcap").is_err());
        assert!(parse_subscribed_resource("/edev/abc/derp/1/derc").is_err());
    }
}
