//! Change detection and sep2 batching.
//!
//! A sep2 Notification is raised under a single list resource, so entities
//! changed at one instant must be grouped by the tuple identifying that
//! list. The first element of every batch key is the aggregator id.

use std::collections::HashMap;

use sqlx::PgConnection;
use time::OffsetDateTime;

use crate::model::{
    ArchiveDynamicOperatingEnvelope, ArchiveSite, ArchiveTariffGeneratedRate, DynamicOperatingEnvelope, Site,
    SiteReading, SiteReadingType, Subscription, SubscriptionCondition, SubscriptionResource,
    TariffGeneratedRate,
};
use crate::store::archive::{self, specs};

/// One changed (or deleted) entity, carrying enough parent context to be
/// batched and rendered without further lookups.
#[derive(Debug, Clone)]
pub enum ChangedEntity {
    Site {
        site: Site,
        deleted: bool,
    },
    Doe {
        doe: DynamicOperatingEnvelope,
        aggregator_id: i64,
        deleted: bool,
    },
    Rate {
        rate: TariffGeneratedRate,
        aggregator_id: i64,
        deleted: bool,
    },
    Reading {
        reading: SiteReading,
        reading_type: SiteReadingType,
        deleted: bool,
    },
}

impl ChangedEntity {
    pub fn aggregator_id(&self) -> i64 {
        match self {
            ChangedEntity::Site { site, .. } => site.aggregator_id,
            ChangedEntity::Doe { aggregator_id, .. } => *aggregator_id,
            ChangedEntity::Rate { aggregator_id, .. } => *aggregator_id,
            ChangedEntity::Reading { reading_type, .. } => reading_type.aggregator_id,
        }
    }

    pub fn site_id(&self) -> i64 {
        match self {
            ChangedEntity::Site { site, .. } => site.site_id,
            ChangedEntity::Doe { doe, .. } => doe.site_id,
            ChangedEntity::Rate { rate, .. } => rate.site_id,
            ChangedEntity::Reading { reading_type, .. } => reading_type.site_id,
        }
    }

    pub fn deleted(&self) -> bool {
        match self {
            ChangedEntity::Site { deleted, .. }
            | ChangedEntity::Doe { deleted, .. }
            | ChangedEntity::Rate { deleted, .. }
            | ChangedEntity::Reading { deleted, .. } => *deleted,
        }
    }

    /// The id `Subscription.resource_id` filters on, per resource flavour.
    pub fn filter_id(&self) -> i64 {
        match self {
            ChangedEntity::Site { site, .. } => site.site_id,
            ChangedEntity::Doe { doe, .. } => doe.dynamic_operating_envelope_id,
            ChangedEntity::Rate { rate, .. } => rate.tariff_id,
            ChangedEntity::Reading { reading, .. } => reading.site_reading_type_id,
        }
    }

    /// The sep2 batch key. Rates additionally split by the calendar date
    /// (UTC) of their start time.
    pub fn batch_key(&self) -> BatchKey {
        match self {
            ChangedEntity::Site { site, .. } => BatchKey {
                aggregator_id: site.aggregator_id,
                rest: vec![site.site_id],
            },
            ChangedEntity::Doe { doe, aggregator_id, .. } => BatchKey {
                aggregator_id: *aggregator_id,
                rest: vec![doe.site_id],
            },
            ChangedEntity::Reading { reading, reading_type, .. } => BatchKey {
                aggregator_id: reading_type.aggregator_id,
                rest: vec![reading_type.site_id, reading.site_reading_type_id],
            },
            ChangedEntity::Rate { rate, aggregator_id, .. } => BatchKey {
                aggregator_id: *aggregator_id,
                rest: vec![
                    rate.tariff_id,
                    rate.site_id,
                    i64::from(rate.start_time.date().to_julian_day()),
                ],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub aggregator_id: i64,
    pub rest: Vec<i64>,
}

/// Partitions entities into sep2 notification batches.
pub fn batch_entities(entities: Vec<ChangedEntity>) -> HashMap<BatchKey, Vec<ChangedEntity>> {
    let mut batches: HashMap<BatchKey, Vec<ChangedEntity>> = HashMap::new();
    for entity in entities {
        batches.entry(entity.batch_key()).or_default().push(entity);
    }
    batches
}

/// Whether `subscription` wants `entity`, given the batch has already been
/// narrowed to the right aggregator and resource type.
///
/// Conditions range over the reading value; an entity without that
/// attribute can never satisfy one.
pub fn entity_matches_subscription(
    subscription: &Subscription,
    conditions: &[SubscriptionCondition],
    entity: &ChangedEntity,
) -> bool {
    if let Some(resource_id) = subscription.resource_id {
        if entity.filter_id() != resource_id {
            return false;
        }
    }

    if let Some(scoped_site_id) = subscription.scoped_site_id {
        if entity.site_id() != scoped_site_id {
            return false;
        }
    }

    conditions.iter().all(|condition| match entity {
        ChangedEntity::Reading { reading, .. } => condition.matches(reading.value),
        _ => false,
    })
}

/// Fetches every site stamped with `timestamp`, plus archived sites deleted
/// at that instant.
pub async fn fetch_sites_by_changed_at(
    conn: &mut PgConnection,
    timestamp: OffsetDateTime,
) -> sqlx::Result<Vec<ChangedEntity>> {
    let live: Vec<Site> = sqlx::query_as("SELECT * FROM site WHERE changed_time = $1")
        .bind(timestamp)
        .fetch_all(&mut *conn)
        .await?;

    let deleted: Vec<ArchiveSite> = sqlx::query_as(
        "SELECT DISTINCT ON (site_id) * FROM archive_site WHERE deleted_time = $1 \
         ORDER BY site_id, archive_time DESC",
    )
    .bind(timestamp)
    .fetch_all(conn)
    .await?;

    Ok(live
        .into_iter()
        .map(|site| ChangedEntity::Site { site, deleted: false })
        .chain(deleted.into_iter().map(|row| ChangedEntity::Site {
            site: Site {
                site_id: row.site_id,
                aggregator_id: row.aggregator_id,
                lfdi: row.lfdi,
                sfdi: row.sfdi,
                device_category: row.device_category,
                timezone_id: row.timezone_id,
                nmi: row.nmi,
                registration_pin: row.registration_pin,
                created_time: row.created_time,
                changed_time: row.changed_time,
            },
            deleted: true,
        }))
        .collect())
}

/// Resolves `site_id → aggregator_id` for entities whose parent site may
/// itself be deleted, using the archive-aware re-fetch protocol.
async fn resolve_site_aggregators(
    conn: &mut PgConnection,
    site_ids: Vec<i64>,
) -> sqlx::Result<HashMap<i64, i64>> {
    if site_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let (live, archived): (Vec<Site>, Vec<ArchiveSite>) =
        archive::fetch_with_archive_by_id(conn, &specs::SITE, &site_ids).await?;

    let mut map = HashMap::new();
    for site in live {
        map.insert(site.site_id, site.aggregator_id);
    }
    for row in archived {
        map.entry(row.site_id).or_insert(row.aggregator_id);
    }
    Ok(map)
}

pub async fn fetch_does_by_changed_at(
    conn: &mut PgConnection,
    timestamp: OffsetDateTime,
) -> sqlx::Result<Vec<ChangedEntity>> {
    let live: Vec<DynamicOperatingEnvelope> =
        sqlx::query_as("SELECT * FROM dynamic_operating_envelope WHERE changed_time = $1")
            .bind(timestamp)
            .fetch_all(&mut *conn)
            .await?;

    let deleted: Vec<ArchiveDynamicOperatingEnvelope> = sqlx::query_as(
        "SELECT DISTINCT ON (dynamic_operating_envelope_id) * FROM archive_dynamic_operating_envelope \
         WHERE deleted_time = $1 ORDER BY dynamic_operating_envelope_id, archive_time DESC",
    )
    .bind(timestamp)
    .fetch_all(&mut *conn)
    .await?;

    let mut site_ids: Vec<i64> = live.iter().map(|d| d.site_id).chain(deleted.iter().map(|d| d.site_id)).collect();
    site_ids.sort_unstable();
    site_ids.dedup();
    let aggregators = resolve_site_aggregators(conn, site_ids).await?;

    let mut entities = Vec::new();
    for doe in live {
        if let Some(aggregator_id) = aggregators.get(&doe.site_id) {
            entities.push(ChangedEntity::Doe {
                aggregator_id: *aggregator_id,
                doe,
                deleted: false,
            });
        }
    }
    for row in deleted {
        if let Some(aggregator_id) = aggregators.get(&row.site_id) {
            let crate::store::doe::DoeWithDeleted { doe, .. } = row.into();
            entities.push(ChangedEntity::Doe {
                aggregator_id: *aggregator_id,
                doe,
                deleted: true,
            });
        }
    }
    Ok(entities)
}

pub async fn fetch_rates_by_changed_at(
    conn: &mut PgConnection,
    timestamp: OffsetDateTime,
) -> sqlx::Result<Vec<ChangedEntity>> {
    let live: Vec<TariffGeneratedRate> =
        sqlx::query_as("SELECT * FROM tariff_generated_rate WHERE changed_time = $1")
            .bind(timestamp)
            .fetch_all(&mut *conn)
            .await?;

    let deleted: Vec<ArchiveTariffGeneratedRate> = sqlx::query_as(
        "SELECT DISTINCT ON (tariff_generated_rate_id) * FROM archive_tariff_generated_rate \
         WHERE deleted_time = $1 ORDER BY tariff_generated_rate_id, archive_time DESC",
    )
    .bind(timestamp)
    .fetch_all(&mut *conn)
    .await?;

    let mut site_ids: Vec<i64> = live.iter().map(|r| r.site_id).chain(deleted.iter().map(|r| r.site_id)).collect();
    site_ids.sort_unstable();
    site_ids.dedup();
    let aggregators = resolve_site_aggregators(conn, site_ids).await?;

    let mut entities = Vec::new();
    for rate in live {
        if let Some(aggregator_id) = aggregators.get(&rate.site_id) {
            entities.push(ChangedEntity::Rate {
                aggregator_id: *aggregator_id,
                rate,
                deleted: false,
            });
        }
    }
    for row in deleted {
        if let Some(aggregator_id) = aggregators.get(&row.site_id) {
            entities.push(ChangedEntity::Rate {
                aggregator_id: *aggregator_id,
                rate: TariffGeneratedRate {
                    tariff_generated_rate_id: row.tariff_generated_rate_id,
                    tariff_id: row.tariff_id,
                    site_id: row.site_id,
                    calculation_log_id: row.calculation_log_id,
                    start_time: row.start_time,
                    duration_seconds: row.duration_seconds,
                    import_active_price: row.import_active_price,
                    export_active_price: row.export_active_price,
                    import_reactive_price: row.import_reactive_price,
                    export_reactive_price: row.export_reactive_price,
                    created_time: row.created_time,
                    changed_time: row.changed_time,
                },
                deleted: true,
            });
        }
    }
    Ok(entities)
}

pub async fn fetch_readings_by_changed_at(
    conn: &mut PgConnection,
    timestamp: OffsetDateTime,
) -> sqlx::Result<Vec<ChangedEntity>> {
    #[derive(sqlx::FromRow)]
    struct ReadingWithType {
        #[sqlx(flatten)]
        reading: SiteReading,
        #[sqlx(flatten)]
        reading_type: SiteReadingType,
    }

    let live: Vec<ReadingWithType> = sqlx::query_as(
        "SELECT r.*, t.aggregator_id, t.site_id, t.mup_lfdi, t.uom, t.data_qualifier, t.flow_direction, \
                t.accumulation_behaviour, t.kind, t.phase, t.power_of_ten_multiplier, t.default_interval_seconds \
         FROM site_reading r \
         JOIN site_reading_type t ON t.site_reading_type_id = r.site_reading_type_id \
         WHERE r.changed_time = $1",
    )
    .bind(timestamp)
    .fetch_all(&mut *conn)
    .await?;

    // Readings deleted at this instant (a cascade from their site) live in
    // the archive, as may their channel definitions.
    let deleted: Vec<SiteReading> = sqlx::query_as(
        "SELECT DISTINCT ON (site_reading_id) \
             site_reading_id, site_reading_type_id, local_id, quality_flags, time_period_start, \
             time_period_seconds, value, created_time, changed_time \
         FROM archive_site_reading WHERE deleted_time = $1 \
         ORDER BY site_reading_id, archive_time DESC",
    )
    .bind(timestamp)
    .fetch_all(&mut *conn)
    .await?;

    let mut entities: Vec<ChangedEntity> = live
        .into_iter()
        .map(|row| ChangedEntity::Reading {
            reading: row.reading,
            reading_type: row.reading_type,
            deleted: false,
        })
        .collect();

    if !deleted.is_empty() {
        let mut srt_ids: Vec<i64> = deleted.iter().map(|r| r.site_reading_type_id).collect();
        srt_ids.sort_unstable();
        srt_ids.dedup();

        let mut types: HashMap<i64, SiteReadingType> = sqlx::query_as::<_, SiteReadingType>(
            "SELECT * FROM site_reading_type WHERE site_reading_type_id = ANY($1)",
        )
        .bind(&srt_ids)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|t| (t.site_reading_type_id, t))
        .collect();

        let missing: Vec<i64> = srt_ids.iter().copied().filter(|id| !types.contains_key(id)).collect();
        if !missing.is_empty() {
            let archived_types: Vec<SiteReadingType> = sqlx::query_as(
                "SELECT DISTINCT ON (site_reading_type_id) \
                     site_reading_type_id, aggregator_id, site_id, mup_lfdi, uom, data_qualifier, \
                     flow_direction, accumulation_behaviour, kind, phase, power_of_ten_multiplier, \
                     default_interval_seconds, created_time, changed_time \
                 FROM archive_site_reading_type WHERE site_reading_type_id = ANY($1) \
                 ORDER BY site_reading_type_id, deleted_time DESC NULLS LAST, archive_time DESC",
            )
            .bind(&missing)
            .fetch_all(conn)
            .await?;
            types.extend(archived_types.into_iter().map(|t| (t.site_reading_type_id, t)));
        }

        for reading in deleted {
            if let Some(reading_type) = types.get(&reading.site_reading_type_id) {
                entities.push(ChangedEntity::Reading {
                    reading,
                    reading_type: reading_type.clone(),
                    deleted: true,
                });
            }
        }
    }

    Ok(entities)
}

/// Dispatches on the resource flavour.
pub async fn fetch_entities_by_changed_at(
    conn: &mut PgConnection,
    resource: SubscriptionResource,
    timestamp: OffsetDateTime,
) -> sqlx::Result<Vec<ChangedEntity>> {
    match resource {
        SubscriptionResource::Site => fetch_sites_by_changed_at(conn, timestamp).await,
        SubscriptionResource::DynamicOperatingEnvelope => fetch_does_by_changed_at(conn, timestamp).await,
        SubscriptionResource::TariffGeneratedRate => fetch_rates_by_changed_at(conn, timestamp).await,
        SubscriptionResource::Reading => fetch_readings_by_changed_at(conn, timestamp).await,
        // Default control changes are per-site singletons with no list body.
        SubscriptionResource::DefaultSiteControl => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use time::macros::datetime;

    fn site(site_id: i64, aggregator_id: i64) -> ChangedEntity {
        ChangedEntity::Site {
            site: Site {
                site_id,
                aggregator_id,
                ..Site::default()
            },
            deleted: false,
        }
    }

    fn rate(rate_id: i64, tariff_id: i64, site_id: i64, start: OffsetDateTime) -> ChangedEntity {
        ChangedEntity::Rate {
            aggregator_id: 1,
            rate: TariffGeneratedRate {
                tariff_generated_rate_id: rate_id,
                tariff_id,
                site_id,
                calculation_log_id: None,
                start_time: start,
                duration_seconds: 300,
                import_active_price: rust_decimal::Decimal::ZERO,
                export_active_price: rust_decimal::Decimal::ZERO,
                import_reactive_price: rust_decimal::Decimal::ZERO,
                export_reactive_price: rust_decimal::Decimal::ZERO,
                created_time: start,
                changed_time: start,
            },
            deleted: false,
        }
    }

    fn subscription(resource_id: Option<i64>, scoped_site_id: Option<i64>) -> Subscription {
        Subscription {
            subscription_id: 1,
            aggregator_id: 1,
            resource_type: SubscriptionResource::Site,
            resource_id,
            scoped_site_id,
            notification_uri: String::from("https://example.com/hook"),
            entity_limit: 10,
            created_time: OffsetDateTime::UNIX_EPOCH,
            changed_time: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn entities_sharing_a_batch_key_group_together() {
        let batches = batch_entities(vec![site(1, 7), site(1, 7), site(2, 7)]);
        assert_eq!(batches.len(), 2);

        let key = ChangedEntity::Site {
            site: Site {
                site_id: 1,
                aggregator_id: 7,
                ..Site::default()
            },
            deleted: false,
        }
        .batch_key();
        assert_eq!(batches.get(&key).map(Vec::len), Some(2));
    }

    #[test]
    fn rates_batch_by_tariff_site_and_day() {
        let day1 = datetime!(2024-01-01 01:00 UTC);
        let day1_later = datetime!(2024-01-01 23:00 UTC);
        let day2 = datetime!(2024-01-02 01:00 UTC);

        let batches = batch_entities(vec![
            rate(1, 5, 3, day1),
            rate(2, 5, 3, day1_later),
            rate(3, 5, 3, day2),
            rate(4, 6, 3, day1),
        ]);

        assert_eq!(batches.len(), 3);
    }

    #[test]
    fn resource_id_and_site_scope_filters_apply() {
        let entity = site(3, 1);

        assert!(entity_matches_subscription(&subscription(None, None), &[], &entity));
        assert!(entity_matches_subscription(&subscription(Some(3), Some(3)), &[], &entity));
        assert!(!entity_matches_subscription(&subscription(Some(4), None), &[], &entity));
        assert!(!entity_matches_subscription(&subscription(None, Some(9)), &[], &entity));
    }

    #[test]
    fn conditions_only_ever_match_reading_values() {
        let condition = SubscriptionCondition {
            subscription_condition_id: 1,
            subscription_id: 1,
            attribute: crate::model::subscription::ConditionAttribute::ReadingValue,
            lower_threshold: 0,
            upper_threshold: 100,
        };

        // A non-reading entity can't satisfy a reading-value condition.
        assert!(!entity_matches_subscription(
            &subscription(None, None),
            std::slice::from_ref(&condition),
            &site(3, 1)
        ));

        let reading_entity = ChangedEntity::Reading {
            reading: SiteReading {
                site_reading_id: 1,
                site_reading_type_id: 2,
                local_id: None,
                quality_flags: 0,
                time_period_start: OffsetDateTime::UNIX_EPOCH,
                time_period_seconds: 300,
                value: 50,
                created_time: OffsetDateTime::UNIX_EPOCH,
                changed_time: OffsetDateTime::UNIX_EPOCH,
            },
            reading_type: SiteReadingType {
                site_reading_type_id: 2,
                aggregator_id: 1,
                site_id: 3,
                mup_lfdi: String::new(),
                uom: 38,
                data_qualifier: 0,
                flow_direction: 1,
                accumulation_behaviour: 0,
                kind: 0,
                phase: 0,
                power_of_ten_multiplier: 0,
                default_interval_seconds: 300,
                created_time: OffsetDateTime::UNIX_EPOCH,
                changed_time: OffsetDateTime::UNIX_EPOCH,
            },
            deleted: false,
        };

        let mut in_range = subscription(None, None);
        in_range.resource_type = SubscriptionResource::Reading;
        assert!(entity_matches_subscription(
            &in_range,
            std::slice::from_ref(&condition),
            &reading_entity
        ));

        let narrow = SubscriptionCondition {
            upper_threshold: 10,
            ..condition
        };
        assert!(!entity_matches_subscription(&in_range, &[narrow], &reading_entity));
    }
}
