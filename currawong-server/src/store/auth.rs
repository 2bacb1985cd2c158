use sqlx::PgPool;

use crate::auth::ClientIdDetails;

/// Fetches every certificate with an aggregator assignment, expired ones
/// included: the cache needs those present so stale certs are rejected
/// rather than mistaken for device certs. Where an LFDI is assigned to
/// several aggregators, the most recent assignment wins.
pub async fn select_all_client_id_details(pool: &PgPool) -> sqlx::Result<Vec<ClientIdDetails>> {
    sqlx::query_as(
        "SELECT DISTINCT ON (c.lfdi) \
             c.certificate_id, lower(c.lfdi) AS lfdi, ca.aggregator_id, c.expiry \
         FROM certificate c \
         JOIN certificate_assignment ca ON ca.certificate_id = c.certificate_id \
         ORDER BY c.lfdi, ca.assigned_time DESC",
    )
    .fetch_all(pool)
    .await
}
