use time::OffsetDateTime;

/// Tenant boundary. Aggregator id 0 is reserved for the "NULL aggregator"
/// which owns sites registered directly by device certificates.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Aggregator {
    pub aggregator_id: i64,
    pub name: String,
    pub created_time: OffsetDateTime,
    pub changed_time: OffsetDateTime,
}

/// A domain an aggregator is allowed to receive webhook notifications on.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AggregatorDomain {
    pub aggregator_domain_id: i64,
    pub aggregator_id: i64,
    pub domain: String,
    pub changed_time: OffsetDateTime,
}

/// An issued client TLS certificate, unique by LFDI. Expired certificates
/// remain on record but never authorize requests.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Certificate {
    pub certificate_id: i64,
    pub lfdi: String,
    pub created: OffsetDateTime,
    pub expiry: OffsetDateTime,
}
