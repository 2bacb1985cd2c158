use time::OffsetDateTime;

use crate::http::{generate_href, Sep2Xml};
use crate::scope::UnregisteredScope;
use crate::sep2::sep2_ns;
use crate::sep2::time::Time;

/// Server time. The server runs in UTC; DST bookkeeping is zeroed, which is
/// what sep2 prescribes for a tzOffset of 0.
pub async fn get_time(scope: UnregisteredScope) -> Sep2Xml<Time> {
    let now = OffsetDateTime::now_utc();

    Sep2Xml(Time {
        xmlns: sep2_ns(),
        href: generate_href(scope.href_prefix.as_deref(), "/tm"),
        current_time: now.unix_timestamp(),
        dst_end_time: 0,
        dst_offset: 0,
        dst_start_time: 0,
        quality: 4,
        tz_offset: 0,
    })
}
