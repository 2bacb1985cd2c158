use crate::model::Site;
use crate::sep2::end_device::{ConnectionPoint, EndDevice, EndDeviceList, Registration};
use crate::sep2::{csip_ns, sep2_ns, Link, ListLink};

use super::MapperContext;

pub fn map_site(ctx: &MapperContext, site: &Site) -> EndDevice {
    let id = site.site_id;
    EndDevice {
        xmlns: sep2_ns(),
        href: Some(ctx.href(&format!("/edev/{id}"))),
        device_category: Some(site.device_category().to_hex()),
        lfdi: Some(site.lfdi.clone()),
        sfdi: site.sfdi,
        changed_time: Some(site.changed_time.unix_timestamp()),
        enabled: Some(true),
        connection_point_link: Some(Link::new(ctx.href(&format!("/edev/{id}/cp")))),
        der_list_link: Some(ListLink::new(ctx.href(&format!("/edev/{id}/der")), Some(1))),
        derp_list_link: Some(ListLink::new(ctx.href(&format!("/edev/{id}/derp")), None)),
        fsa_list_link: Some(ListLink::new(ctx.href(&format!("/edev/{id}/fsa")), Some(1))),
        registration_link: Some(Link::new(ctx.href(&format!("/edev/{id}/reg")))),
        subscription_list_link: Some(ListLink::new(ctx.href(&format!("/edev/{id}/sub")), None)),
        log_event_list_link: Some(ListLink::new(ctx.href(&format!("/edev/{id}/log")), None)),
    }
}

pub fn map_site_list(
    ctx: &MapperContext,
    sites: &[Site],
    total: i64,
    poll_rate: Option<i32>,
) -> EndDeviceList {
    EndDeviceList {
        xmlns: sep2_ns(),
        href: ctx.href("/edev"),
        all: total,
        results: i64::try_from(sites.len()).unwrap_or(i64::MAX),
        poll_rate,
        end_devices: sites.iter().map(|site| map_site(ctx, site)).collect(),
    }
}

pub fn map_registration(ctx: &MapperContext, site: &Site) -> Registration {
    Registration {
        xmlns: sep2_ns(),
        href: Some(ctx.href(&format!("/edev/{}/reg", site.site_id))),
        date_time_registered: site.created_time.unix_timestamp(),
        pin: site.registration_pin,
    }
}

pub fn map_connection_point(ctx: &MapperContext, site: &Site) -> ConnectionPoint {
    ConnectionPoint {
        xmlns: csip_ns(),
        href: Some(ctx.href(&format!("/edev/{}/cp", site.site_id))),
        connection_point_id: site.nmi.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(prefix: Option<&str>) -> MapperContext {
        MapperContext {
            href_prefix: prefix.map(str::to_owned),
            iana_pen: 40414,
            pow10: -2,
        }
    }

    fn site() -> Site {
        Site {
            site_id: 3,
            aggregator_id: 1,
            lfdi: String::from("3e4f45ab31edfe5b67e343e5e4562e31984e23e5"),
            sfdi: 167_261_211_391,
            device_category: 0x0200_0000,
            ..Site::default()
        }
    }

    #[test]
    fn end_device_href_carries_prefix() {
        let device = map_site(&ctx(Some("/prefix")), &site());
        assert_eq!(device.href.as_deref(), Some("/prefix/edev/3"));
        assert_eq!(
            device.registration_link.as_ref().map(|l| l.href.as_str()),
            Some("/prefix/edev/3/reg")
        );
    }

    #[test]
    fn device_category_renders_as_hex() {
        let device = map_site(&ctx(None), &site());
        assert_eq!(device.device_category.as_deref(), Some("2000000"));
    }
}
