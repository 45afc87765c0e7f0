//! Network interface MAC extraction from domain descriptors
//!
//! For a whole-host enumeration this yields one [`MatchRecord::Entry`] per
//! domain, which is the shape [`crate::matcher::find_record`] consumes.

use color_eyre::{eyre::Context, Result};

use crate::matcher::MatchRecord;
use crate::xml_utils;

/// Extract the MAC addresses of `domain`'s interfaces attached to `network`.
///
/// Returns `None` when there is no descriptor. Interfaces on other networks,
/// and interfaces without a `source` or `mac/@address`, are skipped; a
/// domain with no matching interface still yields an entry with no values.
pub fn parse_interface_macs(
    domain: &str,
    network: &str,
    descriptor: Option<&str>,
) -> Result<Option<MatchRecord>> {
    let Some(xml) = descriptor else {
        return Ok(None);
    };
    let dom = xml_utils::parse_xml_dom(xml)
        .with_context(|| format!("Failed to parse descriptor of domain '{}'", domain))?;

    let values = dom
        .find_all("devices/interface")
        .into_iter()
        .filter(|iface| {
            iface
                .child("source")
                .and_then(|source| source.attr("network"))
                == Some(network)
        })
        .filter_map(|iface| iface.child("mac").and_then(|mac| mac.attr("address")))
        .map(str::to_string)
        .collect();

    Ok(Some(MatchRecord::Entry {
        name: domain.to_string(),
        values,
    }))
}
