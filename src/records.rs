//! A and SRV record synthesis.
//!
//! Construction failures are reported per record so the caller can skip the
//! offending record and keep its siblings.

use hickory_proto::rr::rdata::{A, SRV};
use hickory_proto::rr::{DNSClass, Name, RData, Record};
use std::net::Ipv4Addr;

use crate::cluster::Endpoint;
use crate::error::ResolveError;

/// TTL of every synthesized record, in seconds.
pub const RECORD_TTL: u32 = 15;

/// SRV priority of every synthesized record.
pub const SRV_PRIORITY: u16 = 10;

/// SRV weight of every synthesized record.
pub const SRV_WEIGHT: u16 = 0;

/// Build an A record for `name` pointing at `address`.
pub fn a_record(name: &Name, address: &str) -> Result<Record, ResolveError> {
    let ip: Ipv4Addr = address
        .parse()
        .map_err(|e| ResolveError::RecordConstruction {
            rtype: "A",
            name: name.to_string(),
            reason: format!("invalid IPv4 address {address:?}: {e}"),
        })?;

    let mut record = Record::from_rdata(name.clone(), RECORD_TTL, RData::A(A(ip)));
    record.set_dns_class(DNSClass::IN);
    Ok(record)
}

/// Build an SRV record for `name` targeting `<endpoint.name>.<base_domain>.`.
pub fn srv_record(
    name: &Name,
    endpoint: &Endpoint,
    base_domain: &str,
) -> Result<Record, ResolveError> {
    let target = format!("{}.{}.", endpoint.name, base_domain.trim_matches('.'));
    let target = Name::from_ascii(&target).map_err(|e| ResolveError::RecordConstruction {
        rtype: "SRV",
        name: name.to_string(),
        reason: format!("invalid target {target:?}: {e}"),
    })?;

    let srv = SRV::new(SRV_PRIORITY, SRV_WEIGHT, endpoint.port, target);
    let mut record = Record::from_rdata(name.clone(), RECORD_TTL, RData::SRV(srv));
    record.set_dns_class(DNSClass::IN);
    Ok(record)
}
