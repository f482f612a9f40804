// Copyright 2024-2026 Farlight Networks, LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Semantic checks on well-framed messages.
//!
//! A message that decodes can still be meaningless: a TCP port match
//! without an IP protocol, a goto-table pointing backwards. Such messages
//! are answered with an error reply and the connection carries on.

use crate::action::Action;
use crate::flow::{flow_command, FlowMod, TABLE_ALL};
use crate::group::{group_command, group_type, GroupMod};
use crate::instruction::Instruction;
use crate::match10::{wildcards, Match10};
use crate::matching::{Match, OxmMatch};
use crate::meter::{meter_command, MeterMod};
use crate::message::{Body, Message};
use crate::oxm::{OxmBasic, OxmField, OPENFLOW_BASIC};
use crate::port::ports;
use crate::stats::StatsRequestBody;
use crate::{ValidationError, Violation};
use std::collections::HashSet;

const ETH_IPV4: u16 = 0x0800;
const ETH_ARP: u16 = 0x0806;
const ETH_IPV6: u16 = 0x86dd;
const ETH_MPLS: [u16; 2] = [0x8847, 0x8848];
const ETH_PBB: u16 = 0x88e7;

const PROTO_ICMP: u8 = 1;
const PROTO_TCP: u8 = 6;
const PROTO_UDP: u8 = 17;
const PROTO_ICMPV6: u8 = 58;
const PROTO_SCTP: u8 = 132;

const ND_SOLICIT: u8 = 135;
const ND_ADVERT: u8 = 136;

/// Checks the semantic rules for `msg`.
///
/// # Errors
///
/// Returns the first rule violated; [`ValidationError::error_code`] maps it
/// to the error reply for the message's version.
pub fn validate(msg: &Message) -> Result<(), ValidationError> {
    match &msg.body {
        Body::FlowMod(fm) => validate_flow_mod(fm),
        Body::PacketOut(out) => out.actions.iter().try_for_each(|a| validate_action(a, true)),
        Body::PacketIn(pin) => validate_oxm(&pin.match_fields),
        Body::FlowRemoved(fr) => validate_match(&fr.match_fields),
        Body::GroupMod(gm) => validate_group_mod(gm),
        Body::MeterMod(mm) => validate_meter_mod(mm),
        Body::StatsRequest(req) => match &req.body {
            StatsRequestBody::Flow(f) | StatsRequestBody::Aggregate(f) => {
                validate_match(&f.match_fields)
            }
            _ => Ok(()),
        },
        _ => Ok(()),
    }
}

impl Message {
    /// Checks the semantic rules for this message; see [`validate`].
    ///
    /// # Errors
    ///
    /// Returns the first rule violated.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate(self)
    }
}

fn validate_flow_mod(fm: &FlowMod) -> Result<(), ValidationError> {
    validate_match(&fm.match_fields)?;

    let adds = matches!(
        fm.command,
        flow_command::ADD | flow_command::MODIFY | flow_command::MODIFY_STRICT
    );
    if adds && fm.table_id == TABLE_ALL {
        return Err(ValidationError::new(
            Violation::BadTableId,
            "flows cannot be added to table 0xff",
        ));
    }

    for action in &fm.actions {
        validate_action(action, false)?;
    }

    let mut seen = HashSet::new();
    for instruction in &fm.instructions {
        if !seen.insert(instruction.type_code()) {
            return Err(ValidationError::new(
                Violation::DuplicateInstruction,
                format!("instruction type {} repeated", instruction.type_code()),
            ));
        }
        match instruction {
            Instruction::GotoTable(next) => {
                if *next == TABLE_ALL || *next <= fm.table_id {
                    return Err(ValidationError::new(
                        Violation::BadGotoTable,
                        format!("goto-table {next} from table {}", fm.table_id),
                    ));
                }
            }
            Instruction::WriteActions(actions) | Instruction::ApplyActions(actions) => {
                for action in actions {
                    validate_action(action, false)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_action(action: &Action, packet_out: bool) -> Result<(), ValidationError> {
    match action {
        Action::Output { port, .. } => {
            // TABLE is only meaningful for packets injected by the controller.
            let bad = *port == 0 || *port == ports::ANY || (*port == ports::TABLE && !packet_out);
            if bad {
                return Err(ValidationError::new(
                    Violation::BadOutPort,
                    format!("output to port {port:#x}"),
                ));
            }
            Ok(())
        }
        Action::SetField(field) => validate_field_shape(field),
        _ => Ok(()),
    }
}

fn validate_group_mod(gm: &GroupMod) -> Result<(), ValidationError> {
    if gm.command == group_command::DELETE {
        return Ok(());
    }
    if gm.group_type == group_type::INDIRECT && gm.buckets.len() != 1 {
        return Err(ValidationError::new(
            Violation::BadGroup,
            format!("indirect group with {} buckets", gm.buckets.len()),
        ));
    }
    for bucket in &gm.buckets {
        if gm.group_type != group_type::SELECT && bucket.weight != 0 {
            return Err(ValidationError::new(
                Violation::BadGroup,
                "bucket weight on a non-select group",
            ));
        }
        if gm.group_type == group_type::FAST_FAILOVER
            && bucket.watch_port == ports::ANY
            && bucket.watch_group == crate::group::GROUP_ANY
        {
            return Err(ValidationError::new(
                Violation::BadGroup,
                "fast-failover bucket watches nothing",
            ));
        }
        for action in &bucket.actions {
            validate_action(action, false)?;
        }
    }
    Ok(())
}

fn validate_meter_mod(mm: &MeterMod) -> Result<(), ValidationError> {
    if mm.command == meter_command::DELETE {
        return Ok(());
    }
    if mm.bands.is_empty() {
        return Err(ValidationError::new(Violation::BadMeterBand, "meter without bands"));
    }
    if mm.bands.iter().any(|b| b.rate() == 0) {
        return Err(ValidationError::new(Violation::BadMeterBand, "band rate of zero"));
    }
    Ok(())
}

/// Checks a match in either layout.
///
/// # Errors
///
/// Returns the first violated match rule.
pub fn validate_match(m: &Match) -> Result<(), ValidationError> {
    match m {
        Match::Standard(m) => validate_match10(m),
        Match::Oxm(m) => validate_oxm(m),
    }
}

fn validate_match10(m: &Match10) -> Result<(), ValidationError> {
    let ports_set = !m.is_wild(wildcards::TP_SRC) || !m.is_wild(wildcards::TP_DST);
    if ports_set && m.is_wild(wildcards::NW_PROTO) {
        return Err(ValidationError::new(
            Violation::InconsistentWildcards,
            "transport ports matched without an IP protocol",
        ));
    }
    Ok(())
}

fn validate_field_shape(field: &OxmField) -> Result<(), ValidationError> {
    let Some(basic) = field.basic_field() else {
        return Ok(());
    };
    let width = basic.width();
    if field.value.len() != width {
        return Err(ValidationError::new(
            Violation::BadFieldLength,
            format!("{basic:?} value is {} bytes, expected {width}", field.value.len()),
        ));
    }
    if let Some(mask) = &field.mask {
        if !basic.maskable() {
            return Err(ValidationError::new(
                Violation::BadMask,
                format!("{basic:?} cannot be masked"),
            ));
        }
        if mask.len() != width {
            return Err(ValidationError::new(
                Violation::BadFieldLength,
                format!("{basic:?} mask is {} bytes, expected {width}", mask.len()),
            ));
        }
    }
    Ok(())
}

/// What a field needs to be present before it may be matched.
enum Prerequisite {
    EthType(&'static [u16]),
    IpProto(u8),
    Icmpv6Type(&'static [u8]),
    VlanPresent,
}

fn prerequisite(field: OxmBasic) -> Option<Prerequisite> {
    use OxmBasic::*;
    use Prerequisite as P;
    let p = match field {
        VlanPcp => P::VlanPresent,
        IpDscp | IpEcn | IpProto => P::EthType(&[ETH_IPV4, ETH_IPV6]),
        Ipv4Src | Ipv4Dst => P::EthType(&[ETH_IPV4]),
        TcpSrc | TcpDst => P::IpProto(PROTO_TCP),
        UdpSrc | UdpDst => P::IpProto(PROTO_UDP),
        SctpSrc | SctpDst => P::IpProto(PROTO_SCTP),
        Icmpv4Type | Icmpv4Code => P::IpProto(PROTO_ICMP),
        ArpOp | ArpSpa | ArpTpa | ArpSha | ArpTha => P::EthType(&[ETH_ARP]),
        Ipv6Src | Ipv6Dst | Ipv6Flabel | Ipv6Exthdr => P::EthType(&[ETH_IPV6]),
        Icmpv6Type | Icmpv6Code => P::IpProto(PROTO_ICMPV6),
        Ipv6NdTarget => P::Icmpv6Type(&[ND_SOLICIT, ND_ADVERT]),
        Ipv6NdSll => P::Icmpv6Type(&[ND_SOLICIT]),
        Ipv6NdTll => P::Icmpv6Type(&[ND_ADVERT]),
        MplsLabel | MplsTc | MplsBos => P::EthType(&ETH_MPLS),
        PbbIsid => P::EthType(&[ETH_PBB]),
        InPort | InPhyPort | Metadata | EthDst | EthSrc | EthType | VlanVid | TunnelId => {
            return None
        }
    };
    Some(p)
}

/// Exact (unmasked) value of a field in `m`.
fn exact(m: &OxmMatch, field: OxmBasic) -> Option<u64> {
    m.get(field)
        .filter(|f| f.mask.is_none())
        .and_then(OxmField::value_u64)
}

fn validate_oxm(m: &OxmMatch) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for field in &m.fields {
        validate_field_shape(field)?;
        if !seen.insert((field.class, field.field)) {
            return Err(ValidationError::new(
                Violation::DuplicateField,
                format!("field {}:{} repeated", field.class, field.field),
            ));
        }
    }

    for field in m.fields.iter().filter(|f| f.class == OPENFLOW_BASIC) {
        let Some(basic) = field.basic_field() else {
            continue;
        };
        let met = match prerequisite(basic) {
            None => true,
            Some(Prerequisite::EthType(types)) => {
                exact(m, OxmBasic::EthType).is_some_and(|t| types.contains(&(t as u16)))
            }
            Some(Prerequisite::IpProto(proto)) => {
                exact(m, OxmBasic::IpProto) == Some(u64::from(proto))
            }
            Some(Prerequisite::Icmpv6Type(types)) => {
                exact(m, OxmBasic::Icmpv6Type).is_some_and(|t| types.contains(&(t as u8)))
            }
            Some(Prerequisite::VlanPresent) => m
                .get(OxmBasic::VlanVid)
                .and_then(OxmField::value_u64)
                .is_some_and(|vid| vid != 0),
        };
        if !met {
            return Err(ValidationError::new(
                Violation::BadPrerequisite,
                format!("{basic:?} without its prerequisite"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_msg::codes;
    use crate::group::Bucket;
    use crate::meter::MeterBand;
    use crate::Version;
    use bytes::Bytes;
    use std::net::Ipv4Addr;

    fn flow_mod(fields: Vec<OxmField>) -> FlowMod {
        FlowMod::add(Match::Oxm(OxmMatch { fields }))
    }

    fn check(fm: FlowMod) -> Result<(), ValidationError> {
        validate(&Message::new(Version::V1_3, 1, Body::FlowMod(fm)))
    }

    #[test]
    fn well_formed_flow_passes() {
        let mut fm = flow_mod(vec![
            OxmField::eth_type(ETH_IPV4),
            OxmField::ip_proto(PROTO_TCP),
            OxmField::ipv4_src(Ipv4Addr::new(10, 0, 0, 1)),
            OxmField::tcp_dst(443),
        ]);
        fm.instructions = vec![
            Instruction::ApplyActions(vec![Action::output(1)]),
            Instruction::GotoTable(1),
        ];
        assert_eq!(check(fm), Ok(()));
    }

    #[test]
    fn ipv4_needs_eth_type() {
        let err = check(flow_mod(vec![OxmField::ipv4_dst(Ipv4Addr::LOCALHOST)]))
            .expect_err("missing eth_type");
        assert_eq!(err.violation, Violation::BadPrerequisite);
    }

    #[test]
    fn tcp_port_needs_tcp_proto() {
        let err = check(flow_mod(vec![
            OxmField::eth_type(ETH_IPV4),
            OxmField::ip_proto(PROTO_UDP),
            OxmField::tcp_src(22),
        ]))
        .expect_err("wrong ip_proto");
        assert_eq!(err.violation, Violation::BadPrerequisite);
    }

    #[test]
    fn duplicate_field_rejected() {
        let err = check(flow_mod(vec![
            OxmField::eth_type(ETH_IPV4),
            OxmField::eth_type(ETH_IPV6),
        ]))
        .expect_err("duplicate");
        assert_eq!(err.violation, Violation::DuplicateField);
        assert_eq!(
            err.error_code(Version::V1_3),
            (codes::BAD_MATCH, codes::DUP_FIELD)
        );
    }

    #[test]
    fn wrong_width_rejected() {
        let err = check(flow_mod(vec![OxmField::basic(
            OxmBasic::EthType,
            Bytes::from_static(&[0x08]),
        )]))
        .expect_err("one-byte eth_type");
        assert_eq!(err.violation, Violation::BadFieldLength);
    }

    #[test]
    fn unmaskable_field_rejected() {
        let err = check(flow_mod(vec![OxmField::basic_masked(
            OxmBasic::EthType,
            Bytes::from_static(&[0x08, 0x00]),
            Bytes::from_static(&[0xff, 0x00]),
        )]))
        .expect_err("masked eth_type");
        assert_eq!(err.violation, Violation::BadMask);
    }

    #[test]
    fn goto_must_move_forward() {
        let mut fm = flow_mod(vec![]);
        fm.table_id = 3;
        fm.instructions = vec![Instruction::GotoTable(3)];
        let err = check(fm).expect_err("goto same table");
        assert_eq!(err.violation, Violation::BadGotoTable);
        assert_eq!(
            err.error_code(Version::V1_3),
            (codes::BAD_INSTRUCTION, codes::BAD_TABLE_ID_INST)
        );
    }

    #[test]
    fn duplicate_instruction_rejected() {
        let mut fm = flow_mod(vec![]);
        fm.instructions = vec![
            Instruction::ApplyActions(vec![]),
            Instruction::ApplyActions(vec![Action::output(2)]),
        ];
        let err = check(fm).expect_err("apply twice");
        assert_eq!(err.violation, Violation::DuplicateInstruction);
    }

    #[test]
    fn add_to_table_all_rejected() {
        let mut fm = flow_mod(vec![]);
        fm.table_id = TABLE_ALL;
        assert_eq!(
            check(fm.clone()).map_err(|e| e.violation),
            Err(Violation::BadTableId)
        );

        fm.command = flow_command::DELETE;
        assert_eq!(check(fm), Ok(()));
    }

    #[test]
    fn v10_ports_need_protocol() {
        let mut fm = FlowMod::add(Match::Standard(Match10::any().with_tp_dst(80)));
        fm.actions = vec![Action::output(1)];
        let msg = Message::new(Version::V1_0, 1, Body::FlowMod(fm));
        let err = validate(&msg).expect_err("tp_dst without nw_proto");
        assert_eq!(err.violation, Violation::InconsistentWildcards);
        assert_eq!(
            err.error_code(Version::V1_0),
            (codes::v10::BAD_REQUEST, codes::v10::BAD_LEN)
        );
    }

    #[test]
    fn output_to_table_only_from_packet_out() {
        let mut fm = FlowMod::add(Match::any(Version::V1_0));
        fm.actions = vec![Action::output(ports::TABLE)];
        let msg = Message::new(Version::V1_0, 1, Body::FlowMod(fm));
        assert_eq!(
            validate(&msg).map_err(|e| e.violation),
            Err(Violation::BadOutPort)
        );

        let out = crate::packet::PacketOut::to_port(ports::TABLE, Bytes::new());
        let msg = Message::new(Version::V1_0, 1, Body::PacketOut(out));
        assert_eq!(validate(&msg), Ok(()));
    }

    #[test]
    fn indirect_group_has_one_bucket() {
        let gm = GroupMod {
            command: group_command::ADD,
            group_type: group_type::INDIRECT,
            group_id: 1,
            buckets: vec![
                Bucket::new(vec![Action::output(1)]),
                Bucket::new(vec![Action::output(2)]),
            ],
        };
        let msg = Message::new(Version::V1_3, 1, Body::GroupMod(gm));
        assert_eq!(
            validate(&msg).map_err(|e| e.violation),
            Err(Violation::BadGroup)
        );
    }

    #[test]
    fn meter_needs_bands() {
        let mm = MeterMod {
            command: meter_command::ADD,
            flags: 0,
            meter_id: 1,
            bands: vec![],
        };
        let msg = Message::new(Version::V1_3, 1, Body::MeterMod(mm.clone()));
        assert!(validate(&msg).is_err());

        let mm = MeterMod {
            bands: vec![MeterBand::Drop {
                rate: 100,
                burst_size: 0,
            }],
            ..mm
        };
        let msg = Message::new(Version::V1_3, 1, Body::MeterMod(mm));
        assert_eq!(validate(&msg), Ok(()));
    }
}
