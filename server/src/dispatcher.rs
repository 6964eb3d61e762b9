//! Per-command routing: registry effects and outgoing datagram fan-out
//!
//! One handler per command tag. Each handler is pure given the command, the
//! sender's address, and the registry, except for the registry mutations in
//! `join` and `bye`. Handlers never perform I/O; they return the list of
//! datagrams to send, and the network layer delivers each one independently
//! so a single failed send cannot abort the rest of a broadcast.
//!
//! Routing policies:
//! - unicast-to-sender: `join` acknowledgment only
//! - unicast-to-target: `detailsFor` (to the requester), `hit` (to the target)
//! - broadcast-to-all-but-sender: everything else
//!
//! The relay is permissive by design: nothing checks that a sender has
//! joined before it moves, rotates, or creates, and a directed send whose
//! identifier is not registered is dropped silently.

use crate::registry::SessionRegistry;
use log::debug;
use shared::{encode, tags, Command};
use std::net::SocketAddr;
use uuid::Uuid;

/// A single datagram scheduled for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub payload: String,
    pub dest: SocketAddr,
}

/// Executes one decoded command against the registry and returns the
/// datagrams to send, in delivery order.
pub fn dispatch(
    command: Command,
    sender: SocketAddr,
    registry: &mut SessionRegistry,
) -> Vec<Outgoing> {
    match command {
        Command::Join { client } => {
            registry.add(client, sender);
            unicast(registry, &client, join_ack(true))
        }

        Command::Bye { client } => {
            // Fan-out is computed while the leaving client is still
            // registered; it is excluded either way.
            let outgoing = broadcast(registry, &client, encode(tags::BYE, [client.to_string()]));
            registry.remove(&client);
            outgoing
        }

        Command::Create {
            client,
            position: [x, y, z],
            texture,
        } => {
            let create = encode(
                tags::CREATE,
                [client.to_string(), x, y, z, texture],
            );
            let mut outgoing = broadcast(registry, &client, create);
            // Two-phase state sync: announce the new avatar, then ask the
            // peers that were already present for their details.
            outgoing.extend(broadcast(
                registry,
                &client,
                encode(tags::WANTS_DETAILS, [client.to_string()]),
            ));
            outgoing
        }

        Command::DetailsFor {
            requester,
            subject,
            position: [x, y, z],
            texture,
        } => {
            // Asymmetric on purpose: the responding client echoes its own
            // identifier as the subject, and the message is delivered to
            // the original requester.
            let details = encode(
                tags::DETAILS_FOR,
                [subject.to_string(), x, y, z, texture],
            );
            unicast(registry, &requester, details)
        }

        Command::Move {
            client,
            position: [x, y, z],
        } => broadcast(
            registry,
            &client,
            encode(tags::MOVE, [client.to_string(), x, y, z]),
        ),

        Command::Rotate { client, matrix } => broadcast(
            registry,
            &client,
            encode(
                tags::ROTATE,
                std::iter::once(client.to_string()).chain(matrix),
            ),
        ),

        Command::CreateBall {
            client,
            ball,
            position: [x, y, z],
        } => broadcast(
            registry,
            &client,
            encode(
                tags::CREATE_BALL,
                [client.to_string(), ball.to_string(), x, y, z],
            ),
        ),

        Command::MoveBall {
            client,
            ball,
            position: [x, y, z],
        } => broadcast(
            registry,
            &client,
            encode(
                tags::MOVE_BALL,
                [client.to_string(), ball.to_string(), x, y, z],
            ),
        ),

        Command::RemoveBall { client, ball } => broadcast(
            registry,
            &client,
            encode(tags::REMOVE_BALL, [client.to_string(), ball.to_string()]),
        ),

        Command::Hit { target } => {
            // The only command whose sender need not be registered.
            unicast(registry, &target, encode(tags::HIT, [target.to_string()]))
        }

        Command::ShieldActivate { client } => {
            broadcast_status(registry, tags::SHIELD_ACTIVATE, &client)
        }
        Command::ShieldDeactivate { client } => {
            broadcast_status(registry, tags::SHIELD_DEACTIVATE, &client)
        }
        Command::ShieldHit { client } => broadcast_status(registry, tags::SHIELD_HIT, &client),
        Command::SwordAnimate { client } => broadcast_status(registry, tags::SWORD_ANIMATE, &client),
    }
}

/// Builds the `join` acknowledgment payload.
///
/// With the in-memory registry every add succeeds, so dispatch only ever
/// emits the `success` shape; the `failure` shape is part of the protocol
/// for registries that can refuse a join.
pub fn join_ack(granted: bool) -> String {
    let verdict = if granted { "success" } else { "failure" };
    encode(tags::JOIN, [verdict])
}

fn unicast(registry: &SessionRegistry, dest: &Uuid, payload: String) -> Vec<Outgoing> {
    match registry.resolve(dest) {
        Some(addr) => vec![Outgoing { payload, dest: addr }],
        None => {
            debug!("Dropping directed send: {} is not registered", dest);
            Vec::new()
        }
    }
}

fn broadcast(registry: &SessionRegistry, exclude: &Uuid, payload: String) -> Vec<Outgoing> {
    registry
        .all_except(exclude)
        .into_iter()
        .map(|(_, addr)| Outgoing {
            payload: payload.clone(),
            dest: addr,
        })
        .collect()
}

fn broadcast_status(registry: &SessionRegistry, tag: &str, client: &Uuid) -> Vec<Outgoing> {
    broadcast(registry, client, encode(tag, [client.to_string()]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::decode;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    /// Registers three peers and returns (registry, ids, addrs).
    fn three_peers() -> (SessionRegistry, [Uuid; 3], [SocketAddr; 3]) {
        let mut registry = SessionRegistry::new();
        let ids = [id(1), id(2), id(3)];
        let addrs = [addr(9001), addr(9002), addr(9003)];
        for (client, a) in ids.iter().zip(addrs.iter()) {
            registry.add(*client, *a);
        }
        (registry, ids, addrs)
    }

    fn payloads_to(outgoing: &[Outgoing], dest: SocketAddr) -> Vec<&str> {
        outgoing
            .iter()
            .filter(|o| o.dest == dest)
            .map(|o| o.payload.as_str())
            .collect()
    }

    #[test]
    fn test_join_registers_and_acks_sender() {
        let mut registry = SessionRegistry::new();
        let client = id(7);
        let sender = addr(9100);

        let outgoing = dispatch(Command::Join { client }, sender, &mut registry);

        assert_eq!(registry.resolve(&client), Some(sender));
        assert_eq!(
            outgoing,
            vec![Outgoing {
                payload: "join,success".to_string(),
                dest: sender,
            }]
        );
    }

    #[test]
    fn test_rejoin_rebinds_address() {
        let mut registry = SessionRegistry::new();
        let client = id(7);

        dispatch(Command::Join { client }, addr(9100), &mut registry);
        let outgoing = dispatch(Command::Join { client }, addr(9101), &mut registry);

        assert_eq!(registry.resolve(&client), Some(addr(9101)));
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].dest, addr(9101));
    }

    #[test]
    fn test_join_ack_shapes() {
        assert_eq!(join_ack(true), "join,success");
        assert_eq!(join_ack(false), "join,failure");
    }

    #[test]
    fn test_bye_unregisters_and_broadcasts() {
        let (mut registry, [a, _, _], [addr_a, addr_b, addr_c]) = three_peers();

        let outgoing = dispatch(Command::Bye { client: a }, addr_a, &mut registry);

        assert_eq!(registry.resolve(&a), None);
        assert_eq!(registry.len(), 2);

        let expected = format!("bye,{}", a);
        assert_eq!(payloads_to(&outgoing, addr_b), vec![expected.as_str()]);
        assert_eq!(payloads_to(&outgoing, addr_c), vec![expected.as_str()]);
        assert!(payloads_to(&outgoing, addr_a).is_empty());
    }

    #[test]
    fn test_bye_twice_is_idempotent_on_registry() {
        let (mut registry, [a, _, _], [addr_a, _, _]) = three_peers();

        dispatch(Command::Bye { client: a }, addr_a, &mut registry);
        let after_first = registry.len();
        dispatch(Command::Bye { client: a }, addr_a, &mut registry);

        assert_eq!(registry.len(), after_first);
        assert_eq!(registry.resolve(&a), None);
    }

    #[test]
    fn test_move_broadcasts_without_echo() {
        let (mut registry, [a, _, _], [addr_a, addr_b, addr_c]) = three_peers();

        let command = decode(&format!("move,{},1,2,3", a)).unwrap();
        let outgoing = dispatch(command, addr_a, &mut registry);

        let expected = format!("move,{},1,2,3", a);
        assert_eq!(outgoing.len(), 2);
        assert_eq!(payloads_to(&outgoing, addr_b), vec![expected.as_str()]);
        assert_eq!(payloads_to(&outgoing, addr_c), vec![expected.as_str()]);
        assert!(payloads_to(&outgoing, addr_a).is_empty());
    }

    #[test]
    fn test_create_broadcasts_then_wants_details() {
        let (mut registry, [a, _, _], [addr_a, addr_b, _]) = three_peers();

        let command = decode(&format!("create,{},1,2,3", a)).unwrap();
        let outgoing = dispatch(command, addr_a, &mut registry);

        // Both messages fan out to both peers, create phase first.
        assert_eq!(outgoing.len(), 4);
        let create = format!("create,{},1,2,3,frog.png", a);
        let wants = format!("wantsDetails,{}", a);
        assert!(outgoing[..2].iter().all(|o| o.payload == create));
        assert!(outgoing[2..].iter().all(|o| o.payload == wants));

        assert_eq!(
            payloads_to(&outgoing, addr_b),
            vec![create.as_str(), wants.as_str()]
        );
    }

    #[test]
    fn test_details_for_unicasts_to_requester_with_subject_echoed() {
        let (mut registry, [a, b, _], [addr_a, addr_b, _]) = three_peers();

        // b answers a's wantsDetails: destination is a's entry, subject is b.
        let command = decode(&format!("detailsFor,{},{},7,8,9,fox.png", a, b)).unwrap();
        let outgoing = dispatch(command, addr_b, &mut registry);

        assert_eq!(
            outgoing,
            vec![Outgoing {
                payload: format!("detailsFor,{},7,8,9,fox.png", b),
                dest: addr_a,
            }]
        );
    }

    #[test]
    fn test_details_for_unregistered_requester_is_dropped() {
        let (mut registry, [_, b, _], [_, addr_b, _]) = three_peers();
        let ghost = id(99);

        let command = decode(&format!("detailsFor,{},{},7,8,9", ghost, b)).unwrap();
        let outgoing = dispatch(command, addr_b, &mut registry);

        assert!(outgoing.is_empty());
    }

    #[test]
    fn test_rotate_broadcasts_all_matrix_values() {
        let (mut registry, [a, _, _], [addr_a, _, _]) = three_peers();

        let values: Vec<String> = (1..=16).map(|v| v.to_string()).collect();
        let command = decode(&format!("rotate,{},{}", a, values.join(","))).unwrap();
        let outgoing = dispatch(command, addr_a, &mut registry);

        let expected = format!("rotate,{},{}", a, values.join(","));
        assert_eq!(outgoing.len(), 2);
        assert!(outgoing.iter().all(|o| o.payload == expected));
        assert!(outgoing.iter().all(|o| o.dest != addr_a));
    }

    #[test]
    fn test_ball_commands_broadcast() {
        let (mut registry, [a, _, _], [addr_a, _, _]) = three_peers();
        let ball = id(50);

        let create = decode(&format!("createBall,{},{},1,2,3", a, ball)).unwrap();
        let outgoing = dispatch(create, addr_a, &mut registry);
        assert_eq!(outgoing.len(), 2);
        assert!(outgoing
            .iter()
            .all(|o| o.payload == format!("createBall,{},{},1,2,3", a, ball)));

        let relocate = decode(&format!("moveBall,{},{},4,5,6", a, ball)).unwrap();
        let outgoing = dispatch(relocate, addr_a, &mut registry);
        assert!(outgoing
            .iter()
            .all(|o| o.payload == format!("moveBall,{},{},4,5,6", a, ball)));

        let remove = decode(&format!("removeBall,{},{}", a, ball)).unwrap();
        let outgoing = dispatch(remove, addr_a, &mut registry);
        assert_eq!(outgoing.len(), 2);
        assert!(outgoing
            .iter()
            .all(|o| o.payload == format!("removeBall,{},{}", a, ball)));
    }

    #[test]
    fn test_hit_unicasts_to_target() {
        let (mut registry, [a, _, _], [addr_a, _, _]) = three_peers();

        // Sender address is not a registered peer; hit does not care.
        let outgoing = dispatch(Command::Hit { target: a }, addr(9999), &mut registry);

        assert_eq!(
            outgoing,
            vec![Outgoing {
                payload: format!("hit,{}", a),
                dest: addr_a,
            }]
        );
    }

    #[test]
    fn test_hit_unknown_target_is_silent() {
        let (mut registry, _, _) = three_peers();
        let before = registry.len();

        let outgoing = dispatch(Command::Hit { target: id(99) }, addr(9999), &mut registry);

        assert!(outgoing.is_empty());
        assert_eq!(registry.len(), before);
    }

    #[test]
    fn test_status_commands_broadcast() {
        let (mut registry, [a, _, _], [addr_a, _, _]) = three_peers();

        for (command, tag) in [
            (Command::ShieldActivate { client: a }, "shieldActivate"),
            (Command::ShieldDeactivate { client: a }, "shieldDeactivate"),
            (Command::ShieldHit { client: a }, "shieldHit"),
            (Command::SwordAnimate { client: a }, "swordAnimate"),
        ] {
            let outgoing = dispatch(command, addr_a, &mut registry);
            let expected = format!("{},{}", tag, a);
            assert_eq!(outgoing.len(), 2);
            assert!(outgoing.iter().all(|o| o.payload == expected));
            assert!(outgoing.iter().all(|o| o.dest != addr_a));
        }
    }

    #[test]
    fn test_unregistered_sender_still_relays() {
        // Permissive by design: moving under a never-joined identifier
        // relays to everyone registered.
        let (mut registry, _, _) = three_peers();
        let ghost = id(42);

        let command = decode(&format!("move,{},0,0,0", ghost)).unwrap();
        let outgoing = dispatch(command, addr(9999), &mut registry);

        assert_eq!(outgoing.len(), 3);
    }

    #[test]
    fn test_broadcast_to_empty_registry_sends_nothing() {
        let mut registry = SessionRegistry::new();
        let lone = id(1);
        registry.add(lone, addr(9001));

        let command = decode(&format!("move,{},1,2,3", lone)).unwrap();
        let outgoing = dispatch(command, addr(9001), &mut registry);

        assert!(outgoing.is_empty());
    }
}
