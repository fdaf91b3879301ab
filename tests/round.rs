#![allow(clippy::unwrap_used)]

use rstest::rstest;

use assh_kex::{
    algorithm::Category,
    kex::{GexParams, Role, Round, State, Step},
    side::{client::HostKeyVerifier, Side},
    wire::{message::Message, NameList},
    Error, ErrorKind, Result,
};

mod common;

struct Rounds {
    client: Round,
    server: Round,
    key: ssh_key::PrivateKey,
}

fn open(kex: &str) -> Result<(Rounds, Step)> {
    let (client, server) = (common::client(kex), common::server(kex));
    let key = server.keys[0].clone();

    let i_c = client.kexinit().to_payload()?;
    let i_s = server.kexinit().to_payload()?;

    let mut rounds = Rounds {
        client: Round::new(Role::Client, &client.id, &server.id),
        server: Round::new(Role::Server, &client.id, &server.id),
        key,
    };

    let step = rounds.client.start(i_c.clone(), i_s.clone())?;
    rounds.server.start(i_c, i_s)?;
    rounds
        .server
        .set_host_key(rounds.key.public_key().to_bytes()?);

    Ok((rounds, step))
}

/// Shuttle the method messages between both rounds, up to the server's signature.
fn drive(rounds: &mut Rounds, mut step: Step) -> Result<()> {
    while let Step::Send { payload, .. } = step {
        match rounds.server.handle(&payload)? {
            Step::Send { payload, .. } => step = rounds.client.handle(&payload)?,
            _ => break,
        }
    }

    let reply = rounds.server.sign(&rounds.key)?;
    rounds.client.handle(&reply)?;

    Ok(())
}

#[rstest]
#[case("curve25519-sha256")]
#[case("ecdh-sha2-nistp384")]
#[case("diffie-hellman-group-exchange-sha256")]
#[case("diffie-hellman-group14-sha1")]
fn both_rounds_agree(#[case] kex: &str) -> Result<(), Box<dyn std::error::Error>> {
    common::init();

    let (mut rounds, step) = open(kex)?;
    assert_eq!(rounds.client.state(), State::AwaitingPeerReply);

    drive(&mut rounds, step)?;

    assert_eq!(rounds.client.state(), State::Completed);
    assert_eq!(rounds.server.state(), State::Completed);
    assert_eq!(rounds.client.shared_secret(), rounds.server.shared_secret());
    assert_eq!(rounds.client.host_key(), rounds.server.host_key());

    let hash = rounds.server.exchange_hash().unwrap().to_vec();
    assert_eq!(rounds.client.calculate_hash()?, &hash[..]);
    assert_eq!(
        hash.len(),
        rounds.client.negotiated().unwrap().kex.hash().size()
    );

    rounds.client.verify(&HostKeyVerifier::accept_any())?;

    let client = rounds.client.finish(&hash)?;
    let server = rounds.server.finish(&hash)?;

    assert_eq!(client.exchange_hash(), server.exchange_hash());
    assert_eq!(client.negotiated(), server.negotiated());

    Ok(())
}

#[test]
fn finish_requires_authentication() -> Result<(), Box<dyn std::error::Error>> {
    let (mut rounds, step) = open("curve25519-sha256")?;
    drive(&mut rounds, step)?;

    let hash = rounds.client.calculate_hash()?.to_vec();
    let err = rounds.client.finish(&hash).unwrap_err();

    assert!(matches!(err, Error::KexError(_)));
    assert_eq!(err.kind(), ErrorKind::Protocol);

    Ok(())
}

#[test]
fn rejected_host_key_fails_the_round() -> Result<(), Box<dyn std::error::Error>> {
    let (mut rounds, step) = open("ecdh-sha2-nistp256")?;
    drive(&mut rounds, step)?;

    let err = rounds
        .client
        .verify(&HostKeyVerifier::new(|_| false))
        .unwrap_err();

    assert!(matches!(err, Error::Rejected));
    assert_eq!(rounds.client.state(), State::Failed);

    Ok(())
}

#[test]
fn foreign_signature_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let (mut rounds, mut step) = open("curve25519-sha256")?;

    while let Step::Send { payload, .. } = step {
        match rounds.server.handle(&payload)? {
            Step::Send { payload, .. } => step = rounds.client.handle(&payload)?,
            _ => break,
        }
    }

    let reply = rounds.server.sign(&common::host_key())?;
    rounds.client.handle(&reply)?;

    let err = rounds
        .client
        .verify(&HostKeyVerifier::accept_any())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    Ok(())
}

#[test]
fn start_is_single_use() -> Result<(), Box<dyn std::error::Error>> {
    let (mut rounds, _) = open("curve25519-sha256")?;

    let err = rounds.client.start(vec![], vec![]).unwrap_err();
    assert!(matches!(err, Error::KexInProgress));

    Ok(())
}

#[test]
fn out_of_place_message_is_refused() -> Result<(), Box<dyn std::error::Error>> {
    let mut round = Round::new(
        Role::Client,
        &common::client("curve25519-sha256").id,
        &common::server("curve25519-sha256").id,
    );

    let err = round.handle(&[31, 0, 0, 0, 0]).unwrap_err();
    assert!(matches!(err, Error::UnexpectedMessage(31)));
    assert_eq!(round.state(), State::Failed);

    Ok(())
}

#[test]
fn group_exchange_honors_the_bounds() -> Result<(), Box<dyn std::error::Error>> {
    let (client, server) = (
        common::client("diffie-hellman-group-exchange-sha256"),
        common::server("diffie-hellman-group-exchange-sha256"),
    );
    let i_c = client.kexinit().to_payload()?;
    let i_s = server.kexinit().to_payload()?;

    let mut round = Round::new(Role::Client, &client.id, &server.id).with_group_exchange(
        GexParams {
            min: 9000,
            n: 9000,
            max: 10000,
        },
    );
    let mut peer = Round::new(Role::Server, &client.id, &server.id);

    let Step::Send { payload, .. } = round.start(i_c.clone(), i_s.clone())? else {
        panic!("the client opens the group exchange");
    };
    peer.start(i_c, i_s)?;

    let err = peer.handle(&payload).unwrap_err();
    assert!(matches!(err, Error::KexError(_)));
    assert_eq!(peer.state(), State::Failed);

    Ok(())
}

#[test]
fn sha1_rsa_host_keys_are_not_negotiated() -> Result<(), Box<dyn std::error::Error>> {
    let (client, server) = (
        common::client("curve25519-sha256"),
        common::server("curve25519-sha256"),
    );

    let mut kexinit = server.kexinit();
    kexinit.server_host_key_algorithms = NameList::from("ssh-rsa");

    let mut round = Round::new(Role::Client, &client.id, &server.id);
    let err = round
        .start(client.kexinit().to_payload()?, kexinit.to_payload()?)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::NoCommonAlgorithm {
            category: Category::HostKey,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Negotiation);
    assert_eq!(round.state(), State::Failed);

    Ok(())
}
