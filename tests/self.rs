#![allow(clippy::unwrap_used)]

use std::time::{Duration, Instant};

use rstest::rstest;

use assh_kex::{
    algorithm::{Hmac, Kex},
    side::{
        client::{Client, HostKeyVerifier},
        server::Server,
        Side,
    },
    wire::message::DisconnectReason,
    Error, ErrorKind, Pipe, Result, Session,
};

mod common;

#[rstest]
#[case("curve25519-sha256")]
#[case("curve25519-sha256@libssh.org")]
#[case("ecdh-sha2-nistp256")]
#[case("ecdh-sha2-nistp384")]
#[case("ecdh-sha2-nistp521")]
#[case("diffie-hellman-group-exchange-sha256")]
#[case("diffie-hellman-group-exchange-sha1")]
#[case("diffie-hellman-group14-sha256")]
#[case("diffie-hellman-group14-sha1")]
#[case("diffie-hellman-group1-sha1")]
#[case("diffie-hellman-group16-sha512")]
#[async_std::test]
async fn end_to_end(#[case] kex: &str) -> Result<(), Box<dyn std::error::Error>> {
    common::init();

    let mut peers = common::connect(common::client(kex), common::server(kex));

    futures::try_join!(peers.client.rekey(), peers.server.rekey())?;

    assert!(peers.client.session_id().is_some());
    assert_eq!(peers.client.session_id(), peers.server.session_id());
    assert_eq!(peers.client.exchange_hash(), peers.server.exchange_hash());
    assert_eq!(peers.client.session_id(), peers.client.exchange_hash());

    let negotiated = peers.client.negotiated().unwrap();
    assert_eq!(negotiated.kex, kex.parse::<Kex>()?);
    assert_eq!(Some(negotiated), peers.server.negotiated());

    assert_eq!(
        peers.client_sent.lock().unwrap().last(),
        Some(&assh_kex::wire::message::NEWKEYS)
    );

    Ok(())
}

#[rstest]
#[case("aes256-gcm@openssh.com", "hmac-sha2-256")]
#[case("aes128-gcm@openssh.com", "hmac-sha2-256")]
#[case("aes256-ctr", "hmac-sha2-512-etm@openssh.com")]
#[case("aes192-ctr", "hmac-sha2-256")]
#[case("aes128-ctr", "hmac-sha1-etm@openssh.com")]
#[case("aes256-cbc", "hmac-sha2-512")]
#[case("aes128-cbc", "hmac-sha1")]
#[case("3des-cbc", "hmac-md5")]
#[async_std::test]
async fn transports_interoperate(
    #[case] cipher: &str,
    #[case] mac: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    common::init();

    let mut client = common::client("curve25519-sha256");
    client.algorithms.ciphers = vec![cipher.parse()?];
    client.algorithms.macs = vec![mac.parse()?];

    let mut peers = common::connect(client, common::server("curve25519-sha256"));
    futures::try_join!(peers.client.rekey(), peers.server.rekey())?;

    let mut tx = peers.client_installed.lock().unwrap().tx.take().unwrap();
    let mut rx = peers.server_installed.lock().unwrap().rx.take().unwrap();
    assert!(tx.is_protected() && rx.is_protected());

    let plaintext = b"SSH_MSG_SERVICE_REQUEST ssh-userauth".repeat(8)[..256].to_vec();
    let mut packet = plaintext.clone();

    if tx.cipher.is_aead() {
        assert!(tx.mac.is_none());

        for seq in 3..6u32 {
            let aad = seq.to_be_bytes();

            let tag = tx.cipher.seal(&aad, &mut packet)?;
            assert_ne!(packet, plaintext);

            rx.cipher.open(&aad, &mut packet, &tag)?;
            assert_eq!(packet, plaintext);
        }
    } else {
        let (sign, verify) = (tx.mac.as_ref().unwrap(), rx.mac.as_ref().unwrap());
        assert_eq!(*sign.hmac(), mac.parse::<Hmac>()?);

        for seq in 3..6u32 {
            let tag = sign.sign(seq, &packet);

            tx.cipher.apply(&mut packet)?;
            assert_ne!(packet, plaintext);

            rx.cipher.apply(&mut packet)?;
            assert_eq!(packet, plaintext);

            verify.verify(seq, &packet, &tag)?;
        }
    }

    Ok(())
}

#[async_std::test]
async fn rekey_keeps_the_session_id() -> Result<(), Box<dyn std::error::Error>> {
    common::init();

    let mut peers = common::connect(
        common::client("diffie-hellman-group14-sha256"),
        common::server("diffie-hellman-group14-sha256"),
    );

    futures::try_join!(peers.client.rekey(), peers.server.rekey())?;

    let session_id = peers.client.session_id().unwrap().to_vec();
    let first = peers.client.exchange_hash().unwrap().to_vec();

    futures::try_join!(peers.client.rekey(), peers.server.rekey())?;

    assert_eq!(peers.client.session_id(), Some(&session_id[..]));
    assert_eq!(peers.server.session_id(), Some(&session_id[..]));
    assert_ne!(peers.client.exchange_hash(), Some(&first[..]));
    assert_eq!(peers.client.exchange_hash(), peers.server.exchange_hash());

    Ok(())
}

async fn rekey_then_send<S: Side>(
    session: &mut Session<common::Duplex, S>,
    payload: &[u8],
) -> Result<()> {
    session.rekey().await?;
    session.send(payload).await
}

#[async_std::test]
async fn peer_initiated_rekey_is_transparent() -> Result<(), Box<dyn std::error::Error>> {
    common::init();

    let mut peers = common::connect(
        common::client("ecdh-sha2-nistp256"),
        common::server("ecdh-sha2-nistp256"),
    );

    futures::try_join!(peers.client.rekey(), peers.server.rekey())?;
    let first = peers.server.exchange_hash().unwrap().to_vec();

    let payload = [94, 0, 0, 0, 0, 0, 0, 0, 2, b'h', b'i'];
    let (sent, received) = futures::join!(
        rekey_then_send(&mut peers.client, &payload),
        peers.server.recv()
    );

    sent?;
    assert_eq!(received?, payload);
    assert_ne!(peers.server.exchange_hash(), Some(&first[..]));
    assert_eq!(peers.client.exchange_hash(), peers.server.exchange_hash());

    Ok(())
}

#[async_std::test]
async fn first_use_runs_the_key_exchange() -> Result<(), Box<dyn std::error::Error>> {
    common::init();

    let mut peers = common::connect(
        common::client("curve25519-sha256"),
        common::server("curve25519-sha256"),
    );

    let payload = [5, 0, 0, 0, 12];
    let (sent, received) = futures::join!(peers.client.send(&payload), peers.server.recv());

    sent?;
    assert_eq!(received?, payload);
    assert!(peers.client.session_id().is_some());

    Ok(())
}

#[async_std::test]
async fn untrusted_host_key_is_rejected() {
    common::init();

    let client = Client {
        verifier: HostKeyVerifier::new(|_| false),
        ..common::client("curve25519-sha256")
    };
    let mut peers = common::connect(client, common::server("curve25519-sha256"));

    let (client, server) = futures::join!(peers.client.rekey(), peers.server.rekey());

    let err = client.unwrap_err();
    assert!(matches!(err, Error::Rejected));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(matches!(server, Err(Error::Disconnected)));

    let sent = peers.client_sent.lock().unwrap();
    assert!(!sent.contains(&assh_kex::wire::message::NEWKEYS));
    assert_eq!(sent.last(), Some(&assh_kex::wire::message::DISCONNECT));

    assert!(peers.client.session_id().is_none());
    assert!(matches!(peers.client.recv().await, Err(Error::Disconnected)));
}

#[async_std::test]
async fn pinned_host_key_is_accepted() -> Result<(), Box<dyn std::error::Error>> {
    common::init();

    let server = common::server("curve25519-sha256");
    let client = Client {
        verifier: HostKeyVerifier::pinned(server.keys[0].public_key().clone()),
        ..common::client("curve25519-sha256")
    };
    let mut peers = common::connect(client, server);

    futures::try_join!(peers.client.rekey(), peers.server.rekey())?;

    Ok(())
}

#[async_std::test]
async fn no_common_cipher_is_fatal() {
    common::init();

    let mut client = common::client("curve25519-sha256");
    client.algorithms.ciphers = vec!["aes128-ctr".parse().unwrap()];

    let mut server = common::server("curve25519-sha256");
    server.algorithms.ciphers = vec!["aes256-cbc".parse().unwrap()];

    let mut peers = common::connect(client, server);
    let (client, server) = futures::join!(peers.client.rekey(), peers.server.rekey());

    for err in [client.unwrap_err(), server.unwrap_err()] {
        assert_eq!(err.kind(), ErrorKind::Negotiation);
        assert!(err.to_string().contains("cipher"));
    }
}

#[async_std::test]
async fn silent_peer_times_out() {
    common::init();

    let (pipe, _peer) = common::pair();
    let client = Client {
        timeout: Duration::from_millis(200),
        ..common::client("curve25519-sha256")
    };
    let mut session = Session::new(pipe, client, Server::default().id);

    let err = session.rekey().await.unwrap_err();

    assert!(matches!(err, Error::Timeout));
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(matches!(session.rekey().await, Err(Error::Disconnected)));
}

#[async_std::test]
async fn trickling_peer_times_out() {
    common::init();

    let (pipe, mut peer) = common::pair();
    let client = Client {
        timeout: Duration::from_millis(200),
        ..common::client("curve25519-sha256")
    };
    let mut session = Session::new(pipe, client, Server::default().id);

    let trickle = async {
        for _ in 0..40 {
            async_std::task::sleep(Duration::from_millis(50)).await;

            if peer.send(&[2, 0, 0, 0, 0]).await.is_err() {
                break;
            }
        }
    };
    let rekey = async {
        let start = Instant::now();
        let result = session.rekey().await;

        (result, start.elapsed())
    };

    let ((result, elapsed), ()) = futures::join!(rekey, trickle);

    assert!(matches!(result, Err(Error::Timeout)));
    assert!(elapsed < Duration::from_secs(1));
}

#[async_std::test]
async fn disconnect_reaches_the_peer() -> Result<(), Box<dyn std::error::Error>> {
    common::init();

    let mut peers = common::connect(
        common::client("curve25519-sha256"),
        common::server("curve25519-sha256"),
    );

    futures::try_join!(peers.client.rekey(), peers.server.rekey())?;

    peers
        .client
        .disconnect(DisconnectReason::ByApplication, "bye")
        .await?;

    assert!(matches!(peers.server.recv().await, Err(Error::Disconnected)));
    assert!(matches!(
        peers.client.send(&[5]).await,
        Err(Error::Disconnected)
    ));

    Ok(())
}
